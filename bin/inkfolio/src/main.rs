//! # Inkfolio Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use ink_api::{configure_routes, middleware, AppState};
use ink_config::{LogFormat, LogSettings, Settings};
use ink_core::admission::{AdmissionController, AdmissionPolicy};
use ink_core::cache::GalleryReader;
use ink_core::pipeline::SubmissionPipeline;
use ink_core::publishing::PostPublisher;
use ink_core::traits::{Clock, SystemClock};
use secrecy::ExposeSecret;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-sqlite")]
use ink_db_sqlite::SqliteRepo;

#[cfg(feature = "storage-local")]
use ink_storage_local::LocalBlobStore;

#[cfg(feature = "captcha-simple")]
use ink_captcha_simple::SimpleCaptchaVerifier;

#[cfg(feature = "notify-queue")]
use ink_notify_queue::{LogDelivery, NotificationWorker, QueueNotifier};

#[cfg(not(all(
    feature = "db-sqlite",
    feature = "storage-local",
    feature = "captcha-simple",
    feature = "notify-queue"
)))]
compile_error!("inkfolio needs one plugin for each of: database, storage, captcha, notify");

/// How long the notification worker gets to drain after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(&settings.log);
    if let Some(path) = &settings.env_file {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    if settings.uses_default_captcha_secret() {
        tracing::warn!("captcha.secret is the built-in default; set INKFOLIO__CAPTCHA__SECRET");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 1. Database
    #[cfg(feature = "db-sqlite")]
    let repo = Arc::new(
        SqliteRepo::new(&settings.database.url)
            .await
            .with_context(|| format!("failed to open database {}", settings.database.url))?,
    );

    // 2. Binary storage
    tokio::fs::create_dir_all(&settings.media.root)
        .await
        .with_context(|| format!("failed to create {}", settings.media.root.display()))?;
    #[cfg(feature = "storage-local")]
    let blobs = Arc::new(LocalBlobStore::new(
        settings.media.root.clone(),
        settings.media.url_prefix.clone(),
    ));

    // 3. Captcha
    #[cfg(feature = "captcha-simple")]
    let captcha = Arc::new(
        SimpleCaptchaVerifier::new(settings.captcha.secret.expose_secret())
            .with_ttl(settings.captcha.ttl()),
    );

    // 4. Owner notifications
    #[cfg(feature = "notify-queue")]
    let (notifier, worker) = {
        let (notifier, receiver) = QueueNotifier::channel(settings.notify.queue_capacity);
        let delivery = Arc::new(LogDelivery::new(settings.notify.recipient.clone()));
        (Arc::new(notifier), NotificationWorker::new(receiver, delivery).spawn())
    };

    // 5. Admission, shared by every worker and swept in the background
    let admission = Arc::new(AdmissionController::new(
        AdmissionPolicy {
            limit: settings.rate_limit.limit,
            window: settings.rate_limit.window(),
        },
        Arc::clone(&clock),
    ));
    let sweeper = spawn_sweeper(Arc::clone(&admission), settings.rate_limit.cleanup_interval());

    let pipeline = SubmissionPipeline::new(admission, captcha, notifier, repo.clone())
        .with_notify_timeout(settings.notify.timeout());

    let state = web::Data::new(AppState {
        pipeline,
        gallery: GalleryReader::new(repo.clone(), clock, settings.cache.gallery_ttl()),
        publisher: PostPublisher::new(repo.clone()),
        submissions: repo,
        blobs,
    });

    let (host, port) = settings.server.bind_addr();
    let media_prefix = settings.media.url_prefix.clone();
    let media_root = settings.media.root.clone();
    tracing::info!(%host, port, "inkfolio starting");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::security_headers())
            .wrap(middleware::standard_middleware())
            // Must precede the catch-all scope of the site routes
            .service(actix_files::Files::new(&media_prefix, &media_root))
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("failed to bind {host}:{port}"))?
    .run()
    .await?;

    sweeper.abort();
    drain(worker).await;
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Plain => builder.init(),
    }
}

fn spawn_sweeper(admission: Arc<AdmissionController>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            admission.cleanup();
        }
    })
}

async fn drain(worker: JoinHandle<usize>) {
    match tokio::time::timeout(SHUTDOWN_GRACE, worker).await {
        Ok(Ok(delivered)) => tracing::info!(delivered, "notification queue drained"),
        Ok(Err(err)) => tracing::error!(error = %err, "notification worker panicked"),
        Err(_) => tracing::warn!("notification worker still busy at shutdown"),
    }
}
