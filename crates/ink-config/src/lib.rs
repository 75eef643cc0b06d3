//! # ink-config
//!
//! Layered settings for the Inkfolio binary.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults
//! 2. an optional `inkfolio.toml` in the working directory
//! 3. environment variables such as `INKFOLIO__SERVER__PORT=9000`
//!
//! A `.env` file is read into the environment before step 3.
//!
//! Nothing here logs: settings are loaded before the subscriber exists, so
//! the binary reports [`Settings::env_file`] and
//! [`Settings::uses_default_captcha_secret`] once tracing is up.

use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "INKFOLIO";
pub const FILE_NAME: &str = "inkfolio";

const DEFAULT_CAPTCHA_SECRET: &str = "change-me";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub notify: NotifySettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub captcha: CaptchaSettings,
    pub log: LogSettings,
    /// The `.env` file that was read, if any.
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct NotifySettings {
    pub queue_capacity: usize,
    pub timeout_ms: u64,
    /// Where owner notifications end up.
    pub recipient: String,
}

impl NotifySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct RateLimitSettings {
    pub limit: usize,
    pub window_secs: u64,
    /// How often stale client windows are swept.
    pub cleanup_secs: u64,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheSettings {
    pub gallery_ttl_secs: u64,
}

impl CacheSettings {
    pub fn gallery_ttl(&self) -> Duration {
        Duration::from_secs(self.gallery_ttl_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct CaptchaSettings {
    pub secret: SecretString,
    /// How long an issued challenge stays answerable.
    pub ttl_secs: u64,
}

impl CaptchaSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Settings {
    /// Loads `.env`, the optional settings file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = dotenvy::dotenv().ok();

        let builder = Config::builder()
            .add_source(File::with_name(FILE_NAME).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        let mut settings = Self::from_builder(builder)?;
        settings.env_file = env_file;
        Ok(settings)
    }

    pub fn uses_default_captcha_secret(&self) -> bool {
        self.captcha.secret.expose_secret() == DEFAULT_CAPTCHA_SECRET
    }

    /// Applies defaults beneath whatever sources `builder` already carries.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://inkfolio.db")?
            .set_default("media.root", "./data/media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("notify.queue_capacity", 64)?
            .set_default("notify.timeout_ms", 5_000)?
            .set_default("notify.recipient", "owner@localhost")?
            .set_default("rate_limit.limit", 2)?
            .set_default("rate_limit.window_secs", 600)?
            .set_default("rate_limit.cleanup_secs", 60)?
            .set_default("cache.gallery_ttl_secs", 1_800)?
            .set_default("captcha.secret", DEFAULT_CAPTCHA_SECRET)?
            .set_default("captcha.ttl_secs", 600)?
            .set_default("log.format", "plain")?
            .set_default("log.filter", "info")?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("notify.queue_capacity", self.notify.queue_capacity as u64),
            ("notify.timeout_ms", self.notify.timeout_ms),
            ("rate_limit.limit", self.rate_limit.limit as u64),
            ("rate_limit.window_secs", self.rate_limit.window_secs),
            ("rate_limit.cleanup_secs", self.rate_limit.cleanup_secs),
            ("captcha.ttl_secs", self.captcha.ttl_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".into(),
                });
            }
        }

        if !self.media.url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "media.url_prefix",
                reason: format!("{:?} must start with '/'", self.media.url_prefix),
            });
        }
        Ok(())
    }
}
