//! # ink-api
//!
//! The web routing and orchestration layer for Inkfolio.

pub mod client;
pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::web;

pub use client::{client_key, ClientKeyExtractor};
pub use error::ApiError;
pub use handlers::AppState;

/// Configures the public routes of the site.
///
/// Mounted under an empty scope so the binary can nest it (e.g. `/api`).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            // Front page gallery
            .route("/", web::get().to(handlers::main_gallery))
            .route("/portfolio", web::get().to(handlers::portfolio))
            // Feedback form
            .route("/contact", web::post().to(handlers::contact))
            .route("/blog", web::get().to(handlers::blog_index))
            .route("/blog/{slug}", web::get().to(handlers::view_post))
            // Comment form on a post
            .route("/blog/{slug}", web::post().to(handlers::comment)),
    );
}
