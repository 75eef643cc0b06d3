//! inkfolio/crates/ink-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Inkfolio:
//! visitor submissions, post publishing, gallery assets and their caches.

pub mod admission;
pub mod assets;
pub mod cache;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod publishing;
pub mod slug;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

pub use admission::{AdmissionController, AdmissionPolicy, Decision};
pub use assets::AssetStore;
pub use cache::{GalleryCache, GalleryReader, GALLERY_TTL};
pub use pipeline::{Outcome, SubmissionPipeline, SubmissionRequest, SubmissionTarget, UserMessage};
pub use publishing::PostPublisher;
