//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AssetCollection, BinaryRef, GalleryAsset, Notification, Post, StoredComment, Submission,
};

/// Hand-off to whatever alerts the site owner (mail queue, chat hook, ...).
///
/// `Ok(())` only means the notification was queued, never that it was delivered.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<()>;
}

/// Answers whether a captcha response proves a human is on the other end.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn is_human_verified(&self, response: &str) -> bool;
}

/// Persistence for visitor submissions (feedback and comments).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    /// Stores the entity, assigning its id and creation timestamp.
    async fn insert_submission(&self, submission: &Submission) -> Result<Uuid>;
    /// Active top-level comments of a post, oldest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<StoredComment>>;
    /// Post a stored comment belongs to, or `None` if there is no such comment.
    async fn comment_post(&self, comment_id: Uuid) -> Result<Option<Uuid>>;
}

/// Persistence for blog posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
    /// Fails with `AppError::Conflict` when the slug is already taken.
    async fn insert_post(&self, post: &Post) -> Result<()>;
    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>>;
    /// Published posts, newest first.
    async fn list_published(&self) -> Result<Vec<Post>>;
    async fn record_view(&self, id: Uuid) -> Result<()>;
}

/// Persistence for gallery records. Binaries live in a [`BlobStore`].
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AssetRepo: Send + Sync {
    async fn get_asset(&self, id: Uuid) -> Result<Option<GalleryAsset>>;
    async fn count_assets(&self, collection: AssetCollection) -> Result<usize>;
    /// Fails with `AppError::CapacityExceeded` when the collection is full.
    async fn insert_asset(&self, asset: &GalleryAsset) -> Result<()>;
    async fn update_binary_ref(&self, id: Uuid, binary_ref: &BinaryRef) -> Result<()>;
    /// Returns the removed record, or `None` if it did not exist.
    async fn delete_asset(&self, id: Uuid) -> Result<Option<GalleryAsset>>;
    /// Exchanges the binary references of two records in one transaction.
    async fn swap_binary_refs(&self, a: Uuid, b: Uuid) -> Result<()>;
    /// All assets of a collection in insertion order.
    async fn list_assets(&self, collection: AssetCollection) -> Result<Vec<GalleryAsset>>;
}

/// Media storage contract for gallery binaries.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Saves raw bytes under a fresh reference no other record uses.
    async fn write(&self, data: &[u8]) -> Result<BinaryRef>;
    async fn remove(&self, binary_ref: &BinaryRef) -> Result<()>;
    /// Returns the public URL of the binary.
    fn url(&self, binary_ref: &BinaryRef) -> String;
}

/// Monotonic time source for windows and TTLs.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(any(test, feature = "testing"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "testing"))]
mod manual {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::Clock;

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        origin: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
            *offset += by;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            let offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
            self.origin + *offset
        }
    }
}
