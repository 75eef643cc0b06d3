//! # Domain Models
//!
//! These structs represent the core entities of Inkfolio.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the caller for admission purposes (usually the peer IP).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Family of mutating requests that share one admission window per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    Feedback,
    Comment,
}

impl ActionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::Feedback => "feedback",
            ActionClass::Comment => "comment",
        }
    }
}

/// A validated contact-form message ("I want a tattoo").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub name: String,
    pub email: String,
    pub message: String,
    pub telegram: Option<String>,
    pub whatsapp: Option<String>,
}

/// A validated blog comment, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub post_id: Uuid,
    /// Set when the comment replies to another comment
    pub parent_id: Option<Uuid>,
    pub username: String,
    pub body: String,
}

/// A validated entity on its way to storage. Immutable from here on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    Feedback(Feedback),
    Comment(Comment),
}

impl Submission {
    pub fn action_class(&self) -> ActionClass {
        match self {
            Submission::Feedback(_) => ActionClass::Feedback,
            Submission::Comment(_) => ActionClass::Comment,
        }
    }
}

/// A comment as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub username: String,
    pub body: String,
    /// Cleared by a moderator to hide the comment
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

/// A blog post. The slug is assigned once and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub view_count: i64,
}

/// Author input for a new post. `slug: None` asks the resolver for one.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub slug: Option<String>,
    pub status: PostStatus,
}

/// Opaque handle of a stored binary, owned by exactly one GalleryAsset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryRef(pub String);

impl BinaryRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinaryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which gallery an asset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCollection {
    /// Front-page images, capped at [`MAIN_GALLERY_CAPACITY`]
    Main,
    Portfolio,
}

/// Hard ceiling of the main page gallery.
pub const MAIN_GALLERY_CAPACITY: usize = 15;

impl AssetCollection {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            AssetCollection::Main => Some(MAIN_GALLERY_CAPACITY),
            AssetCollection::Portfolio => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCollection::Main => "main",
            AssetCollection::Portfolio => "portfolio",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "main" => Some(AssetCollection::Main),
            "portfolio" => Some(AssetCollection::Portfolio),
            _ => None,
        }
    }
}

/// An image record in one of the galleries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryAsset {
    pub id: Uuid,
    pub collection: AssetCollection,
    pub binary_ref: BinaryRef,
    pub caption: Option<String>,
    /// Author of the pictured work
    pub attribution: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata for an asset that has no binary yet.
#[derive(Debug, Clone)]
pub struct NewGalleryAsset {
    pub collection: AssetCollection,
    pub caption: Option<String>,
    pub attribution: Option<String>,
}

impl NewGalleryAsset {
    pub fn into_asset(self, binary_ref: BinaryRef) -> GalleryAsset {
        GalleryAsset {
            id: Uuid::now_v7(),
            collection: self.collection,
            binary_ref,
            caption: self.caption,
            attribution: self.attribution,
            created_at: Utc::now(),
        }
    }
}

/// Payload handed to the notifier. Delivery is not observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}
