//! # Post publishing
//!
//! Creates blog posts with a stable slug and serves the published ones.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{NewPost, Post, PostStatus};
use crate::slug::{slugify, SlugCandidates};
use crate::traits::PostRepo;

pub struct PostPublisher {
    repo: Arc<dyn PostRepo>,
}

impl PostPublisher {
    pub fn new(repo: Arc<dyn PostRepo>) -> Self {
        Self { repo }
    }

    /// Stores a new post, resolving a slug from the title when none is given.
    ///
    /// A resolved slug that loses a race at the storage layer is retried once
    /// with the next free counter. An author-supplied slug is never rewritten,
    /// so a conflict on it is returned as is.
    pub async fn create(&self, draft: NewPost) -> Result<Post> {
        let explicit = draft
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(slugify);

        if let Some(slug) = explicit {
            let post = build_post(draft, slug);
            self.repo.insert_post(&post).await?;
            tracing::info!(slug = %post.slug, "post created");
            return Ok(post);
        }

        let mut candidates = SlugCandidates::new(slugify(&draft.title));
        let slug = self.next_free(&mut candidates).await?;
        let mut post = build_post(draft, slug);

        match self.repo.insert_post(&post).await {
            Ok(()) => {}
            Err(AppError::Conflict(reason)) => {
                tracing::warn!(slug = %post.slug, %reason, "slug taken concurrently, retrying");
                post.slug = self.next_free(&mut candidates).await?;
                self.repo.insert_post(&post).await?;
            }
            Err(err) => return Err(err),
        }

        tracing::info!(slug = %post.slug, "post created");
        Ok(post)
    }

    async fn next_free(&self, candidates: &mut SlugCandidates) -> Result<String> {
        for candidate in candidates.by_ref() {
            if !self.repo.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal("slug candidates exhausted".into()))
    }

    /// Fetches a published post without touching its view count.
    /// Drafts are reported as missing.
    pub async fn find(&self, slug: &str) -> Result<Post> {
        self.repo
            .get_post_by_slug(slug)
            .await?
            .filter(|p| p.status == PostStatus::Published)
            .ok_or_else(|| AppError::NotFound("Post".into(), slug.to_string()))
    }

    /// Fetches a published post and counts the view.
    pub async fn open(&self, slug: &str) -> Result<Post> {
        let mut post = self.find(slug).await?;
        self.repo.record_view(post.id).await?;
        post.view_count += 1;
        Ok(post)
    }

    pub async fn list_published(&self) -> Result<Vec<Post>> {
        self.repo.list_published().await
    }
}

fn build_post(draft: NewPost, slug: String) -> Post {
    let now = Utc::now();
    Post {
        id: Uuid::now_v7(),
        title: draft.title,
        body: draft.body,
        slug,
        status: draft.status,
        created_at: now,
        updated_at: now,
        view_count: 0,
    }
}
