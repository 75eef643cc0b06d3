//! # ink-api Handlers
//!
//! This module coordinates the flow between HTTP requests and core services.
//!
//! Form posts always answer `200 OK` with the pipeline state and the
//! messages to show, even when the visitor was rate limited or the form was
//! rejected. Read endpoints use regular status codes.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use ink_core::cache::GalleryReader;
use ink_core::models::{AssetCollection, GalleryAsset, Post, StoredComment};
use ink_core::pipeline::{Outcome, SubmissionPipeline, SubmissionRequest, SubmissionTarget, UserMessage};
use ink_core::publishing::PostPublisher;
use ink_core::traits::{BlobStore, SubmissionRepo};
use ink_core::validation::{FormData, PARENT_FIELD};
use serde::Serialize;
use uuid::Uuid;

use crate::client::ClientKeyExtractor;
use crate::error::ApiError;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub gallery: GalleryReader,
    pub publisher: PostPublisher,
    pub submissions: Arc<dyn SubmissionRepo>,
    pub blobs: Arc<dyn BlobStore>,
}

#[derive(Debug, Serialize)]
pub struct ImageView {
    pub id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub attribution: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GalleryView {
    pub collection: AssetCollection,
    pub images: Vec<ImageView>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionView {
    pub state: &'static str,
    pub messages: Vec<UserMessage>,
}

impl From<&Outcome> for SubmissionView {
    fn from(outcome: &Outcome) -> Self {
        Self {
            state: outcome.state(),
            messages: outcome.messages(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub title: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub view_count: i64,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            title: post.title,
            slug: post.slug,
            created_at: post.created_at,
            view_count: post.view_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub post: Post,
    pub comments: Vec<StoredComment>,
}

/// Renders the front page gallery (`/`).
pub async fn main_gallery(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    gallery(&data, AssetCollection::Main).await
}

/// Renders the portfolio gallery (`/portfolio`).
pub async fn portfolio(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    gallery(&data, AssetCollection::Portfolio).await
}

async fn gallery(data: &AppState, collection: AssetCollection) -> Result<HttpResponse, ApiError> {
    let assets = data.gallery.list(collection).await?;
    let images = assets
        .iter()
        .map(|asset| image_view(data.blobs.as_ref(), asset))
        .collect();
    Ok(HttpResponse::Ok().json(GalleryView { collection, images }))
}

fn image_view(blobs: &dyn BlobStore, asset: &GalleryAsset) -> ImageView {
    ImageView {
        id: asset.id,
        url: blobs.url(&asset.binary_ref),
        caption: asset.caption.clone(),
        attribution: asset.attribution.clone(),
    }
}

/// Handles the feedback form (`POST /contact`).
pub async fn contact(
    data: web::Data<AppState>,
    client: ClientKeyExtractor,
    form: web::Form<FormData>,
) -> HttpResponse {
    let request = SubmissionRequest {
        target: SubmissionTarget::Feedback,
        form: form.into_inner(),
    };
    let outcome = data.pipeline.submit(&client.0, request).await;
    HttpResponse::Ok().json(SubmissionView::from(&outcome))
}

/// Lists published posts, newest first (`/blog`).
pub async fn blog_index(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let posts: Vec<PostSummary> = data
        .publisher
        .list_published()
        .await?
        .into_iter()
        .map(PostSummary::from)
        .collect();
    Ok(HttpResponse::Ok().json(posts))
}

/// Shows a post with its comments and counts the view (`/blog/{slug}`).
pub async fn view_post(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let slug = path.into_inner();
    let post = data.publisher.open(&slug).await?;
    let comments = data.submissions.list_comments(post.id).await?;
    Ok(HttpResponse::Ok().json(PostView { post, comments }))
}

/// Handles the comment form under a post (`POST /blog/{slug}`).
pub async fn comment(
    data: web::Data<AppState>,
    client: ClientKeyExtractor,
    path: web::Path<String>,
    form: web::Form<FormData>,
) -> Result<HttpResponse, ApiError> {
    let slug = path.into_inner();
    let post = data.publisher.find(&slug).await?;

    let mut form = form.into_inner();
    let parent_id = match form.remove(PARENT_FIELD).filter(|v| !v.trim().is_empty()) {
        None => None,
        Some(raw) => match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => return Ok(HttpResponse::BadRequest().finish()),
        },
    };

    let request = SubmissionRequest {
        target: SubmissionTarget::Comment {
            post_id: post.id,
            post_title: post.title,
            parent_id,
        },
        form,
    };
    let outcome = data.pipeline.submit(&client.0, request).await;
    Ok(HttpResponse::Ok().json(SubmissionView::from(&outcome)))
}
