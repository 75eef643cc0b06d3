//! # ink-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `ink-core` domain models: submissions, posts and gallery records.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use ink_core::error::{AppError, Result};
use ink_core::models::{
    AssetCollection, BinaryRef, GalleryAsset, Post, PostStatus, StoredComment, Submission,
};
use ink_core::traits::{AssetRepo, PostRepo, SubmissionRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS feedback (
        id BLOB PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        message TEXT NOT NULL,
        telegram TEXT,
        whatsapp TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        id BLOB PRIMARY KEY,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        view_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id BLOB PRIMARY KEY,
        post_id BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        parent_id BLOB REFERENCES comments(id) ON DELETE CASCADE,
        username TEXT NOT NULL,
        body TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS comments_post_idx ON comments (post_id)",
    "CREATE TABLE IF NOT EXISTS gallery_assets (
        id BLOB PRIMARY KEY,
        collection TEXT NOT NULL,
        binary_ref TEXT NOT NULL UNIQUE,
        caption TEXT,
        attribution TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS gallery_assets_collection_idx ON gallery_assets (collection)",
];

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Connects and creates the schema if needed.
    ///
    /// An in-memory database lives in a single connection, so the pool is
    /// pinned to one connection that never idles out.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let repo = Self { pool };
        repo.migrate().await?;
        tracing::info!(url, "sqlite repository ready");
        Ok(repo)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Unique-constraint violations become `Conflict`, everything else `Internal`.
fn db_err(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(db.message().to_string())
        }
        _ => AppError::Internal(err.to_string()),
    }
}

fn decode_err(column: &str, raw: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value {raw:?}").into(),
    }
}

fn post_from_row(row: &SqliteRow) -> std::result::Result<Post, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        slug: row.try_get("slug")?,
        status: PostStatus::parse(&status).ok_or_else(|| decode_err("status", &status))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        view_count: row.try_get("view_count")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> std::result::Result<StoredComment, sqlx::Error> {
    Ok(StoredComment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        parent_id: row.try_get("parent_id")?,
        username: row.try_get("username")?,
        body: row.try_get("body")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn asset_from_row(row: &SqliteRow) -> std::result::Result<GalleryAsset, sqlx::Error> {
    let collection: String = row.try_get("collection")?;
    Ok(GalleryAsset {
        id: row.try_get("id")?,
        collection: AssetCollection::parse(&collection)
            .ok_or_else(|| decode_err("collection", &collection))?,
        binary_ref: BinaryRef(row.try_get("binary_ref")?),
        caption: row.try_get("caption")?,
        attribution: row.try_get("attribution")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl SubmissionRepo for SqliteRepo {
    async fn insert_submission(&self, submission: &Submission) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let created_at = Utc::now();

        match submission {
            Submission::Feedback(f) => {
                sqlx::query("INSERT INTO feedback (id, name, email, message, telegram, whatsapp, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
                    .bind(id)
                    .bind(&f.name)
                    .bind(&f.email)
                    .bind(&f.message)
                    .bind(&f.telegram)
                    .bind(&f.whatsapp)
                    .bind(created_at)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            }
            Submission::Comment(c) => {
                sqlx::query("INSERT INTO comments (id, post_id, parent_id, username, body, active, created_at) VALUES (?, ?, ?, ?, ?, 1, ?)")
                    .bind(id)
                    .bind(c.post_id)
                    .bind(c.parent_id)
                    .bind(&c.username)
                    .bind(&c.body)
                    .bind(created_at)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?;
            }
        }
        Ok(id)
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<StoredComment>> {
        let rows = sqlx::query(
            "SELECT * FROM comments WHERE post_id = ? AND parent_id IS NULL AND active = 1 ORDER BY id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(comment_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err)
    }
    async fn comment_post(&self, comment_id: Uuid) -> Result<Option<Uuid>> {
        sqlx::query_scalar("SELECT post_id FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl PostRepo for SqliteRepo {
    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        sqlx::query("INSERT INTO posts (id, title, body, slug, status, created_at, updated_at, view_count) VALUES (?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(&post.slug)
            .bind(post.status.as_str())
            .bind(post.created_at)
            .bind(post.updated_at)
            .bind(post.view_count)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(post_from_row).transpose().map_err(db_err)
    }

    async fn list_published(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query("SELECT * FROM posts WHERE status = ? ORDER BY id DESC")
            .bind(PostStatus::Published.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(post_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err)
    }

    async fn record_view(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl AssetRepo for SqliteRepo {
    async fn get_asset(&self, id: Uuid) -> Result<Option<GalleryAsset>> {
        let row = sqlx::query("SELECT * FROM gallery_assets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(asset_from_row).transpose().map_err(db_err)
    }

    async fn count_assets(&self, collection: AssetCollection) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gallery_assets WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Counts and inserts in one transaction so a full collection stays full.
    async fn insert_asset(&self, asset: &GalleryAsset) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(limit) = asset.collection.capacity() {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM gallery_assets WHERE collection = ?")
                    .bind(asset.collection.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_err)?;
            if count as usize >= limit {
                return Err(AppError::CapacityExceeded {
                    collection: asset.collection.as_str().to_string(),
                    limit,
                });
            }
        }

        sqlx::query("INSERT INTO gallery_assets (id, collection, binary_ref, caption, attribution, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(asset.id)
            .bind(asset.collection.as_str())
            .bind(asset.binary_ref.as_str())
            .bind(&asset.caption)
            .bind(&asset.attribution)
            .bind(asset.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update_binary_ref(&self, id: Uuid, binary_ref: &BinaryRef) -> Result<()> {
        let result = sqlx::query("UPDATE gallery_assets SET binary_ref = ? WHERE id = ?")
            .bind(binary_ref.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("GalleryAsset".into(), id.to_string()));
        }
        Ok(())
    }

    async fn delete_asset(&self, id: Uuid) -> Result<Option<GalleryAsset>> {
        let row = sqlx::query("DELETE FROM gallery_assets WHERE id = ? RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(asset_from_row).transpose().map_err(db_err)
    }

    /// Both rows change or neither does.
    ///
    /// `binary_ref` is unique, so the first record is parked on a placeholder
    /// while the second takes its reference.
    async fn swap_binary_refs(&self, a: Uuid, b: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut refs = Vec::with_capacity(2);
        for id in [a, b] {
            let binary_ref: Option<String> =
                sqlx::query_scalar("SELECT binary_ref FROM gallery_assets WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_err)?;
            refs.push(
                binary_ref.ok_or_else(|| AppError::NotFound("GalleryAsset".into(), id.to_string()))?,
            );
        }

        let placeholder = format!("swap:{}", Uuid::new_v4());
        for (id, binary_ref) in [(a, &placeholder), (b, &refs[0]), (a, &refs[1])] {
            sqlx::query("UPDATE gallery_assets SET binary_ref = ? WHERE id = ?")
                .bind(binary_ref)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_assets(&self, collection: AssetCollection) -> Result<Vec<GalleryAsset>> {
        let rows = sqlx::query("SELECT * FROM gallery_assets WHERE collection = ? ORDER BY id ASC")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(asset_from_row)
            .collect::<std::result::Result<_, _>>()
            .map_err(db_err)
    }
}
