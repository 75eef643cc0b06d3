//! # Asset store
//!
//! Keeps gallery records and their binaries in lockstep:
//!
//! - a binary is written before the record that points at it, and removed
//!   again if the record write fails;
//! - a replaced or deleted record's former binary is removed afterwards;
//! - the record is authoritative: if removing a binary fails the record
//!   operation still stands and the leftover file is logged.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{BinaryRef, GalleryAsset, NewGalleryAsset};
use crate::traits::{AssetRepo, BlobStore};

pub struct AssetStore {
    repo: Arc<dyn AssetRepo>,
    blobs: Arc<dyn BlobStore>,
}

impl AssetStore {
    pub fn new(repo: Arc<dyn AssetRepo>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    /// Stores `binary` and a record owning it.
    ///
    /// A full bounded collection is rejected before anything is written.
    pub async fn put(&self, meta: NewGalleryAsset, binary: &[u8]) -> Result<GalleryAsset> {
        if let Some(limit) = meta.collection.capacity() {
            if self.repo.count_assets(meta.collection).await? >= limit {
                return Err(AppError::CapacityExceeded {
                    collection: meta.collection.as_str().to_string(),
                    limit,
                });
            }
        }

        let binary_ref = self.blobs.write(binary).await?;
        let asset = meta.into_asset(binary_ref);

        if let Err(err) = self.repo.insert_asset(&asset).await {
            self.discard(&asset.binary_ref).await;
            return Err(err);
        }

        tracing::info!(id = %asset.id, collection = asset.collection.as_str(), "asset stored");
        Ok(asset)
    }

    /// Points the record at a new binary and removes the old one.
    pub async fn replace(&self, id: Uuid, binary: &[u8]) -> Result<GalleryAsset> {
        let current = self
            .repo
            .get_asset(id)
            .await?
            .ok_or_else(|| AppError::NotFound("GalleryAsset".into(), id.to_string()))?;

        let new_ref = self.blobs.write(binary).await?;
        if let Err(err) = self.repo.update_binary_ref(id, &new_ref).await {
            self.discard(&new_ref).await;
            return Err(err);
        }

        self.discard(&current.binary_ref).await;
        Ok(GalleryAsset {
            binary_ref: new_ref,
            ..current
        })
    }

    /// Deletes the record, then its binary. Returns the deleted record.
    pub async fn delete(&self, id: Uuid) -> Result<GalleryAsset> {
        let removed = self
            .repo
            .delete_asset(id)
            .await?
            .ok_or_else(|| AppError::NotFound("GalleryAsset".into(), id.to_string()))?;

        self.discard(&removed.binary_ref).await;
        tracing::info!(id = %removed.id, "asset deleted");
        Ok(removed)
    }

    /// Exchanges the binaries of exactly two distinct records.
    pub async fn swap(&self, ids: &[Uuid]) -> Result<()> {
        let [a, b] = ids else {
            return Err(AppError::InvalidOperation(format!(
                "select exactly 2 images to swap, got {}",
                ids.len()
            )));
        };
        if a == b {
            return Err(AppError::InvalidOperation(
                "select exactly 2 images to swap, got 1".into(),
            ));
        }

        self.repo.swap_binary_refs(*a, *b).await?;
        tracing::info!(a = %a, b = %b, "asset binaries swapped");
        Ok(())
    }

    pub fn url(&self, asset: &GalleryAsset) -> String {
        self.blobs.url(&asset.binary_ref)
    }

    async fn discard(&self, binary_ref: &BinaryRef) {
        if let Err(err) = self.blobs.remove(binary_ref).await {
            tracing::error!(binary_ref = %binary_ref, error = %err, "failed to remove binary");
        }
    }
}
