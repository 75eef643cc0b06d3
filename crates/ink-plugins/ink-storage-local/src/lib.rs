//! # ink-storage-local
//! inkfolio/crates/ink-plugins/ink-storage-local/src/lib.rs
//! Local filesystem implementation of `BlobStore`.
//! Features: directory sharding, image type sniffing, one file per record.

use async_trait::async_trait;
use ink_core::error::{AppError, Result};
use ink_core::models::BinaryRef;
use ink_core::traits::BlobStore;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub struct LocalBlobStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Generates a sharded relative path: "ab/cd/abcd...ef.jpg"
    fn sharded_name(name: &str, extension: &str) -> String {
        format!("{}/{}/{}.{}", &name[0..2], &name[2..4], name, extension)
    }

    /// Resolves a reference below the root, refusing anything that escapes it.
    fn resolve(&self, binary_ref: &BinaryRef) -> Result<PathBuf> {
        let relative = Path::new(binary_ref.as_str());
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || binary_ref.as_str().is_empty() {
            return Err(AppError::AssetIo(format!(
                "invalid binary reference {:?}",
                binary_ref.as_str()
            )));
        }
        Ok(self.root_path.join(relative))
    }
}

fn io_err(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::AssetIo(format!("{action} {}: {err}", path.display()))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    /// Saves an upload under a fresh random name.
    /// Identical uploads get separate files so each record owns its own.
    async fn write(&self, data: &[u8]) -> Result<BinaryRef> {
        // 1. Sniff the image type from the magic bytes
        let format = image::guess_format(data)
            .map_err(|e| AppError::AssetIo(format!("unsupported image: {e}")))?;
        let extension = format.extensions_str().first().copied().unwrap_or("bin");

        let name = Uuid::new_v4().simple().to_string();
        let binary_ref = BinaryRef(Self::sharded_name(&name, extension));
        let target_path = self.resolve(&binary_ref)?;

        // 2. Ensure directory exists
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err("create", parent, e))?;
        }

        // 3. Never overwrite an existing file
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target_path)
            .await
            .map_err(|e| io_err("open", &target_path, e))?;
        file.write_all(data)
            .await
            .map_err(|e| io_err("write", &target_path, e))?;
        file.flush()
            .await
            .map_err(|e| io_err("flush", &target_path, e))?;

        tracing::debug!(binary_ref = %binary_ref, bytes = data.len(), "binary written");
        Ok(binary_ref)
    }

    /// Removes the file. An already missing file counts as removed.
    async fn remove(&self, binary_ref: &BinaryRef) -> Result<()> {
        let path = self.resolve(binary_ref)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(binary_ref = %binary_ref, "binary already gone");
                Ok(())
            }
            Err(e) => Err(io_err("remove", &path, e)),
        }
    }

    fn url(&self, binary_ref: &BinaryRef) -> String {
        format!("{}/{}", self.url_prefix, binary_ref)
    }
}
