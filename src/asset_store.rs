//! Asset storage for exported documents and re-hosted textures.
//!
//! Every stored asset is identified by a relative path and a SHA-256 hash of
//! its content.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ExportError, Result};

/// Receipt for a stored asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Normalized relative path, without a leading slash.
    pub path: String,
    /// Hex SHA-256 of the content.
    pub hash: String,
    pub size: usize,
}

impl AssetRecord {
    fn new(path: String, data: &[u8]) -> Self {
        Self {
            path,
            hash: content_hash(data),
            size: data.len(),
        }
    }
}

/// Hex SHA-256 of a byte payload.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Destination for exported assets.
#[allow(async_fn_in_trait)]
pub trait AssetStore {
    /// Store `data` at `path`, replacing anything already there.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<AssetRecord>;
}

/// Strip leading slashes and reject paths that escape the store root.
fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ExportError::Asset("empty asset path".to_string()));
    }
    let escapes = Path::new(trimmed)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ExportError::Asset(format!("invalid asset path: {}", path)));
    }
    Ok(trimmed.to_string())
}

/// Stores assets as files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssetStore {
    root: PathBuf,
}

impl DirectoryAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a stored asset path.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(normalize_path(path)?))
    }
}

impl AssetStore for DirectoryAssetStore {
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<AssetRecord> {
        let normalized = normalize_path(path)?;
        let target = self.root.join(&normalized);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;

        let record = AssetRecord::new(normalized, &data);
        log::info!("Wrote {} ({} bytes)", target.display(), record.size);
        Ok(record)
    }
}

/// In-memory store that also remembers the order of writes.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    order: Mutex<Vec<String>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize_path(path).ok()?;
        self.assets.lock().ok()?.get(&path).cloned()
    }

    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|b| String::from_utf8(b).ok())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Paths in the order they were written.
    pub fn write_order(&self) -> Vec<String> {
        self.order.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.assets.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetStore for MemoryAssetStore {
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<AssetRecord> {
        let normalized = normalize_path(path)?;
        let record = AssetRecord::new(normalized.clone(), &data);

        self.assets
            .lock()
            .map_err(|_| ExportError::Asset("asset map poisoned".to_string()))?
            .insert(normalized.clone(), data);
        self.order
            .lock()
            .map_err(|_| ExportError::Asset("asset order poisoned".to_string()))?
            .push(normalized);

        Ok(record)
    }
}
