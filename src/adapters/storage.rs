//! Filesystem object store.
//!
//! Stands in for the deployment's bucket store behind the `ObjectStore`
//! trait: objects are content-addressed files under a media directory,
//! with a JSON sidecar holding content type and size. URLs follow the
//! `{public_base}/{object_name}` shape so the object name can be derived
//! back from any stored URL, which is what `stat`/`get`/`presign` rely on.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{FieldError, FieldResult};

use super::ObjectStore;

/// Stored-object metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStat {
    pub content_type: Option<String>,
    pub size: u64,
}

pub struct FsObjectStore {
    root: PathBuf,
    public_base: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Derive the stable object name from a stored URL (last path segment).
    pub fn object_name(url: &str) -> FieldResult<&str> {
        let without_query = url.split('?').next().unwrap_or(url);
        without_query
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                FieldError::usage(format!("cannot derive object name from url '{}'", url))
            })
    }

    fn object_path(&self, name: &str) -> FieldResult<PathBuf> {
        // Object names are flat; reject anything that could escape the root
        if name.contains('/') || name.contains("..") {
            return Err(FieldError::usage(format!("invalid object name '{}'", name)));
        }
        Ok(self.root.join(name))
    }

    fn meta_path(&self, name: &str) -> FieldResult<PathBuf> {
        Ok(self.object_path(name)?.with_extension("meta.json"))
    }

    async fn read_meta(&self, name: &str) -> FieldResult<ObjectStat> {
        let path = self.meta_path(name)?;
        let raw = tokio::fs::read_to_string(&path).await.map_err(|_| {
            FieldError::not_found(format!("object '{}' not found in store", name))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn file_extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|e| e.to_str())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bytes: &[u8], name: &str, mime: &str) -> FieldResult<String> {
        if bytes.is_empty() {
            return Err(FieldError::usage("cannot store an empty file"));
        }

        tokio::fs::create_dir_all(&self.root).await?;

        // Content-addressed name keeps repeated uploads stable
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hex::encode(hasher.finalize());

        let object_name = match file_extension(name) {
            Some(ext) => format!("{}-{}.{}", Utc::now().timestamp_millis(), &digest[..12], ext),
            None => format!("{}-{}", Utc::now().timestamp_millis(), &digest[..12]),
        };

        let path = self.object_path(&object_name)?;
        tokio::fs::write(&path, bytes).await?;

        let meta = ObjectStat {
            content_type: Some(mime.to_string()),
            size: bytes.len() as u64,
        };
        tokio::fs::write(self.meta_path(&object_name)?, serde_json::to_vec(&meta)?).await?;

        Ok(format!("{}/{}", self.public_base, object_name))
    }

    async fn stat(&self, url: &str) -> FieldResult<ObjectStat> {
        let name = Self::object_name(url)?;
        self.read_meta(name).await
    }

    async fn get(&self, url: &str) -> FieldResult<Vec<u8>> {
        let name = Self::object_name(url)?;
        let path = self.object_path(name)?;
        tokio::fs::read(&path).await.map_err(|_| {
            FieldError::not_found(format!("object '{}' not found in store", name))
        })
    }

    async fn presign(&self, url: &str, ttl_seconds: u64) -> FieldResult<String> {
        let name = Self::object_name(url)?;
        // Fail for unknown objects so callers can degrade the URL to null
        self.read_meta(name).await?;

        let expires = Utc::now().timestamp() + ttl_seconds as i64;
        Ok(format!("{}/{}?expires={}", self.public_base, name, expires))
    }
}
