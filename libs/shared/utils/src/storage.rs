use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

pub const PROFILE_PHOTO_DIR: &str = "profile-photos";
const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid image data: {0}")]
    InvalidData(String),
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("File too large: {0} bytes")]
    TooLarge(usize),
    #[error("Invalid storage reference: {0}")]
    InvalidReference(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores uploaded files under the configured storage root.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_root(config.storage_root.clone())
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Saves a profile photo given as a base64 data URL (or bare base64 with an explicit
    /// content type) and returns its reference relative to the storage root.
    pub async fn save_profile_photo(
        &self,
        data: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let (mime, payload) = split_data_url(data, content_type)?;
        let extension = extension_for(&mime)?;

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        if bytes.is_empty() {
            return Err(StorageError::InvalidData("empty payload".to_string()));
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(StorageError::TooLarge(bytes.len()));
        }

        let dir = self.root.join(PROFILE_PHOTO_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&file_name), &bytes).await?;

        let reference = format!("{}/{}", PROFILE_PHOTO_DIR, file_name);
        info!("Stored profile photo {} ({} bytes)", reference, bytes.len());
        Ok(reference)
    }

    /// Resolves a stored reference back to a path inside the storage root.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        if reference.is_empty()
            || reference.contains("..")
            || reference.starts_with('/')
            || reference.contains('\\')
        {
            return Err(StorageError::InvalidReference(reference.to_string()));
        }
        debug!("Resolving storage reference {}", reference);
        Ok(self.root.join(reference))
    }

    /// Deletes a stored file. A reference whose file is already gone is not an error.
    pub async fn remove(&self, reference: &str) -> Result<(), StorageError> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed stored file {}", reference);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Stored file {} was already gone", reference);
                Ok(())
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

fn split_data_url<'a>(
    data: &'a str,
    content_type: Option<&str>,
) -> Result<(String, &'a str), StorageError> {
    if let Some(rest) = data.strip_prefix("data:") {
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| StorageError::InvalidData("missing data URL payload".to_string()))?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or_else(|| StorageError::InvalidData("data URL is not base64".to_string()))?;
        Ok((mime.to_ascii_lowercase(), payload))
    } else {
        let mime = content_type
            .ok_or_else(|| StorageError::InvalidData("missing content type".to_string()))?;
        Ok((mime.to_ascii_lowercase(), data))
    }
}

fn extension_for(mime: &str) -> Result<&'static str, StorageError> {
    match mime {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        "image/gif" => Ok("gif"),
        other => Err(StorageError::UnsupportedType(other.to_string())),
    }
}
