//! Storage-delete collaborator for message media.
//!
//! Messages store public URLs; the storage key is the URL with the configured
//! public prefix stripped. Files live under the media root on local disk.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("invalid media reference: {0}")]
    InvalidReference(String),
    #[error("media I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Deletes stored media by the reference kept on a message.
pub trait MediaStorage: Send + Sync {
    fn delete(&self, reference: &str) -> Result<(), MediaError>;
}

/// Media kept on local disk under `root`.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Map a stored reference to a path under the media root.
    /// Rejects anything that would escape the root.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, MediaError> {
        let base = self.public_base_url.trim_end_matches('/');
        let key = if !base.is_empty() {
            reference
                .strip_prefix(base)
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(reference)
        } else {
            reference
        };

        let key_path = Path::new(key);
        let is_plain = !key.is_empty()
            && key_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(MediaError::InvalidReference(reference.to_string()));
        }

        Ok(self.root.join(key_path))
    }
}

impl MediaStorage for LocalMediaStorage {
    fn delete(&self, reference: &str) -> Result<(), MediaError> {
        let path = self.resolve(reference)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Deleted media file {}", path.display());
                Ok(())
            }
            // Already gone counts as deleted
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
