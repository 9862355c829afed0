//! On-disk storage for uploaded image bytes.
//!
//! Files live in `{public_dir}/images/{generated name}` and are served
//! statically under `/public/images/`.

pub mod names;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::StorageError;

pub use names::{generate_image_name, upload_extension};

/// Subdirectory of the public directory holding uploads.
pub const IMAGES_DIR: &str = "images";

/// Writes and removes uploaded images under a fixed directory.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    /// Storage rooted at `{public_dir}/images`.
    pub fn new(public_dir: impl AsRef<Path>) -> Self {
        Self {
            root: public_dir.as_ref().join(IMAGES_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a stored image.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let is_plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(|c| c == '/' || c == '\\')
            && Path::new(name).file_name().is_some();

        if is_plain {
            Ok(self.root.join(name))
        } else {
            Err(StorageError::InvalidName(name.to_string()))
        }
    }

    /// Write the uploaded bytes, creating the directory on first use.
    pub async fn write(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        let io_err = |source| StorageError::Io {
            name: name.to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        tokio::fs::write(&path, &data).await.map_err(io_err)?;

        debug!(name = name, bytes = data.len(), "Stored image");
        Ok(())
    }

    /// Remove a stored image. A file that is already gone is not an error.
    pub async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name = name, "Removed image");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(name = name, "Image file already missing");
                Ok(())
            }
            Err(source) => Err(StorageError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }
}
