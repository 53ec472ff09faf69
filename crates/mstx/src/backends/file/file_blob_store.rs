use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::backends::blob_store::{BlobReference, BlobStore, ByteStream, fresh_blob_name};
use crate::error::{Result, TaskError};

/// 💾 Blobs as plain files under one root directory.
///
/// Cheap to clone. Holds a path, not a handle. Every `open_for_read` opens its own file,
/// and the caller owns it until they drop it.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// 🚀 Points the store at `root`, creating the directory if it is not there yet.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| TaskError::storage(format!("creating blob root '{}'", root.display()), e))?;
        debug!("💾 blob store rooted at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, reference: &BlobReference) -> PathBuf {
        reference
            .name()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn open_for_read(&self, reference: &BlobReference) -> Result<ByteStream> {
        let path = self.path_for(reference);
        trace!("📂 opening {} at {}", reference, path.display());
        let file = File::open(&path)
            .await
            .map_err(|e| TaskError::unresolved(reference.to_string(), e))?;
        Ok(Box::new(file))
    }

    async fn write_and_store(&self, mut stream: ByteStream) -> Result<BlobReference> {
        let reference = BlobReference::from_name(fresh_blob_name());
        let path = self.path_for(&reference);

        let written = async {
            let mut file = File::create(&path).await?;
            let bytes = tokio::io::copy(&mut stream, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match written {
            Ok(bytes) => {
                debug!("💾 stored {} ({} bytes)", reference, bytes);
                Ok(reference)
            }
            Err(e) => {
                // 🧹 no half-written blobs left behind for the next step to trip on
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!("🧹 could not remove partial blob {}: {}", path.display(), cleanup);
                }
                Err(TaskError::storage(format!("writing blob '{}'", path.display()), e))
            }
        }
    }
}
