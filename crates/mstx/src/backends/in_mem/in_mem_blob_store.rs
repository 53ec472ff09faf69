use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::blob_store::{BlobReference, BlobStore, ByteStream, fresh_blob_name};
use crate::error::{Result, TaskError};

/// 🧠 A blob store that forgets everything when the last clone drops.
///
/// Clones share the same map, so a test can seed it, hand a clone to a task, and read
/// what the task wrote afterwards. It also counts open read handles: every stream it
/// hands out bumps the count and dropping the stream brings it back down. A count
/// stuck above zero after a task returns means somebody leaked a stream.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
    open_handles: Arc<AtomicUsize>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🌱 Seed a blob under a chosen name.
    pub async fn insert(&self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> BlobReference {
        let name = name.into();
        let contents: Vec<u8> = contents.into();
        self.blobs.lock().await.insert(name.clone(), Arc::from(contents));
        BlobReference::from_name(name)
    }

    /// 🔍 Peek at a blob without opening a handle.
    pub async fn contents(&self, reference: &BlobReference) -> Option<Vec<u8>> {
        self.blobs.lock().await.get(reference.name()).map(|bytes| bytes.to_vec())
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 🚿 How many read streams are out there right now.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn open_for_read(&self, reference: &BlobReference) -> Result<ByteStream> {
        let bytes = self.blobs.lock().await.get(reference.name()).cloned().ok_or_else(|| {
            TaskError::unresolved(
                reference.to_string(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such blob in memory"),
            )
        })?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        trace!("📂 opened {} ({} open)", reference, self.open_handles());
        Ok(Box::new(TrackedReader {
            inner: Cursor::new(bytes),
            handles: Arc::clone(&self.open_handles),
        }))
    }

    async fn write_and_store(&self, mut stream: ByteStream) -> Result<BlobReference> {
        let mut contents = Vec::new();
        stream
            .read_to_end(&mut contents)
            .await
            .map_err(|e| TaskError::storage("draining stream into memory", e))?;
        Ok(self.insert(fresh_blob_name(), contents).await)
    }
}

/// 🚿 A cursor over a blob that signs itself out of the handle count on drop.
struct TrackedReader {
    inner: Cursor<Arc<[u8]>>,
    handles: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn the_one_where_handles_are_counted_in_and_out() -> Result<()> {
        let store = InMemoryBlobStore::new();
        let reference = store.insert("movies.ndjson", "{\"id\":1}\n").await;

        let mut first = store.open_for_read(&reference).await?;
        let second = store.open_for_read(&reference).await?;
        assert_eq!(store.open_handles(), 2);

        let mut text = String::new();
        first.read_to_string(&mut text).await.expect("💀 read");
        assert_eq!(text, "{\"id\":1}\n");

        drop(first);
        drop(second);
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_written_blobs_can_be_peeked_at() -> Result<()> {
        let store = InMemoryBlobStore::new();
        let reference = store.write_and_store(Box::new(&b"{\"a\":1}\n"[..])).await?;
        assert_eq!(store.contents(&reference).await, Some(b"{\"a\":1}\n".to_vec()));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.open_handles(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_unknown_name_is_unresolved_and_nothing_is_opened() {
        let store = InMemoryBlobStore::new();
        let err = store
            .open_for_read(&BlobReference::from_name("ghost.ndjson"))
            .await
            .err()
            .expect("💀 should not open");
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
        assert_eq!(store.open_handles(), 0);
    }
}
