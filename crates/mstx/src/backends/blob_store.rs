use std::io;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::backends::{file, in_mem};
use crate::error::{Result, TaskError};

/// 🚿 A readable byte stream. Owned by whoever opened it; dropping it releases it.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

const SCHEME: &str = "blob://";

/// 🔗 An opaque handle to a stored object, printed as `blob://<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct BlobReference {
    name: String,
}

impl BlobReference {
    /// 🔍 Parse a `blob://<name>` string. Anything else is unresolvable.
    ///
    /// Names may contain `/` for nesting but never `..`, a leading `/`, or a backslash.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.strip_prefix(SCHEME).ok_or_else(|| {
            TaskError::unresolved(
                raw,
                io::Error::new(io::ErrorKind::InvalidInput, format!("reference must start with '{SCHEME}'")),
            )
        })?;
        let is_sketchy = name.is_empty()
            || name.starts_with('/')
            || name.contains('\\')
            || name.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
        if is_sketchy {
            return Err(TaskError::unresolved(
                raw,
                io::Error::new(io::ErrorKind::InvalidInput, "reference name is empty or escapes the store"),
            ));
        }
        Ok(Self { name: name.to_string() })
    }

    pub(crate) fn from_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for BlobReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SCHEME}{}", self.name)
    }
}

impl From<BlobReference> for String {
    fn from(reference: BlobReference) -> Self {
        reference.to_string()
    }
}

/// 🗄️ Durable storage for intermediate files, the workflow engine's shared drawer.
///
/// # Contract 📜
/// - `open_for_read` fails with `TaskError::UnresolvedReference` when the object is absent.
/// - `write_and_store` drains the stream into a fresh object and returns its reference.
///   References are never reused.
#[async_trait]
pub trait BlobStore: std::fmt::Debug + Send + Sync {
    async fn open_for_read(&self, reference: &BlobReference) -> Result<ByteStream>;

    async fn write_and_store(&self, stream: ByteStream) -> Result<BlobReference>;
}

/// 🎭 Disk or RAM. The tasks do not care which.
#[derive(Debug, Clone)]
pub enum BlobBackend {
    File(file::FileBlobStore),
    InMemory(in_mem::InMemoryBlobStore),
}

#[async_trait]
impl BlobStore for BlobBackend {
    async fn open_for_read(&self, reference: &BlobReference) -> Result<ByteStream> {
        match self {
            BlobBackend::File(f) => f.open_for_read(reference).await,
            BlobBackend::InMemory(i) => i.open_for_read(reference).await,
        }
    }

    async fn write_and_store(&self, stream: ByteStream) -> Result<BlobReference> {
        match self {
            BlobBackend::File(f) => f.write_and_store(stream).await,
            BlobBackend::InMemory(i) => i.write_and_store(stream).await,
        }
    }
}

/// 🎫 A fresh object name. uuid v4, `.ndjson` so humans know what is inside.
pub(crate) fn fresh_blob_name() -> String {
    format!("{}.ndjson", uuid::Uuid::new_v4())
}
