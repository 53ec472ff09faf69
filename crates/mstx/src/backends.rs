//! 🔌 Backends: where the real I/O happens.
//!
//! Two seams, two traits. A [`RemoteIndex`] is the search service rows go into and
//! hits come out of. A [`BlobStore`] is the shared drawer where workflow steps leave
//! files for each other. Each trait gets an enum that dispatches to the concrete
//! flavour, so tasks hold an `IndexBackend` and a `BlobBackend` and never ask which
//! one they got.
//!
//! 🎭 Flavours on offer:
//! - `meilisearch`: the real thing, over HTTP.
//! - `file`: blobs on local disk, one file per reference.
//! - `in_mem`: both seams in RAM, for tests and for dry runs that touch nothing.
//!
//! 🦆

pub mod blob_store;
pub mod common_config;
pub mod remote_index;

pub mod file;
pub mod in_mem;
pub mod meilisearch;

// 🎯 Re-exports so callers write `backends::RemoteIndex` instead of spelunking.
pub use blob_store::{BlobBackend, BlobReference, BlobStore, ByteStream};
pub use common_config::CommonHttpConfig;
pub use file::FileBlobStore;
pub use in_mem::{InMemoryBlobStore, InMemoryIndex};
pub use meilisearch::MeilisearchIndex;
pub use remote_index::{FacetSearchRequest, FacetSearchResult, IndexBackend, RemoteIndex, TaskHandle};
