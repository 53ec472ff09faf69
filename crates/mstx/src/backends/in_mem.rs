//! # 🧠 The RAM-only backends
//!
//! An index and a blob store that live on the heap, shared behind
//! `Arc<tokio::sync::Mutex<..>>` so a test can keep a clone and peek inside after
//! handing the other clone to a task.
//!
//! ⚠️ The index is a test double, not a search engine. It upserts on the primary key,
//! matches queries by case-insensitive substring and understands the filter grammar
//! well enough for facet counts. Ranking, typo tolerance and pagination are someone
//! else's problem.

mod filter;
mod in_mem_blob_store;
mod in_mem_index;

pub use in_mem_blob_store::InMemoryBlobStore;
pub use in_mem_index::InMemoryIndex;
