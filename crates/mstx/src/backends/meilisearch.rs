//! # 📡 THE MEILISEARCH BACKEND
//!
//! One HTTP round trip per operation. Add a document, fetch a document, search,
//! facet-search. The server answers a document addition with a task receipt and
//! indexes in its own time. We keep the receipt and do not wait around.
//!
//! Errors come back as `{message, code, type, link}` and are carried into
//! `TaskError::RemoteIndex` word for word, so whoever reads the log sees what the
//! server said and not our paraphrase of it.

mod meilisearch_index;

pub use meilisearch_index::MeilisearchIndex;
