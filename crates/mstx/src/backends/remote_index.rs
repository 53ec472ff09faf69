use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backends::{in_mem, meilisearch};
use crate::common::Row;
use crate::error::Result;

/// 🎫 What the index hands back when a document is accepted.
///
/// Meilisearch indexes asynchronously: a 202 means "queued", not "searchable". The
/// handle is the receipt. We log it and move on. We do not poll it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHandle {
    pub task_uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub enqueued_at: Option<String>,
}

/// 🔎 A facet search: which facet, which prefix of its values, and which filters narrow the docs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSearchRequest {
    pub facet_name: String,
    pub facet_query: Option<String>,
    pub filters: Vec<String>,
}

/// 📊 Facet hits are `{"value": ..., "count": ...}` rows.
///
/// `total_hits` is the `count` of the first (most frequent) facet hit, or 0 when nothing matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetSearchResult {
    pub facet_hits: Vec<Row>,
    pub total_hits: u64,
}

impl FacetSearchResult {
    /// 🧮 Wraps facet hits and reads the headline count off the first one.
    pub fn from_hits(facet_hits: Vec<Row>) -> Self {
        let total_hits = facet_hits
            .first()
            .and_then(|hit| hit.get("count"))
            .and_then(|count| count.as_u64().or_else(|| count.as_f64().map(|c| c as u64)))
            .unwrap_or(0);
        Self {
            facet_hits,
            total_hits,
        }
    }
}

/// 📡 A remote search index: the thing rows go into and hits come out of.
///
/// # Contract 📜
/// - Every call is a single round trip. Nothing is batched, nothing is retried.
/// - `add_row` takes an already-encoded row. Upsert semantics belong to the index
///   (same primary key means replace, not duplicate).
/// - `get_by_id` fails with `TaskError::NotFound` when the id is absent.
/// - `search` returns whatever the service's default page holds.
#[async_trait]
pub trait RemoteIndex: std::fmt::Debug + Send + Sync {
    async fn add_row(&self, index: &str, encoded_row: &str) -> Result<TaskHandle>;

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Row>;

    async fn search(&self, index: &str, query: &str) -> Result<Vec<Row>>;

    async fn facet_search(&self, index: &str, request: &FacetSearchRequest) -> Result<FacetSearchResult>;
}

/// 🎭 The many faces of a remote index. The real one speaks HTTP, the other one lives in RAM.
#[derive(Debug)]
pub enum IndexBackend {
    Meilisearch(meilisearch::MeilisearchIndex),
    InMemory(in_mem::InMemoryIndex),
}

#[async_trait]
impl RemoteIndex for IndexBackend {
    async fn add_row(&self, index: &str, encoded_row: &str) -> Result<TaskHandle> {
        match self {
            IndexBackend::Meilisearch(m) => m.add_row(index, encoded_row).await,
            IndexBackend::InMemory(i) => i.add_row(index, encoded_row).await,
        }
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Row> {
        match self {
            IndexBackend::Meilisearch(m) => m.get_by_id(index, id).await,
            IndexBackend::InMemory(i) => i.get_by_id(index, id).await,
        }
    }

    async fn search(&self, index: &str, query: &str) -> Result<Vec<Row>> {
        match self {
            IndexBackend::Meilisearch(m) => m.search(index, query).await,
            IndexBackend::InMemory(i) => i.search(index, query).await,
        }
    }

    async fn facet_search(&self, index: &str, request: &FacetSearchRequest) -> Result<FacetSearchResult> {
        match self {
            IndexBackend::Meilisearch(m) => m.facet_search(index, request).await,
            IndexBackend::InMemory(i) => i.facet_search(index, request).await,
        }
    }
}
