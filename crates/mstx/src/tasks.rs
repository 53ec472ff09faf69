//! 🎬 Tasks: the four things a workflow step can ask of Meilisearch.
//!
//! Each task is a plain struct of already-resolved inputs. Running it consumes it.
//! Everything it needs from the outside world (blob store, a way to reach the index,
//! counters) comes in through a [`TaskContext`], and the index handle it opens lives
//! exactly as long as the `run` call.
//!
//! ```text
//!   DocumentAdd ──► rows ──► ingest ──► RemoteIndex::add_row (×N)
//!   DocumentGet ──────────────────────► RemoteIndex::get_by_id
//!   Search ───────► RemoteIndex::search ───────► BlobStore::write_and_store
//!   FacetSearch ──► RemoteIndex::facet_search ─► BlobStore::write_and_store
//! ```

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::backends::{BlobBackend, CommonHttpConfig, InMemoryIndex, IndexBackend, MeilisearchIndex};
use crate::common::IndexTarget;
use crate::error::Result;
use crate::metrics::MetricRegistry;
use crate::progress::ProgressMetrics;

pub mod document_add;
pub mod document_get;
pub mod facet_search;
pub mod search;

pub use document_add::{DocumentAdd, DocumentAddOutput};
pub use document_get::{DocumentGet, DocumentGetOutput};
pub use facet_search::FacetSearch;
pub use search::{Search, StoredHits};

/// 🎯 One unit of work. Run once, get an output or a `TaskError`.
#[async_trait]
pub trait Task: Send + Sized {
    type Output: Serialize + Send;

    async fn run(self, ctx: &TaskContext) -> Result<Self::Output>;
}

/// 🔌 How a task reaches its index.
///
/// Holds the recipe, not the connection. `connect` builds a fresh handle per task.
#[derive(Debug, Clone)]
pub enum Connector {
    /// 📡 Over HTTP, using the target's URL and key.
    Meilisearch(CommonHttpConfig),
    /// 🧠 A shared in-process index. The target's URL and key are ignored.
    InMemory(InMemoryIndex),
}

impl Connector {
    pub fn connect(&self, target: &IndexTarget) -> Result<IndexBackend> {
        debug!("🔌 connecting to {:?}", target);
        match self {
            Connector::Meilisearch(http) => Ok(IndexBackend::Meilisearch(MeilisearchIndex::new(target, http)?)),
            Connector::InMemory(index) => Ok(IndexBackend::InMemory(index.clone())),
        }
    }
}

/// 🧰 What every task gets handed: storage, a way to the index, and somewhere to count things.
#[derive(Debug, Clone)]
pub struct TaskContext {
    blobs: BlobBackend,
    connector: Connector,
    metrics: MetricRegistry,
    show_progress: bool,
}

impl TaskContext {
    pub fn new(blobs: BlobBackend, connector: Connector) -> Self {
        Self {
            blobs,
            connector,
            metrics: MetricRegistry::new(),
            show_progress: false,
        }
    }

    /// 🎨 Draw a progress spinner during ingest.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn blobs(&self) -> &BlobBackend {
        &self.blobs
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    pub fn connect(&self, target: &IndexTarget) -> Result<IndexBackend> {
        self.connector.connect(target)
    }

    pub(crate) fn progress(&self, label: &str) -> ProgressMetrics {
        ProgressMetrics::new(label, self.show_progress)
    }
}
