//! 📈 Named counters, the kind a workflow engine scrapes after a task finishes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

pub const DOCUMENTS_ADDED: &str = "documents.added";
pub const SEARCH_HITS: &str = "search.hits";
pub const FACET_SEARCH_HITS: &str = "facet_search.hits";

/// 📈 A bag of monotonically increasing counters.
///
/// Clones share the same bag. Sorted by name so reports come out the same every time.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    counters: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// ➕ Bump `name` by `by`. A counter that was never touched starts at zero.
    pub async fn increment(&self, name: &str, by: u64) {
        let mut counters = self.counters.lock().await;
        let value = counters.entry(name.to_string()).or_insert(0);
        *value += by;
        debug!("📈 {} += {} (now {})", name, by, value);
    }

    pub async fn get(&self, name: &str) -> u64 {
        self.counters.lock().await.get(name).copied().unwrap_or(0)
    }

    /// 📸 A copy of every counter as it stands right now.
    pub async fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().await.clone()
    }
}
