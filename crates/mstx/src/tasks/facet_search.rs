use async_trait::async_trait;
use tracing::info;

use crate::backends::{FacetSearchRequest, RemoteIndex};
use crate::common::IndexTarget;
use crate::error::Result;
use crate::metrics::FACET_SEARCH_HITS;
use crate::tasks::search::{StoredHits, store_hits};
use crate::tasks::{Task, TaskContext};

/// 📊 Count the values of one facet across the documents that pass `filters`.
///
/// Facet hits (`{"value": .., "count": ..}`) are stored one per line. `total_hits` in the
/// output is the count of the first, most frequent, facet value.
#[derive(Debug, Clone)]
pub struct FacetSearch {
    pub target: IndexTarget,
    pub facet_name: String,
    pub facet_query: Option<String>,
    pub filters: Vec<String>,
}

#[async_trait]
impl Task for FacetSearch {
    type Output = StoredHits;

    async fn run(self, ctx: &TaskContext) -> Result<Self::Output> {
        let index = ctx.connect(&self.target)?;
        let request = FacetSearchRequest {
            facet_name: self.facet_name,
            facet_query: self.facet_query,
            filters: self.filters,
        };
        let result = index.facet_search(self.target.index(), &request).await?;

        let uri = store_hits(ctx, &result.facet_hits).await?;
        ctx.metrics().increment(FACET_SEARCH_HITS, result.total_hits).await;

        info!(
            "📊 facet '{}' in '{}': {} values, top count {}, stored at {}",
            request.facet_name,
            self.target.index(),
            result.facet_hits.len(),
            result.total_hits,
            uri
        );
        Ok(StoredHits {
            uri,
            total_hits: result.total_hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BlobBackend, InMemoryBlobStore, InMemoryIndex};
    use crate::error::ErrorKind;
    use crate::tasks::Connector;

    async fn library() -> (InMemoryBlobStore, TaskContext) {
        let index = InMemoryIndex::new();
        for row in [
            r#"{"id":1,"title":"Dune","genre":"Fiction","rating":5}"#,
            r#"{"id":2,"title":"Emma","genre":"Romance","rating":4}"#,
            r#"{"id":3,"title":"Neuromancer","genre":"Fiction","rating":4}"#,
            r#"{"id":4,"title":"Eragon","genre":"Fiction","rating":2}"#,
        ] {
            index.add_row("books", row).await.expect("💀 seed");
        }
        let store = InMemoryBlobStore::new();
        let ctx = TaskContext::new(BlobBackend::InMemory(store.clone()), Connector::InMemory(index));
        (store, ctx)
    }

    fn facets(filters: &[&str]) -> FacetSearch {
        FacetSearch {
            target: IndexTarget::new("books", "http://localhost:7700", ""),
            facet_name: "genre".into(),
            facet_query: Some("fic".into()),
            filters: filters.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn the_one_where_the_top_facet_count_is_the_headline() -> Result<()> {
        let (store, ctx) = library().await;
        let output = facets(&["rating > 3"]).run(&ctx).await?;
        assert_eq!(output.total_hits, 2);
        let stored = store.contents(&output.uri).await.expect("💀 blob exists");
        assert_eq!(String::from_utf8_lossy(&stored), "{\"value\":\"Fiction\",\"count\":2}\n");
        assert_eq!(ctx.metrics().get(FACET_SEARCH_HITS).await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_bad_filter_stores_nothing() {
        let (store, ctx) = library().await;
        let err = facets(&["rating >>> 3"]).run(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteIndexError);
        assert!(store.is_empty().await);
    }
}
