use std::io::Cursor;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::backends::{BlobReference, BlobStore, RemoteIndex};
use crate::codec::compose_ndjson;
use crate::common::{IndexTarget, Row};
use crate::error::Result;
use crate::metrics::SEARCH_HITS;
use crate::tasks::{Task, TaskContext};

/// 🔎 Full-text search, hits written to the blob store one per line.
#[derive(Debug, Clone)]
pub struct Search {
    pub target: IndexTarget,
    pub query: String,
}

/// 📦 Where the hits were stored and how many there were.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredHits {
    pub uri: BlobReference,
    pub total_hits: u64,
}

/// 💾 Compose `hits` as newline-delimited JSON and hand them to the blob store.
pub(crate) async fn store_hits(ctx: &TaskContext, hits: &[Row]) -> Result<BlobReference> {
    let payload = compose_ndjson(hits)?;
    ctx.blobs()
        .write_and_store(Box::new(Cursor::new(payload.into_bytes())))
        .await
}

#[async_trait]
impl Task for Search {
    type Output = StoredHits;

    async fn run(self, ctx: &TaskContext) -> Result<Self::Output> {
        let index = ctx.connect(&self.target)?;
        let hits = index.search(self.target.index(), &self.query).await?;
        let total_hits = hits.len() as u64;

        let uri = store_hits(ctx, &hits).await?;
        ctx.metrics().increment(SEARCH_HITS, total_hits).await;

        info!("🔎 '{}' matched {} in '{}', stored at {}", self.query, total_hits, self.target.index(), uri);
        Ok(StoredHits { uri, total_hits })
    }
}
