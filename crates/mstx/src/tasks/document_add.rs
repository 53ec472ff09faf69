use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::common::IndexTarget;
use crate::error::{Result, TaskError};
use crate::ingest::ingest;
use crate::metrics::DOCUMENTS_ADDED;
use crate::rows::DataSource;
use crate::tasks::{Task, TaskContext};

/// 📥 Push every row of `data` into `target`'s index, one call per row.
#[derive(Debug)]
pub struct DocumentAdd {
    pub target: IndexTarget,
    pub data: DataSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentAddOutput {
    pub index: String,
    pub documents_added: u64,
}

#[async_trait]
impl Task for DocumentAdd {
    type Output = DocumentAddOutput;

    async fn run(self, ctx: &TaskContext) -> Result<Self::Output> {
        let index = ctx.connect(&self.target)?;
        let rows = self.data.resolve(ctx.blobs()).await?;
        let mut progress = ctx.progress(self.target.index());

        // 📈 rows that made it are counted even when a later one did not
        let outcome = ingest(rows, &index, &self.target, &mut progress).await;
        let forwarded = match &outcome {
            Ok(count) => *count,
            Err(TaskError::IngestAborted { forwarded, .. }) => *forwarded,
            Err(_) => 0,
        };
        ctx.metrics().increment(DOCUMENTS_ADDED, forwarded).await;
        let documents_added = outcome?;

        info!("📥 {} documents added to '{}'", documents_added, self.target.index());
        Ok(DocumentAddOutput {
            index: self.target.index().to_string(),
            documents_added,
        })
    }
}
