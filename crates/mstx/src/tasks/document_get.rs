use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::backends::RemoteIndex;
use crate::common::{IndexTarget, Row};
use crate::error::{Result, TaskError};
use crate::tasks::{Task, TaskContext};

/// 🔍 Fetch one document by its primary key.
///
/// A missing document is an error unless `allow_missing` is set, in which case the
/// output simply has no document in it.
#[derive(Debug, Clone)]
pub struct DocumentGet {
    pub target: IndexTarget,
    pub id: String,
    pub allow_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentGetOutput {
    pub document: Option<Row>,
}

#[async_trait]
impl Task for DocumentGet {
    type Output = DocumentGetOutput;

    async fn run(self, ctx: &TaskContext) -> Result<Self::Output> {
        let index = ctx.connect(&self.target)?;
        match index.get_by_id(self.target.index(), &self.id).await {
            Ok(document) => {
                info!("🔍 found '{}' in '{}'", self.id, self.target.index());
                Ok(DocumentGetOutput {
                    document: Some(document),
                })
            }
            Err(TaskError::NotFound { .. }) if self.allow_missing => {
                debug!("🤷 '{}' is not in '{}', and that is allowed", self.id, self.target.index());
                Ok(DocumentGetOutput { document: None })
            }
            Err(e) => Err(e),
        }
    }
}
