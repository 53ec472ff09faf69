//! 🔎 mstx: Meilisearch tasks for workflow steps.
//!
//! Four tasks (add documents, get one by id, search, facet search), each a single
//! sequential run against one index, with results handed to a blob store so the
//! next step can pick them up. Configure with TOML or `MSTX_*` env vars, call [`run`].

pub mod app_config;
pub mod backends;
pub mod codec;
pub mod common;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod progress;
pub mod rows;
pub mod tasks;

use std::collections::BTreeMap;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::app_config::{AppConfig, TaskConfig};
use crate::common::IndexTarget;
use crate::tasks::{DocumentAdd, DocumentGet, FacetSearch, Search, Task, TaskContext};

pub use crate::common::Row;
pub use crate::error::{ErrorKind, TaskError};

/// 📋 What a run produced: the task's output as JSON and every counter it touched.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task: &'static str,
    pub index: String,
    pub output: serde_json::Value,
    pub metrics: BTreeMap<String, u64>,
}

async fn execute<T: Task>(task: T, ctx: &TaskContext) -> anyhow::Result<serde_json::Value> {
    let output = task.run(ctx).await?;
    serde_json::to_value(output).context("💀 Task output could not be turned into JSON")
}

/// 🚀 Build the context from config, run the configured task once, report back.
pub async fn run(config: AppConfig) -> anyhow::Result<RunReport> {
    let name = config.task.name();
    let index = config.task.index().to_string();
    info!("🎬 running {} against '{}'", name, index);

    let blobs = config.storage.blob_backend().await?;
    let (connector, url, key) = config.connection.connector();
    let target = IndexTarget::new(index.clone(), url, key);
    let ctx = TaskContext::new(blobs, connector).with_progress(config.show_progress);

    let output = match config.task {
        TaskConfig::DocumentAdd { data, .. } => {
            let data = data
                .into_source()
                .await
                .context("💀 The data section of the DocumentAdd task could not be turned into rows")?;
            execute(DocumentAdd { target, data }, &ctx).await
        }
        TaskConfig::DocumentGet { id, allow_missing, .. } => {
            execute(
                DocumentGet {
                    target,
                    id,
                    allow_missing,
                },
                &ctx,
            )
            .await
        }
        TaskConfig::Search { query, .. } => execute(Search { target, query }, &ctx).await,
        TaskConfig::FacetSearch {
            facet_name,
            facet_query,
            filters,
            ..
        } => {
            execute(
                FacetSearch {
                    target,
                    facet_name,
                    facet_query,
                    filters,
                },
                &ctx,
            )
            .await
        }
    }
    .with_context(|| format!("💀 {name} on index '{index}' failed"))?;

    let metrics = ctx.metrics().snapshot().await;
    info!("✅ {} finished", name);
    Ok(RunReport {
        task: name,
        index,
        output,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{ConnectionConfig, StorageConfig};
    use crate::rows::DataConfig;
    use serde_json::json;

    fn in_memory(task: TaskConfig) -> AppConfig {
        AppConfig {
            connection: ConnectionConfig::InMemory,
            storage: StorageConfig::InMemory,
            task,
            show_progress: false,
        }
    }

    #[tokio::test]
    async fn the_one_where_a_dry_run_add_reports_its_count() -> anyhow::Result<()> {
        let report = run(in_memory(TaskConfig::DocumentAdd {
            index: "movies".into(),
            data: DataConfig {
                from_list: Some(vec![json!({"id": "1"}), json!({"id": "2"})]),
                ..Default::default()
            },
        }))
        .await?;

        assert_eq!(report.task, "DocumentAdd");
        assert_eq!(report.output, json!({"index": "movies", "documents_added": 2}));
        assert_eq!(report.metrics.get("documents.added"), Some(&2));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_searching_a_missing_index_fails_with_context() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = in_memory(TaskConfig::Search {
            index: "movies".into(),
            query: "anything".into(),
        });
        config.storage = StorageConfig::File {
            root_dir: dir.path().to_path_buf(),
        };

        // 🧠 a fresh in-memory index has no 'movies' yet, so this one is a 404
        let err = run(config).await.unwrap_err();
        let task_error = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<TaskError>())
            .expect("💀 a TaskError should be in the chain");
        assert_eq!(task_error.kind(), ErrorKind::RemoteIndexError);
        assert!(format!("{err:#}").contains("Search on index 'movies' failed"), "{err:#}");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_data_section_with_two_sources_is_refused() {
        let err = run(in_memory(TaskConfig::DocumentAdd {
            index: "movies".into(),
            data: DataConfig {
                from_list: Some(vec![]),
                from_uri: Some("blob://x.ndjson".into()),
                ..Default::default()
            },
        }))
        .await
        .unwrap_err();
        let kind = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<TaskError>())
            .map(TaskError::kind);
        assert_eq!(kind, Some(ErrorKind::InvalidInputShape));
    }
}
