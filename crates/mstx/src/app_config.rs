//! 🔧 App Configuration: TOML and `MSTX_*` env vars in, one [`AppConfig`] out.
//!
//! ```toml
//! [connection.Meilisearch]
//! url = "http://localhost:7700"
//! key = "MASTER_KEY"
//!
//! [storage.File]
//! root_dir = "/var/lib/mstx/blobs"
//!
//! [task.Search]
//! index = "movies"
//! query = "John"
//! ```
//!
//! The same thing from the environment: `MSTX_CONNECTION__MEILISEARCH__URL=...`,
//! `MSTX_TASK__SEARCH__QUERY=John`, and so on. Env keys arrive lowercased, which is
//! why every enum variant also answers to its snake_case name. A file that wants to
//! override an env var has to use that same snake_case spelling (`[task.search]`),
//! otherwise the two land under different keys. 🦆

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::backends::{BlobBackend, CommonHttpConfig, FileBlobStore, InMemoryBlobStore, InMemoryIndex};
use crate::rows::DataConfig;
use crate::tasks::Connector;

pub const ENV_PREFIX: &str = "MSTX_";

/// 📦 Everything one invocation needs: where Meilisearch is, where blobs go, what to do.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub storage: StorageConfig,
    pub task: TaskConfig,
    /// 🎨 Draw a spinner while rows are ingested.
    #[serde(default)]
    pub show_progress: bool,
}

/// 📡 How to reach the index.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum ConnectionConfig {
    #[serde(alias = "meilisearch")]
    Meilisearch(MeilisearchConnectionConfig),
    /// 🧠 A throwaway in-process index. Good for dry runs, useless for anything lasting.
    #[serde(alias = "in_memory")]
    InMemory,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MeilisearchConnectionConfig {
    pub url: String,
    /// 🔒 Empty for an instance running without a master key.
    #[serde(default)]
    pub key: String,
    #[serde(flatten)]
    pub http: CommonHttpConfig,
}

/// 🗄️ Where intermediate files live.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum StorageConfig {
    #[serde(alias = "file")]
    File { root_dir: PathBuf },
    #[serde(alias = "in_memory")]
    InMemory,
}

/// 🎬 Which task to run, with its inputs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum TaskConfig {
    #[serde(alias = "document_add")]
    DocumentAdd { index: String, data: DataConfig },
    #[serde(alias = "document_get")]
    DocumentGet {
        index: String,
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default)]
        allow_missing: bool,
    },
    #[serde(alias = "search")]
    Search { index: String, query: String },
    #[serde(alias = "facet_search")]
    FacetSearch {
        index: String,
        facet_name: String,
        #[serde(default)]
        facet_query: Option<String>,
        #[serde(default)]
        filters: Vec<String>,
    },
}

impl TaskConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TaskConfig::DocumentAdd { .. } => "DocumentAdd",
            TaskConfig::DocumentGet { .. } => "DocumentGet",
            TaskConfig::Search { .. } => "Search",
            TaskConfig::FacetSearch { .. } => "FacetSearch",
        }
    }

    pub fn index(&self) -> &str {
        match self {
            TaskConfig::DocumentAdd { index, .. }
            | TaskConfig::DocumentGet { index, .. }
            | TaskConfig::Search { index, .. }
            | TaskConfig::FacetSearch { index, .. } => index,
        }
    }
}

/// 🔢 `MSTX_TASK__DOCUMENT_GET__ID=13` reaches us as a number. An id is an id.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Unsigned(n) => n.to_string(),
        Id::Signed(n) => n.to_string(),
    })
}

impl ConnectionConfig {
    /// 🔌 The connector plus the (url, key) pair targets should carry.
    pub(crate) fn connector(&self) -> (Connector, &str, &str) {
        match self {
            ConnectionConfig::Meilisearch(meili) => (Connector::Meilisearch(meili.http.clone()), &meili.url, &meili.key),
            ConnectionConfig::InMemory => (Connector::InMemory(InMemoryIndex::new()), "memory://", ""),
        }
    }
}

impl StorageConfig {
    pub(crate) async fn blob_backend(&self) -> anyhow::Result<BlobBackend> {
        match self {
            StorageConfig::File { root_dir } => {
                let store = FileBlobStore::new(root_dir.clone())
                    .await
                    .with_context(|| format!("💀 Could not set up blob storage at '{}'", root_dir.display()))?;
                Ok(BlobBackend::File(store))
            }
            StorageConfig::InMemory => Ok(BlobBackend::InMemory(InMemoryBlobStore::new())),
        }
    }
}

fn figment(config_file_name: Option<&Path>) -> Figment {
    let config = Figment::new().merge(Env::prefixed(ENV_PREFIX).split("__"));
    match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    }
}

/// 🚀 Load the config from `MSTX_*` env vars, plus a TOML file when one is given.
///
/// The TOML file is merged last, so it wins when both set the same key.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {}",
        config_file_name.map(|p| p.display().to_string()).unwrap_or_else(|| "(env only)".into())
    );

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables ({ENV_PREFIX}*).",
            path.display()
        ),
        None => format!("💀 Failed to parse configuration from environment variables ({ENV_PREFIX}*). No file was given."),
    };

    figment(config_file_name).extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use serde_json::json;

    fn from_toml(contents: &str) -> AppConfig {
        let dir = tempfile::tempdir().expect("💀 tempdir");
        let path = dir.path().join("mstx.toml");
        std::fs::write(&path, contents).expect("💀 write config");
        Figment::new()
            .merge(Toml::file(&path))
            .extract()
            .expect("💀 config should parse")
    }

    #[test]
    fn the_one_where_a_search_config_reads_like_it_looks() {
        let config = from_toml(
            r#"
            [connection.Meilisearch]
            url = "http://localhost:7700"
            key = "MASTER_KEY"
            request_timeout_secs = 5

            [storage.File]
            root_dir = "/tmp/blobs"

            [task.Search]
            index = "movies"
            query = "John"
            "#,
        );

        assert_eq!(
            config.connection,
            ConnectionConfig::Meilisearch(MeilisearchConnectionConfig {
                url: "http://localhost:7700".into(),
                key: "MASTER_KEY".into(),
                http: CommonHttpConfig {
                    connect_timeout_secs: 10,
                    request_timeout_secs: 5,
                },
            })
        );
        assert_eq!(config.storage, StorageConfig::File { root_dir: "/tmp/blobs".into() });
        assert_eq!(config.task.name(), "Search");
        assert_eq!(config.task.index(), "movies");
        assert!(!config.show_progress);
    }

    #[test]
    fn the_one_where_facet_search_and_inline_data_parse() {
        let config = from_toml(
            r#"
            connection = "InMemory"
            storage = "InMemory"

            [task.FacetSearch]
            index = "movies"
            facet_name = "genre"
            facet_query = "Fiction"
            filters = ["rating > 3"]
            "#,
        );
        assert_eq!(config.connection, ConnectionConfig::InMemory);
        assert_eq!(
            config.task,
            TaskConfig::FacetSearch {
                index: "movies".into(),
                facet_name: "genre".into(),
                facet_query: Some("Fiction".into()),
                filters: vec!["rating > 3".into()],
            }
        );

        let config = from_toml(
            r#"
            connection = "InMemory"
            storage = "InMemory"

            [task.DocumentAdd]
            index = "movies"

            [task.DocumentAdd.data]
            from_map = { id = "13", title = "Notebook" }
            "#,
        );
        match config.task {
            TaskConfig::DocumentAdd { data, .. } => {
                let row = data.from_map.expect("💀 from_map should be set");
                assert_eq!(serde_json::Value::Object(row), json!({"id": "13", "title": "Notebook"}));
            }
            other => panic!("💀 expected DocumentAdd, got {other:?}"),
        }
    }

    #[test]
    fn the_one_where_numeric_ids_are_still_ids() {
        let config = from_toml(
            r#"
            connection = "InMemory"
            storage = "InMemory"

            [task.DocumentGet]
            index = "movies"
            id = 13
            "#,
        );
        assert_eq!(
            config.task,
            TaskConfig::DocumentGet {
                index: "movies".into(),
                id: "13".into(),
                allow_missing: false,
            }
        );
    }

    #[test]
    fn the_one_where_the_environment_alone_is_enough() {
        Jail::expect_with(|jail| {
            jail.set_env("MSTX_CONNECTION__MEILISEARCH__URL", "http://meili:7700");
            jail.set_env("MSTX_CONNECTION__MEILISEARCH__KEY", "from-env");
            jail.set_env("MSTX_STORAGE", "InMemory");
            jail.set_env("MSTX_TASK__DOCUMENT_GET__INDEX", "movies");
            jail.set_env("MSTX_TASK__DOCUMENT_GET__ID", "13");
            jail.set_env("MSTX_TASK__DOCUMENT_GET__ALLOW_MISSING", "true");

            let config = load_config(None).map_err(|e| figment::Error::from(format!("{e:#}")))?;
            match config.connection {
                ConnectionConfig::Meilisearch(meili) => {
                    assert_eq!(meili.url, "http://meili:7700");
                    assert_eq!(meili.key, "from-env");
                }
                other => panic!("💀 expected Meilisearch, got {other:?}"),
            }
            assert_eq!(
                config.task,
                TaskConfig::DocumentGet {
                    index: "movies".into(),
                    id: "13".into(),
                    allow_missing: true,
                }
            );
            Ok(())
        });
    }

    #[test]
    fn the_one_where_the_file_wins_a_tie_with_the_environment() {
        Jail::expect_with(|jail| {
            jail.set_env("MSTX_TASK__SEARCH__QUERY", "from-env");
            jail.create_file(
                "mstx.toml",
                r#"
                connection = "InMemory"
                storage = "InMemory"

                [task.search]
                index = "movies"
                query = "from-file"
                "#,
            )?;

            let config = load_config(Some(Path::new("mstx.toml"))).map_err(|e| figment::Error::from(format!("{e:#}")))?;
            assert_eq!(
                config.task,
                TaskConfig::Search {
                    index: "movies".into(),
                    query: "from-file".into(),
                }
            );
            Ok(())
        });
    }

    #[test]
    fn the_one_where_a_missing_task_is_reported_with_context() {
        Jail::expect_with(|jail| {
            jail.create_file("mstx.toml", "connection = \"InMemory\"\nstorage = \"InMemory\"\n")?;
            let err = load_config(Some(Path::new("mstx.toml"))).expect_err("💀 a config with no task should not load");
            assert!(format!("{err:#}").contains("mstx.toml"), "{err:#}");
            Ok(())
        });
    }
}
