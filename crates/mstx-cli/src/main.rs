//! 🚀 mstx: the front door. Loads config, sets up logging, runs one task, prints the report.
//!
//! The task output goes to stdout as pretty JSON so a workflow engine can capture it.
//! Counters go to stderr as a small table so humans can glance at them. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL_CONDENSED};
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "mstx.toml";

#[derive(Debug, Parser)]
#[command(name = "mstx")]
#[command(version, about = "Run one Meilisearch task: add, get, search or facet search")]
struct Cli {
    /// TOML config file. Defaults to ./mstx.toml when present, env vars (MSTX_*) otherwise.
    #[arg(short, long, env = "MSTX_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Draw a progress spinner while documents are added.
    #[arg(short, long)]
    progress: bool,
}

/// 🔒 An explicit path must exist. The default is only used when it does.
fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Could not check whether '{}' exists. Permissions, maybe?", path.display())
            })?;
            if !exists {
                anyhow::bail!(
                    "💀 Config file '{}' does not exist. Relative paths are resolved from the current directory.",
                    path.display()
                );
            }
            Ok(Some(path))
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            Ok(default.is_file().then(|| default.to_path_buf()))
        }
    }
}

fn metrics_table(metrics: &std::collections::BTreeMap<String, u64>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["metric", "value"]);
    for (name, value) in metrics {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// 🧅 Peel the error chain, name the error kind when there is one, and hint at
/// connectivity when the causes smell like it.
fn report_failure(err: &anyhow::Error) {
    error!("💀 error: {}", err);

    let mut looks_like_connectivity = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        let text = cause.to_string();
        if text.contains("error sending request")
            || text.contains("connection refused")
            || text.contains("Connection refused")
            || text.contains("tcp connect error")
            || text.contains("dns error")
            || text.contains("[transport]")
        {
            looks_like_connectivity = true;
        }
    }

    if let Some(task_error) = err.chain().find_map(|cause| cause.downcast_ref::<mstx::TaskError>()) {
        error!("🏷️  kind: {}", task_error.kind());
    }

    if looks_like_connectivity {
        error!(
            "🔧 hint: Meilisearch does not seem reachable. Check that it is running and that the \
             url in the config points at it (default port 7700). With Docker, `docker ps` shows \
             whether the container is up."
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = async {
        let config_path = resolve_config_path(cli.config)?;
        let mut app_config = mstx::app_config::load_config(config_path.as_deref())
            .context("💀 mstx could not load its configuration. Check the file and the MSTX_* env vars.")?;
        app_config.show_progress |= cli.progress;
        mstx::run(app_config).await
    }
    .await;

    match outcome {
        Ok(report) => {
            let json = serde_json::to_string_pretty(&report.output).context("💀 Could not print the task output")?;
            println!("{json}");
            if !report.metrics.is_empty() {
                eprintln!("{}", metrics_table(&report.metrics));
            }
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            std::process::exit(1);
        }
    }
}
