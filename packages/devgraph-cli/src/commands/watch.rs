use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use devgraph_ir::analyzer::{AnalyzeOptions, AnalyzeReport};
use devgraph_ir::watch::{self, CrossRepoNeedEvent, WatchObserver};
use devgraph_storage::{FsSeedStore, SeedLayout};
use tracing::info;

use crate::error::{CliError, Result};

#[derive(Args)]
pub struct WatchArgs {
    #[arg(long)]
    package: PathBuf,
    #[arg(long, default_value = "local")]
    repo: String,
    #[arg(long, default_value = "root")]
    name: String,
    #[arg(long, default_value = "main")]
    branch: String,
    /// Debounce window in milliseconds, overriding the configured default.
    #[arg(long)]
    debounce_ms: Option<u64>,
    /// Run the initial analysis unconditionally, ignoring a matching fingerprint.
    #[arg(long)]
    force: bool,
    #[arg(long)]
    verbose: bool,
    #[arg(long)]
    config: Option<PathBuf>,
}

struct CliObserver {
    verbose: bool,
    json: bool,
}

impl WatchObserver for CliObserver {
    fn on_analyzed(&self, report: &AnalyzeReport) {
        if report.skipped {
            if self.verbose {
                info!("watch: no changes since last generation");
            }
            return;
        }
        let line = format!(
            "analyzed {} files, {} nodes, {} edges, {} refs in {}ms",
            report.files_analyzed, report.nodes_created, report.edges_created, report.refs_created, report.time_ms
        );
        if self.json {
            println!(
                "{}",
                serde_json::json!({
                    "event": "analyzed",
                    "filesAnalyzed": report.files_analyzed,
                    "nodesCreated": report.nodes_created,
                    "edgesCreated": report.edges_created,
                    "refsCreated": report.refs_created,
                    "timeMs": report.time_ms,
                })
            );
        } else {
            println!("{line}");
        }
    }

    fn on_cross_repo_need(&self, event: &CrossRepoNeedEvent) {
        println!(
            "cross-repo need: `{}` resolves to sibling repo at {}",
            event.module_specifier,
            event.sibling_repo_path.display()
        );
    }

    fn on_error(&self, message: &str) {
        eprintln!("watch error: {message}");
    }
}

pub async fn run(args: WatchArgs, json: bool) -> Result<()> {
    let mut config = super::load_config(&args.config)?;
    if let Some(debounce_ms) = args.debounce_ms {
        config.watch.debounce_ms = debounce_ms;
    }
    let registry = super::default_registry();

    let layout = SeedLayout::new(args.package.clone());
    let store = FsSeedStore::new(layout);

    let options = AnalyzeOptions {
        package_root: args.package.clone(),
        repo: args.repo,
        package: args.name,
        branch: args.branch,
        if_changed: !args.force,
        changed_paths: None,
        within_hub: false,
    };

    let observer = Arc::new(CliObserver { verbose: args.verbose, json });
    let handle = watch::start(registry, config, store, options, observer)
        .await
        .map_err(CliError::from)?;

    println!("watching {} (ctrl-c to stop)", args.package.display());
    tokio::signal::ctrl_c().await.map_err(|e| CliError::System(e.to_string()))?;
    println!("stopping, flushing in-flight analysis...");
    handle.stop(true).await;

    Ok(())
}
