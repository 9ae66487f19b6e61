use std::path::PathBuf;

use clap::{Args, Subcommand};
use devgraph_ir::analyzer::{AnalyzeOptions, Analyzer};
use devgraph_storage::{FsSeedStore, SeedLayout};
use serde::Serialize;

use crate::error::Result;
use crate::output::emit;

#[derive(Args)]
pub struct HubArgs {
    #[arg(long, global = true)]
    hub_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: HubCommand,
}

#[derive(Subcommand)]
enum HubCommand {
    /// Create the Hub's schema if missing.
    Init,
    /// Register a repository with the Hub.
    Register {
        id: String,
        local_path: PathBuf,
        #[arg(long)]
        metadata: Option<String>,
    },
    Unregister {
        id: String,
    },
    List,
    /// Summarize repository and diagnostic counts.
    Status,
    /// Re-analyze every registered repository and report per-repo results.
    Sync {
        #[arg(long, default_value = "main")]
        branch: String,
    },
}

#[derive(Serialize)]
struct RepoRow {
    id: String,
    local_path: String,
}

#[derive(Serialize)]
struct StatusOutput {
    repo_count: usize,
    diagnostic_count: usize,
}

#[derive(Serialize)]
struct SyncRow {
    repo: String,
    skipped: bool,
    files_analyzed: u32,
    nodes_created: u32,
    error: Option<String>,
}

pub async fn run(args: HubArgs, json: bool) -> Result<()> {
    let config = super::load_config(&args.config)?;
    let hub_dir = args.hub_dir.clone().unwrap_or_else(|| config.hub_dir.clone());

    match args.command {
        HubCommand::Init => {
            let hub = super::open_hub(&hub_dir)?;
            hub.init()?;
            hub.close()?;
            emit(&serde_json::json!({"initialized": true}), json, |_| println!("hub initialized at {}", hub_dir.display()));
        }
        HubCommand::Register { id, local_path, metadata } => {
            let hub = super::open_hub(&hub_dir)?;
            let metadata = metadata
                .map(|m| serde_json::from_str(&m))
                .transpose()
                .map_err(|e: serde_json::Error| crate::error::CliError::User(e.to_string()))?
                .unwrap_or(serde_json::Value::Null);
            hub.register_repo(&id, &local_path.display().to_string(), metadata)?;
            hub.close()?;
            emit(&serde_json::json!({"registered": id}), json, |_| println!("registered {id}"));
        }
        HubCommand::Unregister { id } => {
            let hub = super::open_hub(&hub_dir)?;
            hub.unregister_repo(&id)?;
            hub.close()?;
            emit(&serde_json::json!({"unregistered": id}), json, |_| println!("unregistered {id}"));
        }
        HubCommand::List => {
            let hub = super::open_hub(&hub_dir)?;
            let repos = hub.list_repos()?;
            hub.close()?;
            let rows: Vec<RepoRow> = repos.into_iter().map(|r| RepoRow { id: r.id, local_path: r.local_path }).collect();
            emit(&rows, json, |rows| {
                for r in rows {
                    println!("{}  {}", r.id, r.local_path);
                }
            });
        }
        HubCommand::Status => {
            let hub = super::open_hub(&hub_dir)?;
            let repo_count = hub.list_repos()?.len();
            let diagnostic_count = hub.get_diagnostics(&devgraph_hub::DiagnosticFilter::default())?.len();
            hub.close()?;
            let status = StatusOutput { repo_count, diagnostic_count };
            emit(&status, json, |s| {
                println!("{} repositories, {} diagnostics", s.repo_count, s.diagnostic_count);
            });
        }
        HubCommand::Sync { branch } => {
            let hub = super::open_hub(&hub_dir)?;
            let repos = hub.list_repos()?;
            hub.close()?;

            let registry = super::default_registry();
            let mut rows = Vec::with_capacity(repos.len());
            for repo in repos {
                let package_root = PathBuf::from(&repo.local_path);
                let layout = SeedLayout::new(package_root.clone());
                let store = FsSeedStore::new(layout);
                let analyzer = Analyzer::new(registry.clone(), config.clone(), store);
                let options = AnalyzeOptions {
                    package_root,
                    repo: repo.id.clone(),
                    package: "root".to_string(),
                    branch: branch.clone(),
                    if_changed: true,
                    changed_paths: None,
                    within_hub: true,
                };
                match analyzer.analyze(&options).await {
                    Ok(report) => rows.push(SyncRow {
                        repo: repo.id,
                        skipped: report.skipped,
                        files_analyzed: report.files_analyzed,
                        nodes_created: report.nodes_created,
                        error: None,
                    }),
                    Err(e) => rows.push(SyncRow {
                        repo: repo.id,
                        skipped: false,
                        files_analyzed: 0,
                        nodes_created: 0,
                        error: Some(e.to_string()),
                    }),
                }
            }

            emit(&rows, json, |rows| {
                for r in rows {
                    match &r.error {
                        Some(e) => println!("{}: error: {e}", r.repo),
                        None if r.skipped => println!("{}: skipped (unchanged)", r.repo),
                        None => println!("{}: {} files, {} nodes", r.repo, r.files_analyzed, r.nodes_created),
                    }
                }
            });
        }
    }

    Ok(())
}
