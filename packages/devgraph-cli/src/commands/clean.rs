use std::path::PathBuf;

use clap::Args;
use devgraph_storage::{FsSeedStore, SeedLayout, SeedStore};
use serde::Serialize;

use crate::error::{CliError, Result};
use crate::output::emit;

#[derive(Args)]
pub struct CleanArgs {
    #[arg(long, required = true)]
    package: Vec<PathBuf>,
    /// Also remove the workspace Hub directory (`.devac` by default).
    #[arg(long)]
    config: bool,
    #[arg(long)]
    hub_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct CleanResult {
    cleaned: Vec<String>,
    hub_dir_removed: bool,
}

pub async fn run(args: CleanArgs, json: bool) -> Result<()> {
    let mut cleaned = Vec::with_capacity(args.package.len());
    for package_root in &args.package {
        let layout = SeedLayout::new(package_root.clone());
        let store = FsSeedStore::new(layout);
        store.clean().await.map_err(CliError::from)?;
        cleaned.push(package_root.display().to_string());
    }

    let mut hub_dir_removed = false;
    if args.config {
        let hub_dir = args.hub_dir.unwrap_or_else(|| PathBuf::from(".devac"));
        if hub_dir.exists() {
            std::fs::remove_dir_all(&hub_dir).map_err(|e| CliError::System(e.to_string()))?;
            hub_dir_removed = true;
        }
    }

    let result = CleanResult { cleaned, hub_dir_removed };
    emit(&result, json, |r| {
        for path in &r.cleaned {
            println!("cleaned {path}");
        }
        if r.hub_dir_removed {
            println!("removed hub directory");
        }
    });

    Ok(())
}
