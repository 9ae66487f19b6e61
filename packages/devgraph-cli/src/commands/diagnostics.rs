use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;
use devgraph_hub::{Category, DiagnosticFilter, DiagnosticSource, Severity};
use serde::Serialize;

use crate::error::{CliError, Result};
use crate::output::emit;

#[derive(Args)]
pub struct DiagnosticsArgs {
    #[arg(long)]
    hub_dir: Option<PathBuf>,
    #[arg(long)]
    repo: Option<String>,
    #[arg(long)]
    source: Option<String>,
    /// Repeatable: `--severity warning --severity error`.
    #[arg(long = "severity")]
    severities: Vec<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    file: Option<String>,
    #[arg(long)]
    resolved: Option<bool>,
    #[arg(long)]
    actionable: Option<bool>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct DiagnosticsOutput {
    count: usize,
    diagnostics: Vec<serde_json::Value>,
}

pub async fn run(args: DiagnosticsArgs, json: bool) -> Result<()> {
    let config = super::load_config(&args.config)?;
    let hub_dir = args.hub_dir.unwrap_or(config.hub_dir);
    let hub = super::open_hub(&hub_dir)?;

    let source = match &args.source {
        Some(raw) => Some(DiagnosticSource::from_str(raw).map_err(|_| CliError::User(format!("unknown diagnostic source `{raw}`")))?),
        None => None,
    };
    let category = match &args.category {
        Some(raw) => Some(Category::from_str(raw).map_err(|_| CliError::User(format!("unknown diagnostic category `{raw}`")))?),
        None => None,
    };
    let mut severities = Vec::with_capacity(args.severities.len());
    for raw in &args.severities {
        severities.push(Severity::from_str(raw).map_err(|_| CliError::User(format!("unknown severity `{raw}`")))?);
    }

    let filter = DiagnosticFilter {
        repo_id: args.repo,
        source,
        severities,
        category,
        file: args.file,
        resolved: args.resolved,
        actionable: args.actionable,
        limit: args.limit,
    };

    let diagnostics = hub.get_diagnostics(&filter)?;
    hub.close()?;

    let rows: Vec<serde_json::Value> = diagnostics
        .iter()
        .map(|d| serde_json::to_value(d).unwrap_or(serde_json::Value::Null))
        .collect();
    let output = DiagnosticsOutput { count: rows.len(), diagnostics: rows };

    emit(&output, json, |out| {
        println!("{} diagnostic(s)", out.count);
        for d in &out.diagnostics {
            println!("{d}");
        }
    });

    Ok(())
}
