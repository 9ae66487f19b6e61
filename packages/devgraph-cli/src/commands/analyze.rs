use std::path::PathBuf;

use clap::Args;
use devgraph_ir::analyzer::{AnalyzeOptions, AnalyzeReport, Analyzer};
use devgraph_storage::{FsSeedStore, SeedLayout};
use serde::Serialize;

use crate::error::{CliError, Result};
use crate::output::emit;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Package root to analyze. Required unless `--all` is given.
    #[arg(long)]
    package: Option<PathBuf>,
    /// Repository identifier this package belongs to, e.g. `acme/widgets`.
    #[arg(long, default_value = "local")]
    repo: String,
    /// Package name within the repository.
    #[arg(long, default_value = "root")]
    name: String,
    #[arg(long, default_value = "main")]
    branch: String,
    /// Skip reanalysis when the source fingerprint hasn't changed.
    #[arg(long)]
    if_changed: bool,
    /// Proceed even if the seed directory carries an in-flight lock marker.
    #[arg(long)]
    force: bool,
    /// Analyze every repository registered with the workspace Hub instead of one package.
    #[arg(long)]
    all: bool,
    #[arg(long)]
    hub_dir: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct AnalyzeResult {
    package: String,
    skipped: bool,
    files_analyzed: u32,
    nodes_created: u32,
    edges_created: u32,
    refs_created: u32,
    rule_matches: u32,
    time_ms: u64,
    parse_errors: Vec<String>,
}

impl AnalyzeResult {
    fn from_report(package: String, report: AnalyzeReport) -> Self {
        Self {
            package,
            skipped: report.skipped,
            files_analyzed: report.files_analyzed,
            nodes_created: report.nodes_created,
            edges_created: report.edges_created,
            refs_created: report.refs_created,
            rule_matches: report.rule_matches,
            time_ms: report.time_ms,
            parse_errors: report.parse_errors,
        }
    }
}

pub async fn run(args: AnalyzeArgs, json: bool) -> Result<()> {
    let config = super::load_config(&args.config)?;
    let registry = super::default_registry();

    let mut targets: Vec<(PathBuf, String, String)> = Vec::new();
    if args.all {
        let hub_dir = args.hub_dir.clone().unwrap_or_else(|| config.hub_dir.clone());
        let hub = super::open_hub(&hub_dir)?;
        for entry in hub.list_repos()? {
            targets.push((PathBuf::from(&entry.local_path), entry.id.clone(), args.name.clone()));
        }
        hub.close()?;
        if targets.is_empty() {
            return Err(CliError::User("no repositories registered with the Hub; register one first or pass --package".into()));
        }
    } else {
        let package = args
            .package
            .clone()
            .ok_or_else(|| CliError::User("--package is required unless --all is given".into()))?;
        targets.push((package, args.repo.clone(), args.name.clone()));
    }

    let mut results = Vec::with_capacity(targets.len());
    for (package_root, repo, name) in targets {
        let layout = SeedLayout::new(package_root.clone());
        if !args.force && layout.has_inflight_markers().map_err(|e| CliError::System(e.to_string()))? {
            return Err(CliError::ReadinessNotMet(format!(
                "{} carries an in-flight seed lock; rerun with --force once the other writer finishes",
                package_root.display()
            )));
        }

        let store = FsSeedStore::new(layout);
        let analyzer = Analyzer::new(registry.clone(), config.clone(), store);
        let options = AnalyzeOptions {
            package_root: package_root.clone(),
            repo,
            package: name,
            branch: args.branch.clone(),
            if_changed: args.if_changed && !args.force,
            changed_paths: None,
            within_hub: args.all,
        };
        let report = analyzer.analyze(&options).await?;
        results.push(AnalyzeResult::from_report(package_root.display().to_string(), report));
    }

    emit(&results, json, |results| {
        for r in results {
            if r.skipped {
                println!("{}: skipped (unchanged)", r.package);
                continue;
            }
            println!(
                "{}: {} files, {} nodes, {} edges, {} refs, {} rule matches in {}ms",
                r.package, r.files_analyzed, r.nodes_created, r.edges_created, r.refs_created, r.rule_matches, r.time_ms
            );
            for err in &r.parse_errors {
                println!("  parse error: {err}");
            }
        }
    });

    Ok(())
}
