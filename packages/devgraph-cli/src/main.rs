//! `devgraph`: CLI surface over `devgraph-ir`'s analyzer, federated query
//! engine and watch loop, plus `devgraph-hub`'s workspace registry.
//!
//! Every subcommand accepts `--json` for machine-readable output. Exit
//! codes follow a fixed contract: 0 success, 1 user error (bad args,
//! malformed SQL), 2 system error (I/O, storage corruption), 3 readiness
//! not met (a federated query ran against tables with no data yet).

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};

use error::CliError;

#[derive(Parser)]
#[command(name = "devgraph", version, about = "Code-graph indexing and federated query over analyzed packages")]
struct Cli {
    /// Emit machine-readable JSON instead of human-formatted text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a one-shot structural/semantic analysis over a package.
    Analyze(commands::analyze::AnalyzeArgs),
    /// Watch a package root and re-analyze on quiescence.
    Watch(commands::watch::WatchArgs),
    /// Run a federated SQL query or a predefined bundle across packages.
    Query(commands::query::QueryArgs),
    /// Look up symbols directly against a package's seed generation.
    Symbol(commands::symbol::SymbolArgs),
    /// List unified diagnostics from the workspace Hub.
    Diagnostics(commands::diagnostics::DiagnosticsArgs),
    /// Manage the workspace Hub's repository registry.
    Hub(commands::hub::HubArgs),
    /// Remove stale seed generations and orphaned staging directories.
    Clean(commands::clean::CleanArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze(args) => commands::analyze::run(args, cli.json).await,
        Commands::Watch(args) => commands::watch::run(args, cli.json).await,
        Commands::Query(args) => commands::query::run(args, cli.json).await,
        Commands::Symbol(args) => commands::symbol::run(args, cli.json).await,
        Commands::Diagnostics(args) => commands::diagnostics::run(args, cli.json).await,
        Commands::Hub(args) => commands::hub::run(args, cli.json).await,
        Commands::Clean(args) => commands::clean::run(args, cli.json).await,
    };

    if let Err(e) = result {
        report_error(&e, cli.json);
        std::process::exit(e.exit_code());
    }
}

fn report_error(e: &CliError, json: bool) {
    if json {
        let body = serde_json::json!({ "error": e.message(), "exitCode": e.exit_code() });
        eprintln!("{}", serde_json::to_string(&body).unwrap_or_default());
    } else {
        eprintln!("error: {e}");
    }
}
