use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use devgraph_ir::query::{bundles, federated, FederatedQueryEngine, QueryRequest, QueryResponse};
use serde::Serialize;

use crate::error::{CliError, Result};
use crate::output::emit;

#[derive(Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    command: QueryCommand,
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Run raw SQL against the federated view.
    Sql {
        sql: String,
        #[arg(long = "package", required = true)]
        packages: Vec<PathBuf>,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long, default_value = "table")]
        format: String,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },
    Symbol(BundleArgs),
    Deps(BundleArgs),
    Dependents(BundleArgs),
    #[command(name = "file-symbols")]
    FileSymbols(BundleArgs),
    #[command(name = "call-graph")]
    CallGraph(BundleArgs),
    Affected(BundleArgs),
}

#[derive(Args)]
struct BundleArgs {
    /// The bundle's single parameter value (entity id, file path, etc.).
    value: String,
    #[arg(long = "package", required = true)]
    packages: Vec<PathBuf>,
    #[arg(long, default_value = "main")]
    branch: String,
    #[arg(long)]
    limit: Option<i64>,
    #[arg(long)]
    offset: Option<i64>,
}

#[derive(Serialize)]
struct QueryOutput {
    row_count: usize,
    elapsed_ms: u128,
    readiness: String,
    views_created: Vec<String>,
    warnings: Vec<String>,
    rows: Vec<serde_json::Value>,
}

impl From<QueryResponse> for QueryOutput {
    fn from(r: QueryResponse) -> Self {
        let readiness = match r.readiness {
            federated::Readiness::Ready => "ready",
            federated::Readiness::FirstRun => "first-run",
            federated::Readiness::Partial => "partial",
            federated::Readiness::Locked => "locked",
        };
        Self {
            row_count: r.row_count,
            elapsed_ms: r.elapsed_ms,
            readiness: readiness.to_string(),
            views_created: r.views_created,
            warnings: r.warnings,
            rows: r.rows,
        }
    }
}

pub async fn run(args: QueryArgs, json: bool) -> Result<()> {
    let engine = FederatedQueryEngine::new();
    let mut json = json;

    let (request, bundle_name) = match args.command {
        QueryCommand::Sql {
            sql,
            packages,
            branch,
            format,
            limit,
            offset,
        } => {
            if format.eq_ignore_ascii_case("json") {
                json = true;
            }
            (
                QueryRequest {
                    package_roots: packages,
                    branch,
                    sql,
                    limit,
                    offset,
                },
                Some("sql"),
            )
        }
        QueryCommand::Symbol(b) => bundle_request(bundles::symbol_search(), "name", b),
        QueryCommand::Deps(b) => bundle_request(bundles::dependencies(), "entity_id", b),
        QueryCommand::Dependents(b) => bundle_request(bundles::dependents(), "entity_id", b),
        QueryCommand::FileSymbols(b) => bundle_request(bundles::file_symbols(), "source_file", b),
        QueryCommand::CallGraph(b) => bundle_request(bundles::call_graph(), "entity_id", b),
        QueryCommand::Affected(b) => bundle_request(bundles::affected(), "source_file", b),
    };

    let response = engine.run(request).await.map_err(CliError::from)?;
    if response.row_count == 0 && response.readiness != federated::Readiness::Ready {
        if let Some(name) = bundle_name {
            return Err(CliError::ReadinessNotMet(format!(
                "`{name}` returned no rows and the requested packages are not fully ready ({:?})",
                response.readiness
            )));
        }
    }

    let output: QueryOutput = response.into();
    emit(&output, json, |out| {
        println!("{} row(s) in {}ms (readiness: {})", out.row_count, out.elapsed_ms, out.readiness);
        for warning in &out.warnings {
            println!("warning: {warning}");
        }
        for row in &out.rows {
            println!("{row}");
        }
    });

    Ok(())
}

fn bundle_request(bundle: bundles::QueryBundle, param: &str, args: BundleArgs) -> (QueryRequest, Option<&'static str>) {
    let mut values = BTreeMap::new();
    let escaped = federated::escape_string_literal(&args.value);
    values.insert(param, escaped);
    let sql = bundles::render(&bundle, &values);
    (
        QueryRequest {
            package_roots: args.packages,
            branch: args.branch,
            sql,
            limit: args.limit,
            offset: args.offset,
        },
        Some(bundle.name),
    )
}
