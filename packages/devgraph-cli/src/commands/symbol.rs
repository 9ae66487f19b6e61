//! `devgraph symbol`: direct C1 lookups over a package's seed generation —
//! URI ↔ entity id, file → entities, and wildcard name-pattern search —
//! backed by [`SeedSymbolIndex`] rather than the federated SQL engine.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use devgraph_model::{CanonicalUri, EntityId, SymbolIndex};
use devgraph_storage::{SeedLayout, SeedReader, SeedSymbolIndex};
use serde::Serialize;

use crate::error::{CliError, Result};
use crate::output::emit;

#[derive(Args)]
pub struct SymbolArgs {
    #[arg(long)]
    package: PathBuf,
    #[arg(long, default_value = "main")]
    branch: String,
    #[command(subcommand)]
    command: SymbolCommand,
}

#[derive(Subcommand)]
enum SymbolCommand {
    /// Resolve a `devac://` URI to its entity id.
    Resolve { uri: String },
    /// Look up the canonical URI for an entity id.
    Uri { entity_id: String },
    /// List entities declared in a given file.
    #[command(name = "in-file")]
    InFile { file: String },
    /// Find entity ids whose qualified name matches a `*`-wildcard pattern.
    Find { pattern: String },
}

#[derive(Serialize)]
struct EntityRow {
    entity_id: String,
    uri: Option<String>,
}

pub async fn run(args: SymbolArgs, json: bool) -> Result<()> {
    let layout = SeedLayout::new(args.package.clone());
    let reader = SeedReader::open(layout, &args.branch).map_err(CliError::from)?;
    let index = SeedSymbolIndex::build(&reader).map_err(CliError::from)?;

    match args.command {
        SymbolCommand::Resolve { uri } => {
            let uri = CanonicalUri::parse(&uri).map_err(|e| CliError::User(e.to_string()))?;
            let entity = index.uri_to_entity(&uri).map(|e| e.to_string());
            emit(&entity, json, |entity| match entity {
                Some(id) => println!("{id}"),
                None => println!("no entity at that URI"),
            });
        }
        SymbolCommand::Uri { entity_id } => {
            let entity_id: EntityId = entity_id
                .parse()
                .map_err(|_| CliError::User(format!("malformed entity id `{entity_id}`")))?;
            let uri = index.entity_to_uri(&entity_id).map(|u| u.to_string());
            emit(&uri, json, |uri| match uri {
                Some(uri) => println!("{uri}"),
                None => println!("no URI for that entity"),
            });
        }
        SymbolCommand::InFile { file } => {
            let entities = index.entities_in_file(&reader.meta.repo_name, &reader.meta.package_path, &file);
            let rows = to_rows(&index, entities);
            emit(&rows, json, |rows| print_rows(rows));
        }
        SymbolCommand::Find { pattern } => {
            let entities = index.find_by_pattern(&pattern);
            let rows = to_rows(&index, entities);
            emit(&rows, json, |rows| print_rows(rows));
        }
    }

    Ok(())
}

fn to_rows(index: &SeedSymbolIndex, entities: Vec<EntityId>) -> Vec<EntityRow> {
    entities
        .into_iter()
        .map(|e| EntityRow {
            uri: index.entity_to_uri(&e).map(|u| u.to_string()),
            entity_id: e.to_string(),
        })
        .collect()
}

fn print_rows(rows: &[EntityRow]) {
    for row in rows {
        println!("{}  {}", row.entity_id, row.uri.as_deref().unwrap_or(""));
    }
}
