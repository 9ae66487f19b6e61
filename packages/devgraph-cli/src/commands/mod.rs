pub mod analyze;
pub mod clean;
pub mod diagnostics;
pub mod hub;
pub mod query;
pub mod symbol;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use devgraph_ir::language_router::LanguageRegistry;
use devgraph_ir::parsing::{python::PythonPlugin, rust_lang::RustPlugin, typescript::TypeScriptPlugin};
use devgraph_ir::DevgraphConfig;

use crate::error::{CliError, Result};

/// Every subcommand that touches the analyzer builds the same three-language
/// registry; nothing here is package-specific.
pub(crate) fn default_registry() -> Arc<LanguageRegistry> {
    let mut registry = LanguageRegistry::new();
    registry.register(Arc::new(TypeScriptPlugin::new()));
    registry.register(Arc::new(PythonPlugin::new()));
    registry.register(Arc::new(RustPlugin::new()));
    Arc::new(registry)
}

pub(crate) fn load_config(config_path: &Option<PathBuf>) -> Result<DevgraphConfig> {
    let mut config = match config_path {
        Some(path) => DevgraphConfig::from_yaml(path)?,
        None => DevgraphConfig::preset(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

pub(crate) fn hub_db_path(hub_dir: &Path) -> PathBuf {
    hub_dir.join("central.db")
}

pub(crate) fn open_hub(hub_dir: &Path) -> Result<devgraph_hub::Hub> {
    devgraph_hub::Hub::open(hub_db_path(hub_dir)).map_err(CliError::from)
}
