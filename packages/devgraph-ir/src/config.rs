//! Tiered configuration: a preset default, overridden by an optional YAML
//! file, overridden last by `SEMANTIC_*`/`HUB_DIR` environment variables.
//! Scoped to what C5/C8/C9/C10 need, not a general-purpose config crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};

/// Per-language resolver settings (C5 §4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageResolverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default)]
    pub skip_lib_check: bool,
    #[serde(default)]
    pub tool_path: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_batch_size() -> u32 {
    100
}

impl Default for LanguageResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_timeout_ms(),
            batch_size: default_batch_size(),
            skip_lib_check: false,
            tool_path: None,
        }
    }
}

impl LanguageResolverConfig {
    fn validate(&self) -> Result<()> {
        if !(1000..=300_000).contains(&self.timeout_ms) {
            return Err(IrError::Config(format!(
                "timeoutMs must be in 1000..=300000, got {}",
                self.timeout_ms
            )));
        }
        if !(1..=500).contains(&self.batch_size) {
            return Err(IrError::Config(format!("batchSize must be in 1..=500, got {}", self.batch_size)));
        }
        Ok(())
    }
}

/// C9 watch debounce/ignore settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_ignore_globs")]
    pub ignore_globs: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    100
}
fn default_ignore_globs() -> Vec<String> {
    vec!["**/node_modules/**".into(), "**/.git/**".into(), "**/target/**".into()]
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore_globs: default_ignore_globs(),
        }
    }
}

/// C8 embedded columnar engine pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPoolSettings {
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_memory_limit_mb() -> u64 {
    256
}
fn default_max_connections() -> u32 {
    4
}

impl Default for QueryPoolSettings {
    fn default() -> Self {
        Self {
            memory_limit_mb: default_memory_limit_mb(),
            max_connections: default_max_connections(),
        }
    }
}

/// Whether removed rows survive as `is_deleted=true` tombstones across
/// generations, or are dropped. `None` defers to the call site: a package
/// analyzed as part of a Hub-registered workspace tracks deletions, an ad hoc
/// `analyze` run outside one does not. An explicit `Some` in config always
/// wins over that default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TombstonePolicy {
    #[serde(default)]
    pub track_deletions: Option<bool>,
}

impl TombstonePolicy {
    pub fn resolve(&self, within_hub: bool) -> bool {
        self.track_deletions.unwrap_or(within_hub)
    }
}

/// Root configuration, assembled preset-first then layered with YAML and
/// environment overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevgraphConfig {
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageResolverConfig>,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub query: QueryPoolSettings,
    #[serde(default)]
    pub tombstones: TombstonePolicy,
    #[serde(default = "default_hub_dir")]
    pub hub_dir: PathBuf,
}

fn default_hub_dir() -> PathBuf {
    PathBuf::from(".devac")
}

impl Default for DevgraphConfig {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        for lang in ["typescript", "python", "rust"] {
            languages.insert(lang.to_string(), LanguageResolverConfig::default());
        }
        Self {
            languages,
            watch: WatchSettings::default(),
            query: QueryPoolSettings::default(),
            tombstones: TombstonePolicy::default(),
            hub_dir: default_hub_dir(),
        }
    }
}

impl DevgraphConfig {
    /// Level 1: the preset default, no YAML, no env.
    pub fn preset() -> Self {
        Self::default()
    }

    /// Level 3: load from a YAML file, falling back to defaults for
    /// anything the file omits.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| IrError::Config(e.to_string()))
    }

    /// Applies `SEMANTIC_TS_*`/`SEMANTIC_PY_*`/`SEMANTIC_RS_*` and `HUB_DIR`
    /// overrides from the process environment, mutating in place.
    pub fn apply_env_overrides(&mut self) {
        self.apply_language_env_overrides("typescript", "SEMANTIC_TS_");
        self.apply_language_env_overrides("python", "SEMANTIC_PY_");
        self.apply_language_env_overrides("rust", "SEMANTIC_RS_");

        if let Ok(hub_dir) = std::env::var("HUB_DIR") {
            self.hub_dir = PathBuf::from(hub_dir);
        }
    }

    fn apply_language_env_overrides(&mut self, language: &str, prefix: &str) {
        let entry = self.languages.entry(language.to_string()).or_default();
        if let Ok(v) = std::env::var(format!("{prefix}ENABLED")) {
            entry.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var(format!("{prefix}TIMEOUT_MS")) {
            if let Ok(parsed) = v.parse() {
                entry.timeout_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{prefix}BATCH_SIZE")) {
            if let Ok(parsed) = v.parse() {
                entry.batch_size = parsed;
            }
        }
        if let Ok(v) = std::env::var(format!("{prefix}SKIP_LIB_CHECK")) {
            entry.skip_lib_check = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var(format!("{prefix}TOOL_PATH")) {
            entry.tool_path = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (language, config) in &self.languages {
            config
                .validate()
                .map_err(|e| IrError::Config(format!("language `{language}`: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_is_valid() {
        assert!(DevgraphConfig::preset().validate().is_ok());
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        let mut config = DevgraphConfig::preset();
        config.languages.get_mut("typescript").unwrap().timeout_ms = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_win_over_preset() {
        std::env::set_var("SEMANTIC_TS_TIMEOUT_MS", "5000");
        let mut config = DevgraphConfig::preset();
        config.apply_env_overrides();
        std::env::remove_var("SEMANTIC_TS_TIMEOUT_MS");

        assert_eq!(config.languages["typescript"].timeout_ms, 5000);
    }

    #[test]
    fn tombstone_policy_defers_to_hub_membership_unless_overridden() {
        let unset = TombstonePolicy::default();
        assert!(unset.resolve(true));
        assert!(!unset.resolve(false));

        let forced_off = TombstonePolicy { track_deletions: Some(false) };
        assert!(!forced_off.resolve(true));
    }

    #[test]
    fn hub_dir_env_override() {
        std::env::set_var("HUB_DIR", "/tmp/custom-hub");
        let mut config = DevgraphConfig::preset();
        config.apply_env_overrides();
        std::env::remove_var("HUB_DIR");

        assert_eq!(config.hub_dir, PathBuf::from("/tmp/custom-hub"));
    }
}
