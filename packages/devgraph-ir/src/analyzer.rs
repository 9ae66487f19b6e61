//! Analyzer (C7): orchestrates a single package analysis end to end —
//! discover, fingerprint, parse, resolve, rule-apply, delta-diff, emit.
//!
//! Any phase failing before the final emit leaves the previously visible
//! generation untouched; [`devgraph_storage::write_generation`] only makes a
//! new generation visible on its last, atomic rename.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info_span, instrument, warn};
use walkdir::WalkDir;

use devgraph_model::{DomainEffect, Edge, ExternalRef, Node, SeedMeta};
use devgraph_storage::{GenerationPayload, SeedReader, SeedStore};

use crate::config::DevgraphConfig;
use crate::error::Result;
use crate::language_router::LanguageRegistry;
use crate::parsing::{common::file_hash, PackageContext};
use crate::resolver::{ExportIndex, Resolver};
use crate::rules::significance::DisambiguationContext;
use crate::rules::RuleEngines;

const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", "build", ".seed"];

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub package_root: PathBuf,
    pub repo: String,
    pub package: String,
    pub branch: String,
    /// Skip the run entirely if the discovered file set's fingerprint
    /// matches the previously emitted generation's.
    pub if_changed: bool,
    /// Narrows discovery/parsing to exactly these paths, carrying over every
    /// previously emitted row sourced from an untouched file unchanged. A
    /// path that no longer exists on disk is treated as a deletion and
    /// tombstones whatever it previously contributed. `None` walks the whole
    /// package, as one-shot `analyze` runs do.
    pub changed_paths: Option<Vec<PathBuf>>,
    /// Whether this package is analyzed as part of a Hub-registered
    /// workspace. Only consulted by [`TombstonePolicy::resolve`] when config
    /// doesn't pin an explicit value.
    ///
    /// [`TombstonePolicy::resolve`]: crate::config::TombstonePolicy::resolve
    pub within_hub: bool,
}

/// `{filesAnalyzed, nodesCreated, edgesCreated, refsCreated, skipped,
/// timeMs}` from spec.md §4.7, plus an additive `ruleMatches` count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeReport {
    pub files_analyzed: u32,
    pub nodes_created: u32,
    pub edges_created: u32,
    pub refs_created: u32,
    pub skipped: bool,
    pub time_ms: u64,
    pub rule_matches: u32,
    pub parse_errors: Vec<String>,
}

pub struct Analyzer<S: SeedStore> {
    registry: Arc<LanguageRegistry>,
    config: DevgraphConfig,
    seed_store: S,
}

impl<S: SeedStore> Analyzer<S> {
    pub fn new(registry: Arc<LanguageRegistry>, config: DevgraphConfig, seed_store: S) -> Self {
        Self {
            registry,
            config,
            seed_store,
        }
    }

    #[instrument(skip(self, options), fields(package = %options.package, branch = %options.branch))]
    pub async fn analyze(&self, options: &AnalyzeOptions) -> Result<AnalyzeReport> {
        let started = Instant::now();

        let discover_span = info_span!("discover");
        let files = {
            let _guard = discover_span.enter();
            self.discover(&options.package_root, options.changed_paths.as_deref())
        };

        let fingerprint_span = info_span!("fingerprint");
        let (sources, fingerprint) = {
            let _guard = fingerprint_span.enter();
            self.fingerprint(&files)?
        };

        if options.if_changed {
            if let Ok(previous) = self.seed_store.open(&options.branch).await {
                if previous.meta.source_fingerprint == fingerprint {
                    return Ok(AnalyzeReport {
                        skipped: true,
                        time_ms: started.elapsed().as_millis() as u64,
                        ..Default::default()
                    });
                }
            }
        }

        // Loaded once and reused both as the symbol surface for files this
        // run didn't reparse and as the prior generation to diff against —
        // relevant only when `changed_paths` scopes this run to a subset of
        // the package; a full-package run has no need for it either way.
        let previous = self.seed_store.open(&options.branch).await.ok();
        let touched_files: Option<HashSet<String>> = options
            .changed_paths
            .as_ref()
            .map(|paths| paths.iter().map(|p| relative_path(&options.package_root, p)).collect());

        let parse_span = info_span!("parse");
        let (mut nodes, mut edges, mut external_refs, raw_effects, parse_errors) = {
            let _guard = parse_span.enter();
            self.parse_all(&sources, options)
        };

        let resolve_span = info_span!("resolve");
        {
            let _guard = resolve_span.enter();
            let baseline = baseline_nodes(previous.as_ref(), touched_files.as_ref());
            self.resolve_all(&nodes, &baseline, &mut edges, &mut external_refs, options);
        }

        let rule_span = info_span!("rule_apply");
        let (effects, rule_matches) = {
            let _guard = rule_span.enter();
            self.apply_rules(&raw_effects, options)
        };

        let diff_span = info_span!("delta_diff");
        let (nodes, edges, external_refs, effects) = {
            let _guard = diff_span.enter();
            self.delta_diff(options, previous, touched_files.as_ref(), nodes, edges, external_refs, effects)
        };

        let report = AnalyzeReport {
            files_analyzed: sources.len() as u32,
            nodes_created: nodes.len() as u32,
            edges_created: edges.len() as u32,
            refs_created: external_refs.len() as u32,
            skipped: false,
            time_ms: 0,
            rule_matches,
            parse_errors,
        };

        let emit_span = info_span!("emit");
        {
            let _guard = emit_span.enter();
            self.emit(options, &fingerprint, nodes, edges, external_refs, effects).await?;
        }

        Ok(AnalyzeReport {
            time_ms: started.elapsed().as_millis() as u64,
            ..report
        })
    }

    /// Walks `package_root` for every supported-language file, unless
    /// `changed_paths` is given — then discovery is exactly that list,
    /// filtered to files that still exist and are a supported language. A
    /// path for a file that's been deleted is simply absent from the result;
    /// its prior contributions get tombstoned downstream instead.
    fn discover(&self, package_root: &Path, changed_paths: Option<&[PathBuf]>) -> Vec<PathBuf> {
        match changed_paths {
            Some(paths) => paths
                .iter()
                .filter(|path| path.is_file())
                .filter(|path| self.registry.for_path(path).is_some())
                .cloned()
                .collect(),
            None => WalkDir::new(package_root)
                .into_iter()
                .filter_entry(|entry| {
                    entry
                        .file_name()
                        .to_str()
                        .map(|name| !IGNORED_DIRS.contains(&name))
                        .unwrap_or(true)
                })
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| self.registry.for_path(entry.path()).is_some())
                .map(|entry| entry.into_path())
                .collect(),
        }
    }

    fn fingerprint(&self, files: &[PathBuf]) -> Result<(Vec<(PathBuf, Vec<u8>)>, String)> {
        let mut sources = Vec::with_capacity(files.len());
        let mut hashes = Vec::with_capacity(files.len());
        for path in files {
            let bytes = std::fs::read(path)?;
            hashes.push(file_hash(&bytes));
            sources.push((path.clone(), bytes));
        }
        let fingerprint = SeedMeta::fingerprint(hashes.iter().map(String::as_str));
        Ok((sources, fingerprint))
    }

    fn parse_all(
        &self,
        sources: &[(PathBuf, Vec<u8>)],
        options: &AnalyzeOptions,
    ) -> (Vec<Node>, Vec<Edge>, Vec<ExternalRef>, Vec<crate::parsing::RawEffect>, Vec<String>) {
        let ctx = PackageContext {
            repo: options.repo.clone(),
            package: options.package.clone(),
            branch: options.branch.clone(),
        };

        let outcomes: Vec<_> = sources
            .par_iter()
            .map(|(path, bytes)| {
                let relative = relative_path(&options.package_root, path);
                match self.registry.for_path(path) {
                    Some(plugin) => match plugin.parse(&relative, bytes, &ctx) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(file = %relative, error = %e, "parser failed, skipping file");
                            let mut outcome = crate::parsing::ParseOutcome::default();
                            outcome.parse_errors.push(format!("{relative}: {e}"));
                            outcome
                        }
                    },
                    None => crate::parsing::ParseOutcome::default(),
                }
            })
            .collect();

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut external_refs = Vec::new();
        let mut raw_effects = Vec::new();
        let mut parse_errors = Vec::new();
        for outcome in outcomes {
            nodes.extend(outcome.nodes);
            edges.extend(outcome.edges);
            external_refs.extend(outcome.external_refs);
            raw_effects.extend(outcome.raw_effects);
            parse_errors.extend(outcome.parse_errors);
        }
        (nodes, edges, external_refs, raw_effects, parse_errors)
    }

    /// Resolves against an index built from `nodes` (freshly parsed this
    /// run) plus `baseline` — previously emitted nodes from files this run
    /// didn't touch, so a call into an untouched file still resolves when
    /// only a subset of the package was reparsed.
    fn resolve_all(&self, nodes: &[Node], baseline: &[Node], edges: &mut [Edge], external_refs: &mut [ExternalRef], options: &AnalyzeOptions) {
        let mut index = ExportIndex::new();
        index.index_package(&options.package, nodes);
        if !baseline.is_empty() {
            index.index_package(&options.package, baseline);
        }

        let mut by_language: HashMap<&str, (Vec<usize>, Vec<usize>)> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            by_language.entry(language_of(&edge.source_file_path)).or_default().0.push(i);
        }
        for (i, r) in external_refs.iter().enumerate() {
            by_language.entry(language_of(&r.source_file_path)).or_default().1.push(i);
        }

        for (language, (edge_idxs, ref_idxs)) in by_language {
            let config = self.config.languages.get(language).cloned().unwrap_or_default();
            let resolver = Resolver::new(config);
            let mut local_edges: Vec<Edge> = edge_idxs.iter().map(|&i| edges[i].clone()).collect();
            let mut local_refs: Vec<ExternalRef> = ref_idxs.iter().map(|&i| external_refs[i].clone()).collect();
            resolver.resolve(&index, &mut local_edges, &mut local_refs);
            for (slot, i) in edge_idxs.into_iter().enumerate() {
                edges[i] = local_edges[slot].clone();
            }
            for (slot, i) in ref_idxs.into_iter().enumerate() {
                external_refs[i] = local_refs[slot].clone();
            }
        }
    }

    fn apply_rules(&self, raw_effects: &[crate::parsing::RawEffect], options: &AnalyzeOptions) -> (Vec<DomainEffect>, u32) {
        let mut engines = RuleEngines::new();
        let ctx = DisambiguationContext {
            package: options.package.clone(),
            repo: options.repo.clone(),
            is_test_path: false,
        };

        let mut effects = Vec::with_capacity(raw_effects.len());
        for raw_effect in raw_effects {
            effects.push(engines.apply(raw_effect, &options.branch, &ctx));
        }
        (effects, raw_effects.len() as u32)
    }

    /// Partitions nodes/edges/refs/effects missing from a `changed_paths`
    /// batch into "carried over unchanged" and "compared against this run's
    /// output", tombstoning anything from the latter group that didn't come
    /// back. A full-package run (`touched_files: None`) compares everything,
    /// matching a plain generation-to-generation diff.
    fn delta_diff(
        &self,
        options: &AnalyzeOptions,
        previous: Option<SeedReader>,
        touched_files: Option<&HashSet<String>>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        external_refs: Vec<ExternalRef>,
        effects: Vec<DomainEffect>,
    ) -> (Vec<Node>, Vec<Edge>, Vec<ExternalRef>, Vec<DomainEffect>) {
        if !self.config.tombstones.resolve(options.within_hub) {
            return (nodes, edges, external_refs, effects);
        }
        let Some(previous) = previous else {
            return (nodes, edges, external_refs, effects);
        };

        let (unaffected_nodes, affected_prev_nodes) =
            partition_by_file(previous.nodes().unwrap_or_default(), touched_files, |n| &n.source_file);
        let affected_entity_ids: HashSet<String> = affected_prev_nodes.iter().map(|n| n.entity_id.clone()).collect();
        let mut merged_nodes = tombstone_missing(nodes, affected_prev_nodes, |n| n.entity_id.clone(), |n| !n.is_deleted, |n| {
            n.is_deleted = true;
            n.updated_at = chrono::Utc::now();
        });
        merged_nodes.extend(unaffected_nodes);

        let (unaffected_edges, affected_prev_edges) =
            partition_by_file(previous.edges().unwrap_or_default(), touched_files, |e| &e.source_file_path);
        let mut merged_edges = tombstone_missing(edges, affected_prev_edges, edge_key, |e| !e.is_deleted, |e| {
            e.is_deleted = true;
            e.updated_at = chrono::Utc::now();
        });
        merged_edges.extend(unaffected_edges);

        let (unaffected_refs, affected_prev_refs) =
            partition_by_file(previous.external_refs().unwrap_or_default(), touched_files, |r| &r.source_file_path);
        let mut merged_refs = tombstone_missing(external_refs, affected_prev_refs, ref_key, |r| !r.is_deleted, |r| {
            r.is_deleted = true;
            r.updated_at = chrono::Utc::now();
        });
        merged_refs.extend(unaffected_refs);

        // Effects carry no file path of their own; they're scoped by whether
        // the node that produced them belonged to a file this run touched.
        let (unaffected_effects, affected_prev_effects): (Vec<_>, Vec<_>) = previous
            .effects()
            .unwrap_or_default()
            .into_iter()
            .partition(|e| !affected_entity_ids.contains(&e.source_entity_id));
        let mut merged_effects = tombstone_missing(effects, affected_prev_effects, effect_key, |e| !e.is_deleted, |e| {
            e.is_deleted = true;
            e.updated_at = chrono::Utc::now();
        });
        merged_effects.extend(unaffected_effects);

        (merged_nodes, merged_edges, merged_refs, merged_effects)
    }

    async fn emit(
        &self,
        options: &AnalyzeOptions,
        fingerprint: &str,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        external_refs: Vec<ExternalRef>,
        effects: Vec<DomainEffect>,
    ) -> Result<()> {
        let generation = self
            .seed_store
            .open(&options.branch)
            .await
            .map(|reader| reader.meta.generation + 1)
            .unwrap_or(1);

        let mut parser_versions = BTreeMap::new();
        parser_versions.insert("devgraph-ir".to_string(), env!("CARGO_PKG_VERSION").to_string());

        let meta = SeedMeta {
            schema_version: devgraph_model::SCHEMA_VERSION,
            generation,
            source_fingerprint: fingerprint.to_string(),
            analyzed_at: chrono::Utc::now(),
            parser_versions,
            package_path: options.package_root.to_string_lossy().to_string(),
            repo_name: options.repo.clone(),
            branch: options.branch.clone(),
        };

        let payload = GenerationPayload {
            nodes,
            edges,
            external_refs,
            effects,
        };

        self.seed_store.write_generation(&options.branch, &payload, &meta).await?;
        Ok(())
    }
}

/// A path relative to `package_root`, forward-slashed, matching the
/// convention `source_file`/`source_file_path` columns are stored under.
fn relative_path(package_root: &Path, path: &Path) -> String {
    path.strip_prefix(package_root).unwrap_or(path).to_string_lossy().replace('\\', "/")
}

/// Previously emitted, still-live nodes from files outside `touched_files` —
/// the symbol surface a scoped reparse needs but didn't just produce itself.
fn baseline_nodes(previous: Option<&SeedReader>, touched_files: Option<&HashSet<String>>) -> Vec<Node> {
    let (Some(previous), Some(touched_files)) = (previous, touched_files) else {
        return Vec::new();
    };
    previous
        .nodes()
        .unwrap_or_default()
        .into_iter()
        .filter(|n| !n.is_deleted && !touched_files.contains(&n.source_file))
        .collect()
}

/// Splits `items` into (untouched by this run, touched by this run) using
/// `file_of` against `touched_files`. `None` means the whole package was
/// reparsed, so everything is "touched" and compared.
fn partition_by_file<T>(items: Vec<T>, touched_files: Option<&HashSet<String>>, file_of: impl Fn(&T) -> &str) -> (Vec<T>, Vec<T>) {
    match touched_files {
        Some(touched) => items.into_iter().partition(|item| !touched.contains(file_of(item))),
        None => (Vec::new(), items),
    }
}

/// Keeps `current` as-is and appends a tombstoned copy of every `previous`
/// entry whose key is missing from `current` and that wasn't already a
/// tombstone — a tombstone row survives exactly one generation past the
/// deletion it records, then drops out entirely.
fn tombstone_missing<T, K: Eq + std::hash::Hash>(
    current: Vec<T>,
    previous: Vec<T>,
    key_of: impl Fn(&T) -> K,
    is_live: impl Fn(&T) -> bool,
    mark_deleted: impl Fn(&mut T),
) -> Vec<T> {
    let current_keys: HashSet<K> = current.iter().map(&key_of).collect();
    let mut merged = current;
    for mut prior in previous {
        if is_live(&prior) && !current_keys.contains(&key_of(&prior)) {
            mark_deleted(&mut prior);
            merged.push(prior);
        }
    }
    merged
}

fn edge_key(e: &Edge) -> String {
    format!(
        "{}\0{}\0{}\0{}\0{}",
        e.source_entity_id, e.target_entity_id, e.edge_type, e.source_file_path, e.source_line
    )
}

fn ref_key(r: &ExternalRef) -> String {
    format!("{}\0{}\0{}\0{}", r.source_entity_id, r.module_specifier, r.referenced_name, r.source_line)
}

fn effect_key(e: &DomainEffect) -> String {
    format!(
        "{}\0{}\0{}\0{}\0{}\0{}",
        e.source_entity_id,
        e.domain,
        e.provider,
        e.operation,
        e.group.as_deref().unwrap_or(""),
        e.container.as_deref().unwrap_or("")
    )
}

fn language_of(file_path: &str) -> &'static str {
    match Path::new(file_path).extension().and_then(|e| e.to_str()) {
        Some(ext) if matches!(ext, "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs") => "typescript",
        Some(ext) if matches!(ext, "py" | "pyi") => "python",
        Some("rs") => "rust",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devgraph_storage::{FsSeedStore, SeedLayout};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn registry() -> Arc<LanguageRegistry> {
        let mut registry = LanguageRegistry::new();
        registry.register(Arc::new(crate::parsing::typescript::TypeScriptPlugin::new()));
        registry.register(Arc::new(crate::parsing::python::PythonPlugin::new()));
        registry.register(Arc::new(crate::parsing::rust_lang::RustPlugin::new()));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn analyzes_a_small_typescript_package() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export function greet() {}\n").unwrap();

        let layout = SeedLayout::new(dir.path());
        let store = FsSeedStore::new(layout);
        let analyzer = Analyzer::new(registry(), DevgraphConfig::preset(), store);

        let options = AnalyzeOptions {
            package_root: dir.path().to_path_buf(),
            repo: "acme/widgets".into(),
            package: "core".into(),
            branch: "main".into(),
            if_changed: false,
            changed_paths: None,
            within_hub: false,
        };

        let report = analyzer.analyze(&options).await.unwrap();
        assert_eq!(report.files_analyzed, 1);
        assert!(report.nodes_created >= 1);
        assert!(!report.skipped);
    }

    #[tokio::test]
    async fn if_changed_skips_unchanged_reanalysis() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export function greet() {}\n").unwrap();

        let layout = SeedLayout::new(dir.path());
        let store = FsSeedStore::new(layout);
        let analyzer = Analyzer::new(registry(), DevgraphConfig::preset(), store);

        let options = AnalyzeOptions {
            package_root: dir.path().to_path_buf(),
            repo: "acme/widgets".into(),
            package: "core".into(),
            branch: "main".into(),
            if_changed: true,
            changed_paths: None,
            within_hub: false,
        };

        analyzer.analyze(&options).await.unwrap();
        let second = analyzer.analyze(&options).await.unwrap();
        assert!(second.skipped);
    }

    #[tokio::test]
    async fn removed_file_produces_tombstone_when_tracked() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export function greet() {}\n").unwrap();

        let layout = SeedLayout::new(dir.path());
        let store = FsSeedStore::new(layout);
        let analyzer = Analyzer::new(registry(), DevgraphConfig::preset(), store);

        let mut options = AnalyzeOptions {
            package_root: dir.path().to_path_buf(),
            repo: "acme/widgets".into(),
            package: "core".into(),
            branch: "main".into(),
            if_changed: false,
            changed_paths: None,
            within_hub: true,
        };

        analyzer.analyze(&options).await.unwrap();
        std::fs::remove_file(dir.path().join("a.ts")).unwrap();
        std::fs::write(dir.path().join("b.ts"), "export function other() {}\n").unwrap();
        options.package_root = dir.path().to_path_buf();
        let report = analyzer.analyze(&options).await.unwrap();

        assert!(report.nodes_created >= 2);
    }

    #[tokio::test]
    async fn incremental_reanalysis_scopes_to_changed_paths_and_tombstones_deletions() {
        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.ts");
        let b_path = dir.path().join("b.ts");
        std::fs::write(&a_path, "export function greet() {}\n").unwrap();
        std::fs::write(&b_path, "export function farewell() {}\n").unwrap();

        let layout = SeedLayout::new(dir.path());
        let store = FsSeedStore::new(layout);
        let analyzer = Analyzer::new(registry(), DevgraphConfig::preset(), store);

        let base_options = AnalyzeOptions {
            package_root: dir.path().to_path_buf(),
            repo: "acme/widgets".into(),
            package: "core".into(),
            branch: "main".into(),
            if_changed: false,
            changed_paths: None,
            within_hub: true,
        };
        let full = analyzer.analyze(&base_options).await.unwrap();
        assert_eq!(full.nodes_created, 2);

        // Remove `a.ts` and reanalyze scoped to just the two changed paths —
        // `b.ts`'s node must survive untouched even though it wasn't reparsed.
        std::fs::remove_file(&a_path).unwrap();
        let incremental = AnalyzeOptions {
            changed_paths: Some(vec![a_path, b_path]),
            ..base_options
        };
        let report = analyzer.analyze(&incremental).await.unwrap();

        assert_eq!(report.files_analyzed, 1);
        assert_eq!(report.nodes_created, 2);
    }
}
