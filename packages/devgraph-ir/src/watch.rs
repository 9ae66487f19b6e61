//! Watch Loop (C9): observes a package root for filesystem changes and
//! re-runs the analyzer on quiescence, coalescing rapid-fire edits under a
//! debounce window. Built on `notify` the way the teacher's file watcher
//! feature is, generalized to call the analyzer instead of a generic
//! event-handler callback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{error, info, warn};

use devgraph_storage::SeedStore;

use crate::analyzer::{AnalyzeOptions, AnalyzeReport, Analyzer};
use crate::config::WatchSettings;
use crate::error::{IrError, Result};
use crate::language_router::LanguageRegistry;

/// A single filesystem change, already extension-filtered and
/// ignore-glob-filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

impl WatchEvent {
    fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Deleted(p) => p,
        }
    }
}

/// Per-package lifecycle: `Idle -> Dirty -> Analyzing -> Idle`, with
/// `Analyzing -> Dirty` readmitting events that arrive mid-run so they
/// aren't lost — the loop simply reruns once the in-flight analysis
/// finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Dirty,
    Analyzing,
}

#[derive(Debug, Default)]
pub struct WatchCounters {
    pub files_watched: u64,
    pub events_processed: u64,
    pub errors: u64,
}

/// Emitted when C5 leaves an external reference unresolved and a sibling
/// directory matching the module specifier's leading path component looks
/// like another repository. Purely informational — nothing is dispatched
/// automatically.
#[derive(Debug, Clone)]
pub struct CrossRepoNeedEvent {
    pub module_specifier: String,
    pub sibling_repo_path: PathBuf,
}

pub trait WatchObserver: Send + Sync {
    fn on_analyzed(&self, _report: &AnalyzeReport) {}
    fn on_cross_repo_need(&self, _event: &CrossRepoNeedEvent) {}
    fn on_error(&self, _message: &str) {}
}

struct Counters {
    files_watched: AtomicU64,
    events_processed: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            files_watched: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> WatchCounters {
        WatchCounters {
            files_watched: self.files_watched.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A running watch loop. Dropping this without calling `stop` leaves the
/// background watcher thread and dispatch task running until the process
/// exits — callers that care about graceful shutdown should always call
/// `stop`.
pub struct WatchHandle {
    state: Arc<Mutex<WatchState>>,
    counters: Arc<Counters>,
    stop_requested: Arc<AtomicBool>,
    flush_on_stop: Arc<AtomicBool>,
    stop_notify: Arc<tokio::sync::Notify>,
    _watcher: RecommendedWatcher,
    dispatch_task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    pub fn state(&self) -> WatchState {
        *self.state.lock()
    }

    pub fn counters(&self) -> WatchCounters {
        self.counters.snapshot()
    }

    /// Requests a cooperative stop. When `flush` is true, an in-flight
    /// analysis is allowed to complete before the loop exits; when false,
    /// the loop exits as soon as it next checks the stop flag, potentially
    /// mid-analysis (the analyzer's own atomicity guarantees the seed store
    /// itself never shows a partial generation either way).
    pub async fn stop(self, flush: bool) {
        self.flush_on_stop.store(flush, Ordering::SeqCst);
        self.stop_requested.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
        let _ = self.dispatch_task.await;
    }
}

/// Starts watching `options.package_root`, re-running the analyzer on
/// quiescence after debounced changes. Performs an initial full analysis
/// immediately unless the current seed generation's fingerprint already
/// matches the on-disk tree.
pub async fn start<S>(
    registry: Arc<LanguageRegistry>,
    config: crate::config::DevgraphConfig,
    store: S,
    options: AnalyzeOptions,
    observer: Arc<dyn WatchObserver>,
) -> Result<WatchHandle>
where
    S: SeedStore + Clone + 'static,
{
    let settings: WatchSettings = config.watch.clone();
    let analyzer = Analyzer::new(registry, config, store.clone());

    let state = Arc::new(Mutex::new(WatchState::Idle));
    let counters = Arc::new(Counters::new());
    let stop_requested = Arc::new(AtomicBool::new(false));
    let flush_on_stop = Arc::new(AtomicBool::new(false));
    let stop_notify = Arc::new(tokio::sync::Notify::new());

    let (batch_tx, mut batch_rx) = unbounded_channel::<Vec<WatchEvent>>();

    let watcher = spawn_fs_watcher(&options.package_root, settings.clone(), batch_tx, counters.clone())?;

    {
        let initial = analyzer
            .analyze(&AnalyzeOptions {
                if_changed: true,
                changed_paths: None,
                ..options.clone()
            })
            .await;
        match initial {
            Ok(report) => observer.on_analyzed(&report),
            Err(e) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                observer.on_error(&e.to_string());
            }
        }
    }

    let dispatch_task = tokio::spawn({
        let state = state.clone();
        let counters = counters.clone();
        let stop_requested = stop_requested.clone();
        let flush_on_stop = flush_on_stop.clone();
        let stop_notify = stop_notify.clone();
        let observer = observer.clone();
        let package_root = options.package_root.clone();
        let store_for_cross_repo = store.clone();

        async move {
            let mut carried: Option<Vec<WatchEvent>> = None;

            loop {
                if carried.is_none() && stop_requested.load(Ordering::SeqCst) {
                    if !flush_on_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    match batch_rx.try_recv() {
                        Ok(batch) => carried = Some(batch),
                        Err(_) => break,
                    }
                }

                let batch = match carried.take() {
                    Some(batch) => batch,
                    None => tokio::select! {
                        batch = batch_rx.recv() => match batch {
                            Some(batch) => batch,
                            None => break,
                        },
                        _ = stop_notify.notified() => {
                            if flush_on_stop.load(Ordering::SeqCst) {
                                match batch_rx.try_recv() {
                                    Ok(batch) => batch,
                                    Err(_) => break,
                                }
                            } else {
                                break;
                            }
                        }
                    },
                };

                if stop_requested.load(Ordering::SeqCst) && !flush_on_stop.load(Ordering::SeqCst) {
                    break;
                }

                counters.events_processed.fetch_add(batch.len() as u64, Ordering::Relaxed);
                *state.lock() = WatchState::Analyzing;

                // Scope this reanalysis to exactly the paths this debounced
                // batch touched, rather than rediscovering the whole package.
                let changed_paths: Vec<PathBuf> = batch.iter().map(|event| event.path().to_path_buf()).collect();

                match analyzer
                    .analyze(&AnalyzeOptions {
                        if_changed: false,
                        changed_paths: Some(changed_paths),
                        ..options.clone()
                    })
                    .await
                {
                    Ok(report) => {
                        observer.on_analyzed(&report);
                        emit_cross_repo_needs(&store_for_cross_repo, &package_root, &options.branch, observer.as_ref()).await;
                    }
                    Err(e) => {
                        counters.errors.fetch_add(1, Ordering::Relaxed);
                        error!(error = %e, "watch re-analysis failed");
                        observer.on_error(&e.to_string());
                    }
                }

                // Events that arrived while `analyze()` was running are
                // already buffered in the channel. Draining one here before
                // dropping back to `Idle` is what realizes the spec's
                // `Analyzing -> Dirty` readmission: the package is dirty
                // again the instant we know there's queued work, rather
                // than only after a fresh `recv().await` wakes us up.
                match batch_rx.try_recv() {
                    Ok(extra) => {
                        *state.lock() = WatchState::Dirty;
                        carried = Some(extra);
                    }
                    Err(_) => {
                        *state.lock() = WatchState::Idle;
                    }
                }

                if stop_requested.load(Ordering::SeqCst) && !flush_on_stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            info!("watch loop exited");
        }
    });

    Ok(WatchHandle {
        state,
        counters,
        stop_requested,
        flush_on_stop,
        stop_notify,
        _watcher: watcher,
        dispatch_task,
    })
}

fn spawn_fs_watcher(
    package_root: &Path,
    settings: WatchSettings,
    batch_tx: UnboundedSender<Vec<WatchEvent>>,
    counters: Arc<Counters>,
) -> Result<RecommendedWatcher> {
    if !package_root.exists() {
        return Err(IrError::Watch(format!("package root does not exist: {}", package_root.display())));
    }

    let debounce = Duration::from_millis(settings.debounce_ms);
    let ignore_globs = settings.ignore_globs.clone();

    let (raw_tx, raw_rx) = std::sync::mpsc::channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| match res {
            Ok(event) => {
                let _ = raw_tx.send(event);
            }
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        },
        NotifyConfig::default(),
    )
    .map_err(|e| IrError::Watch(format!("failed to create watcher: {e}")))?;

    watcher
        .watch(package_root, RecursiveMode::Recursive)
        .map_err(|e| IrError::Watch(format!("failed to watch {}: {e}", package_root.display())))?;

    std::thread::spawn(move || {
        let mut debounce_map: HashMap<PathBuf, (WatchEvent, Instant)> = HashMap::new();
        loop {
            match raw_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(event) => {
                    if let Some(change) = convert_event(&event, &ignore_globs) {
                        let path = change.path().to_path_buf();
                        let now = Instant::now();
                        if let Some((_, last_seen)) = debounce_map.get(&path) {
                            if now.duration_since(*last_seen) < debounce {
                                debounce_map.insert(path, (change, now));
                                continue;
                            }
                        }
                        counters.files_watched.fetch_add(1, Ordering::Relaxed);
                        debounce_map.insert(path, (change.clone(), now));
                        let _ = batch_tx.send(vec![change]);
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    debounce_map.retain(|_, (_, last_seen)| now.duration_since(*last_seen) < debounce * 2);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    Ok(watcher)
}

fn convert_event(event: &Event, ignore_globs: &[String]) -> Option<WatchEvent> {
    let path = event.paths.first()?;
    if should_ignore(path, ignore_globs) {
        return None;
    }
    match event.kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.clone())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.clone())),
        EventKind::Modify(_) | EventKind::Any => {
            if path.exists() {
                Some(WatchEvent::Modified(path.clone()))
            } else {
                Some(WatchEvent::Deleted(path.clone()))
            }
        }
        _ => None,
    }
}

/// Substring-based glob matching for `**/segment/**`-style patterns, same
/// approach as the simple ignore-pattern matcher this is adapted from.
fn should_ignore(path: &Path, ignore_globs: &[String]) -> bool {
    let Some(path_str) = path.to_str() else { return false };
    for pattern in ignore_globs {
        if pattern.contains("**") {
            for part in pattern.split("**") {
                let part = part.trim_matches('/');
                if part.is_empty() {
                    continue;
                }
                if path_str.contains(&format!("/{part}/"))
                    || path_str.ends_with(&format!("/{part}"))
                    || path_str.starts_with(&format!("{part}/"))
                {
                    return true;
                }
            }
        } else if path_str.contains(pattern.as_str()) {
            return true;
        }
    }
    false
}

/// After an analysis run, scans the emitted generation's unresolved
/// external refs and checks whether the package root's parent directory
/// contains a sibling whose name matches the module specifier's leading
/// path component.
async fn emit_cross_repo_needs<S: SeedStore>(store: &S, package_root: &Path, branch: &str, observer: &dyn WatchObserver) {
    let Some(parent) = package_root.parent() else { return };
    let Ok(reader) = store.open(branch).await else { return };
    let Ok(refs) = reader.external_refs() else { return };

    for r in refs.into_iter().filter(|r| r.resolved_entity_id.is_none()) {
        let Some(repo_component) = r.module_specifier.split('/').find(|s| !s.is_empty() && *s != ".") else {
            continue;
        };
        let candidate = parent.join(repo_component);
        if candidate.is_dir() {
            observer.on_cross_repo_need(&CrossRepoNeedEvent {
                module_specifier: r.module_specifier.clone(),
                sibling_repo_path: candidate,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_ignore_matches_doubled_star_globs() {
        let globs = vec!["**/node_modules/**".to_string()];
        assert!(should_ignore(Path::new("/repo/node_modules/pkg/index.js"), &globs));
        assert!(!should_ignore(Path::new("/repo/src/main.rs"), &globs));
    }

    #[test]
    fn should_ignore_matches_plain_substrings() {
        let globs = vec![".git".to_string()];
        assert!(should_ignore(Path::new("/repo/.git/HEAD"), &globs));
    }

    #[test]
    fn watch_event_path_extracts_inner_path() {
        let event = WatchEvent::Modified(PathBuf::from("/repo/a.ts"));
        assert_eq!(event.path(), Path::new("/repo/a.ts"));
    }
}
