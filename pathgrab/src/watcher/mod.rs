use crate::domain::Domain;
use crate::error::Result;
use crate::util::{join_path, normalize_path};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// A debounced change to a file some domain would index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherEvent {
    pub path: PathBuf,
    pub domain: String,
    pub kind: ChangeKind,
}

/// The kind of file change detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Maps absolute event paths back onto the domain that would index them.
#[derive(Debug, Clone)]
struct DomainFilter {
    roots: Vec<(PathBuf, Domain)>,
}

impl DomainFilter {
    fn new(domains: &[Domain]) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let roots = domains
            .iter()
            .map(|d| (cwd.join(d.root()), d.clone()))
            .collect();
        Ok(DomainFilter { roots })
    }

    /// Name of the first domain that accepts `path`.
    fn domain_for(&self, path: &Path) -> Option<&str> {
        self.roots.iter().find_map(|(abs_root, domain)| {
            let rel = path.strip_prefix(abs_root).ok()?;
            let rel = normalize_path(&rel.to_string_lossy());
            domain
                .accepts(&join_path(domain.root(), &rel))
                .then(|| domain.name())
        })
    }
}

/// Watches every domain root for changes. Debounced events are sent through
/// an mpsc channel; the receiver decides when to rebuild.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    /// Handle to the background thread processing events
    _thread: std::thread::JoinHandle<()>,
    /// Receiver for debounced file change events
    pub event_rx: mpsc::Receiver<WatcherEvent>,
}

impl FileWatcher {
    /// Start watching the roots of `domains`. Debounced events (100ms) are
    /// available via `event_rx`.
    pub fn start(domains: &[Domain]) -> Result<Self> {
        let filter = DomainFilter::new(domains)?;
        let (notify_tx, notify_rx) = mpsc::channel::<notify::Result<Event>>();
        let (event_tx, event_rx) = mpsc::channel::<WatcherEvent>();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = notify_tx.send(res);
            },
            Config::default(),
        )?;

        for (abs_root, domain) in &filter.roots {
            if abs_root.exists() {
                watcher.watch(abs_root, RecursiveMode::Recursive)?;
                log::info!("Watching {} for domain '{}'", abs_root.display(), domain.name());
            } else {
                log::warn!("Root of domain '{}' does not exist, not watching it", domain.name());
            }
        }

        let thread = std::thread::spawn(move || {
            let debounce = Duration::from_millis(100);
            let mut pending: Vec<(PathBuf, ChangeKind)> = Vec::new();
            let mut last_event = Instant::now();

            loop {
                match notify_rx.recv_timeout(debounce) {
                    Ok(Ok(event)) => {
                        if let Some(kind) = change_kind(&event.kind) {
                            pending.extend(event.paths.into_iter().map(|p| (p, kind)));
                        }
                        last_event = Instant::now();
                    }
                    Ok(Err(e)) => {
                        log::warn!("File watcher error: {e}");
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if !pending.is_empty() && last_event.elapsed() >= debounce {
                            // Keep the last change kind per path
                            let mut latest = HashMap::new();
                            for (path, kind) in pending.drain(..) {
                                latest.insert(path, kind);
                            }
                            for (path, kind) in latest {
                                let Some(domain) = filter.domain_for(&path) else {
                                    continue;
                                };
                                let event = WatcherEvent {
                                    path,
                                    domain: domain.to_string(),
                                    kind,
                                };
                                if event_tx.send(event).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Ok(FileWatcher {
            _watcher: watcher,
            _thread: thread,
            event_rx,
        })
    }

    /// Block until at least one event arrives, then drain whatever else is
    /// already queued. `None` once the watcher thread has stopped.
    pub fn next_batch(&self) -> Option<Vec<WatcherEvent>> {
        let first = self.event_rx.recv().ok()?;
        let mut batch = vec![first];
        batch.extend(self.event_rx.try_iter());
        Some(batch)
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        _ => None,
    }
}
