//! Live event pipeline.
//!
//! ```text
//! notify callback --> EventSink (filter) --> mpsc FIFO --> worker (owns Mirror)
//! ```
//!
//! The notify callback thread only filters and enqueues. A single worker
//! thread drains the queue one action at a time, so the name map has exactly
//! one writer and events for the same path are applied in arrival order.

/// Raw events and `notify` translation
pub mod events;

pub use events::{WatchEvent, WatchEventKind, translate};

use crate::config::SyncConfig;
use crate::mirror::{Mirror, SyncAction};
use crate::utils::{has_ignored_segment, normalize_lexically};
use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{Level, debug, span, trace, warn};

/// How often an idle worker re-checks the stop flag
const STOP_POLL: Duration = Duration::from_millis(100);

/// Decides which raw events matter and what the engine should do about them
#[derive(Debug, Clone)]
pub struct EventFilter {
    source_root: PathBuf,
    dest_dir: PathBuf,
    sync: SyncConfig,
}

impl EventFilter {
    /// Filter for `source_root` that also rejects anything under `dest_dir`
    #[must_use]
    pub const fn new(source_root: PathBuf, dest_dir: PathBuf, sync: SyncConfig) -> Self {
        Self {
            source_root,
            dest_dir,
            sync,
        }
    }

    /// Filter configured like `mirror`
    #[must_use]
    pub fn for_mirror(mirror: &Mirror) -> Self {
        Self::new(
            mirror.source_root().to_path_buf(),
            mirror.dest_dir().to_path_buf(),
            mirror.sync_config().clone(),
        )
    }

    /// Check whether a file path should be mirrored.
    ///
    /// Relative paths are taken relative to the source root. Paths outside the
    /// root, inside the destination, or below an ignored directory are rejected.
    #[must_use]
    pub fn is_relevant(&self, path: &Path) -> bool {
        self.relative(path).is_some_and(|relative| {
            !has_ignored_segment(&relative, |name| self.sync.is_ignored_dir(name))
                && self.sync.has_mirrored_extension(&relative)
        })
    }

    /// Check whether a directory lies in the mirrored part of the tree.
    ///
    /// Unlike files, the directory's own name is checked against the ignore set.
    #[must_use]
    pub fn is_watched_dir(&self, path: &Path) -> bool {
        self.relative(path).is_some_and(|relative| {
            !relative.components().any(|c| match c {
                Component::Normal(part) => part.to_str().is_some_and(|n| self.sync.is_ignored_dir(n)),
                _ => false,
            })
        })
    }

    /// Path relative to the source root, or `None` outside it or inside the destination
    fn relative(&self, path: &Path) -> Option<PathBuf> {
        let absolute = if path.is_absolute() {
            normalize_lexically(path)
        } else {
            normalize_lexically(&self.source_root.join(path))
        };

        if absolute.starts_with(&self.dest_dir) {
            return None;
        }
        absolute
            .strip_prefix(&self.source_root)
            .ok()
            .map(Path::to_path_buf)
    }

    /// Turn a raw event into an engine action, or `None` if it is irrelevant
    #[must_use]
    pub fn classify(&self, event: &WatchEvent) -> Option<SyncAction> {
        if event.is_dir {
            return self.classify_dir(event);
        }

        match &event.kind {
            WatchEventKind::Created | WatchEventKind::Modified => self
                .is_relevant(&event.path)
                .then(|| SyncAction::Sync(event.path.clone())),
            // A lone rename-from cannot tell a file from a directory, since the
            // path is already gone
            WatchEventKind::Deleted => {
                if self.is_relevant(&event.path) {
                    Some(SyncAction::Delete(event.path.clone()))
                } else {
                    self.is_watched_dir(&event.path)
                        .then(|| SyncAction::DeleteTree(event.path.clone()))
                }
            }
            WatchEventKind::Moved { to } => {
                match (self.is_relevant(&event.path), self.is_relevant(to)) {
                    (true, true) => Some(SyncAction::Move {
                        from: event.path.clone(),
                        to: to.clone(),
                    }),
                    (true, false) => Some(SyncAction::Delete(event.path.clone())),
                    (false, true) => Some(SyncAction::Sync(to.clone())),
                    (false, false) => None,
                }
            }
        }
    }

    fn classify_dir(&self, event: &WatchEvent) -> Option<SyncAction> {
        match &event.kind {
            WatchEventKind::Modified => None,
            WatchEventKind::Created => self
                .is_watched_dir(&event.path)
                .then(|| SyncAction::SyncTree(event.path.clone())),
            WatchEventKind::Deleted => self
                .is_watched_dir(&event.path)
                .then(|| SyncAction::DeleteTree(event.path.clone())),
            WatchEventKind::Moved { to } => {
                match (self.is_watched_dir(&event.path), self.is_watched_dir(to)) {
                    (true, true) => Some(SyncAction::MoveTree {
                        from: event.path.clone(),
                        to: to.clone(),
                    }),
                    (true, false) => Some(SyncAction::DeleteTree(event.path.clone())),
                    (false, true) => Some(SyncAction::SyncTree(to.clone())),
                    (false, false) => None,
                }
            }
        }
    }
}

/// Producer handle for the event queue
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<SyncAction>,
    filter: Arc<EventFilter>,
    accepting: Arc<AtomicBool>,
}

impl EventSink {
    /// Filter and enqueue one event. Returns whether it was queued.
    pub fn submit(&self, event: &WatchEvent) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        let Some(action) = self.filter.classify(event) else {
            trace!(path = %event.path.display(), "Ignoring event");
            return false;
        };
        self.tx.send(action).is_ok()
    }

    /// Translate and submit a raw notification
    pub fn submit_notify(&self, event: &Event) {
        for watch_event in translate(event) {
            self.submit(&watch_event);
        }
    }

    /// Stop accepting new events
    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }
}

/// The queue plus its single consumer thread
pub struct Pipeline {
    sink: EventSink,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<Mirror>,
}

impl Pipeline {
    /// Start the worker thread; it owns `mirror` until the pipeline is stopped
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned
    pub fn start(mirror: Mirror) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let filter = Arc::new(EventFilter::for_mirror(&mirror));
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = Arc::clone(&stop);
        let worker = thread::Builder::new()
            .name("sync".to_string())
            .spawn(move || run_worker(mirror, &rx, &worker_stop))
            .context("Failed to spawn sync worker")?;

        Ok(Self {
            sink: EventSink {
                tx,
                filter,
                accepting: Arc::new(AtomicBool::new(true)),
            },
            stop,
            worker,
        })
    }

    /// A new producer handle
    #[must_use]
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Stop accepting, let the in-flight action finish and discard the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked
    pub fn shutdown(self) -> Result<Mirror> {
        self.sink.close();
        self.stop.store(true, Ordering::SeqCst);
        join(self.worker)
    }

    /// Stop accepting, then process everything already queued.
    ///
    /// Only returns once every other [`EventSink`] clone has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked
    pub fn drain(self) -> Result<Mirror> {
        self.sink.close();
        drop(self.sink);
        join(self.worker)
    }
}

fn join(worker: JoinHandle<Mirror>) -> Result<Mirror> {
    worker
        .join()
        .map_err(|_| anyhow::anyhow!("Sync worker panicked"))
}

fn run_worker(mut mirror: Mirror, rx: &Receiver<SyncAction>, stop: &AtomicBool) -> Mirror {
    while !stop.load(Ordering::SeqCst) {
        let action = match rx.recv_timeout(STOP_POLL) {
            Ok(action) => action,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let span = span!(Level::DEBUG, "event", action = ?action);
        let _guard = span.enter();
        let outcome = mirror.apply(&action);
        debug!(?outcome, "Processed event");
    }
    debug!("Sync worker stopped");
    mirror
}

/// Recursive filesystem watch feeding an [`EventSink`].
///
/// Dropping it stops notifications.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Watch `root` recursively
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created or `root`
    /// cannot be watched
    pub fn start(root: &Path, sink: EventSink) -> Result<Self> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => sink.submit_notify(&event),
                Err(e) => warn!(error = %e, "File watcher error"),
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::TestTree;
    use rstest::rstest;

    fn filter() -> EventFilter {
        EventFilter::new(
            PathBuf::from("/work/site"),
            PathBuf::from("/work/site/synced_files"),
            SyncConfig::default(),
        )
    }

    #[rstest]
    #[case("/work/site/app.js", true)]
    #[case("/work/site/css/main.css", true)]
    #[case("/work/site/index.html", true)]
    #[case("/work/site/README.md", false)]
    #[case("/work/site/Makefile", false)]
    #[case("/work/site/build/out.js", false)]
    #[case("/work/site/web/build/out.js", false)]
    #[case("/work/site/.git/hooks/x.js", false)]
    #[case("/work/site/rebuild/app.js", true)]
    #[case("/work/site/build.js", true)]
    #[case("/work/site/synced_files/app.js", false)]
    #[case("/elsewhere/app.js", false)]
    #[case("lib/util.js", true)]
    fn test_relevance(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(filter().is_relevant(Path::new(path)), expected);
    }

    #[test]
    fn test_root_named_like_ignored_dir_is_not_ignored() {
        let filter = EventFilter::new(
            PathBuf::from("/work/build"),
            PathBuf::from("/out"),
            SyncConfig::default(),
        );
        assert!(filter.is_relevant(Path::new("/work/build/app.js")));
    }

    #[test]
    fn test_classify_basic_kinds() {
        let f = filter();
        assert_eq!(
            f.classify(&WatchEvent::created("/work/site/a.js")),
            Some(SyncAction::Sync(PathBuf::from("/work/site/a.js")))
        );
        assert_eq!(
            f.classify(&WatchEvent::modified("/work/site/a.js")),
            Some(SyncAction::Sync(PathBuf::from("/work/site/a.js")))
        );
        assert_eq!(
            f.classify(&WatchEvent::deleted("/work/site/a.js")),
            Some(SyncAction::Delete(PathBuf::from("/work/site/a.js")))
        );
    }

    #[rstest]
    #[case(WatchEvent::created("/work/site/lib").directory(), Some(SyncAction::SyncTree(PathBuf::from("/work/site/lib"))))]
    #[case(WatchEvent::deleted("/work/site/lib").directory(), Some(SyncAction::DeleteTree(PathBuf::from("/work/site/lib"))))]
    #[case(WatchEvent::deleted("/work/site/lib"), Some(SyncAction::DeleteTree(PathBuf::from("/work/site/lib"))))]
    #[case(WatchEvent::modified("/work/site/lib").directory(), None)]
    #[case(WatchEvent::created("/work/site/build").directory(), None)]
    #[case(WatchEvent::created("/work/site/web/build").directory(), None)]
    #[case(WatchEvent::created("/work/site/synced_files/x").directory(), None)]
    #[case(WatchEvent::moved("/work/site/src", "/work/site/lib").directory(), Some(SyncAction::MoveTree {
        from: PathBuf::from("/work/site/src"),
        to: PathBuf::from("/work/site/lib"),
    }))]
    #[case(WatchEvent::moved("/work/site/src", "/work/site/build").directory(), Some(SyncAction::DeleteTree(PathBuf::from("/work/site/src"))))]
    #[case(WatchEvent::moved("/work/site/build", "/work/site/src").directory(), Some(SyncAction::SyncTree(PathBuf::from("/work/site/src"))))]
    #[case(WatchEvent::moved("/elsewhere/src", "/work/site/src").directory(), Some(SyncAction::SyncTree(PathBuf::from("/work/site/src"))))]
    fn test_classify_directories(#[case] event: WatchEvent, #[case] expected: Option<SyncAction>) {
        assert_eq!(filter().classify(&event), expected);
    }

    #[rstest]
    #[case("/work/site/a.js", "/work/site/b.js", Some(SyncAction::Move {
        from: PathBuf::from("/work/site/a.js"),
        to: PathBuf::from("/work/site/b.js"),
    }))]
    #[case("/work/site/a.js", "/work/site/a.bak", Some(SyncAction::Delete(PathBuf::from("/work/site/a.js"))))]
    #[case("/work/site/a.js", "/work/site/build/a.js", Some(SyncAction::Delete(PathBuf::from("/work/site/a.js"))))]
    #[case("/work/site/a.tmp", "/work/site/a.js", Some(SyncAction::Sync(PathBuf::from("/work/site/a.js"))))]
    #[case("/work/site/a.tmp", "/work/site/a.bak", None)]
    fn test_classify_moves(
        #[case] from: &str,
        #[case] to: &str,
        #[case] expected: Option<SyncAction>,
    ) {
        assert_eq!(filter().classify(&WatchEvent::moved(from, to)), expected);
    }

    #[test]
    fn test_closed_sink_rejects() {
        let tree = TestTree::new().unwrap();
        let pipeline = Pipeline::start(tree.mirror()).unwrap();
        let sink = pipeline.sink();

        sink.close();
        let path = tree.write_source("late.js", "x").unwrap();
        assert!(!sink.submit(&WatchEvent::created(path)));
        drop(sink);

        pipeline.shutdown().unwrap();
        assert!(tree.state.names.read().is_empty());
    }

    #[test]
    fn test_pipeline_applies_events_in_order() {
        let tree = TestTree::new().unwrap();
        let old = tree.write_source("old.js", "content").unwrap();
        let pipeline = Pipeline::start(tree.mirror()).unwrap();

        {
            let sink = pipeline.sink();
            assert!(sink.submit(&WatchEvent::created(&old)));
            let new = tree.source_root.join("new.js");
            std::fs::rename(&old, &new).unwrap();
            assert!(sink.submit(&WatchEvent::moved(&old, &new)));
            assert!(!sink.submit(&WatchEvent::modified(tree.source_root.join("notes.md"))));
        }

        let mirror = pipeline.drain().unwrap();
        let names = mirror.state().names.read();

        assert_eq!(names.len(), 1);
        assert!(names.contains(Path::new("new.js")));
        assert!(!tree.dest_dir.join("old.js.txt").exists());
        assert_eq!(tree.read_dest("new.js.txt").unwrap(), "content");
    }
}
