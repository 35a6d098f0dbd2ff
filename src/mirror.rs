//! # Flattened Mirror Engine
//!
//! The mirror module applies single filesystem changes from the source tree to
//! the flat destination directory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ Source tree  │ --> │   Mirror     │ --> │ Flat destination │
//! │ (a/b/x.js)   │     │ (name map +  │     │ (b_x.js.txt)     │
//! │              │     │  retry I/O)  │     │                  │
//! └──────────────┘     └──────────────┘     └──────────────────┘
//! ```
//!
//! Every mirrored source file owns one flattened base name in the shared
//! [`NameMap`](crate::mapping::NameMap). The destination file is that base name
//! plus the configured suffix, so `a/b/x.js` lands as `x.js.txt` (or
//! `b_x.js.txt` when `x.js` is already taken).
//!
//! ## Operations
//!
//! - **Sync**: register (or resolve) the source and copy it over the
//!   destination file, preserving the modification time.
//! - **Delete**: unregister the source, then remove the stale destination file.
//!   Unregistration happens first so the map never points at a deleted source,
//!   even when the removal fails.
//! - **Move**: delete at the old path, then sync at the new path.
//! - **Tree operations**: a directory that appears, disappears or is renamed
//!   is expanded into the per-file operations above. Watchers report a
//!   directory rename once, not once per file inside it.
//!
//! ## Concurrency
//!
//! A `Mirror` is owned by exactly one thread at a time: the initial scan runs
//! it on the main thread, then it is handed to the single event worker. That
//! single owner is the only writer of the name map.
//!
//! ## Error Handling
//!
//! Destination writes go through [`io::RetryPolicy`]. Nothing here returns an
//! error to the caller: failures are recorded in the change history and the
//! event is dropped, leaving the destination stale until the next event for
//! the same path.

use crate::MirrorContext;
use crate::config::SyncConfig;
use crate::mapping::SharedNameMap;
use crate::metadata::UpdateSignal;
use crate::output::ChangeHistory;
use crate::scanner;
use crate::utils::{normalize_lexically, source_key};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Failure classification for destination I/O
pub mod errors;

/// Retry-wrapped destination I/O primitives
pub mod io;

use io::{MirrorFs, RetryPolicy, StdFs};

/// State shared between the sync engine, the metadata worker and the CLI
#[derive(Clone)]
pub struct SharedState {
    /// Source path to destination name table
    pub names: SharedNameMap,
    /// Pending-metadata-update flag
    pub signal: Arc<UpdateSignal>,
    /// Human-readable status lines
    pub history: Arc<ChangeHistory>,
}

impl SharedState {
    /// Fresh state with an empty name map and a plain (board-less) history
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self::with_history(ChangeHistory::new(history_capacity))
    }

    /// Fresh state around an existing history
    #[must_use]
    pub fn with_history(history: ChangeHistory) -> Self {
        Self {
            names: crate::mapping::NameMap::shared(),
            signal: Arc::new(UpdateSignal::new()),
            history: Arc::new(history),
        }
    }
}

/// One unit of work for the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Copy a created or modified file
    Sync(PathBuf),
    /// Remove the mirror of a deleted file
    Delete(PathBuf),
    /// Re-home a renamed file
    Move {
        /// Previous location
        from: PathBuf,
        /// New location
        to: PathBuf,
    },
    /// Mirror every matching file below a directory that appeared
    SyncTree(PathBuf),
    /// Drop every mirrored file below a directory that disappeared
    DeleteTree(PathBuf),
    /// Re-home every mirrored file below a renamed directory
    MoveTree {
        /// Previous location
        from: PathBuf,
        /// New location
        to: PathBuf,
    },
}

/// What a single engine operation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do (irrelevant or unregistered path)
    Skipped,
    /// Destination file written
    Synced(String),
    /// Destination file removed
    Removed(String),
    /// The operation was abandoned after logging a failure
    Failed,
    /// A directory was expanded into per-file operations
    Tree {
        /// Files written
        synced: usize,
        /// Destination files removed
        removed: usize,
        /// Files abandoned after a logged failure
        failed: usize,
    },
}

/// Running totals for a tree operation
#[derive(Debug, Default)]
struct TreeTally {
    synced: usize,
    removed: usize,
    failed: usize,
}

impl TreeTally {
    fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Synced(_) => self.synced += 1,
            Outcome::Removed(_) => self.removed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Tree {
                synced,
                removed,
                failed,
            } => {
                self.synced += synced;
                self.removed += removed;
                self.failed += failed;
            }
            Outcome::Skipped => {}
        }
    }

    fn finish(self) -> Outcome {
        if self.synced + self.removed + self.failed == 0 {
            Outcome::Skipped
        } else {
            Outcome::Tree {
                synced: self.synced,
                removed: self.removed,
                failed: self.failed,
            }
        }
    }
}

/// Applies filesystem changes to the flat destination directory
pub struct Mirror {
    /// Absolute source root
    source_root: PathBuf,
    /// Absolute destination directory
    dest_dir: PathBuf,
    /// Extension filter, ignore set and destination suffix
    sync: SyncConfig,
    /// Retry policy for destination mutations
    retry: RetryPolicy,
    /// Shared map, signal and history
    state: SharedState,
    /// Filesystem primitives
    fs: Box<dyn MirrorFs>,
}

impl Mirror {
    /// Create a mirror for the roots and settings in `ctx`
    #[must_use]
    pub fn new(ctx: &MirrorContext, state: SharedState) -> Self {
        Self {
            source_root: ctx.source_root.clone(),
            dest_dir: ctx.dest_dir.clone(),
            sync: ctx.config.sync.clone(),
            retry: RetryPolicy::from(&ctx.config.retry),
            state,
            fs: Box::new(StdFs),
        }
    }

    /// Replace the filesystem primitives
    #[must_use]
    pub fn with_fs(mut self, fs: Box<dyn MirrorFs>) -> Self {
        self.fs = fs;
        self
    }

    /// Absolute source root
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Absolute destination directory
    #[must_use]
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Sync settings in effect
    #[must_use]
    pub const fn sync_config(&self) -> &SyncConfig {
        &self.sync
    }

    /// Shared map, signal and history
    #[must_use]
    pub const fn state(&self) -> &SharedState {
        &self.state
    }

    /// Apply one action
    pub fn apply(&mut self, action: &SyncAction) -> Outcome {
        match action {
            SyncAction::Sync(path) => self.sync_file(path),
            SyncAction::Delete(path) => self.delete_file(path),
            SyncAction::Move { from, to } => self.move_file(from, to),
            SyncAction::SyncTree(dir) => self.sync_tree(dir),
            SyncAction::DeleteTree(dir) => self.delete_tree(dir),
            SyncAction::MoveTree { from, to } => self.move_tree(from, to),
        }
    }

    /// Copy a source file into the destination, registering it if needed.
    ///
    /// Does nothing unless `path` is an existing regular file with a mirrored
    /// extension.
    pub fn sync_file(&mut self, path: &Path) -> Outcome {
        let absolute = self.absolute(path);
        if !absolute.is_file() || !self.sync.has_mirrored_extension(&absolute) {
            return Outcome::Skipped;
        }

        let key = source_key(&self.source_root, &absolute);
        let registration = self.state.names.write().register(&key);
        if registration.created {
            debug!(source = %key.display(), name = %registration.name, "Registered new mapping");
            self.state.signal.set();
        }

        let dest_name = self.sync.dest_file_name(&registration.name);
        let dest_path = self.dest_dir.join(&dest_name);
        let display = display_name(&absolute);

        match self.retry.copy(self.fs.as_ref(), &absolute, &dest_path) {
            Ok(()) => {
                self.state
                    .history
                    .record(format!("Synced: {display} -> {dest_name}"));
                Outcome::Synced(dest_name)
            }
            Err(e) if e.is_not_found() => {
                self.state
                    .history
                    .record(format!("Sync failed: {display} not found."));
                Outcome::Failed
            }
            Err(e) => {
                warn!(source = %key.display(), error = %e, "Copy abandoned");
                self.state
                    .history
                    .record(format!("Failed to copy {}: {e}", key.display()));
                Outcome::Failed
            }
        }
    }

    /// Remove the mirror of a source file and forget its mapping.
    ///
    /// Does nothing unless `path` is registered.
    pub fn delete_file(&mut self, path: &Path) -> Outcome {
        let absolute = self.absolute(path);
        let key = source_key(&self.source_root, &absolute);
        let Some(name) = self.state.names.write().unregister(&key) else {
            return Outcome::Skipped;
        };

        let dest_name = self.sync.dest_file_name(&name);
        let dest_path = self.dest_dir.join(&dest_name);

        match self.retry.remove(self.fs.as_ref(), &dest_path) {
            Ok(()) => {
                self.state
                    .history
                    .record(format!("Deleted: {}", display_name(&absolute)));
                self.state.signal.set();
                Outcome::Removed(dest_name)
            }
            Err(e) => {
                warn!(dest = %dest_path.display(), error = %e, "Removal abandoned");
                self.state
                    .history
                    .record(format!("Failed to delete {dest_name}: {e}"));
                Outcome::Failed
            }
        }
    }

    /// Delete at `from`, then sync at `to`; returns the outcome of the sync
    pub fn move_file(&mut self, from: &Path, to: &Path) -> Outcome {
        self.delete_file(from);
        self.sync_file(to)
    }

    /// Mirror every matching file below `dir`.
    ///
    /// Ignored subdirectories and the destination are skipped. A directory
    /// that is already gone again is a no-op.
    pub fn sync_tree(&mut self, dir: &Path) -> Outcome {
        let mut tally = TreeTally::default();
        for file in self.files_below(dir) {
            tally.add(&self.sync_file(&file));
        }
        tally.finish()
    }

    /// Delete the mirror of every registered file at or below `dir`
    pub fn delete_tree(&mut self, dir: &Path) -> Outcome {
        let prefix = source_key(&self.source_root, &self.absolute(dir));
        let registered = self.state.names.read().sources_under(&prefix);

        let mut tally = TreeTally::default();
        for source in &registered {
            tally.add(&self.delete_file(source));
        }
        tally.finish()
    }

    /// Move every registered file below `from` to the same place below `to`,
    /// then mirror anything under `to` that is still unregistered.
    pub fn move_tree(&mut self, from: &Path, to: &Path) -> Outcome {
        let from_key = source_key(&self.source_root, &self.absolute(from));
        let to_dir = self.absolute(to);
        let registered = self.state.names.read().sources_under(&from_key);
        debug!(
            from = %from_key.display(),
            to = %to_dir.display(),
            files = registered.len(),
            "Directory renamed"
        );

        let mut tally = TreeTally::default();
        for source in &registered {
            let Ok(rest) = source.strip_prefix(&from_key) else {
                continue;
            };
            tally.add(&self.move_file(source, &to_dir.join(rest)));
        }

        for file in self.files_below(&to_dir) {
            let key = source_key(&self.source_root, &file);
            if !self.state.names.read().contains(&key) {
                tally.add(&self.sync_file(&file));
            }
        }
        tally.finish()
    }

    /// Mirrorable files below `dir`, in walk order
    fn files_below(&self, dir: &Path) -> Vec<PathBuf> {
        let absolute = self.absolute(dir);
        if !absolute.is_dir() {
            return Vec::new();
        }
        match scanner::collect_sources(&absolute, &self.dest_dir, &self.sync) {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %absolute.display(), error = %e, "Cannot walk directory");
                Vec::new()
            }
        }
    }

    /// Remove a stale artifact from the destination with retries
    pub(crate) fn remove_artifact(&self, path: &Path) -> bool {
        match self.retry.remove(self.fs.as_ref(), path) {
            Ok(()) => true,
            Err(e) => {
                self.state.history.record(format!(
                    "Failed to delete {}: {e}",
                    display_name(path)
                ));
                false
            }
        }
    }

    /// Resolve `path` against the source root
    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_lexically(path)
        } else {
            normalize_lexically(&self.source_root.join(path))
        }
    }
}

/// Final component of a path for status lines
fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
