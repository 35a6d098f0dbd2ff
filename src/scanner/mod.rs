//! Authoritative full scan of the source tree.
//!
//! The initial scan throws away every previously mirrored artifact and the
//! whole name map, then walks the source tree and mirrors each matching file
//! from scratch. It runs before the watcher starts, so the live event stream
//! always begins from a consistent baseline.

use crate::config::{MetadataConfig, SyncConfig};
use crate::mapping::NameMap;
use crate::mirror::{Mirror, Outcome};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, warn};
use walkdir::WalkDir;

/// Summary of an initial scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    /// Stale destination artifacts removed before the walk
    pub removed: usize,
    /// Source files copied into the destination
    pub synced: usize,
    /// Source files that matched but could not be copied
    pub failed: usize,
}

/// Collect every source file that should be mirrored, in a stable order.
///
/// Directories named in the ignore set are pruned at every level, as is the
/// destination directory when it lives inside the source tree. Unreadable
/// subdirectories are logged and skipped.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory
pub fn collect_sources(root: &Path, dest_dir: &Path, sync: &SyncConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("Source root is not a directory: {}", root.display());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !should_prune(e, dest_dir, sync));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e)
                    .with_context(|| format!("Failed to read source root {}", root.display()));
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if sync.has_mirrored_extension(path) && path.is_file() {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Whether a walk entry is a directory that must not be descended into
fn should_prune(entry: &walkdir::DirEntry, dest_dir: &Path, sync: &SyncConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    if entry.path() == dest_dir {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| sync.is_ignored_dir(name))
}

/// Rebuild the destination and the name map from the current source tree.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created or read,
/// or if the source root cannot be walked.
pub fn initial_sync(mirror: &mut Mirror, metadata: &MetadataConfig) -> Result<ScanReport> {
    let span = span!(Level::INFO, "initial_sync", root = %mirror.source_root().display());
    let _guard = span.enter();

    let state = mirror.state().clone();
    state.history.record("Starting authoritative initial sync...");

    let dest_dir = mirror.dest_dir().to_path_buf();
    fs::create_dir_all(&dest_dir).with_context(|| {
        format!(
            "Failed to create destination directory: {}",
            dest_dir.display()
        )
    })?;

    let mut report = ScanReport {
        removed: remove_stale_artifacts(mirror, metadata)?,
        ..ScanReport::default()
    };
    debug!(removed = report.removed, "Cleared destination");

    state.names.write().clear();

    let sources = collect_sources(mirror.source_root(), &dest_dir, mirror.sync_config())?;
    for source in &sources {
        match mirror.sync_file(source) {
            Outcome::Synced(_) => report.synced += 1,
            Outcome::Failed => report.failed += 1,
            Outcome::Skipped | Outcome::Removed(_) | Outcome::Tree { .. } => {}
        }
    }

    let registered = state.names.read().len();
    info!(synced = report.synced, failed = report.failed, "Initial sync finished");
    state
        .history
        .record(format!("Initial sync complete. Synced {registered} files."));
    state.signal.set();

    Ok(report)
}

/// Delete flattened files and metadata artifacts left by a previous run
fn remove_stale_artifacts(mirror: &Mirror, metadata: &MetadataConfig) -> Result<usize> {
    let dest_dir = mirror.dest_dir();
    let mut removed = 0;

    let entries = fs::read_dir(dest_dir)
        .with_context(|| format!("Failed to read destination directory: {}", dest_dir.display()))?;

    for entry in entries {
        let entry = entry?;
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        let is_artifact = mirror.sync_config().is_mirrored_artifact(name)
            || name == metadata.structure_file
            || name == metadata.commit_log_file;
        if is_artifact && mirror.remove_artifact(&entry.path()) {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Compute the mapping a scan would produce, without touching the destination
///
/// # Errors
///
/// Returns an error if the source root cannot be walked
pub fn plan(root: &Path, dest_dir: &Path, sync: &SyncConfig) -> Result<Vec<(PathBuf, String)>> {
    let mut names = NameMap::new();
    for source in collect_sources(root, dest_dir, sync)? {
        let key = crate::utils::source_key(root, &source);
        names.register(&key);
    }

    Ok(names
        .entries()
        .into_iter()
        .map(|(source, name)| {
            let file_name = sync.dest_file_name(&name);
            (source, file_name)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::TestTree;

    #[test]
    fn test_collect_prunes_ignored_dirs_at_every_level() {
        let tree = TestTree::new().unwrap();
        tree.write_source("index.html", "<html>").unwrap();
        tree.write_source("build/out.js", "x").unwrap();
        tree.write_source("web/build/deep.js", "x").unwrap();
        tree.write_source("web/rebuild/kept.js", "x").unwrap();
        tree.write_source("web/.git/hooks/hook.js", "x").unwrap();
        tree.write_source("notes.txt", "x").unwrap();

        let files = collect_sources(&tree.source_root, &tree.dest_dir, &tree.ctx.config.sync)
            .unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(&tree.source_root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("index.html"),
                PathBuf::from("web/rebuild/kept.js"),
            ]
        );
    }

    #[test]
    fn test_collect_skips_nested_destination() {
        let tree = TestTree::with_nested_dest().unwrap();
        tree.write_source("a.js", "x").unwrap();
        std::fs::write(tree.dest_dir.join("stale.js"), "x").unwrap();

        let files = collect_sources(&tree.source_root, &tree.dest_dir, &tree.ctx.config.sync)
            .unwrap();
        assert_eq!(files, vec![tree.source_root.join("a.js")]);
    }

    #[test]
    fn test_initial_sync_mirrors_and_signals() {
        let tree = TestTree::new().unwrap();
        tree.write_source("a/x.js", "a").unwrap();
        tree.write_source("b/x.js", "b").unwrap();
        tree.write_source("style.css", "c").unwrap();
        let mut mirror = tree.mirror();

        let report = initial_sync(&mut mirror, &tree.ctx.config.metadata).unwrap();

        assert_eq!(report.synced, 3);
        assert_eq!(tree.read_dest("x.js.txt").unwrap(), "a");
        assert_eq!(tree.read_dest("b_x.js.txt").unwrap(), "b");
        assert_eq!(tree.read_dest("style.css.txt").unwrap(), "c");
        assert!(tree.state.signal.is_set());
        assert_eq!(
            tree.state
                .history
                .count_matching("Initial sync complete. Synced 3 files."),
            1
        );
    }

    #[test]
    fn test_initial_sync_removes_stale_artifacts_only() {
        let tree = TestTree::new().unwrap();
        std::fs::write(tree.dest_dir.join("old.js.txt"), "stale").unwrap();
        std::fs::write(tree.dest_dir.join(crate::STRUCTURE_FILE_NAME), "old").unwrap();
        std::fs::write(tree.dest_dir.join("keep.md"), "mine").unwrap();
        tree.write_source("new.js", "n").unwrap();
        let mut mirror = tree.mirror();
        tree.state.names.write().register(Path::new("ghost.js"));

        let report = initial_sync(&mut mirror, &tree.ctx.config.metadata).unwrap();

        assert_eq!(report.removed, 2);
        assert!(!tree.dest_dir.join("old.js.txt").exists());
        assert!(!tree.dest_dir.join(crate::STRUCTURE_FILE_NAME).exists());
        assert!(tree.dest_dir.join("keep.md").exists());
        assert!(!tree.state.names.read().contains(Path::new("ghost.js")));
        assert!(tree.state.names.read().contains(Path::new("new.js")));
    }

    #[test]
    fn test_empty_tree_still_requests_metadata() {
        let tree = TestTree::new().unwrap();
        let mut mirror = tree.mirror();

        let report = initial_sync(&mut mirror, &tree.ctx.config.metadata).unwrap();

        assert_eq!(report, ScanReport::default());
        assert!(tree.state.signal.is_set());
    }

    #[test]
    fn test_plan_matches_scan_names() {
        let tree = TestTree::new().unwrap();
        tree.write_source("a/x.js", "a").unwrap();
        tree.write_source("b/x.js", "b").unwrap();

        let planned = plan(&tree.source_root, &tree.dest_dir, &tree.ctx.config.sync).unwrap();

        assert_eq!(
            planned,
            vec![
                (PathBuf::from("a/x.js"), "x.js.txt".to_string()),
                (PathBuf::from("b/x.js"), "b_x.js.txt".to_string()),
            ]
        );
        assert!(std::fs::read_dir(&tree.dest_dir).unwrap().next().is_none());
    }
}
