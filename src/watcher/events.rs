//! Raw filesystem events and their translation from `notify`.

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};

/// What happened to a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A path appeared
    Created,
    /// File contents or metadata changed
    Modified,
    /// A path disappeared
    Deleted,
    /// Renamed within the watched tree
    Moved {
        /// New location
        to: PathBuf,
    },
}

/// A raw filesystem notification before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened
    pub kind: WatchEventKind,
    /// Affected path (the old path for moves)
    pub path: PathBuf,
    /// Whether the path is a directory
    pub is_dir: bool,
}

impl WatchEvent {
    /// File creation at `path`
    #[must_use]
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::file(WatchEventKind::Created, path)
    }

    /// File modification at `path`
    #[must_use]
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::file(WatchEventKind::Modified, path)
    }

    /// File deletion at `path`
    #[must_use]
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::file(WatchEventKind::Deleted, path)
    }

    /// File rename from `from` to `to`
    #[must_use]
    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::file(WatchEventKind::Moved { to: to.into() }, from)
    }

    /// Mark the event as concerning a directory
    #[must_use]
    pub const fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }

    fn file(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            is_dir: false,
        }
    }
}

/// Translate a `notify` event into zero or more watch events.
///
/// Rename pairs become a single move. A lone rename-from is a delete and a lone
/// rename-to is a create, since the other side lies outside the watched tree.
/// Access events are dropped.
#[must_use]
pub fn translate(event: &Event) -> Vec<WatchEvent> {
    let paths = &event.paths;
    match event.kind {
        EventKind::Access(_) | EventKind::Other => Vec::new(),

        EventKind::Create(kind) => paths
            .iter()
            .map(|p| {
                let is_dir = kind == CreateKind::Folder || p.is_dir();
                WatchEvent {
                    is_dir,
                    ..WatchEvent::created(p)
                }
            })
            .collect(),

        EventKind::Remove(kind) => paths
            .iter()
            .map(|p| WatchEvent {
                is_dir: kind == RemoveKind::Folder,
                ..WatchEvent::deleted(p)
            })
            .collect(),

        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, paths.as_slice()) {
            (RenameMode::Both, [from, to]) => vec![WatchEvent {
                is_dir: to.is_dir(),
                ..WatchEvent::moved(from, to)
            }],
            (RenameMode::From, _) => paths.iter().map(WatchEvent::deleted).collect(),
            _ => paths.iter().map(|p| by_existence(p)).collect(),
        },

        EventKind::Modify(_) => paths
            .iter()
            .map(|p| WatchEvent {
                is_dir: p.is_dir(),
                ..WatchEvent::modified(p)
            })
            .collect(),

        EventKind::Any => paths.iter().map(|p| by_existence(p)).collect(),
    }
}

/// Backends that cannot tell what happened report a bare path; whether it
/// still exists decides between create and delete.
fn by_existence(path: &Path) -> WatchEvent {
    if path.exists() {
        WatchEvent {
            is_dir: path.is_dir(),
            ..WatchEvent::created(path)
        }
    } else {
        WatchEvent::deleted(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn test_rename_pair_becomes_move() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/nonexistent/old.js", "/nonexistent/new.js"],
        );
        assert_eq!(
            translate(&e),
            vec![WatchEvent::moved("/nonexistent/old.js", "/nonexistent/new.js")]
        );
    }

    #[test]
    fn test_lone_rename_from_is_delete() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/nonexistent/old.js"],
        );
        assert_eq!(translate(&e), vec![WatchEvent::deleted("/nonexistent/old.js")]);
    }

    #[test]
    fn test_lone_rename_to_is_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arrived.js");
        std::fs::write(&path, "x").unwrap();

        let mut e = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)));
        e = e.add_path(path.clone());

        assert_eq!(translate(&e), vec![WatchEvent::created(path)]);
    }

    #[test]
    fn test_access_is_dropped() {
        let e = event(EventKind::Access(AccessKind::Any), &["/nonexistent/a.js"]);
        assert!(translate(&e).is_empty());
    }

    #[test]
    fn test_data_change_is_modify() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/nonexistent/a.js"],
        );
        assert_eq!(translate(&e), vec![WatchEvent::modified("/nonexistent/a.js")]);
    }

    #[test]
    fn test_folder_events_are_marked() {
        let created = event(EventKind::Create(CreateKind::Folder), &["/nonexistent/dir.js"]);
        let removed = event(EventKind::Remove(RemoveKind::Folder), &["/nonexistent/dir.js"]);

        assert!(translate(&created)[0].is_dir);
        assert!(translate(&removed)[0].is_dir);
    }
}
