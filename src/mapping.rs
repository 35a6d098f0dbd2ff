//! Bidirectional name mapping between source paths and flattened destination names.
//!
//! Every mirrored source file gets exactly one base name in the flat destination
//! directory. The two directions are kept as separate maps that are always
//! mutated together, so looking up a source yields its name and looking up that
//! name yields the same source back.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Name mapping shared between the sync engine (writer) and the metadata
/// regenerator (reader).
pub type SharedNameMap = Arc<RwLock<NameMap>>;

/// Result of a [`NameMap::register`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Destination base name assigned to the source path
    pub name: String,
    /// Whether this call created the entry (false when it already existed)
    pub created: bool,
}

/// Bidirectional table between source paths and flattened destination base names
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    /// Map from source path to destination base name
    source_to_dest: HashMap<PathBuf, String>,
    /// Map from destination base name to source path
    dest_to_source: HashMap<String, PathBuf>,
}

impl NameMap {
    /// Create a new empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mapping wrapped for sharing across threads
    #[must_use]
    pub fn shared() -> SharedNameMap {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Register a source path, returning its destination base name.
    ///
    /// Idempotent: an already registered path returns its existing name and
    /// leaves the table untouched.
    pub fn register(&mut self, source: &Path) -> Registration {
        if let Some(name) = self.source_to_dest.get(source) {
            return Registration {
                name: name.clone(),
                created: false,
            };
        }

        let name = self.unique_name(source);
        self.dest_to_source.insert(name.clone(), source.to_path_buf());
        self.source_to_dest.insert(source.to_path_buf(), name.clone());

        Registration {
            name,
            created: true,
        }
    }

    /// Get the destination base name for a source path
    #[must_use]
    pub fn resolve(&self, source: &Path) -> Option<&str> {
        self.source_to_dest.get(source).map(String::as_str)
    }

    /// Get the source path that owns a destination base name
    #[must_use]
    pub fn source_for(&self, name: &str) -> Option<&Path> {
        self.dest_to_source.get(name).map(PathBuf::as_path)
    }

    /// Remove a source path from both directions, returning its former name
    pub fn unregister(&mut self, source: &Path) -> Option<String> {
        let name = self.source_to_dest.remove(source)?;
        self.dest_to_source.remove(&name);
        Some(name)
    }

    /// Check whether a source path is registered
    #[must_use]
    pub fn contains(&self, source: &Path) -> bool {
        self.source_to_dest.contains_key(source)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.source_to_dest.clear();
        self.dest_to_source.clear();
    }

    /// Number of registered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.source_to_dest.len()
    }

    /// Whether the table has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_to_dest.is_empty()
    }

    /// Snapshot of every registered source path, sorted
    #[must_use]
    pub fn sorted_sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = self.source_to_dest.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Registered source paths at or below `prefix`, sorted.
    ///
    /// Matching is per path component, so `src` never matches `src2/a.js`.
    #[must_use]
    pub fn sources_under(&self, prefix: &Path) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = self
            .source_to_dest
            .keys()
            .filter(|source| source.starts_with(prefix))
            .cloned()
            .collect();
        sources.sort();
        sources
    }

    /// Snapshot of every entry as `(source, name)` pairs, sorted by source
    #[must_use]
    pub fn entries(&self) -> Vec<(PathBuf, String)> {
        let mut entries: Vec<(PathBuf, String)> = self
            .source_to_dest
            .iter()
            .map(|(source, name)| (source.clone(), name.clone()))
            .collect();
        entries.sort();
        entries
    }

    /// Pick a destination name for a source path that is not yet taken.
    ///
    /// Tries the bare file name first, then prefixes parent directories one
    /// level at a time (`parent_file`, `grandparent_parent_file`, ...). When
    /// every ancestor combination collides, a millisecond timestamp is appended
    /// to the file stem.
    fn unique_name(&self, source: &Path) -> String {
        let file_name = source
            .file_name()
            .map_or_else(|| source.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned());

        if !self.dest_to_source.contains_key(&file_name) {
            return file_name;
        }

        let parents: Vec<String> = source
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut candidate = file_name.clone();
        for parent in parents.iter().rev() {
            candidate = format!("{parent}_{candidate}");
            if !self.dest_to_source.contains_key(&candidate) {
                return candidate;
            }
        }

        self.timestamped_name(&file_name)
    }

    /// Append the current time in milliseconds to the stem of `file_name`,
    /// bumping the value until it is free.
    fn timestamped_name(&self, file_name: &str) -> String {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut millis = chrono::Utc::now().timestamp_millis();
        loop {
            let candidate = format!("{stem}_{millis}{extension}");
            if !self.dest_to_source.contains_key(&candidate) {
                return candidate;
            }
            millis += 1;
        }
    }
}
