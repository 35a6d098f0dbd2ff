//! Configuration loading, validation and dotted-key access.
//!
//! The configuration is a TOML file with four sections: `[sync]`, `[retry]`,
//! `[metadata]` and `[history]`. Every field has a default, so a missing file
//! or a partial one is always usable.

/// Parsing and range validation
pub mod parser;
/// Unknown-field and risky-setting warnings
pub mod validator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Complete flatmirror configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Roots, filters and destination naming
    #[serde(default)]
    pub sync: SyncConfig,

    /// Retry policy for destination copies and removals
    #[serde(default)]
    pub retry: RetryConfig,

    /// Structure listing and commit log regeneration
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Change history and status board
    #[serde(default)]
    pub history: HistoryConfig,
}

/// `[sync]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Tree to mirror
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Flat destination directory
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,
    /// Extensions to mirror, with or without a leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names pruned at every level of the source tree
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,
    /// Extension appended to every flattened file in the destination
    #[serde(default = "default_dest_suffix")]
    pub dest_suffix: String,
}

/// `[retry]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per copy or removal
    #[serde(default = "default_retry_count")]
    pub count: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

/// `[metadata]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Idle time after the last mapping change before regenerating
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
    /// Upper bound on a single wait for the pending flag
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Longest a pending regeneration may be deferred by continuous changes
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// File name of the structure listing
    #[serde(default = "default_structure_file")]
    pub structure_file: String,
    /// File name of the commit log
    #[serde(default = "default_commit_log_file")]
    pub commit_log_file: String,
    /// Command whose stdout becomes the commit log; empty disables it
    #[serde(default = "default_log_command")]
    pub log_command: Vec<String>,
}

/// `[history]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of status lines kept
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
    /// Redraw a status board on every history line when stdout is a terminal
    #[serde(default = "default_live_display")]
    pub live_display: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            dest_dir: default_dest_dir(),
            extensions: default_extensions(),
            ignored_dirs: default_ignored_dirs(),
            dest_suffix: default_dest_suffix(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            count: default_retry_count(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            max_delay_ms: default_max_delay_ms(),
            structure_file: default_structure_file(),
            commit_log_file: default_commit_log_file(),
            log_command: default_log_command(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            live_display: default_live_display(),
        }
    }
}

impl SyncConfig {
    /// Check whether a file name ends in `.<ext>` for a mirrored extension.
    ///
    /// A file named exactly `.js` counts as a `js` file.
    #[must_use]
    pub fn has_mirrored_extension(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|wanted| {
            let ext = wanted.trim_start_matches('.');
            !ext.is_empty()
                && name
                    .strip_suffix(ext)
                    .is_some_and(|stem| stem.ends_with('.'))
        })
    }

    /// Check whether a directory name is in the ignore set
    #[must_use]
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignored_dirs.iter().any(|ignored| ignored == name)
    }

    /// File name in the destination for a flattened base name
    #[must_use]
    pub fn dest_file_name(&self, base_name: &str) -> String {
        format!("{base_name}.{}", self.dest_suffix.trim_start_matches('.'))
    }

    /// Check whether a destination file name was produced by the mirror
    #[must_use]
    pub fn is_mirrored_artifact(&self, file_name: &str) -> bool {
        file_name.ends_with(&format!(".{}", self.dest_suffix.trim_start_matches('.')))
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults when it is missing
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot read or parse the configuration file
    /// - Configuration file contains invalid TOML or out-of-range values
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        parser::parse_config_file(path)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create config file: {}", path.display()))?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Get a configuration value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return None;
        }

        match (parts[0], parts[1]) {
            ("sync", "source_root") => Some(self.sync.source_root.display().to_string()),
            ("sync", "dest_dir") => Some(self.sync.dest_dir.display().to_string()),
            ("sync", "extensions") => Some(self.sync.extensions.join(",")),
            ("sync", "ignored_dirs") => Some(self.sync.ignored_dirs.join(",")),
            ("sync", "dest_suffix") => Some(self.sync.dest_suffix.clone()),
            ("retry", "count") => Some(self.retry.count.to_string()),
            ("retry", "delay_ms") => Some(self.retry.delay_ms.to_string()),
            ("metadata", "quiet_period_ms") => Some(self.metadata.quiet_period_ms.to_string()),
            ("metadata", "wait_timeout_ms") => Some(self.metadata.wait_timeout_ms.to_string()),
            ("metadata", "max_delay_ms") => Some(self.metadata.max_delay_ms.to_string()),
            ("metadata", "structure_file") => Some(self.metadata.structure_file.clone()),
            ("metadata", "commit_log_file") => Some(self.metadata.commit_log_file.clone()),
            ("metadata", "log_command") => Some(self.metadata.log_command.join(" ")),
            ("history", "capacity") => Some(self.history.capacity.to_string()),
            ("history", "live_display") => Some(self.history.live_display.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key
    ///
    /// List values (`extensions`, `ignored_dirs`) are comma separated and
    /// `log_command` is split on whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key format is invalid (must be section.key)
    /// - The key is unknown
    /// - The value cannot be parsed for the key
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() != 2 {
            return Err(anyhow::anyhow!("Invalid configuration key: {key}"));
        }

        match (parts[0], parts[1]) {
            ("sync", "source_root") => self.sync.source_root = PathBuf::from(value),
            ("sync", "dest_dir") => self.sync.dest_dir = PathBuf::from(value),
            ("sync", "extensions") => self.sync.extensions = split_list(&value),
            ("sync", "ignored_dirs") => self.sync.ignored_dirs = split_list(&value),
            ("sync", "dest_suffix") => {
                if value.trim_start_matches('.').is_empty() || value.contains('/') {
                    return Err(anyhow::anyhow!("Invalid destination suffix: {value}"));
                }
                self.sync.dest_suffix = value;
            }
            ("retry", "count") => {
                let count: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                if count == 0 {
                    return Err(anyhow::anyhow!("Retry count must be at least 1"));
                }
                self.retry.count = count;
            }
            ("retry", "delay_ms") => self.retry.delay_ms = parse_millis(&value)?,
            ("metadata", "quiet_period_ms") => self.metadata.quiet_period_ms = parse_millis(&value)?,
            ("metadata", "wait_timeout_ms") => self.metadata.wait_timeout_ms = parse_millis(&value)?,
            ("metadata", "max_delay_ms") => self.metadata.max_delay_ms = parse_millis(&value)?,
            ("metadata", "structure_file") => self.metadata.structure_file = value,
            ("metadata", "commit_log_file") => self.metadata.commit_log_file = value,
            ("metadata", "log_command") => {
                self.metadata.log_command = value.split_whitespace().map(String::from).collect();
            }
            ("history", "capacity") => {
                self.history.capacity = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
            }
            ("history", "live_display") => {
                self.history.live_display = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {value}"))?;
            }
            _ => return Err(anyhow::anyhow!("Unknown configuration key: {key}")),
        }
        Ok(())
    }

    /// Reset a configuration value to its default
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let defaults = Self::default();
        let value = defaults
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {key}"))?;

        match key {
            // Joined list values cannot round-trip through `set` when empty
            "sync.extensions" => self.sync.extensions = defaults.sync.extensions,
            "sync.ignored_dirs" => self.sync.ignored_dirs = defaults.sync.ignored_dirs,
            _ => self.set(key, value)?,
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_millis(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("Invalid number of milliseconds: {value}"))
}

// Default functions for serde
fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_dest_dir() -> PathBuf {
    PathBuf::from("synced_files")
}

fn default_extensions() -> Vec<String> {
    vec!["js".to_string(), "html".to_string(), "css".to_string()]
}

fn default_ignored_dirs() -> Vec<String> {
    vec![
        "build".to_string(),
        ".git".to_string(),
        ".idea".to_string(),
        "gradle".to_string(),
    ]
}

fn default_dest_suffix() -> String {
    "txt".to_string()
}

const fn default_retry_count() -> u32 {
    5
}

const fn default_retry_delay_ms() -> u64 {
    200
}

const fn default_quiet_period_ms() -> u64 {
    500
}

const fn default_wait_timeout_ms() -> u64 {
    2500
}

const fn default_max_delay_ms() -> u64 {
    5000
}

fn default_structure_file() -> String {
    crate::STRUCTURE_FILE_NAME.to_string()
}

fn default_commit_log_file() -> String {
    crate::COMMIT_LOG_FILE_NAME.to_string()
}

fn default_log_command() -> Vec<String> {
    ["git", "log", "--oneline", "-n", "400"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_history_capacity() -> usize {
    30
}

const fn default_live_display() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.extensions, vec!["js", "html", "css"]);
        assert_eq!(config.retry.count, 5);
        assert_eq!(config.retry.delay_ms, 200);
        assert_eq!(config.metadata.quiet_period_ms, 500);
        assert_eq!(config.metadata.wait_timeout_ms, 2500);
        assert_eq!(config.history.capacity, 30);
        assert_eq!(config.sync.dest_file_name("x.js"), "x.js.txt");
    }

    #[test]
    fn test_has_mirrored_extension_accepts_dotted_config() {
        let mut sync = SyncConfig::default();
        sync.extensions = vec![".js".to_string(), "css".to_string()];

        assert!(sync.has_mirrored_extension(Path::new("a/b.js")));
        assert!(sync.has_mirrored_extension(Path::new("style.css")));
        assert!(!sync.has_mirrored_extension(Path::new("a/b.jsx")));
        assert!(!sync.has_mirrored_extension(Path::new("Makefile")));
        assert!(!sync.has_mirrored_extension(Path::new("src/js")));
        assert!(sync.has_mirrored_extension(Path::new("web/.js")));
        assert!(sync.has_mirrored_extension(Path::new("bundle.min.js")));
    }

    #[test]
    fn test_is_mirrored_artifact() {
        let sync = SyncConfig::default();
        assert!(sync.is_mirrored_artifact("main.js.txt"));
        assert!(!sync.is_mirrored_artifact("main.js"));
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();
        config.set("retry.count", "7".to_string()).unwrap();
        config
            .set("sync.extensions", "ts, tsx ,json".to_string())
            .unwrap();
        config
            .set("metadata.log_command", "hg log -l 10".to_string())
            .unwrap();

        assert_eq!(config.get("retry.count").as_deref(), Some("7"));
        assert_eq!(config.sync.extensions, vec!["ts", "tsx", "json"]);
        assert_eq!(config.metadata.log_command, vec!["hg", "log", "-l", "10"]);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("retry.count", "0".to_string()).is_err());
        assert!(config.set("retry.delay_ms", "soon".to_string()).is_err());
        assert!(config.set("sync.dest_suffix", "a/b".to_string()).is_err());
        assert!(config.set("nope.key", "1".to_string()).is_err());
        assert!(config.set("invalid", "1".to_string()).is_err());
    }

    #[test]
    fn test_unset_restores_default() {
        let mut config = Config::default();
        config.set("retry.delay_ms", "10".to_string()).unwrap();
        config.set("sync.extensions", "rs".to_string()).unwrap();

        config.unset("retry.delay_ms").unwrap();
        config.unset("sync.extensions").unwrap();

        assert_eq!(config.retry.delay_ms, 200);
        assert_eq!(config.sync.extensions, vec!["js", "html", "css"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/flatmirror.toml");

        let mut config = Config::default();
        config.sync.dest_dir = PathBuf::from("/tmp/out");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sync.dest_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.sync.dest_suffix, "txt");
        assert!(!dir.path().join("absent.toml").exists());
    }
}
