#![warn(missing_docs)]
#![allow(clippy::arithmetic_side_effects)] // Simple counters cannot overflow
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # Flatmirror - Real-Time Flattened Source Mirror
//!
//! Flatmirror watches a source tree and keeps a flat copy of selected files in
//! a single destination directory. Every mirrored file gets a unique name
//! derived from its path, plus a fixed suffix, so the whole project can be
//! handed to tools that only accept a flat list of text files.
//!
//! ## Features
//!
//! - **Collision-Free Flattening**: `a/x.js` and `b/x.js` become `x.js.txt` and
//!   `b_x.js.txt`; the mapping stays a bijection for the whole session
//! - **Live Mirroring**: creates, edits, deletes and renames are applied as they happen
//! - **Retrying I/O**: destination writes survive transient contention
//! - **Derived Metadata**: a sorted structure listing and the recent commit log are
//!   regenerated after bursts of changes settle
//!
//! ## Architecture
//!
//! - [`mapping`]: Source path to flattened name table
//! - [`mirror`]: Sync engine applying single changes with bounded retries
//! - [`scanner`]: Authoritative initial scan
//! - [`watcher`]: Event filtering, FIFO queue and the single sync worker
//! - [`metadata`]: Debounced structure listing and commit log regeneration
//! - [`config`]: Configuration parsing and validation
//! - [`output`]: Colored output and the change history
//! - [`commands`]: CLI command implementations
//!
//! ## Example Usage
//!
//! ```no_run
//! use flatmirror::MirrorContext;
//! use flatmirror::mirror::{Mirror, SharedState};
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = MirrorContext::new(None)?;
//! let state = SharedState::new(ctx.config.history.capacity);
//! let mut mirror = Mirror::new(&ctx, state);
//! flatmirror::scanner::initial_sync(&mut mirror, &ctx.config.metadata)?;
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Source path to flattened name table.
pub mod mapping;

/// Structure listing and commit log regeneration.
pub mod metadata;

/// Sync engine for the flat destination.
pub mod mirror;

/// Output formatting and status display.
pub mod output;

/// Authoritative full scan of the source tree.
pub mod scanner;

/// Utility functions and helpers.
pub mod utils;

/// Filesystem notifications and the event pipeline.
pub mod watcher;

#[cfg(test)]
mod test_utils;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Current version of the flatmirror binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "flatmirror.toml";

/// Name of the generated structure listing.
pub const STRUCTURE_FILE_NAME: &str = "_Project_Structure.txt";

/// Name of the generated commit log.
pub const COMMIT_LOG_FILE_NAME: &str = "_Commit_Logs.txt";

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "FLATMIRROR_CONFIG";

/// Environment variable overriding the source root.
pub const SOURCE_ENV: &str = "FLATMIRROR_SOURCE";

/// Environment variable overriding the destination directory.
pub const DEST_ENV: &str = "FLATMIRROR_DEST";

/// Central context for all flatmirror operations.
///
/// Holds the loaded configuration plus the resolved, absolute source root and
/// destination directory every component works against.
///
/// # Examples
///
/// ```no_run
/// use flatmirror::MirrorContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Configuration from ./flatmirror.toml or $FLATMIRROR_CONFIG
/// let ctx = MirrorContext::new(None)?;
///
/// // Explicit roots (for testing)
/// let ctx = MirrorContext::new_explicit(
///     "/tmp/site".into(),
///     "/tmp/flat".into(),
///     flatmirror::config::Config::default(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MirrorContext {
    /// Path to the configuration file (which may not exist).
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,

    /// Absolute, canonical source root.
    pub source_root: PathBuf,

    /// Absolute destination directory.
    pub dest_dir: PathBuf,
}

impl MirrorContext {
    /// Load the configuration and resolve both roots.
    ///
    /// The configuration path is `config_path`, then `$FLATMIRROR_CONFIG`, then
    /// `./flatmirror.toml`. `$FLATMIRROR_SOURCE` and `$FLATMIRROR_DEST` override
    /// the configured roots.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be parsed or the
    /// current directory cannot be determined.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from),
        };

        let mut config = config::Config::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        if let Some(source) = std::env::var_os(SOURCE_ENV) {
            config.sync.source_root = PathBuf::from(source);
        }
        if let Some(dest) = std::env::var_os(DEST_ENV) {
            config.sync.dest_dir = PathBuf::from(dest);
        }

        if config_path.exists() {
            let validator = config::validator::ConfigValidator::new();
            if let Err(e) = validator.validate_config_file(&config_path) {
                output::warning(&format!("Configuration validation failed: {e}"));
            }
        }
        config::validator::ConfigValidator::warn_risky_options(&config);

        Self::resolve(config_path, config)
    }

    /// Creates a context with explicit roots, ignoring the environment.
    ///
    /// # Errors
    /// Returns an error if the current directory cannot be determined.
    pub fn new_explicit(
        source_root: PathBuf,
        dest_dir: PathBuf,
        mut config: config::Config,
    ) -> Result<Self> {
        config.sync.source_root = source_root;
        config.sync.dest_dir = dest_dir;
        Self::resolve(PathBuf::from(DEFAULT_CONFIG_FILE), config)
    }

    /// Replace the roots with command-line values
    ///
    /// # Errors
    /// Returns an error if a path cannot be resolved.
    pub fn override_roots(&mut self, source: Option<&Path>, dest: Option<&Path>) -> Result<()> {
        if let Some(source) = source {
            self.config.sync.source_root = source.to_path_buf();
            self.source_root = utils::resolve_dir(source)?;
        }
        if let Some(dest) = dest {
            self.config.sync.dest_dir = dest.to_path_buf();
            self.dest_dir = utils::resolve_dir(dest)?;
        }
        Ok(())
    }

    /// Checks that the source root is an existing directory.
    ///
    /// # Errors
    /// Returns an error if it is missing or not a directory.
    pub fn check_source_root(&self) -> Result<()> {
        if !self.source_root.is_dir() {
            return Err(anyhow::anyhow!(
                "Source root not found: {} is not a directory",
                self.source_root.display()
            ));
        }
        Ok(())
    }

    /// Creates the destination directory and re-resolves it to its canonical form.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dest_exists(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dest_dir).with_context(|| {
            format!(
                "Failed to create destination directory: {}",
                self.dest_dir.display()
            )
        })?;
        self.dest_dir = utils::resolve_dir(&self.dest_dir)?;
        Ok(())
    }

    fn resolve(config_path: PathBuf, config: config::Config) -> Result<Self> {
        let source_root = utils::resolve_dir(&config.sync.source_root)?;
        let dest_dir = utils::resolve_dir(&config.sync.dest_dir)?;

        Ok(Self {
            config_path,
            config,
            source_root,
            dest_dir,
        })
    }
}
