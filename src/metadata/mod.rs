//! Derived metadata regeneration.
//!
//! Two artifacts live next to the flattened files in the destination:
//!
//! - the **structure listing**, every registered source path sorted, one per
//!   line with `/` separators
//! - the **commit log**, the captured stdout of a version-control command
//!   (`git log --oneline -n 400` by default)
//!
//! Both are rewritten by a background worker whenever the name map changes.
//! The worker waits on an [`UpdateSignal`] and lets bursts of changes settle
//! before regenerating, so a checkout touching hundreds of files produces one
//! rewrite instead of hundreds.

/// Pending-update flag with burst tracking
pub mod signal;

pub use signal::{UpdateSignal, Wake};

use crate::MirrorContext;
use crate::mapping::SharedNameMap;
use crate::mirror::SharedState;
use crate::output::ChangeHistory;
use crate::utils::to_forward_slashes;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{Level, debug, span, warn};

/// First line of the structure listing
pub const STRUCTURE_HEADER: &str = "# Project File Structure (Auto-Generated)";

/// Produces the text written to the commit log artifact
pub trait CommitLogSource: Send + Sync {
    /// Capture the current commit log
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be produced
    fn capture(&self) -> Result<String>;
}

impl<F> CommitLogSource for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn capture(&self) -> Result<String> {
        self()
    }
}

/// Commit log captured from an external command run in the source root
#[derive(Debug, Clone)]
pub struct GitLog {
    /// Program followed by its arguments
    command: Vec<String>,
    /// Working directory for the command
    cwd: PathBuf,
}

impl GitLog {
    /// Create a log source running `command` inside `cwd`
    #[must_use]
    pub const fn new(command: Vec<String>, cwd: PathBuf) -> Self {
        Self { command, cwd }
    }
}

impl CommitLogSource for GitLog {
    fn capture(&self) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .context("No commit log command configured")?;

        let program_path =
            which::which(program).with_context(|| format!("'{program}' not found on PATH"))?;

        let output = Command::new(program_path)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run '{}'", self.command.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "'{}' failed: {}",
                self.command.join(" "),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Timing of the regeneration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTiming {
    /// Idle time required after the last change
    pub quiet: Duration,
    /// Longest single wait on the signal
    pub wait_timeout: Duration,
    /// Longest a burst may defer regeneration
    pub max_delay: Duration,
}

impl From<&crate::config::MetadataConfig> for DebounceTiming {
    fn from(config: &crate::config::MetadataConfig) -> Self {
        Self {
            quiet: Duration::from_millis(config.quiet_period_ms),
            wait_timeout: Duration::from_millis(config.wait_timeout_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Which artifacts a regeneration pass managed to write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenerationReport {
    /// Structure listing written
    pub structure: bool,
    /// Commit log written
    pub commit_log: bool,
}

/// Rewrites the structure listing and commit log
pub struct Regenerator {
    dest_dir: PathBuf,
    structure_file: String,
    commit_log_file: String,
    names: SharedNameMap,
    history: Arc<ChangeHistory>,
    log_source: Option<Box<dyn CommitLogSource>>,
    passes: AtomicUsize,
}

impl Regenerator {
    /// Create a regenerator using the configured commit log command
    #[must_use]
    pub fn new(ctx: &MirrorContext, state: &SharedState) -> Self {
        let command = ctx.config.metadata.log_command.clone();
        let log_source: Option<Box<dyn CommitLogSource>> = if command.is_empty() {
            None
        } else {
            Some(Box::new(GitLog::new(command, ctx.source_root.clone())))
        };

        Self {
            dest_dir: ctx.dest_dir.clone(),
            structure_file: ctx.config.metadata.structure_file.clone(),
            commit_log_file: ctx.config.metadata.commit_log_file.clone(),
            names: Arc::clone(&state.names),
            history: Arc::clone(&state.history),
            log_source,
            passes: AtomicUsize::new(0),
        }
    }

    /// Replace the commit log source
    #[must_use]
    pub fn with_log_source(mut self, source: Box<dyn CommitLogSource>) -> Self {
        self.log_source = Some(source);
        self
    }

    /// Number of regeneration passes run so far
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    /// Rewrite both artifacts now. Each artifact fails independently.
    pub fn regenerate_now(&self) -> RegenerationReport {
        let span = span!(Level::DEBUG, "regenerate_metadata");
        let _guard = span.enter();
        self.passes.fetch_add(1, Ordering::SeqCst);

        let structure = match self.write_structure_file() {
            Ok(()) => {
                self.history
                    .record(format!("Updated '{}'.", self.structure_file));
                true
            }
            Err(e) => {
                warn!(error = %e, "Structure listing not written");
                self.history
                    .record(format!("Error updating structure file: {e:#}"));
                false
            }
        };

        let commit_log = match &self.log_source {
            None => {
                debug!("No commit log command configured, skipping");
                false
            }
            Some(source) => match self.write_commit_log(source.as_ref()) {
                Ok(()) => {
                    self.history
                        .record(format!("Updated '{}'.", self.commit_log_file));
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Commit log not written");
                    self.history
                        .record(format!("Could not sync commit log: {e:#}"));
                    false
                }
            },
        };

        RegenerationReport {
            structure,
            commit_log,
        }
    }

    /// Run the debounced loop until `signal` is shut down.
    ///
    /// A change still pending at shutdown gets one final pass.
    pub fn run(&self, signal: &UpdateSignal, timing: DebounceTiming) {
        loop {
            match signal.wait(timing.wait_timeout) {
                Wake::Shutdown => break,
                Wake::Timeout => {}
                Wake::Pending => {
                    if signal.settle(timing.quiet, timing.max_delay) == Wake::Shutdown {
                        break;
                    }
                    signal.take();
                    self.regenerate_now();
                }
            }
        }

        if signal.take() {
            self.regenerate_now();
        }
        debug!("Metadata worker stopped");
    }

    /// Run [`Regenerator::run`] on a dedicated thread
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned
    pub fn spawn(
        self: Arc<Self>,
        signal: Arc<UpdateSignal>,
        timing: DebounceTiming,
    ) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("metadata".to_string())
            .spawn(move || self.run(&signal, timing))
            .context("Failed to spawn metadata worker")
    }

    fn write_structure_file(&self) -> Result<()> {
        // Snapshot under the read lock, write without holding it
        let sources = self.names.read().sorted_sources();

        let mut content = format!("{STRUCTURE_HEADER}\n\n");
        for source in &sources {
            content.push_str(&to_forward_slashes(source));
            content.push('\n');
        }

        write_atomic(&self.dest_dir.join(&self.structure_file), content.as_bytes())
    }

    fn write_commit_log(&self, source: &dyn CommitLogSource) -> Result<()> {
        let log = source.capture()?;
        write_atomic(&self.dest_dir.join(&self.commit_log_file), log.as_bytes())
    }
}

/// Write `contents` to a temporary file beside `path`, then rename it into place
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(contents)?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
