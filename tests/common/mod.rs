#![allow(dead_code)]

use anyhow::Result;
use flatmirror::MirrorContext;
use flatmirror::config::Config;
use flatmirror::metadata::{CommitLogSource, Regenerator};
use flatmirror::mirror::io::{MirrorFs, StdFs};
use flatmirror::mirror::{Mirror, SharedState};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Source tree and flat destination fixture for consistent test setup
pub struct TestTree {
    pub temp_dir: TempDir,
    pub ctx: MirrorContext,
    pub state: SharedState,
}

impl TestTree {
    /// Create an empty source tree and destination with fast retries
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("project");
        let dest = temp_dir.path().join("flat");
        fs::create_dir_all(&source)?;
        fs::create_dir_all(&dest)?;

        let mut config = Config::default();
        config.retry.delay_ms = 1;
        config.history.capacity = 500;
        config.history.live_display = false;

        let ctx = MirrorContext::new_explicit(source, dest, config)?;
        let state = SharedState::new(ctx.config.history.capacity);
        Ok(Self {
            temp_dir,
            ctx,
            state,
        })
    }

    pub fn source(&self) -> &Path {
        &self.ctx.source_root
    }

    pub fn dest(&self) -> &Path {
        &self.ctx.dest_dir
    }

    /// Write a source file, creating parent directories
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.source().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read_dest(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.dest().join(name))?)
    }

    /// Sorted file names currently in the destination
    pub fn dest_listing(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(self.dest())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn mirror(&self) -> Mirror {
        Mirror::new(&self.ctx, self.state.clone())
    }

    /// Regenerator with a fixed commit log so output is reproducible
    pub fn regenerator(&self) -> Regenerator {
        let log: Box<dyn CommitLogSource> =
            Box::new(|| -> Result<String> { Ok("0000000 fixture commit\n".to_string()) });
        Regenerator::new(&self.ctx, &self.state).with_log_source(log)
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new().expect("Failed to create test tree")
    }
}

/// Fails the first `failures` copies with a transient error
pub struct FlakyFs {
    remaining: AtomicU32,
}

impl FlakyFs {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining: AtomicU32::new(failures),
        }
    }
}

impl MirrorFs for FlakyFs {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "destination locked",
            ));
        }
        StdFs.copy(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        StdFs.remove(path)
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(25));
    }
}
