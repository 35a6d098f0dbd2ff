pub mod fixtures {
    use crate::MirrorContext;
    use crate::config::Config;
    use crate::metadata::Regenerator;
    use crate::mirror::io::{MirrorFs, StdFs};
    use crate::mirror::{Mirror, SharedState};
    use anyhow::Result;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// A source tree and a destination directory inside one temp dir
    pub struct TestTree {
        pub temp_dir: TempDir,
        pub source_root: PathBuf,
        pub dest_dir: PathBuf,
        pub ctx: MirrorContext,
        pub state: SharedState,
    }

    impl TestTree {
        pub fn new() -> Result<Self> {
            let temp_dir = tempfile::tempdir()?;
            let source = temp_dir.path().join("site");
            let dest = temp_dir.path().join("flat");
            Self::build(temp_dir, source, dest)
        }

        /// Destination directory living inside the source tree
        pub fn with_nested_dest() -> Result<Self> {
            let temp_dir = tempfile::tempdir()?;
            let source = temp_dir.path().join("site");
            let dest = source.join("synced_files");
            Self::build(temp_dir, source, dest)
        }

        fn build(temp_dir: TempDir, source: PathBuf, dest: PathBuf) -> Result<Self> {
            fs::create_dir_all(&source)?;
            fs::create_dir_all(&dest)?;

            let mut config = Config::default();
            config.retry.delay_ms = 1;
            config.history.capacity = 200;
            config.history.live_display = false;

            let ctx = MirrorContext::new_explicit(source, dest, config)?;
            let state = SharedState::new(ctx.config.history.capacity);

            Ok(Self {
                temp_dir,
                source_root: ctx.source_root.clone(),
                dest_dir: ctx.dest_dir.clone(),
                ctx,
                state,
            })
        }

        pub fn write_source(&self, relative: &str, content: &str) -> Result<PathBuf> {
            let path = self.source_root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            Ok(path)
        }

        pub fn read_dest(&self, name: &str) -> Result<String> {
            Ok(fs::read_to_string(self.dest_dir.join(name))?)
        }

        pub fn mirror(&self) -> Mirror {
            Mirror::new(&self.ctx, self.state.clone())
        }

        pub fn regenerator(&self) -> Regenerator {
            Regenerator::new(&self.ctx, &self.state)
        }
    }

    /// Copies always report the source as gone
    pub struct VanishingFs;

    impl MirrorFs for VanishingFs {
        fn copy(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, "source vanished"))
        }

        fn remove(&self, path: &Path) -> io::Result<()> {
            StdFs.remove(path)
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
            let left = self.remaining.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining.store(left - 1, Ordering::SeqCst);
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
}
