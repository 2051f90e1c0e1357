//! Advisory lock around the load -> mutate -> save cycle

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Exclusive lock on the state directory, released on drop.
pub struct StateLock {
    file: File,
}

impl StateLock {
    /// Take the lock without waiting. Fails if another process holds it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            bail!(
                "Migration state is locked by another process ({}). Try again once it finishes.",
                path.display()
            );
        }

        file.set_len(0)?;
        writeln!(file, "pid={}", std::process::id())?;
        file.flush()?;

        Ok(Self { file })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
