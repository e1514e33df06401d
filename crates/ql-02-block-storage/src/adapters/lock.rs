//! # Data Directory Lock
//!
//! One writer per chain. The lock is an `fs2` advisory lock on
//! `<data_dir>/LOCK`; the OS drops it when the holder exits, so a crashed
//! node never leaves the directory wedged. The file carries the holder's
//! PID for the error message only.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot open lock file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("data directory {} is held by {}", .path.display(), holder_description(.holder))]
    Held { path: PathBuf, holder: Option<u32> },
}

fn holder_description(holder: &Option<u32>) -> String {
    holder.map_or_else(|| "another process".to_string(), |pid| format!("process {pid}"))
}

/// Exclusive hold on a data directory until dropped.
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    const FILE_NAME: &'static str = "LOCK";
    const MAX_POLL: Duration = Duration::from_millis(250);

    /// Take the lock, polling until `wait` has passed.
    pub fn acquire(data_dir: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(Self::FILE_NAME);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };
        let deadline = Instant::now() + wait;
        let mut poll = Duration::from_millis(5);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        while file.try_lock_exclusive().is_err() {
            if Instant::now() >= deadline {
                return Err(LockError::Held {
                    holder: read_holder(&mut file),
                    path: path.clone(),
                });
            }
            std::thread::sleep(poll);
            poll = (poll * 2).min(Self::MAX_POLL);
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        tracing::debug!(path = %path.display(), "[ql-02] Data directory locked");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}
