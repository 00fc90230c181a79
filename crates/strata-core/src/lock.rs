//! Repository locking.
//!
//! Uses advisory file locks (`flock(2)` on Unix) via the `fs2` crate.
//! The OS releases the lock if the process dies, so there is no stale
//! lock detection.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{StrataError, StrataResult};

/// Name of the lock file inside `.strata/`.
pub const LOCK_FILE: &str = "strata.lock";

/// An exclusive repository lock, released on drop.
pub struct RepoLock {
    _file: File,
}

impl RepoLock {
    /// Acquire an exclusive lock on the repository.
    ///
    /// Polls until the lock is acquired or `timeout` expires, then returns
    /// `StrataError::LockTimeout`.
    pub fn acquire(meta_dir: &Path, timeout: Duration) -> StrataResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(meta_dir.join(LOCK_FILE))?;

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(RepoLock { _file: file }),
                Err(_) if start.elapsed() >= timeout => {
                    debug!(?timeout, "repository lock timed out");
                    return Err(StrataError::LockTimeout);
                }
                Err(_) => std::thread::sleep(poll_interval),
            }
        }
    }
}
