//! The narrow I/O interface every strata component goes through.
//!
//! Components name things by key inside a directory; physical layout is
//! decided by whoever builds the paths. Each directory is a flat keyed
//! namespace.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::StrataResult;
use crate::fsutil::{atomic_write, TMP_SUFFIX};

/// Raw byte storage primitives.
pub trait Storage: Send + Sync {
    /// Read the full contents of `path`.
    fn read_bytes(&self, path: &Path) -> StrataResult<Vec<u8>>;

    /// Create or replace `path` with `data`. Parent directories are created.
    fn write_bytes(&self, path: &Path, data: &[u8]) -> StrataResult<()>;

    /// Names of the regular files directly inside `dir`, sorted.
    ///
    /// A missing directory yields an empty list.
    fn list_plain_filenames(&self, dir: &Path) -> StrataResult<Vec<String>>;

    /// True if `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Remove the file at `path`. Removing a missing file is not an error.
    fn delete(&self, path: &Path) -> StrataResult<()>;
}

/// Shared handle to a storage backend.
pub type SharedStorage = Arc<dyn Storage>;

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStorage;

impl DiskStorage {
    /// A shareable disk backend.
    pub fn shared() -> SharedStorage {
        Arc::new(DiskStorage)
    }
}

impl Storage for DiskStorage {
    fn read_bytes(&self, path: &Path) -> StrataResult<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write_bytes(&self, path: &Path, data: &[u8]) -> StrataResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(path, data)
    }

    fn list_plain_filenames(&self, dir: &Path) -> StrataResult<Vec<String>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            names.push(name.to_string());
        }
        Ok(names)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete(&self, path: &Path) -> StrataResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
