//! Content-addressable object store.
//!
//! Blobs live in `.strata/blobs/<id>` as raw bytes; commits live in
//! `.strata/commits/<id>.json`. Both namespaces are flat and write-once.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::commit::Commit;
use crate::error::{StrataError, StrataResult};
use crate::graph::CommitSource;
use crate::hash::{hash_parts, is_full_id};
use crate::storage::SharedStorage;

/// The object store manages blobs and commits on disk.
pub struct ObjectStore {
    storage: SharedStorage,
    /// `.strata/blobs/`
    blobs: PathBuf,
    /// `.strata/commits/`
    commits: PathBuf,
}

impl ObjectStore {
    /// Create an ObjectStore inside the given metadata directory.
    pub fn new(storage: SharedStorage, meta_dir: &Path) -> Self {
        Self {
            storage,
            blobs: meta_dir.join("blobs"),
            commits: meta_dir.join("commits"),
        }
    }

    /// Id of a blob: the file name participates, so equal content under
    /// different names yields different ids.
    pub fn blob_id(name: &str, content: &[u8]) -> String {
        hash_parts(&[name.as_bytes(), content])
    }

    /// Store a blob and return its id.
    ///
    /// If the blob already exists this is a no-op and simply returns
    /// the existing id.
    pub fn put_blob(&self, name: &str, content: &[u8]) -> StrataResult<String> {
        let id = Self::blob_id(name, content);
        let path = self.blobs.join(&id);
        if !self.storage.exists(&path) {
            self.storage.write_bytes(&path, content)?;
        }
        Ok(id)
    }

    /// Retrieve a blob by its id.
    pub fn get_blob(&self, id: &str) -> StrataResult<Vec<u8>> {
        let path = self.blobs.join(id);
        if !self.storage.exists(&path) {
            return Err(StrataError::ObjectNotFound(id.to_string()));
        }
        self.storage.read_bytes(&path)
    }

    pub fn has_blob(&self, id: &str) -> bool {
        self.storage.exists(&self.blobs.join(id))
    }

    /// Persist a commit under its id.
    ///
    /// Rejects a commit whose fields no longer hash to its id.
    pub fn put_commit(&self, commit: &Commit) -> StrataResult<String> {
        if !commit.verify() {
            return Err(StrataError::CorruptCommit(commit.id().to_string()));
        }
        let path = self.commit_path(commit.id());
        if !self.storage.exists(&path) {
            let json = serde_json::to_string_pretty(commit)?;
            self.storage.write_bytes(&path, json.as_bytes())?;
            debug!(commit = commit.short_id(), "stored commit");
        }
        Ok(commit.id().to_string())
    }

    /// Load a commit by full id or unique prefix.
    pub fn get_commit(&self, id_or_prefix: &str) -> StrataResult<Commit> {
        let id = self.resolve_commit_id(id_or_prefix)?;
        self.load_exact(&id)
    }

    /// Resolve a potentially-short commit id to a full id.
    ///
    /// Scans the commit namespace for a unique prefix match.
    pub fn resolve_commit_id(&self, short_id: &str) -> StrataResult<String> {
        if is_full_id(short_id) {
            if self.storage.exists(&self.commit_path(short_id)) {
                return Ok(short_id.to_string());
            }
            return Err(StrataError::NoSuchCommit(short_id.to_string()));
        }
        if short_id.is_empty() {
            return Err(StrataError::NoSuchCommit(String::new()));
        }

        let mut matches: Vec<String> = self
            .commit_ids()?
            .into_iter()
            .filter(|id| id.starts_with(short_id))
            .collect();

        match matches.len() {
            0 => Err(StrataError::NoSuchCommit(short_id.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(StrataError::AmbiguousPrefix {
                prefix: short_id.to_string(),
                matches: n,
            }),
        }
    }

    /// All stored commit ids, sorted.
    pub fn commit_ids(&self) -> StrataResult<Vec<String>> {
        let names = self.storage.list_plain_filenames(&self.commits)?;
        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_suffix(".json").map(String::from))
            .collect())
    }

    /// Load every stored commit.
    pub fn all_commits(&self) -> StrataResult<Vec<Commit>> {
        self.commit_ids()?
            .iter()
            .map(|id| self.load_exact(id))
            .collect()
    }

    fn load_exact(&self, id: &str) -> StrataResult<Commit> {
        let path = self.commit_path(id);
        if !self.storage.exists(&path) {
            return Err(StrataError::NoSuchCommit(id.to_string()));
        }
        let data = self.storage.read_bytes(&path)?;
        let commit: Commit = serde_json::from_slice(&data)?;
        if commit.id() != id || !commit.verify() {
            return Err(StrataError::CorruptCommit(id.to_string()));
        }
        Ok(commit)
    }

    fn commit_path(&self, id: &str) -> PathBuf {
        self.commits.join(format!("{id}.json"))
    }
}

impl CommitSource for ObjectStore {
    fn load_commit(&self, id: &str) -> StrataResult<Commit> {
        self.load_exact(id)
    }
}
