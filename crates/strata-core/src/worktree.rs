//! The working tree: plain files at the repository root.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::commit::FileMap;
use crate::error::{StrataError, StrataResult};
use crate::fsutil::TMP_SUFFIX;
use crate::object::ObjectStore;
use crate::storage::SharedStorage;

/// What a reset changed on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResetSummary {
    pub created: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

pub struct WorkTree {
    storage: SharedStorage,
    root: PathBuf,
}

impl WorkTree {
    pub fn new(storage: SharedStorage, root: &Path) -> Self {
        Self {
            storage,
            root: root.to_path_buf(),
        }
    }

    /// Plain file names in the working tree, sorted.
    pub fn files(&self) -> StrataResult<Vec<String>> {
        self.storage.list_plain_filenames(&self.root)
    }

    pub fn exists(&self, name: &str) -> StrataResult<bool> {
        Ok(self.storage.exists(&self.path(name)?))
    }

    pub fn read(&self, name: &str) -> StrataResult<Vec<u8>> {
        let path = self.path(name)?;
        if !self.storage.exists(&path) {
            return Err(StrataError::FileNotFound(name.to_string()));
        }
        self.storage.read_bytes(&path)
    }

    pub fn write(&self, name: &str, data: &[u8]) -> StrataResult<()> {
        self.storage.write_bytes(&self.path(name)?, data)
    }

    pub fn delete(&self, name: &str) -> StrataResult<()> {
        self.storage.delete(&self.path(name)?)
    }

    /// Fail if a working file that `current` does not track would be
    /// overwritten by `target`.
    pub fn check_untracked(&self, current: &FileMap, target: &FileMap) -> StrataResult<()> {
        for name in self.files()? {
            if !current.contains_key(&name) && target.contains_key(&name) {
                return Err(StrataError::UntrackedFileConflict(name));
            }
        }
        Ok(())
    }

    /// Replace the files tracked by `current` with those of `target`.
    ///
    /// Runs the untracked-file check first; nothing is touched if it fails.
    /// Files untracked by both sides are left alone.
    pub fn reset(
        &self,
        store: &ObjectStore,
        current: &FileMap,
        target: &FileMap,
    ) -> StrataResult<ResetSummary> {
        self.check_untracked(current, target)?;
        let mut summary = ResetSummary::default();

        for name in current.keys() {
            if !target.contains_key(name) && self.exists(name)? {
                self.delete(name)?;
                summary.deleted.push(name.clone());
            }
        }

        for (name, blob) in target {
            let content = store.get_blob(blob)?;
            let on_disk = if self.exists(name)? {
                Some(self.read(name)?)
            } else {
                None
            };
            match on_disk {
                Some(existing) if existing == content => {}
                Some(_) => {
                    self.write(name, &content)?;
                    summary.modified.push(name.clone());
                }
                None => {
                    self.write(name, &content)?;
                    summary.created.push(name.clone());
                }
            }
        }

        debug!(
            created = summary.created.len(),
            modified = summary.modified.len(),
            deleted = summary.deleted.len(),
            "reset working tree"
        );
        Ok(summary)
    }

    /// Absolute path of a working file, after validating its name.
    fn path(&self, name: &str) -> StrataResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// Tracked names are plain file names directly inside the working tree.
pub fn validate_name(name: &str) -> StrataResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name == crate::repo::META_DIR
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.ends_with(TMP_SUFFIX);
    if bad {
        return Err(StrataError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskStorage;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, ObjectStore, WorkTree) {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(DiskStorage::shared(), &dir.path().join(".strata"));
        let tree = WorkTree::new(DiskStorage::shared(), dir.path());
        (dir, store, tree)
    }

    fn map(store: &ObjectStore, files: &[(&str, &str)]) -> FileMap {
        files
            .iter()
            .map(|(n, c)| (n.to_string(), store.put_blob(n, c.as_bytes()).unwrap()))
            .collect()
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("a.txt").is_ok());
        assert!(validate_name(".hidden").is_ok());
        for bad in ["", ".", "..", ".strata", "a/b", "..\\x", "notes.strata-tmp"] {
            assert!(
                matches!(validate_name(bad), Err(StrataError::InvalidFileName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_files_excludes_metadata_dir() {
        let (dir, store, tree) = setup();
        store.put_blob("x", b"x").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        assert_eq!(tree.files().unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn test_read_missing_file() {
        let (_dir, _store, tree) = setup();
        assert!(matches!(
            tree.read("nope.txt"),
            Err(StrataError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_reset_writes_and_deletes() {
        let (dir, store, tree) = setup();
        let current = map(&store, &[("keep.txt", "old"), ("drop.txt", "d")]);
        let target = map(&store, &[("keep.txt", "new"), ("add.txt", "a")]);
        fs::write(dir.path().join("keep.txt"), "old").unwrap();
        fs::write(dir.path().join("drop.txt"), "d").unwrap();
        fs::write(dir.path().join("scratch.txt"), "mine").unwrap();

        let summary = tree.reset(&store, &current, &target).unwrap();

        assert_eq!(summary.created, vec!["add.txt"]);
        assert_eq!(summary.modified, vec!["keep.txt"]);
        assert_eq!(summary.deleted, vec!["drop.txt"]);
        assert_eq!(fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "new");
        assert!(!dir.path().join("drop.txt").exists());
        // Untracked on both sides: untouched.
        assert_eq!(fs::read_to_string(dir.path().join("scratch.txt")).unwrap(), "mine");
    }

    #[test]
    fn test_reset_refuses_to_clobber_untracked() {
        let (dir, store, tree) = setup();
        let current = map(&store, &[("tracked.txt", "t")]);
        let target = map(&store, &[("tracked.txt", "t2"), ("local.txt", "theirs")]);
        fs::write(dir.path().join("tracked.txt"), "t").unwrap();
        fs::write(dir.path().join("local.txt"), "mine").unwrap();

        let result = tree.reset(&store, &current, &target);

        assert!(matches!(result, Err(StrataError::UntrackedFileConflict(ref n)) if n == "local.txt"));
        assert_eq!(fs::read_to_string(dir.path().join("local.txt")).unwrap(), "mine");
        assert_eq!(fs::read_to_string(dir.path().join("tracked.txt")).unwrap(), "t");
    }

    #[test]
    fn test_untracked_check_applies_even_when_content_matches() {
        let (dir, store, tree) = setup();
        let current = FileMap::new();
        let target = map(&store, &[("same.txt", "same")]);
        fs::write(dir.path().join("same.txt"), "same").unwrap();

        assert!(matches!(
            tree.check_untracked(&current, &target),
            Err(StrataError::UntrackedFileConflict(_))
        ));
    }
}
