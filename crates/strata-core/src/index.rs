//! Staging index: changes pending for the next commit.
//!
//! Two disjoint sets layered over HEAD's file mapping:
//! staged additions (name -> raw content) and staged removals
//! (name -> blob id of the version being dropped). Writing one side for
//! a name always clears the other.
//!
//! On disk, additions live in `.strata/stage/add/<name>` and removals in
//! `.strata/stage/remove/<name>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::commit::{Commit, FileMap};
use crate::error::{StrataError, StrataResult};
use crate::object::ObjectStore;
use crate::refs::RefState;
use crate::storage::Storage;

/// Result of staging a file for addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Content differs from HEAD and is now staged.
    Staged,
    /// Content matches HEAD; nothing staged.
    Unchanged,
    /// A pending removal of the same content was cancelled.
    Unremoved,
}

/// Result of staging a file for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// HEAD tracks the file; removal staged and the working copy must go.
    Removed,
    /// The file was only staged; it was dropped from the index.
    Unstaged,
}

/// Parameters of a commit built from the index.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Second parent, set for merge commits.
    pub merge_parent: Option<String>,
    /// Replaces HEAD as the primary parent.
    pub parent_override: Option<String>,
}

impl CommitRequest {
    /// A plain commit stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            merge_parent: None,
            parent_override: None,
        }
    }

    pub fn with_merge_parent(mut self, id: impl Into<String>) -> Self {
        self.merge_parent = Some(id.into());
        self
    }
}

/// Pending additions and removals.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Index {
    added: BTreeMap<String, Vec<u8>>,
    removed: BTreeMap<String, String>,
}

impl Index {
    /// Load the index from its stage directory; missing directories mean
    /// an empty index.
    pub fn load(storage: &dyn Storage, stage_dir: &Path) -> StrataResult<Self> {
        let (add_dir, remove_dir) = Self::dirs(stage_dir);
        let mut index = Index::default();

        for name in storage.list_plain_filenames(&add_dir)? {
            let content = storage.read_bytes(&add_dir.join(&name))?;
            index.added.insert(name, content);
        }
        for name in storage.list_plain_filenames(&remove_dir)? {
            let blob = storage.read_bytes(&remove_dir.join(&name))?;
            index
                .removed
                .insert(name, String::from_utf8_lossy(&blob).trim().to_string());
        }
        Ok(index)
    }

    /// Write the index back, deleting entries that are no longer staged.
    pub fn save(&self, storage: &dyn Storage, stage_dir: &Path) -> StrataResult<()> {
        let (add_dir, remove_dir) = Self::dirs(stage_dir);

        for name in storage.list_plain_filenames(&add_dir)? {
            if !self.added.contains_key(&name) {
                storage.delete(&add_dir.join(&name))?;
            }
        }
        for name in storage.list_plain_filenames(&remove_dir)? {
            if !self.removed.contains_key(&name) {
                storage.delete(&remove_dir.join(&name))?;
            }
        }
        for (name, content) in &self.added {
            storage.write_bytes(&add_dir.join(name), content)?;
        }
        for (name, blob) in &self.removed {
            storage.write_bytes(&remove_dir.join(name), blob.as_bytes())?;
        }
        Ok(())
    }

    fn dirs(stage_dir: &Path) -> (PathBuf, PathBuf) {
        (stage_dir.join("add"), stage_dir.join("remove"))
    }

    /// True if nothing is staged in either direction.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Names staged for addition, sorted.
    pub fn staged(&self) -> impl Iterator<Item = &str> {
        self.added.keys().map(String::as_str)
    }

    /// Names staged for removal, sorted.
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.removed.keys().map(String::as_str)
    }

    /// Staged content for `name`, if any.
    pub fn staged_content(&self, name: &str) -> Option<&[u8]> {
        self.added.get(name).map(Vec::as_slice)
    }

    pub fn is_removed(&self, name: &str) -> bool {
        self.removed.contains_key(name)
    }

    /// Stage `content` as the next version of `name`.
    pub fn stage_add(
        &mut self,
        store: &ObjectStore,
        head: Option<&Commit>,
        name: &str,
        content: Vec<u8>,
    ) -> StrataResult<AddOutcome> {
        let matches_head = match head.and_then(|h| h.blob_for(name)) {
            Some(blob) => store.get_blob(blob)? == content,
            None => false,
        };

        let mut unremoved = false;
        if let Some(blob) = self.removed.get(name) {
            if store.get_blob(blob)? == content {
                self.removed.remove(name);
                unremoved = true;
            }
        }

        if matches_head {
            self.added.remove(name);
            return Ok(if unremoved {
                AddOutcome::Unremoved
            } else {
                AddOutcome::Unchanged
            });
        }

        self.removed.remove(name);
        self.added.insert(name.to_string(), content);
        Ok(AddOutcome::Staged)
    }

    /// Stage `name` for removal.
    pub fn stage_remove(
        &mut self,
        head: Option<&Commit>,
        name: &str,
    ) -> StrataResult<RemoveOutcome> {
        if let Some(blob) = head.and_then(|h| h.blob_for(name)) {
            self.added.remove(name);
            self.removed.insert(name.to_string(), blob.to_string());
            return Ok(RemoveOutcome::Removed);
        }
        if self.added.remove(name).is_some() {
            return Ok(RemoveOutcome::Unstaged);
        }
        Err(StrataError::NothingToRemove(name.to_string()))
    }

    /// Drop everything staged.
    pub fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
    }

    /// Turn the staged changes into a commit on top of HEAD.
    ///
    /// Blobs every staged file, stores the commit, moves HEAD and the
    /// current branch to it and empties the index. Fails with `NoChanges`
    /// before touching anything when the index is empty.
    pub fn build_commit(
        &mut self,
        store: &ObjectStore,
        refs: &mut RefState,
        request: CommitRequest,
    ) -> StrataResult<Commit> {
        if self.is_empty() {
            return Err(StrataError::NoChanges);
        }

        let head = refs.head().map(|id| store.get_commit(id)).transpose()?;
        let mut files: FileMap = head
            .as_ref()
            .map(|h| h.files().clone())
            .unwrap_or_default();

        for name in self.removed.keys() {
            files.remove(name);
        }
        for (name, content) in &self.added {
            let blob = store.put_blob(name, content)?;
            files.insert(name.clone(), blob);
        }

        let parent = request
            .parent_override
            .or_else(|| head.as_ref().map(|h| h.id().to_string()));
        let commit = Commit::new(
            request.timestamp,
            request.message,
            parent,
            request.merge_parent,
            files,
        );
        store.put_commit(&commit)?;

        refs.advance(commit.id());
        self.clear();
        info!(
            commit = commit.short_id(),
            branch = refs.current_branch(),
            files = commit.files().len(),
            "created commit"
        );
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskStorage;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(DiskStorage::shared(), dir.path());
        (dir, store)
    }

    /// Commit `files` directly and return it with the refs pointing at it.
    fn committed(store: &ObjectStore, files: &[(&str, &str)]) -> (Commit, RefState) {
        let mut index = Index::default();
        let mut refs = RefState::new("master");
        for (name, content) in files {
            index
                .stage_add(store, None, name, content.as_bytes().to_vec())
                .unwrap();
        }
        let commit = index
            .build_commit(store, &mut refs, CommitRequest::new("base"))
            .unwrap();
        (commit, refs)
    }

    #[test]
    fn test_empty_index() {
        let idx = Index::default();
        assert!(idx.is_empty());
        assert_eq!(idx.staged().count(), 0);
    }

    #[test]
    fn test_add_new_file_is_staged() {
        let (_dir, store) = setup();
        let mut idx = Index::default();

        let outcome = idx.stage_add(&store, None, "a.txt", b"x".to_vec()).unwrap();
        assert_eq!(outcome, AddOutcome::Staged);
        assert_eq!(idx.staged_content("a.txt"), Some(&b"x"[..]));
    }

    #[test]
    fn test_add_matching_head_clears_stale_entry() {
        let (_dir, store) = setup();
        let (head, _) = committed(&store, &[("a.txt", "x")]);
        let mut idx = Index::default();

        idx.stage_add(&store, Some(&head), "a.txt", b"y".to_vec()).unwrap();
        let outcome = idx
            .stage_add(&store, Some(&head), "a.txt", b"x".to_vec())
            .unwrap();

        assert_eq!(outcome, AddOutcome::Unchanged);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_add_after_rm_unremoves() {
        let (_dir, store) = setup();
        let (head, _) = committed(&store, &[("a.txt", "x")]);
        let mut idx = Index::default();

        idx.stage_remove(Some(&head), "a.txt").unwrap();
        assert!(idx.is_removed("a.txt"));

        let outcome = idx
            .stage_add(&store, Some(&head), "a.txt", b"x".to_vec())
            .unwrap();
        assert_eq!(outcome, AddOutcome::Unremoved);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_add_after_rm_with_new_content_keeps_sets_disjoint() {
        let (_dir, store) = setup();
        let (head, _) = committed(&store, &[("a.txt", "x")]);
        let mut idx = Index::default();

        idx.stage_remove(Some(&head), "a.txt").unwrap();
        let outcome = idx
            .stage_add(&store, Some(&head), "a.txt", b"new".to_vec())
            .unwrap();

        assert_eq!(outcome, AddOutcome::Staged);
        assert!(!idx.is_removed("a.txt"));
        assert_eq!(idx.staged_content("a.txt"), Some(&b"new"[..]));
    }

    #[test]
    fn test_remove_rules() {
        let (_dir, store) = setup();
        let (head, _) = committed(&store, &[("tracked.txt", "t")]);
        let mut idx = Index::default();
        idx.stage_add(&store, Some(&head), "new.txt", b"n".to_vec())
            .unwrap();

        assert_eq!(
            idx.stage_remove(Some(&head), "new.txt").unwrap(),
            RemoveOutcome::Unstaged
        );
        assert_eq!(
            idx.stage_remove(Some(&head), "tracked.txt").unwrap(),
            RemoveOutcome::Removed
        );
        assert!(matches!(
            idx.stage_remove(Some(&head), "ghost.txt"),
            Err(StrataError::NothingToRemove(_))
        ));
    }

    #[test]
    fn test_remove_staged_and_tracked_drops_staged_content() {
        let (_dir, store) = setup();
        let (head, _) = committed(&store, &[("a.txt", "x")]);
        let mut idx = Index::default();

        idx.stage_add(&store, Some(&head), "a.txt", b"y".to_vec()).unwrap();
        idx.stage_remove(Some(&head), "a.txt").unwrap();

        assert_eq!(idx.staged_content("a.txt"), None);
        assert!(idx.is_removed("a.txt"));
    }

    #[test]
    fn test_build_commit_applies_changes() {
        let (_dir, store) = setup();
        let (head, mut refs) = committed(&store, &[("a.txt", "x"), ("b.txt", "y")]);
        let mut idx = Index::default();

        idx.stage_remove(Some(&head), "a.txt").unwrap();
        idx.stage_add(&store, Some(&head), "c.txt", b"z".to_vec()).unwrap();

        let commit = idx
            .build_commit(&store, &mut refs, CommitRequest::new("second"))
            .unwrap();

        assert_eq!(commit.parent(), Some(head.id()));
        assert!(!commit.tracks("a.txt"));
        assert_eq!(commit.blob_for("b.txt"), head.blob_for("b.txt"));
        assert_eq!(store.get_blob(commit.blob_for("c.txt").unwrap()).unwrap(), b"z");
        assert_eq!(refs.head(), Some(commit.id()));
        assert!(refs.is_consistent());
        assert!(idx.is_empty());
    }

    #[test]
    fn test_build_commit_with_nothing_staged() {
        let (_dir, store) = setup();
        let (head, mut refs) = committed(&store, &[("a.txt", "x")]);
        let before = refs.clone();
        let commits_before = store.commit_ids().unwrap();

        let result = Index::default().build_commit(&store, &mut refs, CommitRequest::new("noop"));

        assert!(matches!(result, Err(StrataError::NoChanges)));
        assert_eq!(refs, before);
        assert_eq!(refs.head(), Some(head.id()));
        assert_eq!(store.commit_ids().unwrap(), commits_before);
    }

    #[test]
    fn test_save_and_load() {
        let (dir, store) = setup();
        let (head, _) = committed(&store, &[("gone.txt", "g")]);
        let stage = dir.path().join("stage");

        let mut idx = Index::default();
        idx.stage_add(&store, Some(&head), "a.txt", b"aaa".to_vec()).unwrap();
        idx.stage_remove(Some(&head), "gone.txt").unwrap();
        idx.save(&DiskStorage, &stage).unwrap();

        let loaded = Index::load(&DiskStorage, &stage).unwrap();
        assert_eq!(loaded, idx);

        Index::default().save(&DiskStorage, &stage).unwrap();
        assert!(Index::load(&DiskStorage, &stage).unwrap().is_empty());
    }
}
