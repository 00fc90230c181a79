//! Repository: the main entry point for strata operations.
//!
//! A Repository ties together the object store, reference state, staging
//! index and working tree. Every operation loads what it needs, mutates
//! in memory and persists the result before returning; nothing is cached
//! between calls.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::commit::{Commit, FileMap};
use crate::config::RepoConfig;
use crate::error::{StrataError, StrataResult};
use crate::graph;
use crate::index::{AddOutcome, CommitRequest, Index, RemoveOutcome};
use crate::lock::RepoLock;
use crate::merge::{self, MergeAction, MergeOutcome};
use crate::object::ObjectStore;
use crate::refs::RefState;
use crate::state::{self, Status};
use crate::storage::{DiskStorage, SharedStorage};
use crate::worktree::{validate_name, ResetSummary, WorkTree};

/// The metadata directory name.
pub const META_DIR: &str = ".strata";

/// A strata repository.
pub struct Repository {
    /// Path to the `.strata/` directory.
    meta_dir: PathBuf,
    storage: SharedStorage,
    objects: ObjectStore,
    tree: WorkTree,
    config: RepoConfig,
}

impl Repository {
    /// Initialize a new repository in the given directory.
    pub fn init(root: &Path) -> StrataResult<Self> {
        Self::init_with(root, DiskStorage::shared())
    }

    /// Initialize a new repository on a specific storage backend.
    pub fn init_with(root: &Path, storage: SharedStorage) -> StrataResult<Self> {
        let meta_dir = root.join(META_DIR);

        if storage.exists(&meta_dir) {
            return Err(StrataError::AlreadyExists);
        }

        // Object and stage directories appear on first write.
        let config = RepoConfig::default();
        config.save(storage.as_ref(), &meta_dir.join("config.json"))?;
        RefState::new(&config.default_branch)
            .save(storage.as_ref(), &meta_dir.join("refs.json"))?;

        info!(root = %root.display(), "initialized repository");
        Self::open_with(root, storage)
    }

    /// Open an existing repository rooted at `root`.
    pub fn open(root: &Path) -> StrataResult<Self> {
        Self::open_with(root, DiskStorage::shared())
    }

    pub fn open_with(root: &Path, storage: SharedStorage) -> StrataResult<Self> {
        let meta_dir = root.join(META_DIR);

        if !storage.exists(&meta_dir) {
            return Err(StrataError::NotARepo);
        }

        let config = RepoConfig::load(storage.as_ref(), &meta_dir.join("config.json"))?;
        let objects = ObjectStore::new(storage.clone(), &meta_dir);
        let tree = WorkTree::new(storage.clone(), root);

        Ok(Self {
            meta_dir,
            storage,
            objects,
            tree,
            config,
        })
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Acquire an exclusive lock on the repository.
    fn lock(&self) -> StrataResult<RepoLock> {
        RepoLock::acquire(&self.meta_dir, self.config.lock_timeout())
    }

    /// Current reference state.
    pub fn refs(&self) -> StrataResult<RefState> {
        RefState::load(self.storage.as_ref(), &self.meta_dir.join("refs.json"))
    }

    fn save_refs(&self, refs: &RefState) -> StrataResult<()> {
        refs.save(self.storage.as_ref(), &self.meta_dir.join("refs.json"))
    }

    /// Current staging index.
    pub fn index(&self) -> StrataResult<Index> {
        Index::load(self.storage.as_ref(), &self.meta_dir.join("stage"))
    }

    fn save_index(&self, index: &Index) -> StrataResult<()> {
        index.save(self.storage.as_ref(), &self.meta_dir.join("stage"))
    }

    fn head_of(&self, refs: &RefState) -> StrataResult<Option<Commit>> {
        refs.head().map(|id| self.objects.get_commit(id)).transpose()
    }

    fn head_files(&self, refs: &RefState) -> StrataResult<FileMap> {
        Ok(self
            .head_of(refs)?
            .map(|h| h.files().clone())
            .unwrap_or_default())
    }

    /// The commit HEAD points at, if any.
    pub fn head(&self) -> StrataResult<Option<Commit>> {
        self.head_of(&self.refs()?)
    }

    /// Load a commit by full id or unique prefix.
    pub fn get_commit(&self, id_or_prefix: &str) -> StrataResult<Commit> {
        self.objects.get_commit(id_or_prefix)
    }

    /// Stage the working copy of `name`.
    pub fn add(&self, name: &str) -> StrataResult<AddOutcome> {
        validate_name(name)?;
        let _lock = self.lock()?;
        let refs = self.refs()?;
        let mut index = self.index()?;

        let content = self.tree.read(name)?;
        let head = self.head_of(&refs)?;
        let outcome = index.stage_add(&self.objects, head.as_ref(), name, content)?;

        self.save_index(&index)?;
        Ok(outcome)
    }

    /// Stage `name` for removal, deleting the working copy if HEAD tracks it.
    pub fn rm(&self, name: &str) -> StrataResult<RemoveOutcome> {
        validate_name(name)?;
        let _lock = self.lock()?;
        let refs = self.refs()?;
        let mut index = self.index()?;

        let head = self.head_of(&refs)?;
        let outcome = index.stage_remove(head.as_ref(), name)?;
        if outcome == RemoveOutcome::Removed {
            self.tree.delete(name)?;
        }

        self.save_index(&index)?;
        Ok(outcome)
    }

    /// Record the staged changes as a new commit on the current branch.
    pub fn commit(&self, message: &str) -> StrataResult<Commit> {
        if message.trim().is_empty() {
            return Err(StrataError::EmptyMessage);
        }
        let _lock = self.lock()?;
        let mut refs = self.refs()?;
        let mut index = self.index()?;

        let commit = index.build_commit(&self.objects, &mut refs, CommitRequest::new(message))?;

        self.save_refs(&refs)?;
        self.save_index(&index)?;
        Ok(commit)
    }

    /// History along primary parents from HEAD (newest first).
    pub fn log(&self) -> StrataResult<Vec<Commit>> {
        let mut commits = Vec::new();
        let mut current = self.refs()?.head().map(String::from);

        while let Some(id) = current {
            let commit = self.objects.get_commit(&id)?;
            current = commit.parent().map(String::from);
            commits.push(commit);
        }

        Ok(commits)
    }

    /// Every stored commit, newest first.
    pub fn global_log(&self) -> StrataResult<Vec<Commit>> {
        let mut commits = self.objects.all_commits()?;
        commits.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(commits)
    }

    /// Ids of all commits whose message is exactly `message`.
    pub fn find(&self, message: &str) -> StrataResult<Vec<String>> {
        Ok(self
            .global_log()?
            .into_iter()
            .filter(|c| c.message() == message)
            .map(|c| c.id().to_string())
            .collect())
    }

    pub fn status(&self) -> StrataResult<Status> {
        let refs = self.refs()?;
        let index = self.index()?;
        let head = self.head_of(&refs)?;
        state::compute_status(&refs, &index, head.as_ref(), &self.tree)
    }

    /// Create a branch at HEAD.
    pub fn branch(&self, name: &str) -> StrataResult<()> {
        let _lock = self.lock()?;
        let mut refs = self.refs()?;
        refs.create_branch(name)?;
        self.save_refs(&refs)?;
        info!(branch = name, "created branch");
        Ok(())
    }

    /// Delete a branch pointer.
    pub fn rm_branch(&self, name: &str) -> StrataResult<()> {
        let _lock = self.lock()?;
        let mut refs = self.refs()?;
        refs.delete_branch(name)?;
        self.save_refs(&refs)?;
        info!(branch = name, "removed branch");
        Ok(())
    }

    /// Switch to another branch, resetting the working tree to its tip.
    pub fn checkout_branch(&self, name: &str) -> StrataResult<ResetSummary> {
        let _lock = self.lock()?;
        let mut refs = self.refs()?;
        let mut index = self.index()?;

        let target_id = refs.checkout_target(name)?;
        let target = self.objects.get_commit(&target_id)?;
        let current = self.head_files(&refs)?;
        let summary = self.tree.reset(&self.objects, &current, target.files())?;

        index.clear();
        refs.switch_to(name)?;
        self.save_refs(&refs)?;
        self.save_index(&index)?;
        info!(branch = name, commit = target.short_id(), "switched branch");
        Ok(summary)
    }

    /// Overwrite the working copy of `name` with its version at `commit`
    /// (HEAD when `None`). The index is not touched.
    pub fn checkout_file(&self, commit: Option<&str>, name: &str) -> StrataResult<()> {
        validate_name(name)?;
        let _lock = self.lock()?;
        let refs = self.refs()?;
        let head_files = self.head_files(&refs)?;

        let blob = match commit {
            None => head_files
                .get(name)
                .cloned()
                .ok_or_else(|| StrataError::FileNotTracked(name.to_string()))?,
            Some(id) => {
                let source = self.objects.get_commit(id)?;
                let blob = source
                    .blob_for(name)
                    .map(String::from)
                    .ok_or_else(|| StrataError::FileNotInCommit(name.to_string()))?;
                if !head_files.contains_key(name) && self.tree.exists(name)? {
                    return Err(StrataError::UntrackedFileConflict(name.to_string()));
                }
                blob
            }
        };

        let content = self.objects.get_blob(&blob)?;
        self.tree.write(name, &content)
    }

    /// Move the current branch to `commit` and reset the working tree to it.
    pub fn reset(&self, commit: &str) -> StrataResult<Commit> {
        let _lock = self.lock()?;
        let mut refs = self.refs()?;
        let mut index = self.index()?;

        let target = self.objects.get_commit(commit)?;
        let current = self.head_files(&refs)?;
        self.tree.reset(&self.objects, &current, target.files())?;

        index.clear();
        refs.advance(target.id());
        self.save_refs(&refs)?;
        self.save_index(&index)?;
        info!(
            branch = refs.current_branch(),
            commit = target.short_id(),
            "reset"
        );
        Ok(target)
    }

    /// Merge branch `name` into the current branch.
    pub fn merge(&self, name: &str) -> StrataResult<MergeOutcome> {
        let _lock = self.lock()?;
        let mut refs = self.refs()?;
        let mut index = self.index()?;

        if !index.is_empty() {
            return Err(StrataError::UncommittedChanges);
        }
        let other_id = refs
            .branch(name)
            .map(String::from)
            .ok_or_else(|| StrataError::NoSuchBranch(name.to_string()))?;
        if name == refs.current_branch() {
            return Err(StrataError::SelfMerge);
        }
        let head_id = refs
            .head()
            .map(String::from)
            .ok_or_else(|| StrataError::NoSuchCommit("HEAD".to_string()))?;

        let split_id = graph::split_point(&self.objects, &head_id, &other_id)?;
        if split_id == other_id {
            return Err(StrataError::AlreadyAncestor(name.to_string()));
        }

        let head = self.objects.get_commit(&head_id)?;
        let other = self.objects.get_commit(&other_id)?;

        if split_id == head_id {
            self.tree.reset(&self.objects, head.files(), other.files())?;
            index.clear();
            refs.advance(&other_id);
            self.save_refs(&refs)?;
            self.save_index(&index)?;
            info!(
                branch = refs.current_branch(),
                commit = other.short_id(),
                "fast-forwarded"
            );
            return Ok(MergeOutcome::FastForward { commit: other_id });
        }

        let split = self.objects.get_commit(&split_id)?;
        let decisions = merge::classify(&self.objects, split.files(), head.files(), other.files())?;

        // Nothing is written until every target path is known to be safe.
        for decision in &decisions {
            let writes = matches!(decision.action, MergeAction::TakeOther | MergeAction::Conflict);
            if writes && !head.tracks(&decision.name) && self.tree.exists(&decision.name)? {
                return Err(StrataError::UntrackedFileConflict(decision.name.clone()));
            }
        }

        let mut conflicts = Vec::new();
        for decision in &decisions {
            let file = decision.name.as_str();
            match decision.action {
                MergeAction::KeepHead => {}
                MergeAction::TakeOther => {
                    let blob = other
                        .blob_for(file)
                        .ok_or_else(|| StrataError::FileNotInCommit(file.to_string()))?;
                    let content = self.objects.get_blob(blob)?;
                    self.tree.write(file, &content)?;
                    index.stage_add(&self.objects, Some(&head), file, content)?;
                }
                MergeAction::Remove => {
                    index.stage_remove(Some(&head), file)?;
                    self.tree.delete(file)?;
                }
                MergeAction::Conflict => {
                    let ours = head
                        .blob_for(file)
                        .map(|b| self.objects.get_blob(b))
                        .transpose()?;
                    let theirs = other
                        .blob_for(file)
                        .filter(|b| self.objects.has_blob(b))
                        .map(|b| self.objects.get_blob(b))
                        .transpose()?;
                    let text = merge::conflict_text(ours.as_deref(), theirs.as_deref());
                    self.tree.write(file, &text)?;
                    index.stage_add(&self.objects, Some(&head), file, text)?;
                    conflicts.push(file.to_string());
                }
            }
        }

        let message = format!("Merged {name} into {}.", refs.current_branch());
        let mut request = CommitRequest::new(message).with_merge_parent(other_id.clone());
        request.parent_override = Some(head_id);
        let commit = index.build_commit(&self.objects, &mut refs, request)?;

        self.save_refs(&refs)?;
        self.save_index(&index)?;
        if conflicts.is_empty() {
            info!(branch = name, commit = commit.short_id(), "merged");
        } else {
            warn!(
                branch = name,
                commit = commit.short_id(),
                conflicts = conflicts.len(),
                "merged with conflicts"
            );
        }
        Ok(MergeOutcome::Merged { commit, conflicts })
    }
}
