//! Repository status: branches, staged changes and working-tree drift.

use serde::Serialize;

use crate::commit::Commit;
use crate::error::StrataResult;
use crate::index::Index;
use crate::object::ObjectStore;
use crate::refs::RefState;
use crate::worktree::WorkTree;

/// How a working file drifted from what the next commit would record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Drift {
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnstagedChange {
    pub name: String,
    pub drift: Drift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchEntry {
    pub name: String,
    pub current: bool,
}

/// Full repository status. Every list is sorted by name.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub branches: Vec<BranchEntry>,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub unstaged: Vec<UnstagedChange>,
    pub untracked: Vec<String>,
}

impl Status {
    /// True if nothing is staged and the working tree matches.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.unstaged.is_empty()
            && self.untracked.is_empty()
    }
}

/// Compare HEAD, the index and the working tree.
pub fn compute_status(
    refs: &RefState,
    index: &Index,
    head: Option<&Commit>,
    tree: &WorkTree,
) -> StrataResult<Status> {
    let mut branches: Vec<BranchEntry> = refs
        .branches()
        .keys()
        .map(|name| BranchEntry {
            name: name.clone(),
            current: name == refs.current_branch(),
        })
        .collect();
    if !refs.branches().contains_key(refs.current_branch()) {
        // No commits yet: the current branch has no entry.
        branches.push(BranchEntry {
            name: refs.current_branch().to_string(),
            current: true,
        });
        branches.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let working = tree.files()?;
    let mut unstaged = Vec::new();
    let mut untracked = Vec::new();

    for name in &working {
        let content = tree.read(name)?;
        let blob = ObjectStore::blob_id(name, &content);
        match (index.staged_content(name), head.and_then(|h| h.blob_for(name))) {
            (Some(staged), _) => {
                if staged != content.as_slice() {
                    unstaged.push(change(name, Drift::Modified));
                }
            }
            (None, Some(tracked)) if !index.is_removed(name) => {
                if tracked != blob {
                    unstaged.push(change(name, Drift::Modified));
                }
            }
            _ => untracked.push(name.clone()),
        }
    }

    for name in index.staged() {
        if !working.iter().any(|w| w == name) {
            unstaged.push(change(name, Drift::Deleted));
        }
    }
    if let Some(head) = head {
        for name in head.files().keys() {
            let gone = !working.contains(name);
            if gone && !index.is_removed(name) && index.staged_content(name).is_none() {
                unstaged.push(change(name, Drift::Deleted));
            }
        }
    }
    unstaged.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Status {
        branches,
        staged: index.staged().map(String::from).collect(),
        removed: index.removed().map(String::from).collect(),
        unstaged,
        untracked,
    })
}

fn change(name: &str, drift: Drift) -> UnstagedChange {
    UnstagedChange {
        name: name.to_string(),
        drift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::FileMap;
    use crate::storage::DiskStorage;
    use chrono::Utc;
    use tempfile::tempdir;

    fn head_with(store: &ObjectStore, files: &[(&str, &str)]) -> Commit {
        let map: FileMap = files
            .iter()
            .map(|(n, c)| (n.to_string(), store.put_blob(n, c.as_bytes()).unwrap()))
            .collect();
        Commit::new(Utc::now(), "snapshot".into(), None, None, map)
    }

    #[test]
    fn test_fresh_repo_lists_current_branch() {
        let dir = tempdir().unwrap();
        let tree = WorkTree::new(DiskStorage::shared(), dir.path());
        let refs = RefState::new("master");

        let status = compute_status(&refs, &Index::default(), None, &tree).unwrap();

        assert_eq!(
            status.branches,
            vec![BranchEntry { name: "master".into(), current: true }]
        );
        assert!(status.is_clean());
    }

    #[test]
    fn test_staged_then_edited_is_modified() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::shared();
        let store = ObjectStore::new(storage.clone(), &dir.path().join(".strata"));
        let tree = WorkTree::new(storage, dir.path());
        let refs = RefState::new("master");

        let mut index = Index::default();
        index.stage_add(&store, None, "a.txt", b"one".to_vec()).unwrap();
        tree.write("a.txt", b"two").unwrap();

        let status = compute_status(&refs, &index, None, &tree).unwrap();

        assert_eq!(status.staged, vec!["a.txt"]);
        assert_eq!(
            status.unstaged,
            vec![UnstagedChange { name: "a.txt".into(), drift: Drift::Modified }]
        );
        assert!(status.untracked.is_empty());
    }

    #[test]
    fn test_removed_file_recreated_is_untracked() {
        let dir = tempdir().unwrap();
        let storage = DiskStorage::shared();
        let store = ObjectStore::new(storage.clone(), &dir.path().join(".strata"));
        let tree = WorkTree::new(storage, dir.path());
        let refs = RefState::new("master");
        let head = head_with(&store, &[("a.txt", "x"), ("b.txt", "y")]);

        let mut index = Index::default();
        index.stage_remove(Some(&head), "a.txt").unwrap();
        tree.write("a.txt", b"x").unwrap();
        tree.write("b.txt", b"y").unwrap();

        let status = compute_status(&refs, &index, Some(&head), &tree).unwrap();

        assert_eq!(status.removed, vec!["a.txt"]);
        assert_eq!(status.untracked, vec!["a.txt"]);
        assert!(status.unstaged.is_empty());
    }
}
