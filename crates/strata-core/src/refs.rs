//! Reference state: HEAD, the current branch and the branch table.
//!
//! HEAD is authoritative. The branch table is a name -> commit index,
//! and the current branch's entry is only ever written together with
//! HEAD, so `branches[current] == HEAD` holds after every mutation.
//! Stored as `.strata/refs.json`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StrataError, StrataResult};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefState {
    /// Commit HEAD points at; None until the first commit.
    head: Option<String>,
    /// Name of the active branch.
    current: String,
    /// Branch name -> commit id.
    branches: BTreeMap<String, String>,
}

impl RefState {
    /// Fresh state for an empty repository.
    pub fn new(default_branch: &str) -> Self {
        Self {
            head: None,
            current: default_branch.to_string(),
            branches: BTreeMap::new(),
        }
    }

    pub fn load(storage: &dyn Storage, path: &Path) -> StrataResult<Self> {
        let data = storage.read_bytes(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, storage: &dyn Storage, path: &Path) -> StrataResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        storage.write_bytes(path, json.as_bytes())
    }

    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn current_branch(&self) -> &str {
        &self.current
    }

    pub fn branches(&self) -> &BTreeMap<String, String> {
        &self.branches
    }

    pub fn branch(&self, name: &str) -> Option<&str> {
        self.branches.get(name).map(String::as_str)
    }

    /// Point HEAD and the current branch at `commit_id`.
    pub fn advance(&mut self, commit_id: &str) {
        self.head = Some(commit_id.to_string());
        self.branches
            .insert(self.current.clone(), commit_id.to_string());
    }

    /// Create `name` at HEAD.
    pub fn create_branch(&mut self, name: &str) -> StrataResult<()> {
        if self.branches.contains_key(name) || self.current == name {
            return Err(StrataError::BranchExists(name.to_string()));
        }
        let head = self
            .head
            .clone()
            .ok_or_else(|| StrataError::NoSuchCommit("HEAD".to_string()))?;
        self.branches.insert(name.to_string(), head);
        Ok(())
    }

    /// Remove `name` from the branch table. Commits are left in place.
    pub fn delete_branch(&mut self, name: &str) -> StrataResult<()> {
        if !self.branches.contains_key(name) {
            return Err(StrataError::NoSuchBranch(name.to_string()));
        }
        if self.current == name {
            return Err(StrataError::CannotDeleteCurrentBranch(name.to_string()));
        }
        self.branches.remove(name);
        Ok(())
    }

    /// Commit a checkout of `name` would move to, after validating it.
    pub fn checkout_target(&self, name: &str) -> StrataResult<String> {
        if self.current == name {
            return Err(StrataError::AlreadyOnBranch(name.to_string()));
        }
        self.branch(name)
            .map(String::from)
            .ok_or_else(|| StrataError::NoSuchBranch(name.to_string()))
    }

    /// Make `name` the current branch and move HEAD to its tip.
    pub fn switch_to(&mut self, name: &str) -> StrataResult<()> {
        let target = self
            .branch(name)
            .map(String::from)
            .ok_or_else(|| StrataError::NoSuchBranch(name.to_string()))?;
        self.current = name.to_string();
        self.head = Some(target);
        Ok(())
    }

    /// True if the current branch entry agrees with HEAD.
    pub fn is_consistent(&self) -> bool {
        self.branch(&self.current) == self.head()
    }
}
