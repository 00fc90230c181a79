//! Commits: immutable snapshots of the tracked file set.
//!
//! A commit's id is the hash of its timestamp, message, parent links and
//! file mapping. Fields are only settable through [`Commit::new`], which
//! computes the id last, so a commit can never carry an id for fields it
//! does not hold.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::hash_parts;

/// Printed in place of a missing parent, and hashed for the root commit.
pub const NULL_PARENT: &str = "null";

/// File name -> blob id.
pub type FileMap = BTreeMap<String, String>;

/// A commit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    id: String,
    timestamp: DateTime<Utc>,
    message: String,
    /// Primary parent (None for the root commit).
    parent: Option<String>,
    /// Second parent of a merge commit.
    merge_parent: Option<String>,
    files: FileMap,
}

impl Commit {
    pub fn new(
        timestamp: DateTime<Utc>,
        message: String,
        parent: Option<String>,
        merge_parent: Option<String>,
        files: FileMap,
    ) -> Self {
        let mut commit = Commit {
            id: String::new(),
            timestamp,
            message,
            parent,
            merge_parent,
            files,
        };
        commit.id = commit.compute_id();
        commit
    }

    /// Derive the id from the commit's fields.
    ///
    /// The merge parent only participates when present, so ordinary
    /// commits hash exactly (timestamp, message, parent, files).
    pub fn compute_id(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let parent = self.parent.as_deref().unwrap_or(NULL_PARENT);
        let files = canonical_files(&self.files);

        let mut parts: Vec<&[u8]> = vec![
            timestamp.as_bytes(),
            self.message.as_bytes(),
            parent.as_bytes(),
            files.as_bytes(),
        ];
        if let Some(merge_parent) = &self.merge_parent {
            parts.push(merge_parent.as_bytes());
        }
        hash_parts(&parts)
    }

    /// True if the stored id matches the fields.
    pub fn verify(&self) -> bool {
        self.id == self.compute_id()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// First 12 characters of the id, for display.
    pub fn short_id(&self) -> &str {
        &self.id[..12.min(self.id.len())]
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn merge_parent(&self) -> Option<&str> {
        self.merge_parent.as_deref()
    }

    /// Both parents, primary first.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parent.iter().chain(self.merge_parent.iter()).map(String::as_str)
    }

    pub fn is_merge(&self) -> bool {
        self.merge_parent.is_some()
    }

    pub fn files(&self) -> &FileMap {
        &self.files
    }

    /// Blob id tracked for `name`, if any.
    pub fn blob_for(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn tracks(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// One `name blob` line per file, in name order.
fn canonical_files(files: &FileMap) -> String {
    let mut out = String::new();
    for (name, blob) in files {
        out.push_str(name);
        out.push(' ');
        out.push_str(blob);
        out.push('\n');
    }
    out
}
