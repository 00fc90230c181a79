//! Three-way merge decisions.
//!
//! Every file name present at the split point, in HEAD or in the other
//! branch tip is classified by comparing whole-file contents. The
//! repository then applies the decisions and records a merge commit.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::commit::{Commit, FileMap};
use crate::error::StrataResult;
use crate::object::ObjectStore;

pub const CONFLICT_START: &str = "<<<<<<< HEAD\n";
pub const CONFLICT_SEPARATOR: &str = "=======\n";
pub const CONFLICT_END: &str = ">>>>>>>\n";

/// What happens to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeAction {
    /// HEAD's state stands, including HEAD not having the file.
    KeepHead,
    /// Check out the other branch's version and stage it.
    TakeOther,
    /// Stage removal of the file.
    Remove,
    /// Write conflict markers and stage the result.
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDecision {
    pub name: String,
    pub action: MergeAction,
}

/// How a merge finished.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// HEAD was an ancestor of the branch; the current branch now points
    /// at the branch tip and no commit was made.
    FastForward { commit: String },
    /// A merge commit was recorded. `conflicts` names files left with
    /// conflict markers.
    Merged { commit: Commit, conflicts: Vec<String> },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

/// Classify every file of `split`, `head` and `other`, sorted by name.
pub fn classify(
    store: &ObjectStore,
    split: &FileMap,
    head: &FileMap,
    other: &FileMap,
) -> StrataResult<Vec<FileDecision>> {
    let names: BTreeSet<&String> = split.keys().chain(head.keys()).chain(other.keys()).collect();
    let mut decisions = Vec::with_capacity(names.len());

    for name in names {
        let s = split.get(name).map(String::as_str);
        let h = head.get(name).map(String::as_str);
        let b = other.get(name).map(String::as_str);

        let action = match (s, h, b) {
            (Some(_), Some(_), Some(_)) => {
                let head_same = same_content(store, h, s)?;
                let other_same = same_content(store, b, s)?;
                match (head_same, other_same) {
                    (true, true) | (false, true) => MergeAction::KeepHead,
                    (true, false) => MergeAction::TakeOther,
                    (false, false) => {
                        if same_content(store, h, b)? {
                            MergeAction::KeepHead
                        } else {
                            MergeAction::Conflict
                        }
                    }
                }
            }
            (Some(_), Some(_), None) => {
                if same_content(store, h, s)? {
                    MergeAction::Remove
                } else {
                    MergeAction::Conflict
                }
            }
            (Some(_), None, Some(_)) => {
                if same_content(store, b, s)? {
                    MergeAction::KeepHead
                } else {
                    MergeAction::Conflict
                }
            }
            (None, None, Some(_)) => MergeAction::TakeOther,
            // Added independently on both sides.
            (None, Some(_), Some(_)) => {
                if same_content(store, h, b)? {
                    MergeAction::KeepHead
                } else {
                    MergeAction::Conflict
                }
            }
            _ => MergeAction::KeepHead,
        };

        decisions.push(FileDecision {
            name: name.clone(),
            action,
        });
    }

    Ok(decisions)
}

/// Conflict block for one file. A missing side contributes nothing.
pub fn conflict_text(head: Option<&[u8]>, other: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(CONFLICT_START.as_bytes());
    out.extend_from_slice(head.unwrap_or_default());
    out.extend_from_slice(CONFLICT_SEPARATOR.as_bytes());
    out.extend_from_slice(other.unwrap_or_default());
    out.extend_from_slice(CONFLICT_END.as_bytes());
    out
}

/// Whole-file equality of two blobs. Absence, or a blob missing from the
/// store, differs from any content.
fn same_content(store: &ObjectStore, a: Option<&str>, b: Option<&str>) -> StrataResult<bool> {
    match (a, b) {
        (None, None) => Ok(true),
        (Some(a), Some(b)) if a == b => Ok(true),
        (Some(a), Some(b)) if store.has_blob(a) && store.has_blob(b) => {
            Ok(store.get_blob(a)? == store.get_blob(b)?)
        }
        _ => Ok(false),
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

    /// One-file map for `f`, or empty when `content` is None.
    fn side(store: &ObjectStore, content: Option<&str>) -> FileMap {
        let mut map = FileMap::new();
        if let Some(c) = content {
            map.insert("f".to_string(), store.put_blob("f", c.as_bytes()).unwrap());
        }
        map
    }

    fn decide(s: Option<&str>, h: Option<&str>, b: Option<&str>) -> MergeAction {
        let (_dir, store) = setup();
        let decisions = classify(&store, &side(&store, s), &side(&store, h), &side(&store, b)).unwrap();
        assert_eq!(decisions.len(), 1);
        decisions[0].action
    }

    #[test]
    fn test_classification_matrix() {
        use MergeAction::*;
        let cases = [
            // (split, head, other) -> action
            ((Some("s"), Some("s"), Some("s")), KeepHead),
            ((Some("s"), Some("s"), Some("b")), TakeOther),
            ((Some("s"), Some("h"), Some("s")), KeepHead),
            ((Some("s"), Some("x"), Some("x")), KeepHead),
            ((Some("s"), Some("h"), Some("b")), Conflict),
            ((Some("s"), Some("s"), None), Remove),
            ((Some("s"), Some("h"), None), Conflict),
            ((Some("s"), None, Some("s")), KeepHead),
            ((Some("s"), None, Some("b")), Conflict),
            ((None, None, Some("b")), TakeOther),
            ((None, Some("h"), None), KeepHead),
            ((None, Some("x"), Some("x")), KeepHead),
            ((None, Some("h"), Some("b")), Conflict),
            ((Some("s"), None, None), KeepHead),
        ];
        for ((s, h, b), expected) in cases {
            assert_eq!(decide(s, h, b), expected, "split={s:?} head={h:?} other={b:?}");
        }
    }

    #[test]
    fn test_classify_covers_union_sorted() {
        let (_dir, store) = setup();
        let blob = |n: &str, c: &str| (n.to_string(), store.put_blob(n, c.as_bytes()).unwrap());
        let split: FileMap = [blob("shared", "s")].into_iter().collect();
        let head: FileMap = [blob("shared", "s"), blob("mine", "m")].into_iter().collect();
        let other: FileMap = [blob("theirs", "t")].into_iter().collect();

        let decisions = classify(&store, &split, &head, &other).unwrap();
        let summary: Vec<(&str, MergeAction)> = decisions
            .iter()
            .map(|d| (d.name.as_str(), d.action))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("mine", MergeAction::KeepHead),
                ("shared", MergeAction::Remove),
                ("theirs", MergeAction::TakeOther),
            ]
        );
    }

    #[test]
    fn test_missing_other_blob_conflicts() {
        let (_dir, store) = setup();
        let split = side(&store, Some("s"));
        let head = side(&store, Some("h"));
        let mut other = FileMap::new();
        other.insert("f".to_string(), "f".repeat(64));

        let decisions = classify(&store, &split, &head, &other).unwrap();
        assert_eq!(decisions[0].action, MergeAction::Conflict);
    }

    #[test]
    fn test_conflict_text_layout() {
        let text = conflict_text(Some(b"mine\n"), Some(b"theirs\n"));
        assert_eq!(
            String::from_utf8(text).unwrap(),
            "<<<<<<< HEAD\nmine\n=======\ntheirs\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_conflict_text_missing_side_is_empty() {
        let text = conflict_text(Some(b"mine\n"), None);
        assert_eq!(
            String::from_utf8(text).unwrap(),
            "<<<<<<< HEAD\nmine\n=======\n>>>>>>>\n"
        );
        let text = conflict_text(None, Some(b"theirs\n"));
        assert_eq!(
            String::from_utf8(text).unwrap(),
            "<<<<<<< HEAD\n=======\ntheirs\n>>>>>>>\n"
        );
    }
}
