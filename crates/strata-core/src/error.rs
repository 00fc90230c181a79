//! Error types for strata operations.

use std::fmt;
use std::io;

/// All possible strata errors.
///
/// Every variant is a distinct failure kind so the CLI can render the
/// matching message without string matching.
#[derive(Debug)]
pub enum StrataError {
    /// The directory is not a strata repository.
    NotARepo,
    /// A strata repository already exists here.
    AlreadyExists,
    /// An I/O error occurred.
    Io(io::Error),
    /// JSON serialization/deserialization failed.
    Json(serde_json::Error),
    /// A blob with the given id was not found.
    ObjectNotFound(String),
    /// A branch with this name already exists.
    BranchExists(String),
    /// No branch with this name exists.
    NoSuchBranch(String),
    /// The active branch cannot be deleted.
    CannotDeleteCurrentBranch(String),
    /// Checkout of the branch that is already active.
    AlreadyOnBranch(String),
    /// HEAD does not track the named file.
    FileNotTracked(String),
    /// The given commit does not contain the named file.
    FileNotInCommit(String),
    /// The named file does not exist in the working tree.
    FileNotFound(String),
    /// File names must be plain names inside the working tree.
    InvalidFileName(String),
    /// `rm` on a file that is neither staged nor tracked.
    NothingToRemove(String),
    /// Nothing is staged for commit.
    NoChanges,
    /// Commit message is empty.
    EmptyMessage,
    /// Merge requested while the staging area is not empty.
    UncommittedChanges,
    /// Merge of the active branch into itself.
    SelfMerge,
    /// The given branch is already an ancestor of HEAD.
    AlreadyAncestor(String),
    /// An untracked working file would be overwritten.
    UntrackedFileConflict(String),
    /// No commit matches the given id or prefix.
    NoSuchCommit(String),
    /// A short id matches more than one commit.
    AmbiguousPrefix { prefix: String, matches: usize },
    /// A stored commit does not hash to its own id.
    CorruptCommit(String),
    /// Could not acquire the repository lock within the timeout.
    LockTimeout,
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrataError::NotARepo => write!(f, "not a strata repository (missing .strata/)"),
            StrataError::AlreadyExists => {
                write!(f, "a strata repository already exists in this directory")
            }
            StrataError::Io(e) => write!(f, "I/O error: {e}"),
            StrataError::Json(e) => write!(f, "JSON error: {e}"),
            StrataError::ObjectNotFound(id) => write!(f, "object not found: {id}"),
            StrataError::BranchExists(name) => {
                write!(f, "a branch named '{name}' already exists")
            }
            StrataError::NoSuchBranch(name) => write!(f, "no branch named '{name}'"),
            StrataError::CannotDeleteCurrentBranch(name) => {
                write!(f, "cannot remove the current branch '{name}'")
            }
            StrataError::AlreadyOnBranch(name) => write!(f, "already on branch '{name}'"),
            StrataError::FileNotTracked(name) => write!(f, "'{name}' is not tracked by HEAD"),
            StrataError::FileNotInCommit(name) => {
                write!(f, "file '{name}' does not exist in that commit")
            }
            StrataError::FileNotFound(name) => write!(f, "file '{name}' does not exist"),
            StrataError::InvalidFileName(name) => write!(f, "invalid file name: '{name}'"),
            StrataError::NothingToRemove(name) => {
                write!(f, "no reason to remove '{name}': neither staged nor tracked")
            }
            StrataError::NoChanges => write!(f, "no changes added to the commit"),
            StrataError::EmptyMessage => write!(f, "please enter a commit message"),
            StrataError::UncommittedChanges => write!(f, "you have uncommitted changes"),
            StrataError::SelfMerge => write!(f, "cannot merge a branch with itself"),
            StrataError::AlreadyAncestor(name) => {
                write!(f, "branch '{name}' is an ancestor of the current branch")
            }
            StrataError::UntrackedFileConflict(name) => write!(
                f,
                "untracked file '{name}' is in the way; delete it or add it first"
            ),
            StrataError::NoSuchCommit(id) => write!(f, "no commit with id '{id}' exists"),
            StrataError::AmbiguousPrefix { prefix, matches } => {
                write!(f, "ambiguous commit id '{prefix}' matches {matches} commits")
            }
            StrataError::CorruptCommit(id) => {
                write!(f, "commit {id} does not match its content hash")
            }
            StrataError::LockTimeout => {
                write!(f, "could not acquire repository lock within timeout")
            }
        }
    }
}

impl std::error::Error for StrataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StrataError::Io(e) => Some(e),
            StrataError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StrataError {
    fn from(e: io::Error) -> Self {
        StrataError::Io(e)
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(e: serde_json::Error) -> Self {
        StrataError::Json(e)
    }
}

/// Convenience alias for Results in strata.
pub type StrataResult<T> = Result<T, StrataError>;
