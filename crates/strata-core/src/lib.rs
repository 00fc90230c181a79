//! strata-core: a small local version control system.
//!
//! Snapshots of a flat working directory are stored as content-addressed
//! **commits** over **blobs**. Branches are named pointers into the commit
//! graph, changes pass through a **staging index**, and branches are
//! combined with a whole-file three-way merge.

pub mod commit;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod graph;
pub mod hash;
pub mod index;
pub mod lock;
pub mod merge;
pub mod object;
pub mod refs;
pub mod repo;
pub mod state;
pub mod storage;
pub mod worktree;

pub use error::{StrataError, StrataResult};
pub use repo::Repository;
