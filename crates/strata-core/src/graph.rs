//! Commit graph traversal and split-point selection.
//!
//! The split point between HEAD and a branch tip is found in two passes:
//! a breadth-first walk from HEAD recording the shortest hop distance to
//! every ancestor, then a depth-first walk from the tip collecting its
//! ancestors (primary parent before merge parent). The split point is the
//! tip ancestor closest to HEAD; ties go to the one the tip walk reached
//! first.
//!
//! This picks the nearest common ancestor by distance from HEAD. For the
//! linear-plus-merge histories strata itself produces that is the merge
//! base, but it is not a general lowest-common-ancestor algorithm.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::commit::Commit;
use crate::error::StrataResult;

/// Anything that can load commits by full id.
pub trait CommitSource {
    fn load_commit(&self, id: &str) -> StrataResult<Commit>;
}

/// Shortest hop distance from `head` to each of its ancestors (itself at 0).
pub fn distance_map<S: CommitSource + ?Sized>(
    source: &S,
    head: &str,
) -> StrataResult<HashMap<String, usize>> {
    let mut distances = HashMap::new();
    let mut queue = VecDeque::new();
    distances.insert(head.to_string(), 0);
    queue.push_back(head.to_string());

    while let Some(id) = queue.pop_front() {
        let depth = distances[&id];
        let commit = source.load_commit(&id)?;
        for parent in commit.parents() {
            if !distances.contains_key(parent) {
                distances.insert(parent.to_string(), depth + 1);
                queue.push_back(parent.to_string());
            }
        }
    }

    Ok(distances)
}

/// Every commit reachable from `tip`, including `tip` itself, in
/// depth-first preorder with primary parents visited before merge parents.
pub fn ancestor_set<S: CommitSource + ?Sized>(
    source: &S,
    tip: &str,
) -> StrataResult<Vec<String>> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![tip.to_string()];

    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let commit = source.load_commit(&id)?;
        // Pushed in reverse so the primary parent is popped first.
        if let Some(merge_parent) = commit.merge_parent() {
            stack.push(merge_parent.to_string());
        }
        if let Some(parent) = commit.parent() {
            stack.push(parent.to_string());
        }
        order.push(id);
    }

    Ok(order)
}

/// The split point between `head` and `tip`.
///
/// Falls back to `tip` when the two share no ancestor.
pub fn split_point<S: CommitSource + ?Sized>(
    source: &S,
    head: &str,
    tip: &str,
) -> StrataResult<String> {
    let distances = distance_map(source, head)?;
    let ancestors = ancestor_set(source, tip)?;

    let mut best = tip.to_string();
    let mut best_distance = usize::MAX;
    for id in &ancestors {
        if let Some(&distance) = distances.get(id) {
            if distance < best_distance {
                best_distance = distance;
                best = id.clone();
            }
        }
    }
    Ok(best)
}
