//! Cohort discovery and static work partitioning.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// List all `sub-*` directories directly under the input root, sorted
/// lexicographically. Non-directories and non-subject entries are ignored.
pub fn discover_subjects(root: &Path) -> Result<Vec<PathBuf>> {
    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("sub-") {
            subjects.push(path);
        }
    }
    subjects.sort();
    Ok(subjects)
}

/// Split a list into `n` contiguous, near-equal shards covering it exactly
/// once. When the length is not divisible by `n`, the first `len % n` shards
/// absorb one extra element each. Shards may be empty when there are fewer
/// items than workers.
pub fn split_shards<T: Clone>(list: &[T], n: usize) -> Vec<Vec<T>> {
    assert!(n >= 1, "worker count must be at least 1");
    let base = list.len() / n;
    let remainder = list.len() % n;
    let mut shards = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let size = base + usize::from(i < remainder);
        shards.push(list[start..start + size].to_vec());
        start += size;
    }
    shards
}
