//! Which branches already hold an entry at a relative path.
//!
//! Checks use `lstat` only; entry contents are never read. Branch order is the
//! caller's priority order.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::path::join;

fn _lookup(branch: &Path, relative: &OsStr) -> Option<PathBuf> {
    let path_full = PathBuf::from(join(branch, relative));
    fs::symlink_metadata(&path_full).ok().map(|_| path_full)
}

/// `true` iff at least one branch has an entry at `relative`.
pub fn exists<B, R>(branches: &[B], relative: R) -> bool
where
    B: AsRef<Path>,
    R: AsRef<OsStr>,
{
    find_first(branches, relative).is_some()
}

/// Absolute path on the first branch (in order) holding `relative`.
pub fn find_first<B, R>(branches: &[B], relative: R) -> Option<PathBuf>
where
    B: AsRef<Path>,
    R: AsRef<OsStr>,
{
    let relative = relative.as_ref();
    branches
        .iter()
        .find_map(|branch| _lookup(branch.as_ref(), relative))
}

/// Absolute paths on every branch holding `relative`, in branch order.
pub fn find_all<B, R>(branches: &[B], relative: R) -> Vec<PathBuf>
where
    B: AsRef<Path>,
    R: AsRef<OsStr>,
{
    let relative = relative.as_ref();
    branches
        .iter()
        .filter_map(|branch| _lookup(branch.as_ref(), relative))
        .collect()
}
