//! Relative-path primitives shared by the cloner and the branch probe.
//!
//! Everything except [`is_empty`] is a pure byte operation on the path, so
//! names that are not valid UTF-8 pass through unchanged.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

use crate::util::is_dir_empty;

fn _trim_trailing_slashes(raw: &[u8]) -> &[u8] {
    let n_end = raw.iter().rposition(|v| *v != b'/').map_or(0, |n_idx| n_idx + 1);
    &raw[..n_end]
}

fn _trim_leading_slashes(raw: &[u8]) -> &[u8] {
    let n_start = raw.iter().position(|v| *v != b'/').unwrap_or(raw.len());
    &raw[n_start..]
}

/// Parent of `path`, computed on the bytes alone.
///
/// Trailing slashes are dropped, then the last segment, then the slashes
/// separating it from its parent. A single-segment path yields `""`.
///
/// ```
/// use unionkit_io_fs::path::dirname;
/// assert_eq!(dirname("/a/b/c/"), "/a/b");
/// assert_eq!(dirname("/a"), "");
/// assert_eq!(dirname("a"), "");
/// ```
pub fn dirname<S: AsRef<OsStr>>(path: S) -> OsString {
    let raw = _trim_trailing_slashes(path.as_ref().as_bytes());
    let n_end = raw.iter().rposition(|v| *v == b'/').unwrap_or(0);
    OsStr::from_bytes(_trim_trailing_slashes(&raw[..n_end])).to_os_string()
}

/// Bytes after the last slash; empty when `path` ends in a slash.
pub fn basename<S: AsRef<OsStr>>(path: S) -> OsString {
    let raw = path.as_ref().as_bytes();
    match raw.iter().rposition(|v| *v == b'/') {
        Some(n_idx) => OsStr::from_bytes(&raw[n_idx + 1..]).to_os_string(),
        None => path.as_ref().to_os_string(),
    }
}

/// Branch root and relative path joined by exactly one slash.
///
/// An empty relative path yields the branch root.
pub fn join<B, R>(branch: B, relative: R) -> OsString
where
    B: AsRef<OsStr>,
    R: AsRef<OsStr>,
{
    let raw_branch_full = branch.as_ref().as_bytes();
    let raw_branch = _trim_trailing_slashes(raw_branch_full);
    let raw_relative = _trim_leading_slashes(relative.as_ref().as_bytes());

    let mut raw_joined = Vec::with_capacity(raw_branch.len() + raw_relative.len() + 1);
    match (raw_branch.is_empty(), raw_relative.is_empty()) {
        (true, true) => raw_joined.push(b'/'),
        (true, false) => {
            if raw_branch_full.starts_with(b"/") {
                raw_joined.push(b'/');
            }
            raw_joined.extend_from_slice(raw_relative);
        }
        (false, true) => raw_joined.extend_from_slice(raw_branch),
        (false, false) => {
            raw_joined.extend_from_slice(raw_branch);
            raw_joined.push(b'/');
            raw_joined.extend_from_slice(raw_relative);
        }
    }
    OsString::from_vec(raw_joined)
}

/// `true` when `relative` names the branch root itself.
pub fn is_branch_root<S: AsRef<OsStr>>(relative: S) -> bool {
    relative.as_ref().as_bytes().iter().all(|v| *v == b'/')
}

/// Relative paths from the topmost ancestor down to `relative` itself.
pub(crate) fn ancestor_chain<S: AsRef<OsStr>>(relative: S) -> Vec<OsString> {
    let mut l_chain = Vec::new();
    let mut c_cursor = relative.as_ref().to_os_string();
    while !is_branch_root(&c_cursor) {
        let c_parent = dirname(&c_cursor);
        l_chain.push(c_cursor);
        c_cursor = c_parent;
    }
    l_chain.reverse();
    l_chain
}

/// `true` iff `path` is a directory holding nothing but `.` and `..`.
///
/// Returns `false` when the path cannot be opened as a directory, so "missing"
/// is never reported as "empty".
pub fn is_empty<P: AsRef<Path>>(path: P) -> bool {
    is_dir_empty(path.as_ref())
}
