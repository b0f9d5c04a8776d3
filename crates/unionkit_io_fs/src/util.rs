use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use crate::spec::EnumErrorCategory;

////////////////////////////////////////////////////////////////////////////////
// #region ErrorClassification

/// Map a raw syscall error onto the clone error taxonomy.
///
/// Only the two non-fatal categories are derived from the errno alone;
/// missing-source and type-mismatch depend on which step failed, so callers
/// decide those themselves.
pub fn classify_io_error(error: &io::Error) -> EnumErrorCategory {
    if error.kind() == io::ErrorKind::AlreadyExists {
        return EnumErrorCategory::BenignRace;
    }
    if is_unsupported(error) {
        return EnumErrorCategory::Unsupported;
    }
    EnumErrorCategory::Hard
}

/// `true` when the filesystem does not implement the requested feature.
pub(crate) fn is_unsupported(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::Unsupported {
        return true;
    }
    match error.raw_os_error() {
        Some(n_errno) => {
            n_errno == libc::ENOTTY
                || n_errno == libc::ENOTSUP
                || n_errno == libc::EOPNOTSUPP
                || n_errno == libc::ENOSYS
        }
        None => false,
    }
}

pub(crate) fn is_not_a_directory(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ENOTDIR)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn unsupported_error() -> io::Error {
    io::Error::from_raw_os_error(libc::ENOTSUP)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Handles

/// Open a filesystem object for metadata work only.
///
/// `O_NONBLOCK` keeps FIFOs and device nodes from stalling the open.
pub(crate) fn open_metadata_handle(path: &Path) -> io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        OpenOptions::new().read(true).open(path)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Directories

/// `true` iff `path` is a directory with no entries besides `.` and `..`.
///
/// Unreadable or non-directory paths report `false`, never an error.
pub(crate) fn is_dir_empty(path: &Path) -> bool {
    let Ok(mut iter_entries) = fs::read_dir(path) else {
        return false;
    };
    iter_entries.next().is_none()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;

    use super::{classify_io_error, is_dir_empty, is_unsupported};
    use crate::spec::EnumErrorCategory;

    #[test]
    fn classify_io_error_separates_soft_categories() {
        let err_exists = io::Error::from_raw_os_error(libc::EEXIST);
        assert_eq!(classify_io_error(&err_exists), EnumErrorCategory::BenignRace);

        for n_errno in [libc::ENOTTY, libc::ENOTSUP, libc::EOPNOTSUPP, libc::ENOSYS] {
            let err = io::Error::from_raw_os_error(n_errno);
            assert_eq!(classify_io_error(&err), EnumErrorCategory::Unsupported);
            assert!(is_unsupported(&err));
        }

        for n_errno in [libc::EACCES, libc::EPERM, libc::ENOSPC, libc::ESTALE] {
            let err = io::Error::from_raw_os_error(n_errno);
            assert_eq!(classify_io_error(&err), EnumErrorCategory::Hard);
        }
    }

    #[test]
    fn is_dir_empty_distinguishes_missing_from_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(is_dir_empty(tmp.path()));

        std::fs::write(tmp.path().join(".hidden"), b"x").expect("write");
        assert!(!is_dir_empty(tmp.path()));

        assert!(!is_dir_empty(&tmp.path().join("missing")));
        assert!(!is_dir_empty(&tmp.path().join(".hidden")));
    }
}
