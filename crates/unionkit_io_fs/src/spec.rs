//! Clone specification models and top-level error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Category of a failure (or non-failure) observed while cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumErrorCategory {
    /// The object to clone from does not exist.
    MissingSource,
    /// An entry exists but is not a directory.
    TypeMismatch,
    /// Target directory already existed at creation time.
    BenignRace,
    /// Flag ioctl or xattr calls are not supported by the filesystem.
    Unsupported,
    /// Any other syscall failure.
    Hard,
}

impl EnumErrorCategory {
    /// `true` for the categories that abort a clone.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::MissingSource | Self::TypeMismatch | Self::Hard)
    }
}

/// Syscall-level step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCloneOp {
    Stat,
    Mkdir,
    Chmod,
    Chown,
    ReadFsFlags,
    WriteFsFlags,
    ReadXattrs,
    WriteXattrs,
}

impl fmt::Display for EnumCloneOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_op = match self {
            Self::Stat => "stat",
            Self::Mkdir => "mkdir",
            Self::Chmod => "chmod",
            Self::Chown => "chown",
            Self::ReadFsFlags => "read filesystem flags of",
            Self::WriteFsFlags => "write filesystem flags to",
            Self::ReadXattrs => "read extended attributes of",
            Self::WriteXattrs => "write extended attributes to",
        };
        f.write_str(c_op)
    }
}

/// What a hard (not "unsupported") failure to read source flags or xattrs does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumAttrReadFailureMode {
    /// Fail the clone with the read error.
    Abort,
    /// Record a warning and copy nothing for that attribute kind.
    Degrade,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `clone_path_with_options`.
#[derive(Debug, Clone)]
pub struct SpecCloneOptions {
    /// Apply source uid/gid to every cloned directory.
    pub if_copy_ownership: bool,
    /// Copy the `FS_IOC_GETFLAGS` bitmask.
    pub if_copy_fs_flags: bool,
    /// Copy extended attributes.
    pub if_copy_xattrs: bool,
    /// Policy for hard failures while reading source flags/xattrs.
    pub rule_attr_read_failure: EnumAttrReadFailureMode,
}

impl Default for SpecCloneOptions {
    fn default() -> Self {
        Self {
            if_copy_ownership: true,
            if_copy_fs_flags: true,
            if_copy_xattrs: true,
            rule_attr_read_failure: EnumAttrReadFailureMode::Abort,
        }
    }
}

/// Fatal clone failure.
#[derive(Debug, thiserror::Error)]
pub enum ClonePathError {
    /// Source ancestor does not exist.
    #[error("Source directory is missing: {}", path.display())]
    SourceMissing {
        /// Absolute source path.
        path: PathBuf,
    },
    /// Source ancestor (or an existing target entry) is not a directory.
    #[error("Not a directory: {}", path.display())]
    NotDirectory {
        /// Offending absolute path.
        path: PathBuf,
    },
    /// Any other syscall failure.
    #[error("Failed to {op} {}: {source}", path.display())]
    Io {
        /// Failing step.
        op: EnumCloneOp,
        /// Path the step operated on.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl ClonePathError {
    pub(crate) fn io(op: EnumCloneOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Error category for the dispatch layer.
    pub fn category(&self) -> EnumErrorCategory {
        match self {
            Self::SourceMissing { .. } => EnumErrorCategory::MissingSource,
            Self::NotDirectory { .. } => EnumErrorCategory::TypeMismatch,
            Self::Io { .. } => EnumErrorCategory::Hard,
        }
    }

    /// Errno to hand back to the filesystem caller.
    pub fn raw_os_error(&self) -> i32 {
        match self {
            Self::SourceMissing { .. } => libc::ENOENT,
            Self::NotDirectory { .. } => libc::ENOTDIR,
            Self::Io { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// Path the failure refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::SourceMissing { path } | Self::NotDirectory { path } | Self::Io { path, .. } => {
                path
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
