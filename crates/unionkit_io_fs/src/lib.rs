//! `unionkit_io_fs` v1:
//! Cross-branch directory cloning for union filesystems.
//!
//! Before a file or directory can be created on a target branch, its parent
//! chain must exist there with the same metadata as on the branch it is read
//! from. This crate provides that step and the primitives around it:
//! - `path`   : relative-path primitives (`dirname`, `basename`, `join`)
//! - `attr`   : flag and xattr transfer, metadata snapshots
//! - `probe`  : which branches hold a relative path
//! - `clone`  : recursive ancestor materialization
//! - `spec`   : enums/options/errors
//! - `report` : clone report model
//!
//! Unix only.

pub mod attr;
pub mod clone;
pub mod path;
pub mod probe;
pub mod report;
pub mod spec;
mod util;

pub use attr::{
    SpecDirMetadata, TypeFsFlags, TypeXattrMap, copy_fs_flags, copy_xattrs, get_fs_flags,
    get_xattr, get_xattrs, list_xattrs, set_fs_flags, set_xattr, set_xattrs, transfer_attributes,
};
pub use clone::{clone_path, clone_path_with_options};
pub use path::{basename, dirname, is_empty, join};
pub use probe::{exists, find_all, find_first};
pub use report::{
    EnumDirOutcome, EnumTransferOutcome, ReportAttrTransfer, ReportClone, ReportCloneBuilder,
    SpecCloneLevel,
};
pub use spec::{
    ClonePathError, EnumAttrReadFailureMode, EnumCloneOp, EnumErrorCategory, SpecCloneOptions,
};
pub use util::classify_io_error;
