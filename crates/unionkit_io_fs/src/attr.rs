//! Metadata transfer between two existing filesystem objects.
//!
//! Two independent best-effort sub-transfers:
//! - filesystem flags (`FS_IOC_GETFLAGS` / `FS_IOC_SETFLAGS`),
//! - extended attributes, written through one descriptor per target.
//!
//! Nothing here creates or removes the target object.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::{debug, warn};
use xattr::FileExt;

use crate::report::{EnumTransferOutcome, ReportAttrTransfer};
use crate::spec::{ClonePathError, EnumAttrReadFailureMode, EnumCloneOp, SpecCloneOptions};
use crate::util::{is_unsupported, open_metadata_handle};

/// Filesystem flag bitmask as exchanged with the flag ioctls.
pub type TypeFsFlags = libc::c_int;

/// Extended attributes keyed by name; values are raw bytes.
pub type TypeXattrMap = BTreeMap<OsString, Vec<u8>>;

////////////////////////////////////////////////////////////////////////////////
// #region Snapshot

/// Directory metadata read from the live filesystem.
///
/// `fs_flags` / `xattrs` are `None` when the filesystem does not support them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDirMetadata {
    /// Full `st_mode` (type and permission bits).
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub fs_flags: Option<TypeFsFlags>,
    pub xattrs: Option<TypeXattrMap>,
}

impl SpecDirMetadata {
    /// Read a fresh snapshot of `path` (symlinks are followed).
    pub fn capture<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let stat = fs::metadata(path)?;
        Ok(Self {
            mode: stat.mode(),
            uid: stat.uid(),
            gid: stat.gid(),
            fs_flags: _none_if_unsupported(get_fs_flags(path))?,
            xattrs: _none_if_unsupported(get_xattrs(path))?,
        })
    }

    /// Permission bits including setuid/setgid/sticky.
    pub fn permission_bits(&self) -> u32 {
        self.mode & 0o7777
    }
}

fn _none_if_unsupported<T>(res: io::Result<T>) -> io::Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if is_unsupported(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FsFlags

/// Read the flag bitmask of `path`.
#[cfg(target_os = "linux")]
pub fn get_fs_flags<P: AsRef<Path>>(path: P) -> io::Result<TypeFsFlags> {
    use std::os::fd::AsRawFd;

    let file = open_metadata_handle(path.as_ref())?;
    let mut flags: TypeFsFlags = 0;
    // SAFETY: the descriptor is open for the whole call and the kernel writes
    // exactly one int through the pointer.
    let rv = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            libc::FS_IOC_GETFLAGS,
            &mut flags as *mut TypeFsFlags,
        )
    };
    if rv == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags)
}

/// Write the flag bitmask of `path`.
#[cfg(target_os = "linux")]
pub fn set_fs_flags<P: AsRef<Path>>(path: P, flags: TypeFsFlags) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let file = open_metadata_handle(path.as_ref())?;
    // SAFETY: as above; the kernel only reads one int.
    let rv = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            libc::FS_IOC_SETFLAGS,
            &flags as *const TypeFsFlags,
        )
    };
    if rv == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn get_fs_flags<P: AsRef<Path>>(_path: P) -> io::Result<TypeFsFlags> {
    Err(crate::util::unsupported_error())
}

#[cfg(not(target_os = "linux"))]
pub fn set_fs_flags<P: AsRef<Path>>(_path: P, _flags: TypeFsFlags) -> io::Result<()> {
    Err(crate::util::unsupported_error())
}

/// Copy the flag bitmask from `from` to `to`.
pub fn copy_fs_flags<P, Q>(from: P, to: Q) -> io::Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let flags = get_fs_flags(from)?;
    set_fs_flags(to, flags)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Xattrs

/// Names of all extended attributes on `path`.
///
/// The `xattr` crate sizes the buffer first and re-lists on `ERANGE`, so an
/// attribute added mid-call grows the buffer instead of truncating the list.
pub fn list_xattrs<P: AsRef<Path>>(path: P) -> io::Result<Vec<OsString>> {
    Ok(xattr::list(path)?.collect())
}

/// Value of one extended attribute, `None` when it does not exist.
pub fn get_xattr<P, N>(path: P, name: N) -> io::Result<Option<Vec<u8>>>
where
    P: AsRef<Path>,
    N: AsRef<OsStr>,
{
    xattr::get(path, name)
}

/// All extended attributes on `path`.
///
/// Only a failed listing is an error. A name whose value cannot be read
/// (removed since listing, denied, I/O error) is skipped.
pub fn get_xattrs<P: AsRef<Path>>(path: P) -> io::Result<TypeXattrMap> {
    let path = path.as_ref();
    let l_names = list_xattrs(path)?;
    Ok(_collect_xattrs(path, l_names, |name| xattr::get(path, name)))
}

fn _collect_xattrs<I, F>(path: &Path, l_names: I, mut read_value: F) -> TypeXattrMap
where
    I: IntoIterator<Item = OsString>,
    F: FnMut(&OsStr) -> io::Result<Option<Vec<u8>>>,
{
    let mut dict_xattrs = BTreeMap::new();
    for name in l_names {
        match read_value(&name) {
            Ok(Some(raw_value)) => {
                dict_xattrs.insert(name, raw_value);
            }
            Ok(None) => continue,
            Err(e) => {
                debug!(
                    path = %path.display(),
                    name = ?name,
                    error = %e,
                    "skipping unreadable xattr"
                );
            }
        }
    }
    dict_xattrs
}

/// Set one extended attribute on `path`.
pub fn set_xattr<P, N>(path: P, name: N, value: &[u8]) -> io::Result<()>
where
    P: AsRef<Path>,
    N: AsRef<OsStr>,
{
    xattr::set(path, name, value)
}

/// Write every pair of `dict_xattrs` to `path` through one descriptor.
///
/// Each write is attempted regardless of earlier failures. Returns the number
/// applied, or the last hard error. When nothing could be applied because the
/// filesystem rejects xattrs, the error is an "unsupported" one.
pub fn set_xattrs<P: AsRef<Path>>(path: P, dict_xattrs: &TypeXattrMap) -> io::Result<usize> {
    let file = open_metadata_handle(path.as_ref())?;
    let mut n_applied = 0;
    let mut err_unsupported: Option<io::Error> = None;
    let mut err_hard_last: Option<io::Error> = None;

    for (name, raw_value) in dict_xattrs {
        match file.set_xattr(name, raw_value) {
            Ok(()) => n_applied += 1,
            Err(e) if is_unsupported(&e) => {
                debug!(path = %path.as_ref().display(), name = ?name, "xattr not supported");
                err_unsupported = Some(e);
            }
            Err(e) => err_hard_last = Some(e),
        }
    }

    if let Some(e) = err_hard_last {
        return Err(e);
    }
    match err_unsupported {
        Some(e) if n_applied == 0 => Err(e),
        _ => Ok(n_applied),
    }
}

/// Copy every extended attribute from `from` to `to`.
pub fn copy_xattrs<P, Q>(from: P, to: Q) -> io::Result<usize>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let dict_xattrs = get_xattrs(from)?;
    set_xattrs(to, &dict_xattrs)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Transfer

/// Copy xattrs, then flags, from `path_from` to `path_to`.
///
/// Flags go last so an immutable or append-only bit cannot block the xattr
/// writes. Both sub-transfers are always attempted; hard failures land in
/// [`ReportAttrTransfer::errors`] instead of short-circuiting.
pub fn transfer_attributes(
    path_from: &Path,
    path_to: &Path,
    spec_clone_options: &SpecCloneOptions,
) -> ReportAttrTransfer {
    let mut report_attr = ReportAttrTransfer::default();
    let rule_read_failure = spec_clone_options.rule_attr_read_failure;

    if spec_clone_options.if_copy_xattrs {
        report_attr.outcome_xattrs = match get_xattrs(path_from) {
            Ok(dict_xattrs) => match set_xattrs(path_to, &dict_xattrs) {
                Ok(n_applied) => {
                    report_attr.cnt_xattrs = n_applied;
                    EnumTransferOutcome::Applied
                }
                Err(e) => _on_write_failure(EnumCloneOp::WriteXattrs, path_to, e, &mut report_attr),
            },
            Err(e) => _on_read_failure(
                EnumCloneOp::ReadXattrs,
                path_from,
                e,
                rule_read_failure,
                &mut report_attr,
            ),
        };
    }

    if spec_clone_options.if_copy_fs_flags {
        report_attr.outcome_fs_flags = match get_fs_flags(path_from) {
            Ok(flags) => match set_fs_flags(path_to, flags) {
                Ok(()) => EnumTransferOutcome::Applied,
                Err(e) => _on_write_failure(EnumCloneOp::WriteFsFlags, path_to, e, &mut report_attr),
            },
            Err(e) => _on_read_failure(
                EnumCloneOp::ReadFsFlags,
                path_from,
                e,
                rule_read_failure,
                &mut report_attr,
            ),
        };
    }

    report_attr
}

fn _on_read_failure(
    op: EnumCloneOp,
    path: &Path,
    error: io::Error,
    rule_read_failure: EnumAttrReadFailureMode,
    report_attr: &mut ReportAttrTransfer,
) -> EnumTransferOutcome {
    if is_unsupported(&error) {
        debug!(path = %path.display(), %op, "attribute kind not supported on source");
        return EnumTransferOutcome::Unsupported;
    }
    match rule_read_failure {
        EnumAttrReadFailureMode::Abort => {
            report_attr.errors.push(ClonePathError::io(op, path, error));
            EnumTransferOutcome::Failed
        }
        EnumAttrReadFailureMode::Degrade => {
            let c_warning = format!(
                "Failed to {op} {} ({error}); continuing without it",
                path.display()
            );
            warn!("{c_warning}");
            report_attr.warnings.push(c_warning);
            EnumTransferOutcome::Degraded
        }
    }
}

fn _on_write_failure(
    op: EnumCloneOp,
    path: &Path,
    error: io::Error,
    report_attr: &mut ReportAttrTransfer,
) -> EnumTransferOutcome {
    if is_unsupported(&error) {
        debug!(path = %path.display(), %op, "attribute kind not supported on target");
        return EnumTransferOutcome::Unsupported;
    }
    report_attr.errors.push(ClonePathError::io(op, path, error));
    EnumTransferOutcome::Failed
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::ffi::OsString;
    use std::path::Path;

    use super::{
        SpecDirMetadata, TypeXattrMap, _collect_xattrs, copy_fs_flags, copy_xattrs, get_fs_flags,
        get_xattr, get_xattrs, list_xattrs, set_xattr, set_xattrs, transfer_attributes,
    };
    use crate::report::EnumTransferOutcome;
    use crate::spec::{EnumAttrReadFailureMode, EnumCloneOp, SpecCloneOptions};
    use crate::util::is_unsupported;

    fn has_user_xattrs(path: &Path) -> bool {
        set_xattr(path, "user.unionkit_probe", b"1").is_ok()
    }

    fn make_dirs() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir(&src).expect("mkdir src");
        std::fs::create_dir(&dst).expect("mkdir dst");
        (tmp, src, dst)
    }

    #[test]
    fn copy_xattrs_keeps_binary_values_byte_for_byte() {
        let (_tmp, src, dst) = make_dirs();
        if !has_user_xattrs(&src) {
            return;
        }
        set_xattr(&src, "user.a", b"1").expect("set a");
        set_xattr(&src, "user.b", b"\x00\xff").expect("set b");

        let n_applied = copy_xattrs(&src, &dst).expect("copy xattrs");
        assert!(n_applied >= 3);

        assert_eq!(get_xattr(&dst, "user.a").expect("get a"), Some(b"1".to_vec()));
        assert_eq!(
            get_xattr(&dst, "user.b").expect("get b"),
            Some(b"\x00\xff".to_vec())
        );

        let dict_src = get_xattrs(&src).expect("src xattrs");
        let dict_dst = get_xattrs(&dst).expect("dst xattrs");
        for (name, raw_value) in &dict_src {
            assert_eq!(dict_dst.get(name), Some(raw_value));
        }

        let l_names = list_xattrs(&dst).expect("list");
        assert!(l_names.contains(&OsString::from("user.b")));
    }

    #[test]
    fn get_xattr_reports_absent_attribute_as_none() {
        let (_tmp, src, _dst) = make_dirs();
        if !has_user_xattrs(&src) {
            return;
        }
        assert_eq!(get_xattr(&src, "user.never_set").expect("get"), None);
    }

    #[test]
    fn collect_xattrs_skips_names_that_fail_to_read() {
        let l_names = vec![
            OsString::from("user.a"),
            OsString::from("security.denied"),
            OsString::from("user.gone"),
            OsString::from("user.b"),
        ];
        let dict_xattrs = _collect_xattrs(Path::new("/src"), l_names, |name| {
            match name.to_str() {
                Some("security.denied") => Err(std::io::Error::from_raw_os_error(libc::EACCES)),
                Some("user.gone") => Ok(None),
                _ => Ok(Some(name.len().to_le_bytes().to_vec())),
            }
        });

        assert_eq!(
            dict_xattrs.keys().cloned().collect::<Vec<_>>(),
            vec![OsString::from("user.a"), OsString::from("user.b")]
        );
        assert_eq!(
            dict_xattrs[&OsString::from("user.a")],
            "user.a".len().to_le_bytes().to_vec()
        );
    }

    #[test]
    fn set_xattrs_with_empty_map_applies_nothing() {
        let (_tmp, _src, dst) = make_dirs();
        let dict_xattrs: TypeXattrMap = BTreeMap::new();
        assert_eq!(set_xattrs(&dst, &dict_xattrs).expect("set"), 0);
    }

    #[test]
    fn set_xattrs_on_missing_target_is_a_hard_error() {
        let (tmp, _src, _dst) = make_dirs();
        let mut dict_xattrs: TypeXattrMap = BTreeMap::new();
        dict_xattrs.insert(OsString::from("user.a"), b"1".to_vec());
        let err = set_xattrs(tmp.path().join("missing"), &dict_xattrs).expect_err("missing");
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn copy_fs_flags_succeeds_or_reports_unsupported() {
        let (_tmp, src, dst) = make_dirs();
        match copy_fs_flags(&src, &dst) {
            Ok(()) => {
                assert_eq!(
                    get_fs_flags(&src).expect("src flags"),
                    get_fs_flags(&dst).expect("dst flags")
                );
            }
            Err(e) => assert!(is_unsupported(&e), "unexpected flag error: {e}"),
        }
    }

    #[test]
    fn transfer_attributes_never_fails_on_plain_directories() {
        let (_tmp, src, dst) = make_dirs();
        let report_attr = transfer_attributes(&src, &dst, &SpecCloneOptions::default());
        assert!(report_attr.is_ok(), "errors: {:?}", report_attr.errors);
        assert!(matches!(
            report_attr.outcome_fs_flags,
            EnumTransferOutcome::Applied | EnumTransferOutcome::Unsupported
        ));
        assert!(matches!(
            report_attr.outcome_xattrs,
            EnumTransferOutcome::Applied | EnumTransferOutcome::Unsupported
        ));
    }

    #[test]
    fn flags_on_procfs_are_unsupported_and_soft() {
        let path_proc_sys = Path::new("/proc/sys");
        if !path_proc_sys.is_dir() {
            return;
        }
        let (_tmp, _src, dst) = make_dirs();

        let err = copy_fs_flags(path_proc_sys, &dst).expect_err("procfs flags");
        assert!(is_unsupported(&err), "unexpected flag error: {err}");

        let spec_clone_options = SpecCloneOptions {
            if_copy_xattrs: false,
            ..SpecCloneOptions::default()
        };
        let report_attr = transfer_attributes(path_proc_sys, &dst, &spec_clone_options);
        assert!(report_attr.is_ok(), "errors: {:?}", report_attr.errors);
        assert_eq!(report_attr.outcome_fs_flags, EnumTransferOutcome::Unsupported);
        assert_eq!(report_attr.unsupported_count(), 1);
        assert!(report_attr.warnings.is_empty());
    }

    #[test]
    fn transfer_attributes_honors_disabled_sub_steps() {
        let (_tmp, src, dst) = make_dirs();
        let spec_clone_options = SpecCloneOptions {
            if_copy_fs_flags: false,
            if_copy_xattrs: false,
            ..SpecCloneOptions::default()
        };
        let report_attr = transfer_attributes(&src, &dst, &spec_clone_options);
        assert_eq!(report_attr.outcome_fs_flags, EnumTransferOutcome::Disabled);
        assert_eq!(report_attr.outcome_xattrs, EnumTransferOutcome::Disabled);
        assert_eq!(report_attr.unsupported_count(), 0);
    }

    #[test]
    fn transfer_attributes_read_failure_follows_policy() {
        let (tmp, _src, dst) = make_dirs();
        let path_missing = tmp.path().join("missing");

        let report_abort = transfer_attributes(&path_missing, &dst, &SpecCloneOptions::default());
        assert_eq!(report_abort.outcome_xattrs, EnumTransferOutcome::Failed);
        assert_eq!(report_abort.outcome_fs_flags, EnumTransferOutcome::Failed);
        assert_eq!(report_abort.errors.len(), 2);
        assert!(matches!(
            report_abort.errors[0],
            crate::spec::ClonePathError::Io {
                op: EnumCloneOp::ReadXattrs,
                ..
            }
        ));

        let spec_clone_options = SpecCloneOptions {
            rule_attr_read_failure: EnumAttrReadFailureMode::Degrade,
            ..SpecCloneOptions::default()
        };
        let report_degrade = transfer_attributes(&path_missing, &dst, &spec_clone_options);
        assert!(report_degrade.is_ok());
        assert_eq!(report_degrade.outcome_xattrs, EnumTransferOutcome::Degraded);
        assert_eq!(report_degrade.outcome_fs_flags, EnumTransferOutcome::Degraded);
        assert_eq!(report_degrade.warnings.len(), 2);
    }

    #[test]
    fn capture_reads_mode_and_owner() {
        use std::os::unix::fs::{MetadataExt, PermissionsExt};

        let (_tmp, src, _dst) = make_dirs();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o750)).expect("chmod");
        let spec_meta = SpecDirMetadata::capture(&src).expect("capture");
        let stat = std::fs::metadata(&src).expect("stat");

        assert_eq!(spec_meta.permission_bits(), 0o750);
        assert_eq!(spec_meta.mode & libc::S_IFMT, libc::S_IFDIR);
        assert_eq!(spec_meta.uid, stat.uid());
        assert_eq!(spec_meta.gid, stat.gid());
        assert!(SpecDirMetadata::capture(src.join("missing")).is_err());
    }
}
