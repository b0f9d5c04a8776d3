//! Recursive materialization of a directory chain on a target branch.

use std::ffi::{OsStr, OsString};
use std::fs::{self, DirBuilder, Metadata, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::attr::transfer_attributes;
use crate::path::{ancestor_chain, join};
use crate::report::{EnumDirOutcome, ReportClone, ReportCloneBuilder};
use crate::spec::{ClonePathError, EnumCloneOp, SpecCloneOptions};
use crate::util::is_not_a_directory;

#[derive(Debug)]
struct SpecCloneStep {
    c_relative: OsString,
    path_from: PathBuf,
    path_to: PathBuf,
    stat_from: Metadata,
}

/// Clone `relative` and all of its ancestors from `branch_source` onto
/// `branch_target`, with default [`SpecCloneOptions`].
pub fn clone_path<P, Q, R>(
    branch_source: P,
    branch_target: Q,
    relative: R,
) -> Result<ReportClone, ClonePathError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<OsStr>,
{
    clone_path_with_options(
        branch_source,
        branch_target,
        relative,
        &SpecCloneOptions::default(),
    )
}

/// Clone `relative` and all of its ancestors from `branch_source` onto
/// `branch_target`.
///
/// For every level, root first:
/// 1. `stat` the source; it must exist and be a directory.
/// 2. `mkdir` the target with the source permissions. An existing directory
///    is the expected outcome of a concurrent creator and is reconciled.
/// 3. `chmod`, then `chown` to the source owner.
/// 4. Copy xattrs and filesystem flags; "unsupported" is recorded, not fatal.
///
/// All source levels are checked before the first `mkdir`, so a missing or
/// non-directory source ancestor leaves the target untouched. A hard failure
/// part-way keeps the levels already materialized; calling again resumes and
/// converges them to the current source metadata.
pub fn clone_path_with_options<P, Q, R>(
    branch_source: P,
    branch_target: Q,
    relative: R,
    spec_clone_options: &SpecCloneOptions,
) -> Result<ReportClone, ClonePathError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<OsStr>,
{
    let branch_source = branch_source.as_ref();
    let branch_target = branch_target.as_ref();
    let l_steps = ancestor_chain(relative)
        .into_iter()
        .map(|c_relative| _stat_source_level(branch_source, branch_target, c_relative))
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder_clone_report = ReportCloneBuilder::default();
    for spec_step in l_steps {
        _clone_level(spec_step, spec_clone_options, &mut builder_clone_report)?;
    }
    Ok(builder_clone_report.build())
}

fn _stat_source_level(
    branch_source: &Path,
    branch_target: &Path,
    c_relative: OsString,
) -> Result<SpecCloneStep, ClonePathError> {
    let path_from = PathBuf::from(join(branch_source, &c_relative));
    let stat_from = match fs::metadata(&path_from) {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ClonePathError::SourceMissing { path: path_from });
        }
        Err(e) if is_not_a_directory(&e) => {
            return Err(ClonePathError::NotDirectory { path: path_from });
        }
        Err(e) => return Err(ClonePathError::io(EnumCloneOp::Stat, path_from, e)),
    };
    if !stat_from.is_dir() {
        return Err(ClonePathError::NotDirectory { path: path_from });
    }

    let path_to = PathBuf::from(join(branch_target, &c_relative));
    Ok(SpecCloneStep {
        c_relative,
        path_from,
        path_to,
        stat_from,
    })
}

fn _clone_level(
    spec_step: SpecCloneStep,
    spec_clone_options: &SpecCloneOptions,
    builder_clone_report: &mut ReportCloneBuilder,
) -> Result<(), ClonePathError> {
    let SpecCloneStep {
        c_relative,
        path_from,
        path_to,
        stat_from,
    } = spec_step;
    let n_mode = stat_from.mode() & 0o7777;

    let enum_dir_outcome = _create_directory(&path_to, n_mode)?;

    // mkdir is filtered through the umask; set the bits explicitly.
    fs::set_permissions(&path_to, Permissions::from_mode(n_mode))
        .map_err(|e| ClonePathError::io(EnumCloneOp::Chmod, &path_to, e))?;

    if spec_clone_options.if_copy_ownership {
        std::os::unix::fs::chown(&path_to, Some(stat_from.uid()), Some(stat_from.gid()))
            .map_err(|e| ClonePathError::io(EnumCloneOp::Chown, &path_to, e))?;
    }

    let report_attr = transfer_attributes(&path_from, &path_to, spec_clone_options);
    debug!(
        relative = %Path::new(&c_relative).display(),
        target = %path_to.display(),
        dir = ?enum_dir_outcome,
        xattrs = %report_attr.outcome_xattrs,
        fs_flags = %report_attr.outcome_fs_flags,
        "cloned directory level"
    );
    builder_clone_report.add_level(&c_relative, path_to, enum_dir_outcome, &report_attr);

    match report_attr.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn _create_directory(path_to: &Path, n_mode: u32) -> Result<EnumDirOutcome, ClonePathError> {
    match DirBuilder::new().mode(n_mode).create(path_to) {
        Ok(()) => Ok(EnumDirOutcome::Created),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let meta_to = fs::metadata(path_to)
                .map_err(|e| ClonePathError::io(EnumCloneOp::Stat, path_to, e))?;
            if !meta_to.is_dir() {
                return Err(ClonePathError::NotDirectory {
                    path: path_to.to_path_buf(),
                });
            }
            Ok(EnumDirOutcome::Reconciled)
        }
        Err(e) => Err(ClonePathError::io(EnumCloneOp::Mkdir, path_to, e)),
    }
}
