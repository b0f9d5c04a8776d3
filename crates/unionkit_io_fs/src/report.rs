//! Clone report models and mutable report builder.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

use crate::spec::ClonePathError;

/// How the target directory came to exist at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumDirOutcome {
    /// `mkdir` succeeded.
    Created,
    /// A directory was already there; permissions were reconciled.
    Reconciled,
}

/// Result of one best-effort attribute sub-transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTransferOutcome {
    /// Copied to the target.
    Applied,
    /// The filesystem does not support this attribute kind.
    Unsupported,
    /// Turned off in `SpecCloneOptions`.
    Disabled,
    /// Source read failed and the options asked to carry on without it.
    Degraded,
    /// Hard failure; the error is held in [`ReportAttrTransfer::errors`].
    Failed,
}

impl EnumTransferOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unsupported => "unsupported",
            Self::Disabled => "disabled",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EnumTransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one flag + xattr transfer between two directories.
#[derive(Debug)]
pub struct ReportAttrTransfer {
    /// Flag bitmask sub-transfer.
    pub outcome_fs_flags: EnumTransferOutcome,
    /// Extended-attribute sub-transfer.
    pub outcome_xattrs: EnumTransferOutcome,
    /// Number of xattrs written to the target.
    pub cnt_xattrs: usize,
    /// Non-fatal notes (degraded reads).
    pub warnings: Vec<String>,
    /// Hard failures, in the order they happened.
    pub errors: Vec<ClonePathError>,
}

impl Default for ReportAttrTransfer {
    fn default() -> Self {
        Self {
            outcome_fs_flags: EnumTransferOutcome::Disabled,
            outcome_xattrs: EnumTransferOutcome::Disabled,
            cnt_xattrs: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl ReportAttrTransfer {
    /// `true` when neither sub-transfer hit a hard failure.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of sub-transfers skipped as unsupported.
    pub fn unsupported_count(&self) -> u64 {
        [self.outcome_fs_flags, self.outcome_xattrs]
            .into_iter()
            .filter(|v| *v == EnumTransferOutcome::Unsupported)
            .count() as u64
    }
}

/// Record for one materialized directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCloneLevel {
    /// Relative path of this level.
    pub path_relative: OsString,
    /// Absolute target path.
    pub path_target: PathBuf,
    /// Whether the directory was created or already present.
    pub enum_dir_outcome: EnumDirOutcome,
    /// Flag sub-transfer outcome.
    pub outcome_fs_flags: EnumTransferOutcome,
    /// Xattr sub-transfer outcome.
    pub outcome_xattrs: EnumTransferOutcome,
    /// Number of xattrs written.
    pub cnt_xattrs: usize,
}

/// Aggregate counters and per-level records for one `clone_path` run.
#[derive(Debug, Default, Clone)]
pub struct ReportClone {
    /// Number of directory levels processed.
    pub cnt_levels: u64,
    /// Levels whose target directory was created by this call.
    pub cnt_created: u64,
    /// Levels whose target directory already existed.
    pub cnt_reconciled: u64,
    /// Attribute sub-transfers skipped as unsupported.
    pub cnt_unsupported: u64,
    /// Root-first level records.
    pub levels: Vec<SpecCloneLevel>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportClone {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_levels".to_string(), self.cnt_levels);
        dict_counts.insert("cnt_created".to_string(), self.cnt_created);
        dict_counts.insert("cnt_reconciled".to_string(), self.cnt_reconciled);
        dict_counts.insert("cnt_unsupported".to_string(), self.cnt_unsupported);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} levels={} created={} reconciled={} unsupported={} warnings={}",
            self.cnt_levels,
            self.cnt_created,
            self.cnt_reconciled,
            self.cnt_unsupported,
            self.warning_count()
        )
    }
}

impl fmt::Display for ReportClone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[CLONE]"))
    }
}

/// Mutable accumulator for clone statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportCloneBuilder {
    levels: Vec<SpecCloneLevel>,
    warnings: Vec<String>,
    cnt_unsupported: u64,
}

impl ReportCloneBuilder {
    /// Record one finished level together with its attribute outcomes.
    pub fn add_level(
        &mut self,
        path_relative: &OsStr,
        path_target: PathBuf,
        enum_dir_outcome: EnumDirOutcome,
        report_attr: &ReportAttrTransfer,
    ) {
        self.cnt_unsupported += report_attr.unsupported_count();
        self.warnings.extend(report_attr.warnings.iter().cloned());
        self.levels.push(SpecCloneLevel {
            path_relative: path_relative.to_os_string(),
            path_target,
            enum_dir_outcome,
            outcome_fs_flags: report_attr.outcome_fs_flags,
            outcome_xattrs: report_attr.outcome_xattrs,
            cnt_xattrs: report_attr.cnt_xattrs,
        });
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportClone {
        let cnt_created = self
            .levels
            .iter()
            .filter(|v| v.enum_dir_outcome == EnumDirOutcome::Created)
            .count() as u64;
        ReportClone {
            cnt_levels: self.levels.len() as u64,
            cnt_created,
            cnt_reconciled: self.levels.len() as u64 - cnt_created,
            cnt_unsupported: self.cnt_unsupported,
            levels: self.levels,
            warnings: self.warnings,
        }
    }
}
