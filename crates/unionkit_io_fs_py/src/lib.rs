use std::collections::BTreeMap;

use pyo3::exceptions::{PyFileNotFoundError, PyNotADirectoryError, PyOSError, PyValueError};
use pyo3::prelude::*;
use unionkit_io_fs::{
    ClonePathError, EnumAttrReadFailureMode, ReportClone, SpecCloneLevel, SpecCloneOptions,
};
use unionkit_log::{EnumLogFormat, SpecLogOptions, parse_level};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "unionkit.fs.clone_path.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SpecCloneLevel")]
#[derive(Debug, Clone)]
struct PySpecCloneLevel {
    #[pyo3(get)]
    path_relative: String,
    #[pyo3(get)]
    path_target: String,
    #[pyo3(get)]
    dir_outcome: String,
    #[pyo3(get)]
    outcome_fs_flags: String,
    #[pyo3(get)]
    outcome_xattrs: String,
    #[pyo3(get)]
    cnt_xattrs: usize,
}

impl From<SpecCloneLevel> for PySpecCloneLevel {
    fn from(spec_level: SpecCloneLevel) -> Self {
        Self {
            path_relative: spec_level.path_relative.to_string_lossy().to_string(),
            path_target: spec_level.path_target.to_string_lossy().to_string(),
            dir_outcome: format!("{:?}", spec_level.enum_dir_outcome).to_lowercase(),
            outcome_fs_flags: spec_level.outcome_fs_flags.to_string(),
            outcome_xattrs: spec_level.outcome_xattrs.to_string(),
            cnt_xattrs: spec_level.cnt_xattrs,
        }
    }
}

#[pyclass(name = "ReportClone")]
#[derive(Debug, Clone)]
struct PyReportClone {
    #[pyo3(get)]
    cnt_levels: u64,
    #[pyo3(get)]
    cnt_created: u64,
    #[pyo3(get)]
    cnt_reconciled: u64,
    #[pyo3(get)]
    cnt_unsupported: u64,
    #[pyo3(get)]
    levels: Vec<PySpecCloneLevel>,
    #[pyo3(get)]
    warnings: Vec<String>,
}

impl From<ReportClone> for PyReportClone {
    fn from(report_clone: ReportClone) -> Self {
        Self {
            cnt_levels: report_clone.cnt_levels,
            cnt_created: report_clone.cnt_created,
            cnt_reconciled: report_clone.cnt_reconciled,
            cnt_unsupported: report_clone.cnt_unsupported,
            levels: report_clone
                .levels
                .into_iter()
                .map(PySpecCloneLevel::from)
                .collect(),
            warnings: report_clone.warnings,
        }
    }
}

#[pymethods]
impl PyReportClone {
    #[getter]
    fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_levels".to_string(), self.cnt_levels);
        dict_counts.insert("cnt_created".to_string(), self.cnt_created);
        dict_counts.insert("cnt_reconciled".to_string(), self.cnt_reconciled);
        dict_counts.insert("cnt_unsupported".to_string(), self.cnt_unsupported);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    #[pyo3(signature = (prefix = "[CLONE]"))]
    fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} levels={} created={} reconciled={} unsupported={} warnings={}",
            self.cnt_levels,
            self.cnt_created,
            self.cnt_reconciled,
            self.cnt_unsupported,
            self.warning_count()
        )
    }

    fn __str__(&self) -> String {
        self.format("[CLONE]")
    }
}

fn parse_rule_attr_read_failure(value: &str) -> PyResult<EnumAttrReadFailureMode> {
    match value {
        "abort" => Ok(EnumAttrReadFailureMode::Abort),
        "degrade" => Ok(EnumAttrReadFailureMode::Degrade),
        _ => Err(PyValueError::new_err(format!(
            "Invalid attribute read failure rule: `{value}`. Expected one of: ['abort', 'degrade']"
        ))),
    }
}

fn map_clone_path_error(exception: ClonePathError) -> PyErr {
    let c_message = exception.to_string();
    match exception {
        ClonePathError::SourceMissing { .. } => PyFileNotFoundError::new_err(c_message),
        ClonePathError::NotDirectory { .. } => PyNotADirectoryError::new_err(c_message),
        ClonePathError::Io { .. } => PyOSError::new_err((exception.raw_os_error(), c_message)),
    }
}

#[pyfunction(name = "clone_path")]
#[pyo3(signature = (
    branch_source,
    branch_target,
    relative,
    if_copy_ownership = true,
    if_copy_fs_flags = true,
    if_copy_xattrs = true,
    rule_attr_read_failure = "abort"
))]
#[allow(clippy::too_many_arguments)]
fn clone_path_py(
    py: Python<'_>,
    branch_source: String,
    branch_target: String,
    relative: String,
    if_copy_ownership: bool,
    if_copy_fs_flags: bool,
    if_copy_xattrs: bool,
    rule_attr_read_failure: &str,
) -> PyResult<PyReportClone> {
    let spec_clone_options = SpecCloneOptions {
        if_copy_ownership,
        if_copy_fs_flags,
        if_copy_xattrs,
        rule_attr_read_failure: parse_rule_attr_read_failure(rule_attr_read_failure)?,
    };

    let report_clone = py.allow_threads(|| {
        unionkit_io_fs::clone_path_with_options(
            &branch_source,
            &branch_target,
            &relative,
            &spec_clone_options,
        )
    });
    let report_clone = report_clone.map_err(map_clone_path_error)?;
    Ok(PyReportClone::from(report_clone))
}

#[pyfunction(name = "exists")]
fn exists_py(py: Python<'_>, branches: Vec<String>, relative: String) -> bool {
    py.allow_threads(|| unionkit_io_fs::exists(&branches, &relative))
}

#[pyfunction(name = "find_all")]
fn find_all_py(py: Python<'_>, branches: Vec<String>, relative: String) -> Vec<String> {
    py.allow_threads(|| {
        unionkit_io_fs::find_all(&branches, &relative)
            .into_iter()
            .map(|v| v.to_string_lossy().to_string())
            .collect()
    })
}

#[pyfunction(name = "find_first")]
fn find_first_py(py: Python<'_>, branches: Vec<String>, relative: String) -> Option<String> {
    py.allow_threads(|| {
        unionkit_io_fs::find_first(&branches, &relative).map(|v| v.to_string_lossy().to_string())
    })
}

#[pyfunction(name = "is_empty")]
fn is_empty_py(py: Python<'_>, path: String) -> bool {
    py.allow_threads(|| unionkit_io_fs::is_empty(&path))
}

#[pyfunction(name = "dirname")]
fn dirname_py(path: &str) -> String {
    unionkit_io_fs::dirname(path).to_string_lossy().to_string()
}

#[pyfunction(name = "basename")]
fn basename_py(path: &str) -> String {
    unionkit_io_fs::basename(path).to_string_lossy().to_string()
}

#[pyfunction(name = "join")]
fn join_py(branch: &str, relative: &str) -> String {
    unionkit_io_fs::join(branch, relative)
        .to_string_lossy()
        .to_string()
}

/// Route the crate's tracing events to stderr. Returns `False` if already set up.
#[pyfunction(name = "init_logging")]
#[pyo3(signature = (level = "info", format = "plaintext", if_ansi = false))]
fn init_logging_py(level: &str, format: &str, if_ansi: bool) -> PyResult<bool> {
    let spec_log_options = SpecLogOptions {
        level: parse_level(level).map_err(|e| PyValueError::new_err(e.to_string()))?,
        format: format
            .parse::<EnumLogFormat>()
            .map_err(|e| PyValueError::new_err(e.to_string()))?,
        if_ansi,
        ..SpecLogOptions::default()
    };
    unionkit_log::init_logging(&spec_log_options).map_err(|e| PyOSError::new_err(e.to_string()))
}

#[pymodule]
fn _unionkit_io_fs_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecCloneLevel>()?;
    module.add_class::<PyReportClone>()?;
    module.add_function(wrap_pyfunction!(clone_path_py, module)?)?;
    module.add_function(wrap_pyfunction!(exists_py, module)?)?;
    module.add_function(wrap_pyfunction!(find_all_py, module)?)?;
    module.add_function(wrap_pyfunction!(find_first_py, module)?)?;
    module.add_function(wrap_pyfunction!(is_empty_py, module)?)?;
    module.add_function(wrap_pyfunction!(dirname_py, module)?)?;
    module.add_function(wrap_pyfunction!(basename_py, module)?)?;
    module.add_function(wrap_pyfunction!(join_py, module)?)?;
    module.add_function(wrap_pyfunction!(init_logging_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
