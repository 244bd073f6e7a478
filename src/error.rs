use std::path::PathBuf;

use anyhow::anyhow;

use crate::request::DownloadRequest;

/// Failures raised while locating and assembling datasets.
///
/// These travel inside `anyhow::Error`; callers that need to branch on the
/// kind recover it with `downcast_ref::<DataError>()`.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("no file matches pattern {pattern}")]
    NoMatch { pattern: String },

    #[error("{count} files match pattern {pattern}, expected exactly one")]
    AmbiguousMatch { pattern: String, count: usize },

    #[error("variable '{name}' not found in {}", path.display())]
    MissingVariable { name: String, path: PathBuf },

    #[error("dimension '{name}' mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid time: {reason}")]
    InvalidTime { reason: String },

    #[error("netcdf error: {reason}")]
    Netcdf { reason: String },
}

impl From<netcdf::Error> for DataError {
    fn from(e: netcdf::Error) -> Self {
        DataError::Netcdf {
            reason: e.to_string(),
        }
    }
}

pub(crate) fn format_fetch_failure(
    request: &DownloadRequest,
    code: Option<i32>,
    stderr_tail: &str,
) -> anyhow::Error {
    let code = code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "(killed by signal)".to_string());

    // The downloader prints a python traceback when it cannot import its own modules.
    let looks_like_import = stderr_tail.contains("ModuleNotFoundError")
        || stderr_tail.contains("No module named");
    if looks_like_import {
        return anyhow!(
            "downloader for {} exited with status {}: a python module is missing.\n\nHow to fix:\n1) Activate the environment that has the cmip6_downloader requirements installed\n2) Or point SITVAR_PYTHON at that interpreter\n\nstderr:\n{}",
            request.label(),
            code,
            stderr_tail
        );
    }

    if stderr_tail.contains("No such file or directory") && stderr_tail.contains(".py") {
        return anyhow!(
            "downloader for {} exited with status {}: the downloader script was not found.\n- Set SITVAR_DOWNLOADER or `downloader:` in .sitvarrc to the path of cmip6_downloader.py\n\nstderr:\n{}",
            request.label(),
            code,
            stderr_tail
        );
    }

    anyhow!(
        "downloader for {} exited with status {}\n{}",
        request.label(),
        code,
        stderr_tail
    )
}
