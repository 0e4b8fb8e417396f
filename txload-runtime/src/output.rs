use crate::error::RuntimeError;
use std::path::Path;
use txload::RunReport;

/// Write the machine readable summary, creating parent directories as needed.
pub fn write_summary(path: &Path, report: &RunReport) -> Result<(), RuntimeError> {
    let json = serde_json::to_string_pretty(report)?;
    let io_err = |source| RuntimeError::Summary {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, json).map_err(io_err)
}
