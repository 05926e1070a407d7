use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::timestamp;

/// One document that failed during a batch
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub path: PathBuf,
    /// Single-line error message
    pub error: String,
    /// Full error with its cause chain and backtrace, if captured
    pub trace: String,
}

impl FailureRecord {
    pub fn from_error(path: &Path, error: &anyhow::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            error: format!("{:#}", error),
            trace: format!("{:?}", error),
        }
    }

    fn render(&self) -> String {
        format!("{} :: {}\n{}", self.path.display(), self.error, self.trace)
    }
}

/// Directory the failure report goes into
///
/// The first input itself when it is a directory, otherwise its parent.
pub fn report_dir(inputs: &[PathBuf]) -> PathBuf {
    match inputs.first() {
        Some(first) if first.is_dir() => first.clone(),
        Some(first) => first
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        None => PathBuf::from("."),
    }
}

/// Write `<prefix>_<timestamp>.txt` listing every failure
///
/// Nothing is written when there are no failures.
pub fn write_failure_report(
    failures: &[FailureRecord],
    inputs: &[PathBuf],
    prefix: &str,
) -> Result<Option<PathBuf>> {
    if failures.is_empty() {
        return Ok(None);
    }

    let path = report_dir(inputs).join(format!("{}_{}.txt", prefix, timestamp()));
    let contents = failures
        .iter()
        .map(FailureRecord::render)
        .collect::<Vec<_>>()
        .join("\n\n");
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write failure report: {:?}", path))?;

    Ok(Some(path))
}
