use std::fs;
use std::path::Path;

use crate::domain::{EvalItem, EvalRow, Report, Thresholds};
use crate::error::AppError;
use crate::metrics;

impl Report {
    /// Fold per-item rows into aggregates and the gate decision. Row order is kept as given.
    pub fn from_rows(items: Vec<EvalRow>, thresholds: Thresholds) -> Result<Self, AppError> {
        let aggregate = metrics::aggregate(&items)?;
        let quality_gate = metrics::quality_gate(&aggregate, thresholds);
        Ok(Self {
            items,
            aggregate,
            quality_gate,
        })
    }
}

/// Parse a newline-delimited JSON dataset. Blank lines are skipped.
pub fn parse_dataset(raw: &str) -> Result<Vec<EvalItem>, AppError> {
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: EvalItem = serde_json::from_str(line).map_err(|e| {
            AppError::new("EVAL_DATASET_INVALID", "Failed to decode evaluation item")
                .with_details(format!("line={}; err={}", idx + 1, e))
        })?;
        out.push(item);
    }
    Ok(out)
}

pub fn load_dataset(path: &Path) -> Result<Vec<EvalItem>, AppError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::new("EVAL_DATASET_INVALID", "Failed to read evaluation dataset")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    parse_dataset(&raw)
}

/// Write the report as pretty JSON, replacing any previous report at `path`.
pub fn write_report(path: &Path, report: &Report) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new("REPORT_WRITE_FAILED", "Failed to create report directory")
                .with_details(format!("path={}; err={}", parent.display(), e))
        })?;
    }
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        AppError::new("REPORT_WRITE_FAILED", "Failed to encode evaluation report")
            .with_details(e.to_string())
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("REPORT_WRITE_FAILED", "Failed to write evaluation report")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("REPORT_WRITE_FAILED", "Failed to finalize evaluation report write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}

pub fn read_report(path: &Path) -> Result<Report, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("REPORT_READ_FAILED", "Failed to read evaluation report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("REPORT_READ_FAILED", "Failed to decode evaluation report")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}
