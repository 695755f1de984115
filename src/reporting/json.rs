// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! JSON report renderer

use std::path::Path;

use anyhow::Result;

use super::DiagnosticReport;

/// Serialize a report to pretty-printed JSON.
pub fn to_string(report: &DiagnosticReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Serialize a report to a JSON file at `path`.
pub fn write_file(report: &DiagnosticReport, path: &Path) -> Result<()> {
    std::fs::write(path, to_string(report)?)?;
    Ok(())
}
