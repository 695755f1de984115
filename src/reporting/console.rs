// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/dervmon

//! Console report renderer

use std::fmt::Write as _;

use super::DiagnosticReport;

/// Render a report as a plain-text block.
pub fn render(report: &DiagnosticReport) -> String {
    let mut out = String::new();

    let summary = report
        .summary_severity
        .map(|s| s.to_string().to_uppercase())
        .unwrap_or_else(|| "NONE".to_string());

    let _ = writeln!(out, "===============================================");
    let _ = writeln!(out, " Diagnostic Report — {}", report.vehicle_id);
    let _ = writeln!(out, " Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, " Summary severity: {summary}");
    let _ = writeln!(out, "===============================================");

    let _ = writeln!(out, " Readings:");
    for reading in &report.readings {
        let deviation = reading
            .deviation
            .map(|d| format!("  (deviation {d:+.2})"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "   {:<22} {:>10.2} {}{}",
            reading.sensor_id, reading.value, reading.unit, deviation
        );
    }

    if report.faults.is_empty() {
        let _ = writeln!(out, " Active faults: none");
    } else {
        let _ = writeln!(out, " Active faults:");
        for fault in &report.faults {
            let _ = writeln!(
                out,
                "   [{}] {} ({}) — {}",
                fault.severity.to_string().to_uppercase(),
                fault.code,
                fault.sensor_id,
                fault.description
            );
        }
    }
    let _ = writeln!(out, "===============================================");

    out
}

/// Render and print to stdout.
pub fn print(report: &DiagnosticReport) {
    print!("{}", render(report));
}
