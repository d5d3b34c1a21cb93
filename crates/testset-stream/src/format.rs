// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Human-readable run summaries
//!
//! [`format_run`] renders a run's current state as a single plain-text
//! report. It is deterministic, side-effect-free, and callable at any time,
//! including while the run is still receiving output.

use crate::run::{RunStatus, TestRun, TestStatus};

/// Backtrace lines shown per failure before truncating
const MAX_BACKTRACE_LINES: usize = 5;

/// Raw-output lines shown when nothing structured was parsed
const RAW_TAIL_LINES: usize = 50;

/// Render a run's current state as a plain-text report
///
/// When the run produced no structured results and no failures, the report
/// falls back to the last [`RAW_TAIL_LINES`] raw output lines so the caller
/// always receives something actionable.
#[must_use]
pub fn format_run(run: &TestRun) -> String {
    let mut out = String::new();

    let project = std::path::Path::new(&run.project_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| run.project_path.clone());
    out.push_str(&format!("{} - {}\n", project, status_label(run.status)));

    match run.duration() {
        Some(duration) => {
            let secs = duration.num_milliseconds() as f64 / 1000.0;
            out.push_str(&format!(
                "{} passed, {} failed, {} errored, {} total ({:.1}s)\n",
                run.total_pass, run.total_fail, run.total_error, run.total_tests, secs
            ));
        }
        None => {
            out.push_str(&format!(
                "{} passed, {} failed, {} errored, {} total (running)\n",
                run.total_pass, run.total_fail, run.total_error, run.total_tests
            ));
        }
    }

    if !run.results.is_empty() {
        out.push('\n');
        for result in &run.results {
            let marker = match result.status() {
                TestStatus::Pass => "✓",
                TestStatus::Fail | TestStatus::Error => "✗",
            };
            out.push_str(&format!(
                "{}{} {} ({}/{} passed)\n",
                "  ".repeat(result.depth as usize),
                marker,
                result.name,
                result.pass_count,
                result.total_count,
            ));
        }
    }

    if !run.failures.is_empty() {
        out.push('\n');
        for (index, failure) in run.failures.iter().enumerate() {
            out.push_str(&format!("{}) {}:{}", index + 1, failure.file, failure.line));
            if !failure.group.is_empty() {
                out.push_str(&format!(" in \"{}\"", failure.group));
            }
            out.push('\n');
            if !failure.expression.is_empty() {
                out.push_str(&format!("   Expression: {}\n", failure.expression));
            }
            if !failure.evaluated.is_empty() {
                out.push_str(&format!("   Evaluated: {}\n", failure.evaluated));
            }
            if !failure.backtrace.is_empty() {
                let lines: Vec<&str> = failure.backtrace.lines().collect();
                for line in lines.iter().take(MAX_BACKTRACE_LINES) {
                    out.push_str(&format!("   {}\n", line.trim_end()));
                }
                if lines.len() > MAX_BACKTRACE_LINES {
                    out.push_str(&format!(
                        "   ... {} more lines\n",
                        lines.len() - MAX_BACKTRACE_LINES
                    ));
                }
            }
        }
    }

    if run.results.is_empty() && run.failures.is_empty() {
        out.push('\n');
        out.push_str("No structured results were parsed; raw output tail:\n");
        let start = run.raw_lines.len().saturating_sub(RAW_TAIL_LINES);
        for line in &run.raw_lines[start..] {
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "RUNNING",
        RunStatus::Passed => "PASSED",
        RunStatus::Failed => "FAILED",
        RunStatus::Errored => "ERRORED",
        RunStatus::Cancelled => "CANCELLED",
    }
}
