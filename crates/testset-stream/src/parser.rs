// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Incremental test-output parsing
//!
//! This module reconstructs structured results from the console stream of a
//! Julia test subprocess, one line at a time. Three sources of truth compete
//! in the same stream, in priority order:
//! - `RUNNER:` sentinel lines emitted by a cooperating runner script
//!   (authoritative, structured),
//! - multi-line failure blocks (`Test Failed at file:line` followed by
//!   `Expression:`/`Evaluated:`/stacktrace lines),
//! - plain `Test Summary:` tables, parsed only when no sentinel groups have
//!   been seen for the run.
//!
//! Each rule returns matched/unmatched; a line no rule claims is still kept
//! verbatim in the run's raw log. A malformed structured line is downgraded
//! to unrecognized, never an error: one bad line can only lose itself.
//!
//! # Example
//!
//! ```
//! use testset_stream::parser::ParserState;
//! use testset_stream::run::TestRun;
//!
//! let mut run = TestRun::new("run-1", "/proj", "");
//! let mut state = ParserState::new();
//! state.consume(&mut run, "RUNNER:GROUP_DONE pass=3 fail=0 error=0 total=3 depth=0 name=My Tests");
//! state.finish(&mut run);
//! assert_eq!(run.total_pass, 3);
//! ```

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::run::{GroupResult, RunStatus, TestFailure, TestRun};
use crate::sanitize::strip_ansi;

static FAILURE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Test Failed|Error During Test) at (.+?):(\d+)\s*$")
        .expect("failure header pattern is valid")
});

// ============================================================================
// Summary-table columns
// ============================================================================

/// One summary-table column bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Pass,
    Fail,
    Error,
    Broken,
    Total,
}

/// Case-insensitive column-name mapping, covering both frameworks' spellings
const COLUMN_NAMES: &[(&str, Column)] = &[
    ("pass", Column::Pass),
    ("passed", Column::Pass),
    ("fail", Column::Fail),
    ("failed", Column::Fail),
    ("error", Column::Error),
    ("errors", Column::Error),
    ("broken", Column::Broken),
    ("total", Column::Total),
];

fn column_for(word: &str) -> Option<Column> {
    let lower = word.to_ascii_lowercase();
    COLUMN_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, col)| *col)
}

/// Positional fallback when a table never declared its columns
const DEFAULT_COLUMNS: [Column; 4] = [Column::Pass, Column::Fail, Column::Error, Column::Total];

// ============================================================================
// Parser state
// ============================================================================

/// A failure block being accumulated across lines, not yet flushed
#[derive(Debug, Default)]
struct FailureBlock {
    file: String,
    line: u32,
    expression: String,
    evaluated: String,
    group: String,
    backtrace: Vec<String>,
}

/// An active summary table
#[derive(Debug, Default)]
struct TableState {
    /// Column order, captured at most once per table
    header: Option<Vec<Column>>,
    /// Whether the next non-row line may still be the header
    awaiting_header: bool,
    /// Indentation of the table's first row; rows are measured against it,
    /// so a uniformly indented table still reports its top level as depth 0
    baseline: Option<usize>,
}

/// Transient per-run accumulator state
///
/// Owned by the consumer loop driving one run and passed into [`consume`]
/// alongside the run for its whole lifetime; discarded once the run is
/// terminal. Never shared between runs.
///
/// [`consume`]: ParserState::consume
#[derive(Debug, Default)]
pub struct ParserState {
    block: Option<FailureBlock>,
    table: Option<TableState>,
    current_group: String,
    seen_structured: bool,
}

impl ParserState {
    /// Create a fresh parser state for one run
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one output line into the run
    ///
    /// The raw line is appended to `run.raw_lines` first, unconditionally;
    /// then the sanitized line is tried against each rule in priority order.
    /// Returns whether the line was recognized as semantically meaningful.
    ///
    /// If the run was cancelled externally, any pending failure block is
    /// flushed and nothing further is mutated.
    pub fn consume(&mut self, run: &mut TestRun, line: &str) -> bool {
        if run.status == RunStatus::Cancelled {
            self.flush_pending(run);
            return false;
        }

        run.raw_lines.push(line.to_string());

        let clean = strip_ansi(line);
        let clean = clean.as_ref();

        if self.try_sentinel(run, clean) {
            return true;
        }
        if self.try_failure_start(run, clean) {
            // A failure report interrupts any table being printed
            self.table = None;
            return true;
        }
        if self.block.is_some() {
            if self.try_block_line(clean) {
                return true;
            }
            // Any other line ends the block; the line itself is re-examined
            // by the remaining rules.
            self.flush_pending(run);
        }
        if self.try_test_set(clean) {
            return true;
        }
        if !self.seen_structured && self.try_table(run, clean) {
            return true;
        }
        false
    }

    /// End-of-stream handling: flush any pending failure block and, if no
    /// structured run-finished event arrived, settle the run's final status
    /// from its totals. Idempotent.
    pub fn finish(&mut self, run: &mut TestRun) {
        self.flush_pending(run);
        if !run.status.is_terminal() {
            let status = run.infer_final_status();
            debug!(run_id = %run.id, ?status, "Stream ended without RUN_DONE; inferring status");
            run.finish(status);
        }
    }

    // ------------------------------------------------------------------
    // Sentinel protocol
    // ------------------------------------------------------------------

    fn try_sentinel(&mut self, run: &mut TestRun, line: &str) -> bool {
        let Some(rest) = line.trim().strip_prefix("RUNNER:") else {
            return false;
        };
        let (event, args) = match rest.split_once(' ') {
            Some((event, args)) => (event, args),
            None => (rest, ""),
        };
        match event {
            "START" => {
                self.flush_pending(run);
                debug!(run_id = %run.id, "Runner reported start");
                true
            }
            "GROUP_DONE" => self.handle_group_done(run, args),
            "RUN_DONE" => self.handle_run_done(run, args),
            _ => {
                warn!(run_id = %run.id, event, "Unknown runner sentinel event");
                false
            }
        }
    }

    fn handle_group_done(&mut self, run: &mut TestRun, args: &str) -> bool {
        // Group names may contain spaces, so the name is everything after the
        // last ` name=` marker rather than one token in a key=value split.
        let name_idx = if args.starts_with("name=") {
            Some(0)
        } else {
            args.rfind(" name=").map(|i| i + 1)
        };
        let Some(idx) = name_idx else {
            warn!(run_id = %run.id, args, "GROUP_DONE without name marker");
            return false;
        };
        let name = args[idx + "name=".len()..].to_string();

        let mut pass = 0u64;
        let mut fail = 0u64;
        let mut error = 0u64;
        let mut total = 0u64;
        let mut depth = 0u32;
        for token in args[..idx].split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            if !matches!(key, "pass" | "fail" | "error" | "total" | "depth") {
                continue;
            }
            let Ok(n) = value.parse::<u64>() else {
                warn!(run_id = %run.id, token, "Non-numeric count in GROUP_DONE");
                return false;
            };
            match key {
                "pass" => pass = n,
                "fail" => fail = n,
                "error" => error = n,
                "total" => total = n,
                "depth" => depth = n.min(u64::from(u32::MAX)) as u32,
                _ => {}
            }
        }

        // Structured groups are authoritative for this run onwards: any plain
        // summary table printed later would double count.
        self.seen_structured = true;
        self.flush_pending(run);
        debug!(run_id = %run.id, group = %name, pass, fail, error, "Runner reported group");
        run.record_result(GroupResult {
            name,
            pass_count: pass,
            fail_count: fail,
            error_count: error,
            total_count: total,
            depth,
        });
        true
    }

    fn handle_run_done(&mut self, run: &mut TestRun, args: &str) -> bool {
        let status_value = args
            .split_whitespace()
            .find_map(|token| token.strip_prefix("status="))
            .unwrap_or("");
        let status = match status_value {
            "passed" => RunStatus::Passed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Errored,
        };
        self.flush_pending(run);
        debug!(run_id = %run.id, ?status, "Runner reported run finished");
        run.finish(status);
        true
    }

    // ------------------------------------------------------------------
    // Failure blocks
    // ------------------------------------------------------------------

    fn try_failure_start(&mut self, run: &mut TestRun, line: &str) -> bool {
        let Some(caps) = FAILURE_START_RE.captures(line) else {
            return false;
        };
        self.flush_pending(run);
        self.block = Some(FailureBlock {
            file: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            group: self.current_group.clone(),
            ..FailureBlock::default()
        });
        true
    }

    fn try_block_line(&mut self, line: &str) -> bool {
        let Some(block) = self.block.as_mut() else {
            return false;
        };
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("Expression:") {
            block.expression = rest.trim().to_string();
            return true;
        }
        if let Some(rest) = trimmed.strip_prefix("Evaluated:") {
            block.evaluated = rest.trim().to_string();
            return true;
        }
        let looks_like_frame = trimmed.starts_with("Stacktrace:")
            || trimmed.starts_with('[')
            || trimmed.starts_with('@')
            || (!block.backtrace.is_empty()
                && !trimmed.is_empty()
                && line.starts_with(|c: char| c.is_whitespace()));
        if looks_like_frame {
            block.backtrace.push(line.to_string());
            return true;
        }
        false
    }

    /// Emit the pending block as a `TestFailure`, if it ever got real content
    fn flush_pending(&mut self, run: &mut TestRun) {
        let Some(block) = self.block.take() else {
            return;
        };
        if block.file.is_empty() && block.expression.is_empty() {
            return;
        }
        run.failures.push(TestFailure {
            file: block.file,
            line: block.line,
            expression: block.expression,
            evaluated: block.evaluated,
            group: block.group,
            backtrace: block.backtrace.join("\n"),
        });
    }

    // ------------------------------------------------------------------
    // Enclosing-group tracking
    // ------------------------------------------------------------------

    fn try_test_set(&mut self, line: &str) -> bool {
        let Some(rest) = line.trim_start().strip_prefix("Test set:") else {
            return false;
        };
        self.current_group = rest.trim().to_string();
        true
    }

    // ------------------------------------------------------------------
    // Summary tables
    // ------------------------------------------------------------------

    fn try_table(&mut self, run: &mut TestRun, line: &str) -> bool {
        if line.contains("Test Summary:") {
            // A new table; the header may be inline after the first `|`
            let mut table = TableState {
                header: None,
                awaiting_header: true,
                baseline: None,
            };
            if let Some((_, after)) = line.split_once('|') {
                if let Some(columns) = parse_inline_header(after) {
                    table.header = Some(columns);
                    table.awaiting_header = false;
                }
            }
            self.table = Some(table);
            return true;
        }

        let Some(table) = self.table.as_mut() else {
            return false;
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            self.table = None;
            return false;
        }

        if !line.contains('|') {
            if table.awaiting_header {
                if let Some(columns) = parse_standalone_header(trimmed) {
                    table.header = Some(columns);
                    table.awaiting_header = false;
                    return true;
                }
            }
            if is_rule_line(trimmed) {
                return true;
            }
            // A bare `Module:` header between sections keeps the table open
            if trimmed.len() > 1
                && trimmed.ends_with(':')
                && !trimmed.contains(char::is_whitespace)
            {
                return true;
            }
            // Anything else ends table mode without being consumed
            self.table = None;
            return false;
        }

        // A `name | counts` row
        let Some((name_part, counts_part)) = line.split_once('|') else {
            return false;
        };
        let name = name_part.trim().to_string();
        if name.is_empty() {
            return true;
        }
        table.awaiting_header = false;

        let indent = name_part.chars().take_while(|c| c.is_whitespace()).count();
        let baseline = *table.baseline.get_or_insert(indent);
        let depth = (indent.saturating_sub(baseline) / 2) as u32;

        let numbers: Vec<u64> = counts_part
            .split_whitespace()
            .filter_map(|token| token.parse().ok())
            .collect();

        let mut pass = 0u64;
        let mut fail = 0u64;
        let mut error = 0u64;
        let mut broken = 0u64;
        let mut total = 0u64;
        let columns: &[Column] = table.header.as_deref().unwrap_or(&DEFAULT_COLUMNS);
        for (column, value) in columns.iter().zip(numbers) {
            match column {
                Column::Pass => pass = value,
                Column::Fail => fail = value,
                Column::Error => error = value,
                Column::Broken => broken = value,
                Column::Total => total = value,
            }
        }
        if total == 0 {
            total = pass + fail + error + broken;
        }

        run.record_result(GroupResult {
            name,
            pass_count: pass,
            fail_count: fail,
            error_count: error,
            total_count: total,
            depth,
        });
        true
    }
}

/// Header tokens following `Test Summary: |` on the same line
///
/// Unrecognized words (e.g. a `Time` column) are skipped; their values are
/// never bare integers, so positional mapping of the integer row tokens onto
/// the recognized columns stays aligned.
fn parse_inline_header(after_pipe: &str) -> Option<Vec<Column>> {
    let columns: Vec<Column> = after_pipe
        .split(|c: char| c.is_whitespace() || c == '|')
        .filter(|token| !token.is_empty())
        .filter_map(column_for)
        .collect();
    if columns.is_empty() { None } else { Some(columns) }
}

/// A standalone header line: every word must be a known column name
fn parse_standalone_header(line: &str) -> Option<Vec<Column>> {
    let mut columns = Vec::new();
    for token in line
        .split(|c: char| c.is_whitespace() || c == '|')
        .filter(|token| !token.is_empty())
    {
        columns.push(column_for(token)?);
    }
    if columns.is_empty() { None } else { Some(columns) }
}

/// Horizontal-rule separator lines between a header and its rows
fn is_rule_line(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| matches!(c, '-' | '=' | '─' | '━' | ' ' | '\t'))
}
