// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Run aggregate model
//!
//! A [`TestRun`] is the mutable record one test execution accumulates into:
//! per-group results, individual failures, the verbatim output log, and
//! running totals. The parser mutates it line-by-line; the formatter reads it
//! at any point, including mid-run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a test run
///
/// Transitions are one-way: once a run leaves `Running` it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The subprocess is still producing output
    Running,
    /// Run finished with no failures or errors
    Passed,
    /// Run finished with at least one failed test
    Failed,
    /// Run finished with at least one errored test, or an abnormal exit
    Errored,
    /// Run was cancelled externally (e.g. launcher timeout)
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

/// Derived status of a single test group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// All tests in the group passed
    Pass,
    /// At least one test in the group failed
    Fail,
    /// At least one test in the group errored
    Error,
}

/// One reported test group (a Julia testset), immutable after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    /// Group name as reported
    pub name: String,
    /// Number of passing tests, descendants included
    pub pass_count: u64,
    /// Number of failing tests, descendants included
    pub fail_count: u64,
    /// Number of erroring tests, descendants included
    pub error_count: u64,
    /// Total tests in the group, descendants included
    pub total_count: u64,
    /// Nesting depth; 0 = top level
    pub depth: u32,
}

impl GroupResult {
    /// Status derived from the group's own counts
    #[must_use]
    pub fn status(&self) -> TestStatus {
        if self.error_count > 0 {
            TestStatus::Error
        } else if self.fail_count > 0 {
            TestStatus::Fail
        } else {
            TestStatus::Pass
        }
    }
}

/// One individual assertion failure or test error, immutable after flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    /// Source file the failure was reported at
    pub file: String,
    /// Line number within the file
    pub line: u32,
    /// Failing expression text, if reported
    pub expression: String,
    /// Evaluated form of the expression, if reported
    pub evaluated: String,
    /// Best-known enclosing testset at the time; may be empty
    pub group: String,
    /// Captured backtrace lines, newline-joined; may be empty
    pub backtrace: String,
}

/// Aggregate state of one test execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Run identifier, supplied by the launcher
    pub id: String,
    /// Path of the project under test
    pub project_path: String,
    /// Test filter pattern; empty means run everything
    pub pattern: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status; `None` while running
    pub finished_at: Option<DateTime<Utc>>,
    /// Current lifecycle status
    pub status: RunStatus,
    /// Reported groups, in arrival order
    pub results: Vec<GroupResult>,
    /// Flushed failures, in arrival order
    pub failures: Vec<TestFailure>,
    /// Every line received, verbatim, regardless of parse outcome
    pub raw_lines: Vec<String>,
    /// Passing tests across depth-0 groups
    pub total_pass: u64,
    /// Failing tests across depth-0 groups
    pub total_fail: u64,
    /// Erroring tests across depth-0 groups
    pub total_error: u64,
    /// Total tests across depth-0 groups
    pub total_tests: u64,
}

impl TestRun {
    /// Create a new running test run
    #[must_use]
    pub fn new(id: impl Into<String>, project_path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_path: project_path.into(),
            pattern: pattern.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            results: Vec::new(),
            failures: Vec::new(),
            raw_lines: Vec::new(),
            total_pass: 0,
            total_fail: 0,
            total_error: 0,
            total_tests: 0,
        }
    }

    /// Append a group result, folding depth-0 counts into the run totals
    ///
    /// Only depth-0 groups contribute to totals: a top-level testset's counts
    /// already include its descendants, so summing deeper rows would double
    /// count. Several independent depth-0 groups accumulate additively.
    pub fn record_result(&mut self, result: GroupResult) {
        if result.depth == 0 {
            self.total_pass += result.pass_count;
            self.total_fail += result.fail_count;
            self.total_error += result.error_count;
            self.total_tests += result.total_count;
        }
        self.results.push(result);
    }

    /// Move the run to a terminal status and stamp the finish time
    ///
    /// A no-op if the run is already terminal.
    pub fn finish(&mut self, status: RunStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Cancel the run (external signal, e.g. launcher timeout)
    ///
    /// A no-op if the run is already terminal.
    pub fn cancel(&mut self) {
        self.finish(RunStatus::Cancelled);
    }

    /// Terminal status inferred from totals, for streams that end without a
    /// structured run-finished event
    #[must_use]
    pub fn infer_final_status(&self) -> RunStatus {
        if self.total_error > 0 {
            RunStatus::Errored
        } else if self.total_fail > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        }
    }

    /// Whether no failures or errors have been recorded so far
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.total_fail == 0 && self.total_error == 0 && self.failures.is_empty()
    }

    /// Groups whose own counts contain failures or errors
    #[must_use]
    pub fn failing_groups(&self) -> Vec<&GroupResult> {
        self.results
            .iter()
            .filter(|r| r.status() != TestStatus::Pass)
            .collect()
    }

    /// Wall-clock duration; `None` while the run is still going
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|f| f - self.started_at)
    }
}
