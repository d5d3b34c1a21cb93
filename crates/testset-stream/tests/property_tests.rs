// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Property-based tests for testset-stream
//!
//! These tests use proptest to verify the accumulator's invariants hold for
//! arbitrary input lines: no panic, exactly one raw line recorded per call,
//! and color codes never changing what gets parsed.

use proptest::prelude::*;

use testset_stream::format::format_run;
use testset_stream::parser::ParserState;
use testset_stream::run::TestRun;

// ============================================================================
// Strategies
// ============================================================================

/// Arbitrary console lines, biased towards shapes the parser cares about
fn arbitrary_line() -> impl Strategy<Value = String> {
    prop_oneof![
        // Plain noise
        "[ -~]{0,80}",
        // Sentinel-ish lines, well-formed and broken
        Just("RUNNER:START".to_string()),
        Just("RUNNER:GROUP_DONE pass=1 fail=0 error=0 total=1 depth=0 name=G".to_string()),
        Just("RUNNER:GROUP_DONE pass=x fail=y name=Broken".to_string()),
        Just("RUNNER:RUN_DONE status=passed".to_string()),
        Just("RUNNER:RUN_DONE".to_string()),
        Just("RUNNER:UNKNOWN_EVENT a=b".to_string()),
        // Failure blocks
        Just("Test Failed at a.jl:10".to_string()),
        Just("Error During Test at b.jl:2".to_string()),
        Just("  Expression: x == 1".to_string()),
        Just("  Evaluated: 2 == 1".to_string()),
        Just("Stacktrace:".to_string()),
        Just(" [1] top-level scope".to_string()),
        Just("   @ ./none:0".to_string()),
        // Tables
        Just("Test Summary: | Pass  Fail  Total".to_string()),
        Just("Test Summary:".to_string()),
        Just("Pass  Fail  Error  Total".to_string()),
        Just("  Group | 1 2 3".to_string()),
        Just("----------".to_string()),
        Just("Mod:".to_string()),
        Just("Test set: Some Group".to_string()),
        // Whitespace and control characters
        Just(String::new()),
        Just("   ".to_string()),
        "\\PC{0,20}".prop_map(|s| format!("\x1b[31m{s}\x1b[0m")),
    ]
}

proptest! {
    /// Feeding any sequence of lines never panics and records each line
    /// verbatim, exactly once.
    #[test]
    fn prop_raw_lines_grow_by_one(lines in prop::collection::vec(arbitrary_line(), 0..40)) {
        let mut run = TestRun::new("run-1", "/proj", "");
        let mut state = ParserState::new();
        for (index, line) in lines.iter().enumerate() {
            let before = run.raw_lines.len();
            state.consume(&mut run, line);
            prop_assert_eq!(run.raw_lines.len(), before + 1);
            prop_assert_eq!(&run.raw_lines[index], line);
        }
        state.finish(&mut run);
        prop_assert!(run.status.is_terminal());
    }

    /// Totals always equal the sum over depth-0 results, whatever arrived.
    #[test]
    fn prop_totals_match_depth_zero_results(lines in prop::collection::vec(arbitrary_line(), 0..40)) {
        let mut run = TestRun::new("run-1", "/proj", "");
        let mut state = ParserState::new();
        for line in &lines {
            state.consume(&mut run, line);
        }
        let root_pass: u64 = run.results.iter().filter(|r| r.depth == 0).map(|r| r.pass_count).sum();
        let root_fail: u64 = run.results.iter().filter(|r| r.depth == 0).map(|r| r.fail_count).sum();
        let root_error: u64 = run.results.iter().filter(|r| r.depth == 0).map(|r| r.error_count).sum();
        let root_total: u64 = run.results.iter().filter(|r| r.depth == 0).map(|r| r.total_count).sum();
        prop_assert_eq!(run.total_pass, root_pass);
        prop_assert_eq!(run.total_fail, root_fail);
        prop_assert_eq!(run.total_error, root_error);
        prop_assert_eq!(run.total_tests, root_total);
    }

    /// Wrapping a line in color codes never changes what gets parsed.
    #[test]
    fn prop_ansi_wrapping_is_transparent(lines in prop::collection::vec(arbitrary_line(), 0..25)) {
        let mut plain_run = TestRun::new("run-1", "/proj", "");
        let mut plain_state = ParserState::new();
        let mut colored_run = TestRun::new("run-1", "/proj", "");
        let mut colored_state = ParserState::new();

        for line in &lines {
            plain_state.consume(&mut plain_run, line);
            let colored = format!("\x1b[1m\x1b[32m{line}\x1b[0m");
            colored_state.consume(&mut colored_run, &colored);
        }
        plain_state.finish(&mut plain_run);
        colored_state.finish(&mut colored_run);

        prop_assert_eq!(plain_run.results, colored_run.results);
        prop_assert_eq!(plain_run.failures, colored_run.failures);
        prop_assert_eq!(plain_run.status, colored_run.status);
    }

    /// Formatting never panics, at any point in a run's life.
    #[test]
    fn prop_format_never_panics(lines in prop::collection::vec(arbitrary_line(), 0..40)) {
        let mut run = TestRun::new("run-1", "/proj", "");
        let mut state = ParserState::new();
        for line in &lines {
            state.consume(&mut run, line);
            let report = format_run(&run);
            prop_assert!(!report.is_empty());
        }
        state.finish(&mut run);
        prop_assert!(!format_run(&run).is_empty());
    }
}
