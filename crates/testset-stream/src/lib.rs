// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testset-stream: streaming reconstruction of Julia test-run output
//!
//! This library crate incrementally turns the raw console stream of a Julia
//! test subprocess into a structured model of test outcomes: nested per-group
//! pass/fail/error counts and detailed failure records. It understands the
//! plain `Test Summary:` tables two test frameworks print, the multi-line
//! `Test Failed at file:line` failure blocks, and an authoritative `RUNNER:`
//! sentinel protocol emitted by a cooperating runner script. Malformed input
//! never aborts a run; an unparseable line only loses itself.
//!
//! The process launcher, result consumer, and persistence layers are external
//! collaborators: this crate only transforms a line stream into a run model
//! and a human-readable summary.
//!
//! # Example
//!
//! ```
//! use testset_stream::parser::ParserState;
//! use testset_stream::run::TestRun;
//! use testset_stream::format::format_run;
//!
//! let mut run = TestRun::new("run-1", "/proj/MyProject", "");
//! let mut state = ParserState::new();
//! state.consume(&mut run, "Test Summary: | Pass  Fail  Total");
//! state.consume(&mut run, "My Tests      |    3     1      4");
//! state.finish(&mut run);
//!
//! assert_eq!(run.total_pass, 3);
//! println!("{}", format_run(&run));
//! ```

pub mod error;
pub mod format;
pub mod parser;
pub mod registry;
pub mod run;
pub mod sanitize;

pub use error::StreamError;
pub use format::format_run;
pub use parser::ParserState;
pub use registry::RunRegistry;
pub use run::{GroupResult, RunStatus, TestFailure, TestRun, TestStatus};
pub use sanitize::strip_ansi;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::StreamError;
    pub use crate::format::format_run;
    pub use crate::parser::ParserState;
    pub use crate::registry::RunRegistry;
    pub use crate::run::{GroupResult, RunStatus, TestFailure, TestRun, TestStatus};
}
