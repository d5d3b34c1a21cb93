// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for testset-stream

use thiserror::Error;

/// Errors that can occur while processing a test-run stream
///
/// Per-line parse failures are never errors: a line that cannot be
/// interpreted is recorded verbatim and reported as unrecognized. The only
/// hard-error class is caller misuse of the run registry.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A run id was used that has no backing state in the registry
    #[error("Unknown run id: {run_id}")]
    UnknownRun {
        /// The run id that could not be resolved
        run_id: String,
    },

    /// A run id was registered twice
    #[error("Run id already registered: {run_id}")]
    DuplicateRun {
        /// The run id that was already present
        run_id: String,
    },
}
