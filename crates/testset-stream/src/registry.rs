// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Keyed-by-run-id run storage
//!
//! A [`RunRegistry`] is the caller-owned table mapping run ids to live runs.
//! Each run is guarded by its own lock, so the consumer loop feeding lines
//! and a progress poller formatting the current state never contend across
//! runs, only within one. There is no global registry: callers create and
//! own an instance for as long as they drive subprocesses.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::error::StreamError;
use crate::format::format_run;
use crate::parser::ParserState;
use crate::run::{RunStatus, TestRun};

/// One run bundled with its transient parser state
///
/// The parser state lives exactly as long as the run is in the registry and
/// is discarded with the session when the run is finished out.
#[derive(Debug)]
struct RunSession {
    run: TestRun,
    parser: ParserState,
}

/// Caller-owned storage for concurrently executing runs
#[derive(Debug, Default)]
pub struct RunRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<RunSession>>>>,
}

impl RunRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run with a generated id; returns the id
    pub fn create(&self, project_path: &str, pattern: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let run = TestRun::new(id.clone(), project_path, pattern);
        self.insert_session(run);
        id
    }

    /// Register a run created by the launcher under its own id
    ///
    /// # Errors
    ///
    /// Returns `StreamError::DuplicateRun` if the id is already registered.
    pub fn insert(&self, run: TestRun) -> Result<(), StreamError> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Check and insert under the same lock so two racing inserts with the
        // same id cannot both pass the check and clobber a live run
        match sessions.entry(run.id.clone()) {
            Entry::Occupied(_) => Err(StreamError::DuplicateRun {
                run_id: run.id.clone(),
            }),
            Entry::Vacant(entry) => {
                debug!(run_id = %run.id, project = %run.project_path, "Registering run");
                entry.insert(Arc::new(Mutex::new(RunSession {
                    run,
                    parser: ParserState::new(),
                })));
                Ok(())
            }
        }
    }

    fn insert_session(&self, run: TestRun) {
        let id = run.id.clone();
        debug!(run_id = %id, project = %run.project_path, "Registering run");
        let session = RunSession {
            run,
            parser: ParserState::new(),
        };
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(session)));
    }

    /// Feed one subprocess output line into a run
    ///
    /// Returns whether the line was recognized as semantically meaningful.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownRun` if the id has no backing state.
    pub fn consume_line(&self, run_id: &str, line: &str) -> Result<bool, StreamError> {
        let session = self.session(run_id)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let RunSession { run, parser } = &mut *session;
        Ok(parser.consume(run, line))
    }

    /// Render the run's current state, mid-run or finished
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownRun` if the id has no backing state.
    pub fn format(&self, run_id: &str) -> Result<String, StreamError> {
        let session = self.session(run_id)?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(format_run(&session.run))
    }

    /// Cancel a run externally (e.g. launcher timeout)
    ///
    /// The next `consume_line` call flushes any pending failure block and
    /// otherwise leaves the run untouched.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownRun` if the id has no backing state.
    pub fn cancel(&self, run_id: &str) -> Result<(), StreamError> {
        let session = self.session(run_id)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        session.run.cancel();
        debug!(run_id, "Run cancelled");
        Ok(())
    }

    /// Finish a run at end of stream and remove it from the registry
    ///
    /// Performs the final flush, settles the status if the stream ended
    /// without a structured run-finished event, discards the parser state,
    /// and hands the completed run to the caller.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownRun` if the id has no backing state.
    pub fn finish(&self, run_id: &str) -> Result<TestRun, StreamError> {
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(run_id)
            .ok_or_else(|| StreamError::UnknownRun {
                run_id: run_id.to_string(),
            })?;
        let session = Arc::try_unwrap(session)
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner));
        let mut session = match session {
            Ok(session) => session,
            Err(shared) => {
                // Another task still holds the session; finish through the lock
                // and clone the result out.
                let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let RunSession { run, parser } = &mut *guard;
                parser.finish(run);
                return Ok(run.clone());
            }
        };
        session.parser.finish(&mut session.run);
        debug!(run_id, status = ?session.run.status, "Run finished");
        Ok(session.run)
    }

    /// Current status of a run, if registered
    ///
    /// # Errors
    ///
    /// Returns `StreamError::UnknownRun` if the id has no backing state.
    pub fn status(&self, run_id: &str) -> Result<RunStatus, StreamError> {
        let session = self.session(run_id)?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(session.run.status)
    }

    /// Number of registered runs
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the registry holds no runs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn session(&self, run_id: &str) -> Result<Arc<Mutex<RunSession>>, StreamError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .cloned()
            .ok_or_else(|| StreamError::UnknownRun {
                run_id: run_id.to_string(),
            })
    }
}
