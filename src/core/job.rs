//! # Job Module
//!
//! The unit of work and its state machine.
//!
//! ## State machine
//! `Pending → Running → Done(terminal)`. Skips go straight from Pending
//! to Done. Terminal states are immutable: a second transition attempt is
//! a [`SchedulingError`], never silently absorbed.
//!
//! Single-writer is enforced by ownership, not locking: a `Job` value
//! moves from the queue into exactly one worker.

use crate::core::discover::SourceFormat;
use crate::error::{JobErrorKind, SchedulingError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Final fate of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalState {
    /// Exactly one output file was written
    Succeeded,
    /// Caught and classified; no output file exists
    Failed { kind: JobErrorKind, detail: String },
    /// A better candidate in the same shot group was selected
    SkippedDuplicate,
    /// The mirrored output already existed before the run
    SkippedExisting,
}

impl TerminalState {
    /// Short label used in the report and event stream
    pub fn label(&self) -> &'static str {
        match self {
            TerminalState::Succeeded => "Succeeded",
            TerminalState::Failed { .. } => "Failed",
            TerminalState::SkippedDuplicate => "SkippedDuplicate",
            TerminalState::SkippedExisting => "SkippedExisting",
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            TerminalState::SkippedDuplicate | TerminalState::SkippedExisting
        )
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Done(TerminalState),
}

/// One conversion: a single authoritative source to a single output path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub source: PathBuf,
    pub target: PathBuf,
    pub format: SourceFormat,
    pub size_bytes: u64,
    pub state: JobState,
}

impl Job {
    /// Create a job awaiting dispatch
    pub fn pending(source: PathBuf, target: PathBuf, format: SourceFormat, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            format,
            size_bytes,
            state: JobState::Pending,
        }
    }

    /// Create a job that is terminal from birth (duplicate / existing skips)
    pub fn skipped(
        source: PathBuf,
        target: PathBuf,
        format: SourceFormat,
        size_bytes: u64,
        state: TerminalState,
    ) -> Self {
        debug_assert!(state.is_skip());
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            format,
            size_bytes,
            state: JobState::Done(state),
        }
    }

    /// Pending → Running. The worker that owns the job calls this once.
    pub fn begin(&mut self) -> Result<(), SchedulingError> {
        match self.state {
            JobState::Pending => {
                self.state = JobState::Running;
                Ok(())
            }
            _ => Err(SchedulingError::DuplicateOutcome { id: self.id }),
        }
    }

    /// Running → Done. A second terminal transition is an invariant break.
    pub fn finish(&mut self, terminal: TerminalState) -> Result<(), SchedulingError> {
        match self.state {
            JobState::Running => {
                self.state = JobState::Done(terminal);
                Ok(())
            }
            _ => Err(SchedulingError::DuplicateOutcome { id: self.id }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Done(_))
    }
}

/// Message a worker sends to the report aggregator when a job is done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub source: PathBuf,
    pub format: SourceFormat,
    pub state: TerminalState,
    pub duration_ms: u64,
}

impl JobOutcome {
    /// Build the outcome message from a finished job
    pub fn of(job: &Job, duration_ms: u64) -> Option<Self> {
        match &job.state {
            JobState::Done(terminal) => Some(Self {
                job_id: job.id,
                source: job.source.clone(),
                format: job.format,
                state: terminal.clone(),
                duration_ms,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> Job {
        Job::pending(
            PathBuf::from("/in/img001.cr2"),
            PathBuf::from("/out/img001.jpg"),
            SourceFormat::Raw,
            4_000_000,
        )
    }

    #[test]
    fn pending_job_begins_once() {
        let mut job = pending_job();
        assert!(job.begin().is_ok());
        assert_eq!(job.state, JobState::Running);
        assert!(job.begin().is_err());
    }

    #[test]
    fn running_job_finishes_once() {
        let mut job = pending_job();
        job.begin().unwrap();
        assert!(job.finish(TerminalState::Succeeded).is_ok());
        assert!(job.is_terminal());

        // Terminal states are immutable
        let err = job.finish(TerminalState::Failed {
            kind: crate::error::JobErrorKind::Timeout,
            detail: String::new(),
        });
        assert!(err.is_err());
        assert_eq!(job.state, JobState::Done(TerminalState::Succeeded));
    }

    #[test]
    fn pending_job_cannot_finish_without_running() {
        let mut job = pending_job();
        assert!(job.finish(TerminalState::Succeeded).is_err());
    }

    #[test]
    fn skipped_jobs_are_born_terminal() {
        let job = Job::skipped(
            PathBuf::from("/in/img001.jpg"),
            PathBuf::from("/out/img001.jpg"),
            SourceFormat::Jpeg,
            2_000_000,
            TerminalState::SkippedDuplicate,
        );
        assert!(job.is_terminal());
    }

    #[test]
    fn outcome_only_exists_for_terminal_jobs() {
        let mut job = pending_job();
        assert!(JobOutcome::of(&job, 0).is_none());

        job.begin().unwrap();
        job.finish(TerminalState::Succeeded).unwrap();
        let outcome = JobOutcome::of(&job, 1500).unwrap();
        assert_eq!(outcome.state, TerminalState::Succeeded);
        assert_eq!(outcome.duration_ms, 1500);
    }

    #[test]
    fn terminal_labels_match_report_vocabulary() {
        assert_eq!(TerminalState::Succeeded.label(), "Succeeded");
        assert_eq!(TerminalState::SkippedExisting.label(), "SkippedExisting");
        assert!(TerminalState::SkippedDuplicate.is_skip());
        assert!(!TerminalState::Succeeded.is_skip());
    }
}
