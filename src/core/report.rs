//! # Report Module
//!
//! Collects terminal job outcomes and renders the final report.
//!
//! Workers send outcomes over a channel rather than mutating shared
//! state; the aggregator drains the channel once everything has joined.
//! Closure is checked at finalize time: every job discovery produced must
//! appear exactly once, or the run's own accounting is broken and the
//! error is fatal.

use crate::core::job::{JobOutcome, TerminalState};
use crate::error::{ReportError, SchedulingError};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the text report written into the output directory
pub const REPORT_FILE_NAME: &str = "processing_report.txt";

/// One line of the final report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub job_id: uuid::Uuid,
    pub source: PathBuf,
    pub state: TerminalState,
    pub duration_ms: u64,
}

/// Summary counts over all entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_duplicate: usize,
    pub skipped_existing: usize,
}

impl ReportSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_duplicate + self.skipped_existing
    }
}

/// The finalized run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: chrono::DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
    pub summary: ReportSummary,
    pub duration_ms: u64,
}

impl Report {
    /// Render the human-readable text form
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("photo-mill processing report\n");
        out.push_str(&format!(
            "generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        for entry in &self.entries {
            match &entry.state {
                TerminalState::Failed { kind, detail } => {
                    out.push_str(&format!(
                        "{} | Failed ({}) | {} ms | {}\n",
                        entry.source.display(),
                        kind,
                        entry.duration_ms,
                        detail
                    ));
                }
                other => {
                    out.push_str(&format!(
                        "{} | {} | {} ms\n",
                        entry.source.display(),
                        other.label(),
                        entry.duration_ms
                    ));
                }
            }
        }

        out.push_str(&format!(
            "\nsummary: {} total, {} succeeded, {} failed, {} skipped\n",
            self.summary.total,
            self.summary.succeeded,
            self.summary.failed,
            self.summary.skipped()
        ));
        out
    }

    /// Write the text report into the output directory
    pub fn write_to(&self, output_dir: &Path) -> Result<PathBuf, ReportError> {
        let path = output_dir.join(REPORT_FILE_NAME);
        fs::create_dir_all(output_dir).map_err(|e| ReportError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, self.render_text()).map_err(|e| ReportError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Serialize the report as pretty JSON
    pub fn to_json(&self) -> Result<String, ReportError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReportError::SerializationFailed(e.to_string()))
    }
}

/// Clonable handle workers use to report outcomes
#[derive(Clone)]
pub struct OutcomeRecorder {
    sender: Sender<JobOutcome>,
}

impl OutcomeRecorder {
    /// Record one terminal outcome. Never blocks, never fails: if the
    /// aggregator is gone the run is already over.
    pub fn record(&self, outcome: JobOutcome) {
        let _ = self.sender.send(outcome);
    }
}

/// Concurrent append-only collector of job outcomes
pub struct ReportAggregator {
    sender: Sender<JobOutcome>,
    receiver: Receiver<JobOutcome>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Hand out a recorder for a worker thread
    pub fn recorder(&self) -> OutcomeRecorder {
        OutcomeRecorder {
            sender: self.sender.clone(),
        }
    }

    /// Record from the current thread
    pub fn record(&self, outcome: JobOutcome) {
        let _ = self.sender.send(outcome);
    }

    /// Drain everything recorded and build the final report.
    ///
    /// All workers must have finished by now. `expected_total` is the job
    /// count discovery produced; any mismatch or duplicate job id is an
    /// invariant violation.
    pub fn finalize(
        self,
        expected_total: usize,
        run_duration_ms: u64,
    ) -> Result<Report, SchedulingError> {
        self.drain(Some(expected_total), run_duration_ms)
    }

    /// Finalize a cancelled run: report whatever reached a terminal state
    /// without enforcing closure (undispatched jobs never got an outcome).
    pub fn finalize_partial(self, run_duration_ms: u64) -> Result<Report, SchedulingError> {
        self.drain(None, run_duration_ms)
    }

    fn drain(
        self,
        expected_total: Option<usize>,
        run_duration_ms: u64,
    ) -> Result<Report, SchedulingError> {
        drop(self.sender);

        let mut entries = Vec::new();
        let mut seen: HashSet<uuid::Uuid> = HashSet::new();
        let mut summary = ReportSummary::default();

        for outcome in self.receiver.try_iter() {
            if !seen.insert(outcome.job_id) {
                return Err(SchedulingError::DuplicateOutcome {
                    id: outcome.job_id,
                });
            }

            summary.total += 1;
            match &outcome.state {
                TerminalState::Succeeded => summary.succeeded += 1,
                TerminalState::Failed { .. } => summary.failed += 1,
                TerminalState::SkippedDuplicate => summary.skipped_duplicate += 1,
                TerminalState::SkippedExisting => summary.skipped_existing += 1,
            }

            entries.push(ReportEntry {
                job_id: outcome.job_id,
                source: outcome.source,
                state: outcome.state,
                duration_ms: outcome.duration_ms,
            });
        }

        if let Some(expected) = expected_total {
            if summary.total != expected {
                return Err(SchedulingError::ClosureViolation {
                    expected,
                    actual: summary.total,
                });
            }
        }

        Ok(Report {
            generated_at: Utc::now(),
            entries,
            summary,
            duration_ms: run_duration_ms,
        })
    }
}

impl Default for ReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}
