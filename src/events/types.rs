//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Discovery phase events (scan + dedup)
    Discover(DiscoverEvent),
    /// Per-job lifecycle events
    Job(JobEvent),
    /// Scheduler budget adjustments
    Budget(BudgetEvent),
    /// Run-level events
    Run(RunEvent),
}

/// Events during the discovery phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiscoverEvent {
    /// Walking the input tree has started
    Started { root: PathBuf },
    /// Progress update during the walk
    Progress(DiscoverProgress),
    /// An error occurred but discovery continues
    Error { path: PathBuf, message: String },
    /// Discovery completed
    Completed {
        total_jobs: usize,
        pending: usize,
        skipped: usize,
    },
}

/// Progress information during discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverProgress {
    /// Number of files seen so far
    pub files_seen: usize,
    /// Number of system files ignored so far
    pub system_files_skipped: usize,
    /// Current directory being walked
    pub current_path: PathBuf,
}

/// Per-job lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    /// A job was handed to a worker
    Dispatched { id: uuid::Uuid, source: PathBuf },
    /// A job reached a terminal state
    Finished {
        id: uuid::Uuid,
        source: PathBuf,
        outcome: String,
        duration_ms: u64,
    },
}

/// Scheduler budget adjustments from the memory control loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BudgetEvent {
    /// Concurrency caps were lowered under memory pressure
    Shrunk {
        max_workers: usize,
        max_raw_concurrent: usize,
        bytes_free: u64,
    },
    /// Concurrency caps were raised back toward the hardware ceiling
    Grown {
        max_workers: usize,
        max_raw_concurrent: usize,
        bytes_free: u64,
    },
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// The run has started
    Started,
    /// The scheduler changed phase
    PhaseChanged { phase: RunPhase },
    /// The run was cancelled; in-flight jobs are draining
    Cancelled,
    /// The run completed and the report is final
    Completed { summary: RunSummary },
}

/// Phases of a conversion run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Discovering,
    Processing,
    Draining,
    Reporting,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total jobs produced by discovery
    pub total_jobs: usize,
    /// Jobs that produced an output file
    pub succeeded: usize,
    /// Jobs that failed with a recorded error
    pub failed: usize,
    /// Jobs skipped as duplicates or already processed
    pub skipped: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Discovering => write!(f, "Discovering"),
            RunPhase::Processing => write!(f, "Processing"),
            RunPhase::Draining => write!(f, "Draining"),
            RunPhase::Reporting => write!(f, "Reporting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Discover(DiscoverEvent::Progress(DiscoverProgress {
            files_seen: 42,
            system_files_skipped: 3,
            current_path: PathBuf::from("/photos"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Discover(DiscoverEvent::Progress(p)) => {
                assert_eq!(p.files_seen, 42);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn run_summary_is_serializable() {
        let summary = RunSummary {
            total_jobs: 100,
            succeeded: 90,
            failed: 4,
            skipped: 6,
            duration_ms: 12_000,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("12000"));
    }

    #[test]
    fn phase_display_names() {
        assert_eq!(RunPhase::Processing.to_string(), "Processing");
        assert_eq!(RunPhase::Draining.to_string(), "Draining");
    }
}
