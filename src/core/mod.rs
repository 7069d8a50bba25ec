//! # Core Module
//!
//! The UI-agnostic conversion engine.
//!
//! ## Modules
//! - `hardware` - One-shot machine probe and live memory sampling
//! - `discover` - Finds sources and resolves duplicate shots
//! - `job` - The unit of work and its state machine
//! - `queue` - Thread-safe backlog of pending jobs
//! - `budget` - Concurrency caps retuned from memory telemetry
//! - `scheduler` - The adaptive worker pool
//! - `worker` - Executes one job end to end
//! - `codec` - Pixel-level capability boundary
//! - `report` - Outcome aggregation and the final report
//! - `config` - The run configuration surface
//! - `pipeline` - Wires a whole run together

pub mod budget;
pub mod codec;
pub mod config;
pub mod discover;
pub mod hardware;
pub mod job;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod scheduler;
pub mod worker;

// Re-export commonly used types
pub use config::RunConfig;
pub use discover::SourceFormat;
pub use job::{Job, JobOutcome, JobState, TerminalState};
pub use pipeline::{ConversionRun, RunResult};
pub use report::Report;
pub use scheduler::{CancellationToken, RunCompletion, SchedulerState};
