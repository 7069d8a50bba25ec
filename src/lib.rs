//! # photo-mill
//!
//! Adaptive batch image converter for mixed RAW/JPEG collections.
//!
//! ## Core Philosophy
//! - **Never exhaust the machine** - concurrency follows live memory telemetry
//! - **Every file is accounted for** - duplicates and failures appear in the
//!   report, nothing is silently dropped
//! - **A bad file fails its own job** - never the run
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation layers:
//! - `core` - Discovery, dedup, the adaptive scheduler, workers, reporting
//! - `events` - Event-driven progress reporting
//! - `error` - Error taxonomy
//! - `cli` - Command-line interface

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{MillError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
