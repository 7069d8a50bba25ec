//! # Error Module
//!
//! Error types for the batch conversion pipeline.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Per-job errors stay per-job** - a bad file fails its own job, never the run
//! - **Include context** - paths, file names, what went wrong
//! - **Only broken invariants are fatal** - see [`SchedulingError`]

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum MillError {
    #[error("Discovery error: {0}")]
    Discover(#[from] DiscoverError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Report generation error: {0}")]
    Report(#[from] ReportError),

    #[error("Scheduling invariant violation: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while scanning and grouping source files
#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Input directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by a codec capability
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported image format: {path}")]
    Unsupported { path: PathBuf },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Out of memory while processing {path}")]
    OutOfMemory { path: PathBuf },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Failed to write output {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur during report generation
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    SerializationFailed(String),
}

/// Invariant violations inside the scheduling core.
///
/// Unlike every other error in this module these are process-fatal:
/// they mean the pipeline's own accounting broke, not that an input
/// file was bad.
#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Job {id} reported a terminal state twice")]
    DuplicateOutcome { id: uuid::Uuid },

    #[error("Report closure violated: expected {expected} outcomes, received {actual}")]
    ClosureViolation { expected: usize, actual: usize },

    #[error("Resource budget corrupted: {0}")]
    BudgetCorrupted(String),
}

/// The category recorded against a failed job in the report.
///
/// This is the user-facing taxonomy; the richer [`CodecError`] detail is
/// carried alongside it as a free-form message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JobErrorKind {
    /// The codec cannot decode this format at all
    UnsupportedFormat,
    /// Decode started but failed mid-stream
    CorruptSource,
    /// An allocation failed even after scheduler throttling
    InsufficientMemory,
    /// The job exceeded its soft deadline
    Timeout,
    /// The destination path was unwritable
    WriteFailure,
    /// The pipeline's own invariants broke while handling this job
    InternalScheduling,
}

impl std::fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobErrorKind::UnsupportedFormat => "UnsupportedFormat",
            JobErrorKind::CorruptSource => "CorruptSource",
            JobErrorKind::InsufficientMemory => "InsufficientMemory",
            JobErrorKind::Timeout => "Timeout",
            JobErrorKind::WriteFailure => "WriteFailure",
            JobErrorKind::InternalScheduling => "InternalScheduling",
        };
        write!(f, "{}", s)
    }
}

impl JobErrorKind {
    /// Classify a codec error into the report taxonomy
    pub fn from_codec(err: &CodecError) -> Self {
        match err {
            CodecError::Unsupported { .. } => JobErrorKind::UnsupportedFormat,
            CodecError::Decode { .. } => JobErrorKind::CorruptSource,
            CodecError::OutOfMemory { .. } => JobErrorKind::InsufficientMemory,
            CodecError::Encode { .. } => JobErrorKind::CorruptSource,
            CodecError::Write { .. } => JobErrorKind::WriteFailure,
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, MillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_error_includes_path() {
        let error = DiscoverError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/vacation"));
    }

    #[test]
    fn codec_error_includes_reason() {
        let error = CodecError::Decode {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
    }

    #[test]
    fn codec_errors_classify_into_report_taxonomy() {
        let unsupported = CodecError::Unsupported {
            path: PathBuf::from("/a.xyz"),
        };
        assert_eq!(
            JobErrorKind::from_codec(&unsupported),
            JobErrorKind::UnsupportedFormat
        );

        let oom = CodecError::OutOfMemory {
            path: PathBuf::from("/a.cr2"),
        };
        assert_eq!(
            JobErrorKind::from_codec(&oom),
            JobErrorKind::InsufficientMemory
        );
    }

    #[test]
    fn error_kind_display_matches_report_strings() {
        assert_eq!(JobErrorKind::Timeout.to_string(), "Timeout");
        assert_eq!(
            JobErrorKind::UnsupportedFormat.to_string(),
            "UnsupportedFormat"
        );
    }

    #[test]
    fn closure_violation_names_both_counts() {
        let error = SchedulingError::ClosureViolation {
            expected: 10,
            actual: 9,
        };
        let message = error.to_string();
        assert!(message.contains("10"));
        assert!(message.contains("9"));
    }
}
