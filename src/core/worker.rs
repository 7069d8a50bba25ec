//! # Worker Module
//!
//! Executes one job end to end and isolates every failure.
//!
//! ## Pipeline
//! probe → decode → orientation → resample → encode → atomic write.
//! The soft deadline is checked between stages; outputs go through a
//! temp-file-then-rename so a crash or timeout never leaves a half-written
//! file at the target path.
//!
//! A worker returns `Err` only for [`SchedulingError`] - its own
//! invariants breaking. Everything a bad input file can cause is caught,
//! classified and folded into the job's terminal state.

use crate::core::codec::{apply_orientation, read_orientation, CodecHandle, ResizeTarget};
use crate::core::job::{Job, JobOutcome, TerminalState};
use crate::error::{JobErrorKind, SchedulingError};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Executes jobs against a codec capability
pub struct Worker {
    codec: CodecHandle,
    target: ResizeTarget,
    timeout: Duration,
}

impl Worker {
    pub fn new(codec: CodecHandle, target: ResizeTarget, timeout: Duration) -> Self {
        Self {
            codec,
            target,
            timeout,
        }
    }

    /// Run the job to a terminal state and produce its outcome message.
    ///
    /// `Err` here is an invariant violation (job was not Pending), which
    /// the scheduler treats as fatal.
    pub fn execute(&self, mut job: Job) -> Result<JobOutcome, SchedulingError> {
        let start = Instant::now();
        job.begin()?;

        tracing::debug!(source = %job.source.display(), format = %job.format, "job started");

        let terminal = match self.run_pipeline(&job, start) {
            Ok(()) => TerminalState::Succeeded,
            Err((kind, detail)) => {
                tracing::warn!(
                    source = %job.source.display(),
                    kind = %kind,
                    detail = detail.as_str(),
                    "job failed"
                );
                TerminalState::Failed { kind, detail }
            }
        };

        job.finish(terminal)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        JobOutcome::of(&job, duration_ms).ok_or(SchedulingError::DuplicateOutcome { id: job.id })
    }

    fn run_pipeline(&self, job: &Job, start: Instant) -> Result<(), (JobErrorKind, String)> {
        if !self.codec.probe(&job.source, job.format) {
            return Err((
                JobErrorKind::UnsupportedFormat,
                format!("no codec for {}", job.source.display()),
            ));
        }

        let image = self
            .codec
            .decode(&job.source, job.format)
            .map_err(|e| (JobErrorKind::from_codec(&e), e.to_string()))?;
        self.check_deadline(start)?;

        let orientation = read_orientation(&job.source);
        let image = apply_orientation(image, orientation);
        self.check_deadline(start)?;

        let image = self
            .codec
            .resample(image, self.target)
            .map_err(|e| (JobErrorKind::from_codec(&e), e.to_string()))?;
        self.check_deadline(start)?;

        let bytes = self
            .codec
            .encode(&image, self.target)
            .map_err(|e| (JobErrorKind::from_codec(&e), e.to_string()))?;
        self.check_deadline(start)?;

        write_atomic(&job.target, &bytes)
            .map_err(|e| (JobErrorKind::WriteFailure, e.to_string()))?;

        Ok(())
    }

    fn check_deadline(&self, start: Instant) -> Result<(), (JobErrorKind, String)> {
        if start.elapsed() > self.timeout {
            return Err((
                JobErrorKind::Timeout,
                format!("exceeded soft deadline of {:?}", self.timeout),
            ));
        }
        Ok(())
    }
}

/// Write bytes to a temp file next to the target, then rename into place.
///
/// The temp file is deleted on any error path; the target path either
/// holds the complete output or nothing.
fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{Codec, RasterImage};
    use crate::core::discover::SourceFormat;
    use crate::error::CodecError;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Codec stub with scriptable behavior per stage
    #[derive(Default)]
    struct StubCodec {
        refuse_probe: bool,
        fail_decode: bool,
        decode_delay: Option<Duration>,
        fail_encode: bool,
    }

    impl Codec for StubCodec {
        fn probe(&self, _path: &Path, _format: SourceFormat) -> bool {
            !self.refuse_probe
        }

        fn decode(&self, path: &Path, _format: SourceFormat) -> Result<RasterImage, CodecError> {
            if let Some(delay) = self.decode_delay {
                std::thread::sleep(delay);
            }
            if self.fail_decode {
                return Err(CodecError::Decode {
                    path: path.to_path_buf(),
                    reason: "truncated stream".to_string(),
                });
            }
            Ok(RasterImage::new(2, 2, vec![128; 12]))
        }

        fn resample(
            &self,
            image: RasterImage,
            _target: ResizeTarget,
        ) -> Result<RasterImage, CodecError> {
            Ok(image)
        }

        fn encode(&self, _image: &RasterImage, _target: ResizeTarget) -> Result<Vec<u8>, CodecError> {
            if self.fail_encode {
                return Err(CodecError::Encode {
                    path: PathBuf::new(),
                    reason: "encoder exploded".to_string(),
                });
            }
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }
    }

    fn worker_with(codec: StubCodec, timeout: Duration) -> Worker {
        Worker::new(
            Arc::new(codec),
            ResizeTarget {
                max_side: 3000,
                quality: 90,
            },
            timeout,
        )
    }

    fn job_into(dir: &TempDir) -> Job {
        Job::pending(
            PathBuf::from("/in/img001.jpg"),
            dir.path().join("img001.jpg"),
            SourceFormat::Jpeg,
            1_000,
        )
    }

    #[test]
    fn successful_job_writes_exactly_one_output() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(StubCodec::default(), Duration::from_secs(30));

        let outcome = worker.execute(job_into(&out)).unwrap();

        assert_eq!(outcome.state, TerminalState::Succeeded);
        assert!(out.path().join("img001.jpg").exists());
        // Nothing else in the directory: the temp file was renamed away
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn refused_probe_fails_with_unsupported_format() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(
            StubCodec {
                refuse_probe: true,
                ..Default::default()
            },
            Duration::from_secs(30),
        );

        let outcome = worker.execute(job_into(&out)).unwrap();

        match outcome.state {
            TerminalState::Failed { kind, .. } => {
                assert_eq!(kind, JobErrorKind::UnsupportedFormat)
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!out.path().join("img001.jpg").exists());
    }

    #[test]
    fn decode_error_fails_with_corrupt_source() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(
            StubCodec {
                fail_decode: true,
                ..Default::default()
            },
            Duration::from_secs(30),
        );

        let outcome = worker.execute(job_into(&out)).unwrap();

        match outcome.state {
            TerminalState::Failed { kind, detail } => {
                assert_eq!(kind, JobErrorKind::CorruptSource);
                assert!(detail.contains("truncated"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn slow_decode_times_out_and_leaves_no_files() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(
            StubCodec {
                decode_delay: Some(Duration::from_millis(80)),
                ..Default::default()
            },
            Duration::from_millis(10),
        );

        let outcome = worker.execute(job_into(&out)).unwrap();

        match outcome.state {
            TerminalState::Failed { kind, .. } => assert_eq!(kind, JobErrorKind::Timeout),
            other => panic!("expected timeout, got {:?}", other),
        }
        // Neither the output nor any leftover temp file
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn encode_error_is_classified_and_contained() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(
            StubCodec {
                fail_encode: true,
                ..Default::default()
            },
            Duration::from_secs(30),
        );

        let outcome = worker.execute(job_into(&out)).unwrap();
        assert!(matches!(outcome.state, TerminalState::Failed { .. }));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_target_fails_with_write_failure() {
        let worker = worker_with(StubCodec::default(), Duration::from_secs(30));
        // /proc is not writable on any sane system
        let job = Job::pending(
            PathBuf::from("/in/img001.jpg"),
            PathBuf::from("/proc/photo_mill_denied/img001.jpg"),
            SourceFormat::Jpeg,
            1_000,
        );

        let outcome = worker.execute(job).unwrap();

        match outcome.state {
            TerminalState::Failed { kind, .. } => assert_eq!(kind, JobErrorKind::WriteFailure),
            other => panic!("expected write failure, got {:?}", other),
        }
    }

    #[test]
    fn executing_a_terminal_job_is_an_invariant_violation() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(StubCodec::default(), Duration::from_secs(30));

        let job = Job::skipped(
            PathBuf::from("/in/a.jpg"),
            out.path().join("a.jpg"),
            SourceFormat::Jpeg,
            1_000,
            TerminalState::SkippedDuplicate,
        );

        assert!(worker.execute(job).is_err());
    }

    #[test]
    fn outcome_duration_is_populated() {
        let out = TempDir::new().unwrap();
        let worker = worker_with(
            StubCodec {
                decode_delay: Some(Duration::from_millis(20)),
                ..Default::default()
            },
            Duration::from_secs(30),
        );

        let outcome = worker.execute(job_into(&out)).unwrap();
        assert!(outcome.duration_ms >= 20);
    }
}
