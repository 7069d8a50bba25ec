//! # Pipeline Module
//!
//! Wires the run together: probe hardware, discover and dedup, schedule,
//! aggregate, write the report.
//!
//! [`ConversionRun`] is one-shot; build it, execute it, read the result.
//! Collaborators (codec, memory sampler, hardware snapshot, cancellation)
//! are injectable through the builder, which is how the tests drive the
//! scheduler with scripted memory curves and failing codecs.

use crate::core::budget::{BudgetController, BudgetLimits, ResourceBudget};
use crate::core::codec::{BuiltinCodec, CodecHandle};
use crate::core::config::RunConfig;
use crate::core::discover::{Deduplicator, DiscoveryStats};
use crate::core::hardware::{
    HardwareProfiler, HardwareSnapshot, MemorySampler, SysinfoSampler,
};
use crate::core::job::JobOutcome;
use crate::core::queue::JobQueue;
use crate::core::report::{Report, ReportAggregator};
use crate::core::scheduler::{
    AdaptiveScheduler, CancellationToken, RunCompletion,
};
use crate::error::Result;
use crate::events::{Event, EventSender, RunEvent, RunPhase, RunSummary};
use crate::events::null_sender;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Result of a completed (or cancelled) run
#[derive(Debug)]
pub struct RunResult {
    pub report: Report,
    pub completion: RunCompletion,
    pub stats: DiscoveryStats,
    /// Where processing_report.txt was written
    pub report_path: PathBuf,
}

/// Builder for a conversion run
pub struct ConversionRunBuilder {
    config: RunConfig,
    codec: Option<CodecHandle>,
    sampler: Option<Box<dyn MemorySampler>>,
    snapshot: Option<HardwareSnapshot>,
    cancel: Option<CancellationToken>,
}

impl ConversionRunBuilder {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            codec: None,
            sampler: None,
            snapshot: None,
            cancel: None,
        }
    }

    /// Substitute the codec capability (tests inject stubs here)
    pub fn codec(mut self, codec: CodecHandle) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Substitute the memory sampler
    pub fn sampler(mut self, sampler: Box<dyn MemorySampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Substitute the hardware snapshot instead of probing
    pub fn hardware(mut self, snapshot: HardwareSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Share a cancellation token with the caller (e.g. a ctrl-c handler)
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> ConversionRun {
        ConversionRun {
            config: self.config,
            codec: self.codec.unwrap_or_else(|| Arc::new(BuiltinCodec::new())),
            sampler: self
                .sampler
                .unwrap_or_else(|| Box::new(SysinfoSampler::new())),
            snapshot: self.snapshot,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

/// One end-to-end conversion run
pub struct ConversionRun {
    config: RunConfig,
    codec: CodecHandle,
    sampler: Box<dyn MemorySampler>,
    snapshot: Option<HardwareSnapshot>,
    cancel: CancellationToken,
}

impl ConversionRun {
    pub fn builder(config: RunConfig) -> ConversionRunBuilder {
        ConversionRunBuilder::new(config)
    }

    /// Execute without progress reporting
    pub fn execute(self) -> Result<RunResult> {
        self.execute_with_events(&null_sender())
    }

    /// Execute, emitting progress events along the way.
    ///
    /// Always writes `processing_report.txt` into the output directory,
    /// including on cancellation; only invariant violations abort early.
    pub fn execute_with_events(self, events: &EventSender) -> Result<RunResult> {
        self.config.validate()?;
        let start = Instant::now();

        events.send(Event::Run(RunEvent::Started));

        let snapshot = self.snapshot.unwrap_or_else(HardwareProfiler::probe);
        tracing::info!(
            cores = snapshot.cores,
            total_gb = snapshot.total_memory_bytes / (1024 * 1024 * 1024),
            accelerator = snapshot.has_accelerator,
            "hardware probe"
        );

        // Phase 1: discovery. All dedup decisions land before anything
        // is dispatched.
        events.send(Event::Run(RunEvent::PhaseChanged {
            phase: RunPhase::Discovering,
        }));
        let deduplicator = Deduplicator::new(
            self.config.input_dir.clone(),
            self.config.output_dir.clone(),
            self.config.scan_config(),
        );
        let discovery = deduplicator.scan(events)?;
        let total_jobs = discovery.jobs.len();
        let stats = discovery.stats.clone();

        // Skips are terminal from birth; record them before scheduling
        let aggregator = ReportAggregator::new();
        let mut pending = Vec::new();
        for job in discovery.jobs {
            if job.is_terminal() {
                if let Some(outcome) = JobOutcome::of(&job, 0) {
                    aggregator.record(outcome);
                }
            } else {
                pending.push(job);
            }
        }

        // Phase 2: schedule everything that survived dedup
        let limits = BudgetLimits::from_snapshot(
            &snapshot,
            self.config.max_workers,
            self.config.max_raw_concurrent,
        );
        let budget = Arc::new(ResourceBudget::new(limits));
        let controller = BudgetController::new(limits, self.config.budget_policy());
        let mut scheduler = AdaptiveScheduler::new(
            budget,
            controller,
            self.sampler,
            self.config.sample_interval,
            self.codec,
            self.config.resize_target(),
            self.config.job_timeout,
            self.cancel.clone(),
        );

        let queue = JobQueue::new(pending);
        let completion = scheduler.run(&queue, &aggregator, events)?;

        // Phase 3: fold outcomes into the report
        events.send(Event::Run(RunEvent::PhaseChanged {
            phase: RunPhase::Reporting,
        }));
        let duration_ms = start.elapsed().as_millis() as u64;
        let report = match completion {
            RunCompletion::Drained => aggregator.finalize(total_jobs, duration_ms)?,
            RunCompletion::Cancelled => aggregator.finalize_partial(duration_ms)?,
        };

        let report_path = report.write_to(&self.config.output_dir)?;

        events.send(Event::Run(RunEvent::Completed {
            summary: RunSummary {
                total_jobs: report.summary.total,
                succeeded: report.summary.succeeded,
                failed: report.summary.failed,
                skipped: report.summary.skipped(),
                duration_ms,
            },
        }));

        Ok(RunResult {
            report,
            completion,
            stats,
            report_path,
        })
    }
}
