//! # Scheduler Module
//!
//! The central control loop: owns the worker pool and the resource
//! budget, and retunes both from live memory telemetry while jobs flow.
//!
//! ## Dispatch policy
//! Jobs dispatch first-discovered-first while `active < max_workers`. A
//! RAW job also needs a free slot under `max_raw_concurrent`; when the RAW
//! cap is saturated the job goes back to the front of the queue and the
//! first non-RAW job runs instead. Neither class can starve the other:
//! RAW jobs keep their queue position, non-RAW jobs keep flowing.
//!
//! ## Cancellation
//! Cancelling stops new dispatch immediately; in-flight jobs finish (or
//! time out) so no output file is ever left half-written.

use crate::core::budget::{BudgetAdjustment, BudgetController, ResourceBudget};
use crate::core::codec::{CodecHandle, ResizeTarget};
use crate::core::discover::SourceFormat;
use crate::core::hardware::MemorySampler;
use crate::core::queue::JobQueue;
use crate::core::report::ReportAggregator;
use crate::core::worker::Worker;
use crate::error::SchedulingError;
use crate::events::{BudgetEvent, Event, EventSender, JobEvent, RunEvent, RunPhase};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Run-level cancellation signal, shareable with a ctrl-c handler
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// How a scheduler run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCompletion {
    /// Queue drained, every dispatched job terminal
    Drained,
    /// Cancelled; undispatched jobs never ran
    Cancelled,
}

/// The adaptive worker pool
pub struct AdaptiveScheduler {
    budget: Arc<ResourceBudget>,
    controller: BudgetController,
    sampler: Box<dyn MemorySampler>,
    sample_interval: Duration,
    codec: CodecHandle,
    target: ResizeTarget,
    job_timeout: Duration,
    cancel: CancellationToken,
    state: SchedulerState,
}

impl AdaptiveScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        budget: Arc<ResourceBudget>,
        controller: BudgetController,
        sampler: Box<dyn MemorySampler>,
        sample_interval: Duration,
        codec: CodecHandle,
        target: ResizeTarget,
        job_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            budget,
            controller,
            sampler,
            sample_interval,
            codec,
            target,
            job_timeout,
            cancel,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Read-only view of the live budget
    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    /// Drive the queue to empty (or cancellation), sending every outcome
    /// to the aggregator.
    ///
    /// Returns how the run ended; `Err` only for invariant violations
    /// escaping a worker, which are fatal to the run.
    pub fn run(
        &mut self,
        queue: &JobQueue,
        aggregator: &ReportAggregator,
        events: &EventSender,
    ) -> Result<RunCompletion, SchedulingError> {
        self.state = SchedulerState::Running;
        events.send(Event::Run(RunEvent::PhaseChanged {
            phase: RunPhase::Processing,
        }));

        let worker = Worker::new(Arc::clone(&self.codec), self.target, self.job_timeout);
        let active_workers = AtomicUsize::new(0);
        let active_raw = AtomicUsize::new(0);
        let (fatal_tx, fatal_rx) = crossbeam_channel::unbounded::<SchedulingError>();

        // Sample immediately on entry, then on the configured cadence
        let mut next_sample = Instant::now();
        let mut draining = false;
        let mut cancelled_dispatch = false;

        std::thread::scope(|scope| {
            loop {
                if self.cancel.is_cancelled() && !cancelled_dispatch {
                    cancelled_dispatch = true;
                    events.send(Event::Run(RunEvent::Cancelled));
                    tracing::info!("cancellation requested, draining in-flight jobs");
                }
                if !fatal_rx.is_empty() {
                    // A worker hit an invariant break; stop feeding it more
                    cancelled_dispatch = true;
                }

                let now = Instant::now();
                if now >= next_sample {
                    let sample = self.sampler.sample();
                    let adjusted =
                        self.controller
                            .apply_sample(&self.budget, sample, now);
                    if let Some(direction) = adjusted {
                        let snapshot = self.budget.snapshot();
                        let event = match direction {
                            BudgetAdjustment::Shrunk => BudgetEvent::Shrunk {
                                max_workers: snapshot.max_workers,
                                max_raw_concurrent: snapshot.max_raw_concurrent,
                                bytes_free: snapshot.last_sample_bytes_free,
                            },
                            BudgetAdjustment::Grown => BudgetEvent::Grown {
                                max_workers: snapshot.max_workers,
                                max_raw_concurrent: snapshot.max_raw_concurrent,
                                bytes_free: snapshot.last_sample_bytes_free,
                            },
                        };
                        events.send(Event::Budget(event));
                    }
                    next_sample = now + self.sample_interval;
                }

                if !cancelled_dispatch {
                    self.dispatch_available(
                        queue,
                        scope,
                        &worker,
                        &active_workers,
                        &active_raw,
                        aggregator,
                        events,
                        &fatal_tx,
                    );
                }

                let idle = active_workers.load(Ordering::Acquire) == 0;
                if (queue.is_empty() || cancelled_dispatch) && idle {
                    break;
                }
                if (queue.is_empty() || cancelled_dispatch) && !draining {
                    draining = true;
                    self.state = SchedulerState::Draining;
                    events.send(Event::Run(RunEvent::PhaseChanged {
                        phase: RunPhase::Draining,
                    }));
                }

                std::thread::sleep(Duration::from_millis(5));
            }
        });

        self.state = SchedulerState::Stopped;

        if let Ok(fatal) = fatal_rx.try_recv() {
            return Err(fatal);
        }

        if self.cancel.is_cancelled() {
            Ok(RunCompletion::Cancelled)
        } else {
            Ok(RunCompletion::Drained)
        }
    }

    /// Pull and spawn jobs while budget slots are free
    #[allow(clippy::too_many_arguments)]
    fn dispatch_available<'scope, 'env>(
        &self,
        queue: &JobQueue,
        scope: &'scope std::thread::Scope<'scope, 'env>,
        worker: &'env Worker,
        active_workers: &'env AtomicUsize,
        active_raw: &'env AtomicUsize,
        aggregator: &ReportAggregator,
        events: &EventSender,
        fatal_tx: &crossbeam_channel::Sender<SchedulingError>,
    ) {
        while active_workers.load(Ordering::Acquire) < self.budget.max_workers() {
            let job = match queue.take() {
                Some(job) => job,
                None => return,
            };

            let job = if job.format == SourceFormat::Raw
                && active_raw.load(Ordering::Acquire) >= self.budget.max_raw_concurrent()
            {
                // RAW cap saturated: put it back and look for non-RAW work
                queue.push_front(job);
                match queue.take_non_raw() {
                    Some(other) => other,
                    None => return,
                }
            } else {
                job
            };

            let is_raw = job.format == SourceFormat::Raw;
            active_workers.fetch_add(1, Ordering::AcqRel);
            if is_raw {
                active_raw.fetch_add(1, Ordering::AcqRel);
            }

            events.send(Event::Job(JobEvent::Dispatched {
                id: job.id,
                source: job.source.clone(),
            }));

            let recorder = aggregator.recorder();
            let job_events = events.clone();
            let fatal = fatal_tx.clone();
            scope.spawn(move || {
                match worker.execute(job) {
                    Ok(outcome) => {
                        job_events.send(Event::Job(JobEvent::Finished {
                            id: outcome.job_id,
                            source: outcome.source.clone(),
                            outcome: outcome.state.label().to_string(),
                            duration_ms: outcome.duration_ms,
                        }));
                        recorder.record(outcome);
                    }
                    Err(violation) => {
                        let _ = fatal.send(violation);
                    }
                }
                if is_raw {
                    active_raw.fetch_sub(1, Ordering::AcqRel);
                }
                active_workers.fetch_sub(1, Ordering::AcqRel);
            });
        }
    }
}
