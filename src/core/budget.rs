//! # Budget Module
//!
//! The process-wide concurrency budget and the control policy that
//! retunes it from memory telemetry.
//!
//! ## Ownership
//! [`ResourceBudget`] is the single piece of shared mutable state in the
//! scheduler. The control loop is its only writer; dispatch reads it
//! through atomics. Workers never touch it.
//!
//! ## Policy
//! Below the low watermark the RAW cap shrinks first (RAW decode dominates
//! memory use); only when it is already at 1 does the general worker cap
//! shrink. Growth requires the high watermark AND a full cooldown without
//! pressure. Both directions are rate-limited to one step per cooldown
//! window, which is what keeps the pool from flapping.

use crate::core::hardware::{HardwareSnapshot, MemorySample};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Hardware-derived ceilings the budget can never exceed
#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub worker_ceiling: usize,
    pub raw_ceiling: usize,
}

impl BudgetLimits {
    /// Derive ceilings from the hardware snapshot.
    ///
    /// An accelerator doubles the worker ceiling; the RAW ceiling defaults
    /// to half the cores. Overrides clamp, they never raise above what the
    /// caller asked for.
    pub fn from_snapshot(
        snapshot: &HardwareSnapshot,
        worker_override: Option<usize>,
        raw_override: Option<usize>,
    ) -> Self {
        let multiplier = if snapshot.has_accelerator { 2 } else { 1 };
        let mut worker_ceiling = (snapshot.cores * multiplier).max(1);
        if let Some(cap) = worker_override {
            worker_ceiling = worker_ceiling.min(cap.max(1));
        }

        let mut raw_ceiling = (snapshot.cores / 2).max(1);
        if let Some(cap) = raw_override {
            raw_ceiling = raw_ceiling.min(cap.max(1));
        }
        raw_ceiling = raw_ceiling.min(worker_ceiling);

        Self {
            worker_ceiling,
            raw_ceiling,
        }
    }
}

/// Watermarks and cadence for the control loop.
///
/// These are policy constants without one true value; they ship as
/// configuration and tests parametrize over them.
#[derive(Debug, Clone, Copy)]
pub struct BudgetPolicy {
    /// Shrink below this fraction of memory free (percent)
    pub low_watermark_pct: u8,
    /// Grow above this fraction of memory free (percent)
    pub high_watermark_pct: u8,
    /// Minimum time between adjustments in one direction
    pub cooldown: Duration,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            low_watermark_pct: 15,
            high_watermark_pct: 40,
            cooldown: Duration::from_secs(5),
        }
    }
}

/// Read-only view of the budget at a point in time
#[derive(Debug, Clone, Copy)]
pub struct BudgetSnapshot {
    pub max_workers: usize,
    pub max_raw_concurrent: usize,
    pub last_sample_bytes_free: u64,
}

/// The live concurrency budget: single-writer, many-reader
pub struct ResourceBudget {
    max_workers: AtomicUsize,
    max_raw_concurrent: AtomicUsize,
    last_sample_bytes_free: AtomicU64,
}

impl ResourceBudget {
    /// Start at the hardware ceilings; pressure only ever shrinks from here
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            max_workers: AtomicUsize::new(limits.worker_ceiling),
            max_raw_concurrent: AtomicUsize::new(limits.raw_ceiling),
            last_sample_bytes_free: AtomicU64::new(0),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers.load(Ordering::Acquire)
    }

    pub fn max_raw_concurrent(&self) -> usize {
        self.max_raw_concurrent.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            max_workers: self.max_workers(),
            max_raw_concurrent: self.max_raw_concurrent(),
            last_sample_bytes_free: self.last_sample_bytes_free.load(Ordering::Acquire),
        }
    }
}

/// Direction of a budget adjustment, for events and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetAdjustment {
    Shrunk,
    Grown,
}

/// The control loop's state: owns the write side of the budget.
///
/// `apply_sample` takes the current time as an argument so tests can
/// drive it with artificial clocks and sample sequences.
pub struct BudgetController {
    limits: BudgetLimits,
    policy: BudgetPolicy,
    last_shrink: Option<Instant>,
    last_grow: Option<Instant>,
    last_pressure: Option<Instant>,
}

impl BudgetController {
    pub fn new(limits: BudgetLimits, policy: BudgetPolicy) -> Self {
        Self {
            limits,
            policy,
            last_shrink: None,
            last_grow: None,
            last_pressure: None,
        }
    }

    /// Feed one memory sample into the policy.
    ///
    /// Returns the adjustment made, if any. Caps never leave the range
    /// `[1, ceiling]` no matter what the sample sequence looks like.
    pub fn apply_sample(
        &mut self,
        budget: &ResourceBudget,
        sample: MemorySample,
        now: Instant,
    ) -> Option<BudgetAdjustment> {
        budget
            .last_sample_bytes_free
            .store(sample.available_bytes, Ordering::Release);

        let free_pct = sample.free_fraction() * 100.0;

        if free_pct < self.policy.low_watermark_pct as f64 {
            self.last_pressure = Some(now);
            if !self.cooled_down(self.last_shrink, now) {
                return None;
            }

            let raw = budget.max_raw_concurrent();
            let workers = budget.max_workers();
            if raw > 1 {
                budget
                    .max_raw_concurrent
                    .store(raw - 1, Ordering::Release);
            } else if workers > 1 {
                budget.max_workers.store(workers - 1, Ordering::Release);
            } else {
                // Already at the floor; nothing left to give back
                return None;
            }
            self.last_shrink = Some(now);
            tracing::info!(
                max_workers = budget.max_workers(),
                max_raw = budget.max_raw_concurrent(),
                free_pct,
                "memory pressure: shrinking concurrency"
            );
            return Some(BudgetAdjustment::Shrunk);
        }

        if free_pct > self.policy.high_watermark_pct as f64 {
            // Growth needs a quiet cooldown: no pressure seen and no
            // recent grow step
            if !self.cooled_down(self.last_pressure, now) || !self.cooled_down(self.last_grow, now)
            {
                return None;
            }

            let workers = budget.max_workers();
            let raw = budget.max_raw_concurrent();
            let mut grew = false;
            if workers < self.limits.worker_ceiling {
                budget.max_workers.store(workers + 1, Ordering::Release);
                grew = true;
            }
            if raw < self.limits.raw_ceiling {
                budget.max_raw_concurrent.store(raw + 1, Ordering::Release);
                grew = true;
            }
            if !grew {
                return None;
            }
            self.last_grow = Some(now);
            tracing::debug!(
                max_workers = budget.max_workers(),
                max_raw = budget.max_raw_concurrent(),
                "memory recovered: growing concurrency"
            );
            return Some(BudgetAdjustment::Grown);
        }

        // Between the watermarks: hysteresis band, no change
        None
    }

    fn cooled_down(&self, last: Option<Instant>, now: Instant) -> bool {
        match last {
            Some(t) => now.duration_since(t) >= self.policy.cooldown,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cores: usize) -> HardwareSnapshot {
        HardwareSnapshot {
            cores,
            total_memory_bytes: 2 * 1024 * 1024 * 1024,
            available_memory_bytes: 1024 * 1024 * 1024,
            has_accelerator: false,
        }
    }

    fn sample(free_pct: u64) -> MemorySample {
        let total = 2 * 1024 * 1024 * 1024u64;
        MemorySample {
            available_bytes: total * free_pct / 100,
            total_bytes: total,
        }
    }

    fn setup(cores: usize, policy: BudgetPolicy) -> (ResourceBudget, BudgetController) {
        let limits = BudgetLimits::from_snapshot(&snapshot(cores), None, None);
        (
            ResourceBudget::new(limits),
            BudgetController::new(limits, policy),
        )
    }

    #[test]
    fn limits_respect_overrides() {
        let limits = BudgetLimits::from_snapshot(&snapshot(8), Some(4), Some(1));
        assert_eq!(limits.worker_ceiling, 4);
        assert_eq!(limits.raw_ceiling, 1);
    }

    #[test]
    fn accelerator_doubles_worker_ceiling() {
        let mut snap = snapshot(4);
        snap.has_accelerator = true;
        let limits = BudgetLimits::from_snapshot(&snap, None, None);
        assert_eq!(limits.worker_ceiling, 8);
    }

    #[test]
    fn raw_ceiling_never_exceeds_worker_ceiling() {
        let limits = BudgetLimits::from_snapshot(&snapshot(8), Some(2), None);
        assert!(limits.raw_ceiling <= limits.worker_ceiling);
    }

    #[test]
    fn pressure_shrinks_raw_cap_before_workers() {
        let (budget, mut controller) = setup(4, BudgetPolicy::default());
        let start_workers = budget.max_workers();
        let t0 = Instant::now();

        let adjusted = controller.apply_sample(&budget, sample(10), t0);
        assert_eq!(adjusted, Some(BudgetAdjustment::Shrunk));
        assert_eq!(budget.max_raw_concurrent(), 1);
        assert_eq!(budget.max_workers(), start_workers);
    }

    #[test]
    fn sustained_pressure_eventually_shrinks_workers() {
        let policy = BudgetPolicy {
            cooldown: Duration::from_secs(5),
            ..Default::default()
        };
        let (budget, mut controller) = setup(4, policy);
        let t0 = Instant::now();

        // One shrink per cooldown window until both caps bottom out
        for step in 0..20 {
            let now = t0 + Duration::from_secs(5 * step);
            controller.apply_sample(&budget, sample(5), now);
        }

        assert_eq!(budget.max_raw_concurrent(), 1);
        assert_eq!(budget.max_workers(), 1);
    }

    #[test]
    fn caps_never_fall_below_one() {
        let (budget, mut controller) = setup(1, BudgetPolicy::default());
        let t0 = Instant::now();

        for step in 0..50 {
            let now = t0 + Duration::from_secs(10 * step);
            controller.apply_sample(&budget, sample(1), now);
            assert!(budget.max_workers() >= 1);
            assert!(budget.max_raw_concurrent() >= 1);
        }
    }

    #[test]
    fn caps_never_exceed_ceilings() {
        let limits = BudgetLimits::from_snapshot(&snapshot(4), None, None);
        let (budget, mut controller) = setup(4, BudgetPolicy::default());
        let t0 = Instant::now();

        for step in 0..50 {
            let now = t0 + Duration::from_secs(10 * step);
            controller.apply_sample(&budget, sample(95), now);
            assert!(budget.max_workers() <= limits.worker_ceiling);
            assert!(budget.max_raw_concurrent() <= limits.raw_ceiling);
        }
    }

    #[test]
    fn no_flapping_within_one_cooldown_window() {
        let policy = BudgetPolicy {
            low_watermark_pct: 15,
            high_watermark_pct: 40,
            cooldown: Duration::from_secs(5),
        };
        let (budget, mut controller) = setup(8, policy);
        let t0 = Instant::now();

        // Cross both thresholds repeatedly inside a single cooldown window
        let mut shrinks = 0;
        let mut grows = 0;
        for step in 0..10 {
            let now = t0 + Duration::from_millis(200 * step);
            let s = if step % 2 == 0 { sample(5) } else { sample(80) };
            match controller.apply_sample(&budget, s, now) {
                Some(BudgetAdjustment::Shrunk) => shrinks += 1,
                Some(BudgetAdjustment::Grown) => grows += 1,
                None => {}
            }
        }

        assert!(shrinks <= 1, "shrank {} times in one window", shrinks);
        assert!(grows <= 1, "grew {} times in one window", grows);
    }

    #[test]
    fn growth_requires_quiet_cooldown_after_pressure() {
        let policy = BudgetPolicy {
            cooldown: Duration::from_secs(5),
            ..Default::default()
        };
        let (budget, mut controller) = setup(8, policy);
        let t0 = Instant::now();

        // Shrink once
        controller.apply_sample(&budget, sample(5), t0);
        let shrunk_raw = budget.max_raw_concurrent();

        // Memory recovers immediately, but the cooldown hasn't passed
        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(controller.apply_sample(&budget, sample(80), t1), None);
        assert_eq!(budget.max_raw_concurrent(), shrunk_raw);

        // After a full quiet window the caps grow back
        let t2 = t0 + Duration::from_secs(6);
        assert_eq!(
            controller.apply_sample(&budget, sample(80), t2),
            Some(BudgetAdjustment::Grown)
        );
        assert_eq!(budget.max_raw_concurrent(), shrunk_raw + 1);
    }

    #[test]
    fn band_between_watermarks_changes_nothing() {
        let (budget, mut controller) = setup(4, BudgetPolicy::default());
        let before = budget.snapshot();
        let t0 = Instant::now();

        // 25% free sits between 15% and 40%
        assert_eq!(controller.apply_sample(&budget, sample(25), t0), None);
        let after = budget.snapshot();
        assert_eq!(before.max_workers, after.max_workers);
        assert_eq!(before.max_raw_concurrent, after.max_raw_concurrent);
    }

    #[test]
    fn sample_bytes_are_always_recorded() {
        let (budget, mut controller) = setup(4, BudgetPolicy::default());
        let s = sample(25);
        controller.apply_sample(&budget, s, Instant::now());
        assert_eq!(
            budget.snapshot().last_sample_bytes_free,
            s.available_bytes
        );
    }

    #[test]
    fn thresholds_are_parametrizable() {
        // The same sample shrinks under one policy and not another
        for (low, should_shrink) in [(30u8, true), (10u8, false)] {
            let policy = BudgetPolicy {
                low_watermark_pct: low,
                high_watermark_pct: 60,
                cooldown: Duration::from_secs(5),
            };
            let (budget, mut controller) = setup(4, policy);
            let result = controller.apply_sample(&budget, sample(20), Instant::now());
            assert_eq!(result.is_some(), should_shrink, "low watermark {}", low);
        }
    }
}
