//! # Hardware Module
//!
//! One-shot hardware probe and live memory sampling for the scheduler.
//!
//! The probe runs exactly once at startup and never fails the run:
//! anything it cannot determine degrades to a conservative default.

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Capability snapshot produced by [`HardwareProfiler::probe`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSnapshot {
    /// Physical core count (falls back to logical when unknown)
    pub cores: usize,
    /// Total system memory in bytes
    pub total_memory_bytes: u64,
    /// Available system memory in bytes at probe time
    pub available_memory_bytes: u64,
    /// Whether a hardware accelerator was detected
    pub has_accelerator: bool,
}

/// One-shot hardware probe
pub struct HardwareProfiler;

impl HardwareProfiler {
    /// Probe the host machine.
    ///
    /// Missing information degrades rather than errors: an unreadable
    /// accelerator flag becomes `false`, an unknown physical core count
    /// falls back to the logical count.
    pub fn probe() -> HardwareSnapshot {
        let mut sys = System::new();
        sys.refresh_memory();

        let cores = num_cpus::get_physical().max(1);

        HardwareSnapshot {
            cores,
            total_memory_bytes: sys.total_memory(),
            available_memory_bytes: sys.available_memory(),
            has_accelerator: detect_accelerator(),
        }
    }
}

/// Best-effort accelerator detection.
///
/// On Apple hardware the unified-memory GPU is worth an extra concurrency
/// step; elsewhere we have no reliable cross-platform signal and report
/// none. Detection failure is never an error.
#[cfg(target_os = "macos")]
fn detect_accelerator() -> bool {
    use std::process::Command;

    Command::new("sysctl")
        .arg("-n")
        .arg("machdep.cpu.brand_string")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|brand| brand.to_lowercase().contains("apple"))
        .unwrap_or(false)
}

#[cfg(not(target_os = "macos"))]
fn detect_accelerator() -> bool {
    false
}

/// A single memory reading fed to the scheduler's control loop
#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    /// Bytes currently available for allocation
    pub available_bytes: u64,
    /// Total bytes installed
    pub total_bytes: u64,
}

impl MemorySample {
    /// Available memory as a fraction of total, in [0.0, 1.0]
    pub fn free_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.available_bytes as f64 / self.total_bytes as f64
    }
}

/// Source of periodic memory readings.
///
/// Production uses [`SysinfoSampler`]; tests drive the control loop with
/// scripted sample sequences instead.
pub trait MemorySampler: Send {
    /// Take a fresh reading
    fn sample(&mut self) -> MemorySample;
}

/// Live sampler backed by sysinfo
pub struct SysinfoSampler {
    sys: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for SysinfoSampler {
    fn sample(&mut self) -> MemorySample {
        self.sys.refresh_memory();
        MemorySample {
            available_bytes: self.sys.available_memory(),
            total_bytes: self.sys.total_memory(),
        }
    }
}
