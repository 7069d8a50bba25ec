//! # Config Module
//!
//! The run configuration surface. Every tunable of a conversion run
//! lives here with its default; the CLI only fills this struct in.

use crate::core::budget::BudgetPolicy;
use crate::core::codec::ResizeTarget;
use crate::core::discover::ScanConfig;
use crate::error::{MillError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default longest output side; balances quality against file size for
/// print and archive use
pub const DEFAULT_MAX_SIDE: u32 = 3000;

/// Default JPEG quality; photographic work should not go below 85
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Full configuration of one conversion run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Longest allowed output side in pixels
    pub max_side: u32,
    /// JPEG quality 1-100; values below 85 are raised to 85 at encode time
    pub jpeg_quality: u8,
    /// Ceiling override for the general worker cap
    pub max_workers: Option<usize>,
    /// Ceiling override for concurrent RAW decodes
    pub max_raw_concurrent: Option<usize>,
    /// Soft per-job deadline
    pub job_timeout: Duration,
    /// Shrink concurrency below this percent of memory free
    pub low_watermark_pct: u8,
    /// Grow concurrency above this percent of memory free
    pub high_watermark_pct: u8,
    /// Memory sampling cadence
    pub sample_interval: Duration,
    /// Minimum quiet period between budget adjustments in one direction
    pub cooldown: Duration,
    /// Whether RAW files participate in the run at all
    pub process_raw: bool,
    /// Whether hidden files and directories are scanned
    pub include_hidden: bool,
}

impl RunConfig {
    /// Defaults for everything except the two directories
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
            max_side: DEFAULT_MAX_SIDE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_workers: None,
            max_raw_concurrent: None,
            job_timeout: Duration::from_secs(120),
            low_watermark_pct: 15,
            high_watermark_pct: 40,
            sample_interval: Duration::from_secs(2),
            cooldown: Duration::from_secs(5),
            process_raw: true,
            include_hidden: false,
        }
    }

    /// Reject configurations that cannot produce a sane run
    pub fn validate(&self) -> Result<()> {
        if self.max_side == 0 || self.max_side > 10_000 {
            return Err(MillError::Config(format!(
                "max side must be 1-10000 pixels, got {}",
                self.max_side
            )));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(MillError::Config(format!(
                "JPEG quality must be 1-100, got {}",
                self.jpeg_quality
            )));
        }
        if self.low_watermark_pct >= self.high_watermark_pct {
            return Err(MillError::Config(format!(
                "low watermark ({}%) must be below high watermark ({}%); \
                 equal thresholds make the pool flap",
                self.low_watermark_pct, self.high_watermark_pct
            )));
        }
        if self.high_watermark_pct >= 100 {
            return Err(MillError::Config(format!(
                "high watermark must be below 100%, got {}",
                self.high_watermark_pct
            )));
        }
        if self.job_timeout.is_zero() {
            return Err(MillError::Config("job timeout must be non-zero".into()));
        }
        if self.input_dir == self.output_dir {
            return Err(MillError::Config(
                "input and output directories must differ; outputs would \
                 be rediscovered as sources"
                    .into(),
            ));
        }
        Ok(())
    }

    /// The watermark/cooldown slice of this config
    pub fn budget_policy(&self) -> BudgetPolicy {
        BudgetPolicy {
            low_watermark_pct: self.low_watermark_pct,
            high_watermark_pct: self.high_watermark_pct,
            cooldown: self.cooldown,
        }
    }

    /// The resize/encode slice of this config.
    ///
    /// Quality is floored at 85 the same way the photographic defaults
    /// are; going lower visibly degrades skin tones.
    pub fn resize_target(&self) -> ResizeTarget {
        ResizeTarget {
            max_side: self.max_side,
            quality: self.jpeg_quality.clamp(85, 100),
        }
    }

    /// The discovery slice of this config
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            follow_symlinks: false,
            include_hidden: self.include_hidden,
            process_raw: self.process_raw,
        }
    }
}
