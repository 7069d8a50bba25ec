//! Shot grouping and authoritative-source selection.
//!
//! All dedup decisions for a group are made here, before anything is
//! dispatched; the scheduler never sees two candidates of one shot.

use super::scanner::{ScanConfig, ScanOutput, TreeScanner};
use super::{group_key, ShotGroup, SourceFile};
use crate::core::job::{Job, TerminalState};
use crate::error::Result;
use crate::events::{DiscoverEvent, Event, EventSender};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Scan statistics carried alongside the job list
#[derive(Debug, Clone, Default)]
pub struct DiscoveryStats {
    pub files_seen: usize,
    pub system_files_skipped: usize,
    pub walk_errors: usize,
}

/// Everything discovery produces: the full job list plus statistics
#[derive(Debug)]
pub struct DiscoveryResult {
    /// Every job, in deterministic discovery order. Skips are already
    /// terminal; the rest are Pending.
    pub jobs: Vec<Job>,
    pub stats: DiscoveryStats,
}

impl DiscoveryResult {
    pub fn pending_count(&self) -> usize {
        self.jobs.iter().filter(|j| !j.is_terminal()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_terminal()).count()
    }
}

/// Groups the scanned tree into shots and emits jobs
pub struct Deduplicator {
    input_root: PathBuf,
    output_root: PathBuf,
    scan_config: ScanConfig,
}

impl Deduplicator {
    pub fn new(input_root: PathBuf, output_root: PathBuf, scan_config: ScanConfig) -> Self {
        Self {
            input_root,
            output_root,
            scan_config,
        }
    }

    /// Walk, group, select, and emit the full job list.
    ///
    /// Groups are keyed by normalized stem and emitted in key order, so
    /// two runs over the same tree produce the same job sequence.
    pub fn scan(&self, events: &EventSender) -> Result<DiscoveryResult> {
        let scanner = TreeScanner::new(self.scan_config.clone());
        let output = scanner.scan(&self.input_root, events)?;

        let result = self.emit_jobs(output);

        events.send(Event::Discover(DiscoverEvent::Completed {
            total_jobs: result.jobs.len(),
            pending: result.pending_count(),
            skipped: result.skipped_count(),
        }));

        Ok(result)
    }

    fn emit_jobs(&self, output: ScanOutput) -> DiscoveryResult {
        let stats = DiscoveryStats {
            files_seen: output.files.len(),
            system_files_skipped: output.system_files_skipped,
            walk_errors: output.errors.len(),
        };
        for error in &output.errors {
            tracing::warn!("walk error: {}", error);
        }

        // BTreeMap keeps group order stable without a separate sort
        let mut groups: BTreeMap<String, Vec<SourceFile>> = BTreeMap::new();
        for file in output.files {
            groups.entry(group_key(&file.path)).or_default().push(file);
        }

        let mut jobs = Vec::new();
        for (key, candidates) in groups {
            let group = ShotGroup::resolve(key, candidates);
            let authoritative = group.authoritative();
            let target = self.target_path(&authoritative.path);

            if target.exists() {
                // Restart of a previous run; visible in the report, never
                // reprocessed
                jobs.push(Job::skipped(
                    authoritative.path.clone(),
                    target,
                    authoritative.format,
                    authoritative.size_bytes,
                    TerminalState::SkippedExisting,
                ));
            } else {
                jobs.push(Job::pending(
                    authoritative.path.clone(),
                    target,
                    authoritative.format,
                    authoritative.size_bytes,
                ));
            }

            for duplicate in group.duplicates() {
                let dup_target = self.target_path(&duplicate.path);
                jobs.push(Job::skipped(
                    duplicate.path.clone(),
                    dup_target,
                    duplicate.format,
                    duplicate.size_bytes,
                    TerminalState::SkippedDuplicate,
                ));
            }
        }

        DiscoveryResult { jobs, stats }
    }

    /// Mirror the source's relative path under the output root, with the
    /// extension rewritten to .jpg
    fn target_path(&self, source: &Path) -> PathBuf {
        let relative = source.strip_prefix(&self.input_root).unwrap_or(source);
        self.output_root.join(relative).with_extension("jpg")
    }
}
