//! Integration tests for discovery and shot-group resolution.
//!
//! The selection policy (RAW > JPEG > OTHER, then size, then path) must be
//! deterministic: the same tree always yields the same job list.

use photo_mill::core::discover::{Deduplicator, ScanConfig};
use photo_mill::core::job::{JobState, TerminalState};
use photo_mill::core::SourceFormat;
use photo_mill::events::null_sender;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(dir: &Path, name: &str, bytes: usize) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(&vec![0u8; bytes]).unwrap();
    path
}

fn scan(input: &TempDir, output: &TempDir) -> photo_mill::core::discover::DiscoveryResult {
    Deduplicator::new(
        input.path().to_path_buf(),
        output.path().to_path_buf(),
        ScanConfig::default(),
    )
    .scan(&null_sender())
    .unwrap()
}

#[test]
fn groups_with_multiple_candidates_have_exactly_one_pending() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    // Three shot groups with 3, 2 and 1 candidates
    touch(input.path(), "shot1.cr2", 5_000);
    touch(input.path(), "shot1.jpg", 3_000);
    touch(input.path(), "shot1.png", 2_000);
    touch(input.path(), "shot2.nef", 4_000);
    touch(input.path(), "shot2.jpg", 2_000);
    touch(input.path(), "shot3.jpg", 1_000);

    let result = scan(&input, &output);

    assert_eq!(result.jobs.len(), 6);
    assert_eq!(result.pending_count(), 3);
    assert_eq!(result.skipped_count(), 3);

    // Both RAW members won their groups
    let pending_sources: Vec<_> = result
        .jobs
        .iter()
        .filter(|j| !j.is_terminal())
        .map(|j| j.source.clone())
        .collect();
    assert!(pending_sources.iter().any(|p| p.ends_with("shot1.cr2")));
    assert!(pending_sources.iter().any(|p| p.ends_with("shot2.nef")));
    assert!(pending_sources.iter().any(|p| p.ends_with("shot3.jpg")));
}

#[test]
fn selection_prefers_raw_over_larger_jpeg() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    // The JPEG is twice the size; RAW still wins
    touch(input.path(), "img001.arw", 2_000);
    touch(input.path(), "img001.jpg", 4_000);

    let result = scan(&input, &output);

    let pending: Vec<_> = result.jobs.iter().filter(|j| !j.is_terminal()).collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].format, SourceFormat::Raw);
}

#[test]
fn same_tree_scanned_twice_selects_identically() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    for i in 0..20 {
        touch(input.path(), &format!("img{:03}.cr2", i), 1_000 + i);
        touch(input.path(), &format!("img{:03}.jpg", i), 500 + i);
    }

    let first = scan(&input, &output);
    let second = scan(&input, &output);

    let shape = |r: &photo_mill::core::discover::DiscoveryResult| {
        r.jobs
            .iter()
            .map(|j| (j.source.clone(), j.is_terminal()))
            .collect::<Vec<_>>()
    };
    assert_eq!(shape(&first), shape(&second));
}

#[test]
fn shots_group_across_directories_by_stem() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    std::fs::create_dir_all(input.path().join("raw")).unwrap();
    std::fs::create_dir_all(input.path().join("jpg")).unwrap();
    touch(&input.path().join("raw"), "img001.cr2", 5_000);
    touch(&input.path().join("jpg"), "img001.jpg", 3_000);

    let result = scan(&input, &output);

    // Same stem in different directories is still one shot
    assert_eq!(result.jobs.len(), 2);
    assert_eq!(result.pending_count(), 1);
}

#[test]
fn edited_variants_join_their_original_group() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    touch(input.path(), "img001.jpg", 3_000);
    touch(input.path(), "img001_edited.jpg", 3_500);

    let result = scan(&input, &output);

    assert_eq!(result.jobs.len(), 2);
    assert_eq!(result.pending_count(), 1);
    // The larger edited variant wins the JPEG-vs-JPEG tie
    let pending: Vec<_> = result.jobs.iter().filter(|j| !j.is_terminal()).collect();
    assert!(pending[0].source.ends_with("img001_edited.jpg"));
}

#[test]
fn duplicates_are_recorded_never_deleted() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    let raw = touch(input.path(), "img001.cr2", 5_000);
    let jpg = touch(input.path(), "img001.jpg", 3_000);

    let result = scan(&input, &output);

    let skipped = result
        .jobs
        .iter()
        .find(|j| j.state == JobState::Done(TerminalState::SkippedDuplicate))
        .unwrap();
    assert_eq!(skipped.source, jpg);

    // Both source files are still on disk
    assert!(raw.exists());
    assert!(jpg.exists());
}

#[test]
fn no_raw_config_excludes_raw_candidates() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    touch(input.path(), "img001.cr2", 5_000);
    touch(input.path(), "img001.jpg", 3_000);

    let result = Deduplicator::new(
        input.path().to_path_buf(),
        output.path().to_path_buf(),
        ScanConfig {
            process_raw: false,
            ..Default::default()
        },
    )
    .scan(&null_sender())
    .unwrap();

    // Only the JPEG was discovered; it wins its singleton group
    assert_eq!(result.jobs.len(), 1);
    assert_eq!(result.jobs[0].format, SourceFormat::Jpeg);
    assert!(!result.jobs[0].is_terminal());
}

#[test]
fn system_files_are_counted_but_not_jobs() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();

    touch(input.path(), "._img001.cr2", 100);
    touch(input.path(), "img001.cr2", 5_000);

    let result = scan(&input, &output);

    assert_eq!(result.jobs.len(), 1);
    assert_eq!(result.stats.system_files_skipped, 1);
    assert_eq!(result.stats.files_seen, 1);
}
