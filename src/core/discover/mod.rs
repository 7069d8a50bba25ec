//! # Discover Module
//!
//! Finds source images and resolves duplicate shots before anything is
//! scheduled.
//!
//! A camera that writes RAW+JPEG pairs produces two files per shutter
//! press. Grouping by normalized stem lets the pipeline convert each shot
//! exactly once while still accounting for every file it saw.
//!
//! ## Selection policy
//! Within a group: RAW beats JPEG beats everything else, ties broken by
//! larger file, then lexical path order. Deterministic across runs.

mod dedup;
mod scanner;

pub use dedup::{Deduplicator, DiscoveryResult, DiscoveryStats};
pub use scanner::{ScanConfig, TreeScanner};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Camera RAW extensions, per vendor
pub const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", "nef", "arw", "dng", "raw", "raf", "rw2", "srw", "3fr",
];

/// Suffixes stripped during stem normalization so edited/copied variants
/// land in the same shot group
const STEM_SUFFIXES: &[&str] = &["_edited", "-edited", "_edit", "-edit", "_copy", "-copy"];

/// Source format classification.
///
/// A closed tag, not open-ended type inspection: dispatch and the RAW
/// concurrency cap key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Camera RAW; memory-heavy decode, throttled separately
    Raw,
    /// JPEG; the preferred non-RAW source in a pair
    Jpeg,
    /// Any other raster or unrecognized extension; attempted, never dropped
    Other,
}

impl SourceFormat {
    /// Classify a path by extension
    pub fn from_path(path: &Path) -> Self {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e.to_lowercase(),
            None => return SourceFormat::Other,
        };

        if RAW_EXTENSIONS.contains(&ext.as_str()) {
            SourceFormat::Raw
        } else if ext == "jpg" || ext == "jpeg" {
            SourceFormat::Jpeg
        } else {
            SourceFormat::Other
        }
    }

    /// Selection priority; lower wins
    fn priority(&self) -> u8 {
        match self {
            SourceFormat::Raw => 0,
            SourceFormat::Jpeg => 1,
            SourceFormat::Other => 2,
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Raw => write!(f, "RAW"),
            SourceFormat::Jpeg => write!(f, "JPEG"),
            SourceFormat::Other => write!(f, "OTHER"),
        }
    }
}

/// A discovered candidate source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub size_bytes: u64,
}

/// Candidate files believed to represent the same photographic capture
#[derive(Debug, Clone)]
pub struct ShotGroup {
    /// Normalized stem shared by all candidates
    pub key: String,
    /// Candidates in selection order: the first is authoritative
    pub candidates: Vec<SourceFile>,
}

impl ShotGroup {
    /// Order candidates by the selection policy and return the group.
    ///
    /// RAW > JPEG > OTHER, then larger file, then lexical path.
    pub fn resolve(key: String, mut candidates: Vec<SourceFile>) -> Self {
        candidates.sort_by(|a, b| {
            a.format
                .priority()
                .cmp(&b.format.priority())
                .then(b.size_bytes.cmp(&a.size_bytes))
                .then(a.path.cmp(&b.path))
        });
        Self { key, candidates }
    }

    /// The selected best-quality source
    pub fn authoritative(&self) -> &SourceFile {
        &self.candidates[0]
    }

    /// All non-selected members
    pub fn duplicates(&self) -> &[SourceFile] {
        &self.candidates[1..]
    }
}

/// Normalize a file name into its shot-group key.
///
/// Lowercased stem with known edit/copy suffixes stripped, so
/// `IMG_0042.CR2`, `img_0042.jpg` and `img_0042_edited.jpg` share a key.
pub fn group_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    for suffix in STEM_SUFFIXES {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    stem
}
