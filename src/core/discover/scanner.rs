//! Input tree walking.
//!
//! Phase 1 collects candidate paths single-threaded (walkdir is not
//! parallel); phase 2 stats and classifies them with rayon, which is
//! where the per-file syscall cost lives on large trees.

use super::{SourceFile, SourceFormat};
use crate::error::DiscoverError;
use crate::events::{DiscoverEvent, DiscoverProgress, Event, EventSender};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration for the input walk
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// When false, RAW files are left undiscovered entirely; a RAW+JPEG
    /// pair then selects the JPEG naturally
    pub process_raw: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: false,
            process_raw: true,
        }
    }
}

/// Raw output of a tree walk, before grouping
#[derive(Debug)]
pub struct ScanOutput {
    pub files: Vec<SourceFile>,
    /// macOS resource forks and other `._`/`_` prefixed files
    pub system_files_skipped: usize,
    pub errors: Vec<DiscoverError>,
}

/// Walks an input tree and produces classified source files
pub struct TreeScanner {
    config: ScanConfig,
}

impl TreeScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Walk `root` and return every candidate file.
    ///
    /// Walk errors are collected, not fatal; a missing root is the only
    /// hard failure.
    pub fn scan(&self, root: &Path, events: &EventSender) -> Result<ScanOutput, DiscoverError> {
        if !root.is_dir() {
            return Err(DiscoverError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        events.send(Event::Discover(DiscoverEvent::Started {
            root: root.to_path_buf(),
        }));

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut system_files_skipped = 0usize;
        let mut errors = Vec::new();

        for entry_result in WalkDir::new(root).follow_links(self.config.follow_symlinks) {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let error = if e.io_error().map(|io| io.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        DiscoverError::PermissionDenied { path: path.clone() }
                    } else {
                        DiscoverError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                        }
                    };
                    events.send(Event::Discover(DiscoverEvent::Error {
                        path,
                        message: error.to_string(),
                    }));
                    errors.push(error);
                    continue;
                }
            };

            let path = entry.path();

            if path.is_dir() {
                if !self.config.include_hidden && is_hidden(path) && path != root {
                    continue;
                }
                events.send(Event::Discover(DiscoverEvent::Progress(DiscoverProgress {
                    files_seen: paths.len(),
                    system_files_skipped,
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if is_system_file(path) {
                system_files_skipped += 1;
                continue;
            }

            if !self.config.include_hidden && is_hidden(path) {
                continue;
            }

            if !self.config.process_raw && SourceFormat::from_path(path) == SourceFormat::Raw {
                continue;
            }

            paths.push(path.to_path_buf());
        }

        // Stat and classify in parallel
        let files: Vec<SourceFile> = paths
            .par_iter()
            .filter_map(|path| {
                let size = fs::metadata(path).map(|m| m.len()).ok()?;
                Some(SourceFile {
                    path: path.clone(),
                    format: SourceFormat::from_path(path),
                    size_bytes: size,
                })
            })
            .collect();

        Ok(ScanOutput {
            files,
            system_files_skipped,
            errors,
        })
    }
}

/// Camera card and macOS droppings: `._IMG_0042.CR2`, `_DSC1234.NEF` copies
fn is_system_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("._") || n.starts_with('_'))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
