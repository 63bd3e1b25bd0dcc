//! Catalog archive selection, structural validation, and extraction.
//!
//! Stage 1 of the pipeline. Every `<uuid>.zip` in the archive directory is
//! checked against the layout contract before a single byte is written, then
//! extracted into the shared staging root.
//!
//! ## Archive Layout
//!
//! ```text
//! 0f8fad5b-d9cb-469f-a165-70867728950e.zip
//! └── 0f8fad5b-d9cb-469f-a165-70867728950e/   # single root, equal to the file stem
//!     ├── config.json                         # allowed second-level files
//!     ├── catalog.json
//!     ├── catalog/…                           # allowed second-level directories
//!     ├── templates/…
//!     ├── category/…
//!     └── translations/…
//! ```
//!
//! ## Validation Rules
//!
//! Entries are checked in archive order and the first violation fails the
//! whole archive:
//!
//! - every entry has at least two non-empty path segments
//! - segment 0 is a UUID-v4
//! - every entry shares the same segment 0
//! - a two-segment entry names an allowed file; a deeper entry starts with an
//!   allowed directory
//!
//! Empty segments are dropped before counting, so an explicit directory entry
//! like `<uuid>/` has depth 1 and is rejected.
//!
//! ## Failure Policy
//!
//! A structurally invalid archive, or one whose root id differs from its file
//! name, is skipped and reported. Extraction errors are returned to the
//! caller; extraction is not transactional.

use crate::naming::{self, ARCHIVE_EXTENSION};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Second-level names allowed as files directly under the root.
pub const ALLOWED_SECOND_LEVEL_FILES: &[&str] = &["config.json", "catalog.json"];

/// Second-level names allowed as directories under the root.
pub const ALLOWED_SECOND_LEVEL_DIRS: &[&str] = &["catalog", "templates", "category", "translations"];

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("Entry escapes the staging root: {0}")]
    UnsafePath(String),
}

/// Why an archive failed structural validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureViolation {
    #[error("Archive contains no entries")]
    Empty,
    #[error("Invalid path depth: {entry}")]
    PathDepth { entry: String },
    #[error("Invalid root UUID: {segment}")]
    InvalidRoot { segment: String },
    #[error("Multiple root UUIDs found: {first} and {second}")]
    MultipleRoots { first: String, second: String },
    #[error("Invalid second-level entry: {name}")]
    InvalidSecondLevel { entry: String, name: String },
}

/// One entry of an archive's central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash separated path as stored in the archive.
    pub path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
}

impl ArchiveEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

/// Validate an archive's entry list against the layout contract.
///
/// Pure: no I/O. Returns the shared root id on success, or the first
/// violation found in entry order.
pub fn validate_entries(entries: &[ArchiveEntry]) -> Result<String, StructureViolation> {
    let mut root: Option<&str> = None;

    for entry in entries {
        let segments = entry.segments();
        if segments.len() < 2 {
            return Err(StructureViolation::PathDepth {
                entry: entry.path.clone(),
            });
        }

        let (top, second) = (segments[0], segments[1]);
        if !naming::is_uuid_v4(top) {
            return Err(StructureViolation::InvalidRoot {
                segment: top.to_string(),
            });
        }

        match root {
            None => root = Some(top),
            Some(first) if first != top => {
                return Err(StructureViolation::MultipleRoots {
                    first: first.to_string(),
                    second: top.to_string(),
                });
            }
            Some(_) => {}
        }

        let allowed = if segments.len() == 2 {
            ALLOWED_SECOND_LEVEL_FILES.contains(&second)
        } else {
            ALLOWED_SECOND_LEVEL_DIRS.contains(&second)
        };
        if !allowed {
            return Err(StructureViolation::InvalidSecondLevel {
                entry: entry.path.clone(),
                name: second.to_string(),
            });
        }
    }

    root.map(str::to_string).ok_or(StructureViolation::Empty)
}

fn open_zip(path: &Path) -> Result<zip::ZipArchive<fs::File>, ArchiveError> {
    let file = fs::File::open(path)?;
    zip::ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an archive's entry list in central-directory order.
pub fn list_entries(path: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = open_zip(path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|source| ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        entries.push(ArchiveEntry::new(file.name(), file.size()));
    }
    Ok(entries)
}

/// Extract every entry of `path` under `staging_root`, overwriting existing
/// files. Returns the number of files written.
///
/// A failure part-way through leaves whatever was already written in place.
pub fn extract(path: &Path, staging_root: &Path) -> Result<usize, ArchiveError> {
    let mut archive = open_zip(path)?;
    fs::create_dir_all(staging_root)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|source| ArchiveError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        let relative = file
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafePath(file.name().to_string()))?;
        let target = staging_root.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        written += 1;
    }
    Ok(written)
}

// ============================================================================
// Selection and the ingest loop
// ============================================================================

/// An archive whose file name is `<uuid-v4>.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArchive {
    pub path: PathBuf,
    pub file_name: String,
    /// The UUID taken from the file name.
    pub catalog_id: String,
}

/// Archives found in the archive directory, split by name eligibility.
#[derive(Debug, Default)]
pub struct ArchiveSelection {
    pub candidates: Vec<CandidateArchive>,
    /// `.zip` files whose stem is not a UUID-v4.
    pub ignored: Vec<String>,
}

/// List `.zip` files in `dir` (sorted by name) and keep the ones named after
/// a UUID-v4.
pub fn select_archives(dir: &Path) -> Result<ArchiveSelection, ArchiveError> {
    let mut files: Vec<(String, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(_, p)| {
            p.is_file()
                && p.extension()
                    .map(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut selection = ArchiveSelection::default();
    for (file_name, path) in files {
        match naming::catalog_id_from_archive_name(&file_name) {
            Some(id) => selection.candidates.push(CandidateArchive {
                catalog_id: id.to_string(),
                file_name,
                path,
            }),
            None => selection.ignored.push(file_name),
        }
    }
    Ok(selection)
}

/// Outcome for one candidate archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    /// Passed validation (check mode, nothing written).
    Valid { root_id: String },
    /// Passed validation and was extracted.
    Extracted { root_id: String, files: usize },
    /// Failed structural validation.
    Invalid(StructureViolation),
    /// Structurally valid, but the root id differs from the file name.
    NameMismatch { root_id: String },
}

#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub file_name: String,
    pub status: ArchiveStatus,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub archives: Vec<ArchiveOutcome>,
    pub ignored: Vec<String>,
}

impl IngestReport {
    /// Root ids of every archive that passed (and, when extracting, was extracted).
    pub fn accepted_ids(&self) -> Vec<&str> {
        self.archives
            .iter()
            .filter_map(|a| match &a.status {
                ArchiveStatus::Valid { root_id } | ArchiveStatus::Extracted { root_id, .. } => {
                    Some(root_id.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

/// Validate one candidate: structure first, then root id against file name.
fn check_candidate(candidate: &CandidateArchive) -> Result<ArchiveStatus, ArchiveError> {
    let entries = list_entries(&candidate.path)?;
    debug!(archive = %candidate.file_name, entries = entries.len(), "listed archive");
    let status = match validate_entries(&entries) {
        Err(violation) => ArchiveStatus::Invalid(violation),
        Ok(root_id) if !naming::same_catalog_id(&root_id, &candidate.catalog_id) => {
            ArchiveStatus::NameMismatch { root_id }
        }
        Ok(root_id) => ArchiveStatus::Valid { root_id },
    };
    Ok(status)
}

/// Validate every candidate in `archives_dir` without extracting anything.
pub fn check(archives_dir: &Path) -> Result<IngestReport, ArchiveError> {
    let selection = select_archives(archives_dir)?;
    let mut report = IngestReport {
        ignored: selection.ignored,
        ..IngestReport::default()
    };
    for candidate in &selection.candidates {
        let status = check_candidate(candidate)?;
        report.archives.push(ArchiveOutcome {
            file_name: candidate.file_name.clone(),
            status,
        });
    }
    Ok(report)
}

/// Validate and extract every candidate in `archives_dir` into `staging_root`,
/// one archive at a time.
///
/// Invalid or misnamed archives are logged and skipped. Unreadable archives
/// and extraction failures abort the loop with an error.
pub fn ingest(archives_dir: &Path, staging_root: &Path) -> Result<IngestReport, ArchiveError> {
    let selection = select_archives(archives_dir)?;
    info!(
        candidates = selection.candidates.len(),
        ignored = selection.ignored.len(),
        "selected archives"
    );

    let mut report = IngestReport {
        ignored: selection.ignored,
        ..IngestReport::default()
    };
    for candidate in &selection.candidates {
        let status = match check_candidate(candidate)? {
            ArchiveStatus::Valid { root_id } => {
                let files = extract(&candidate.path, staging_root)?;
                info!(archive = %candidate.file_name, files, "extracted archive");
                ArchiveStatus::Extracted { root_id, files }
            }
            ArchiveStatus::Invalid(violation) => {
                warn!(archive = %candidate.file_name, reason = %violation, "validation failed, skipping");
                ArchiveStatus::Invalid(violation)
            }
            ArchiveStatus::NameMismatch { root_id } => {
                warn!(archive = %candidate.file_name, %root_id, "root id does not match file name, skipping");
                ArchiveStatus::NameMismatch { root_id }
            }
            other => other,
        };
        report.archives.push(ArchiveOutcome {
            file_name: candidate.file_name.clone(),
            status,
        });
    }
    Ok(report)
}
