//! Scan results: findings, diagnostics, counters and the JSON document.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::scanner::archive::ArchiveVerdict;
use crate::scanner::classifier::Classification;
use crate::scanner::mime::MimeType;
use crate::scanner::target::TargetSource;

/// A single file under a scan target, as classified.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Path relative to the scan root (or as given for single artifacts).
    pub display_path: PathBuf,
    pub mime: MimeType,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    BinaryFile,
    BinaryArchive,
}

/// A reported binary file or binary-containing archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub path: PathBuf,
    pub kind: FindingKind,
    /// In-archive paths of binary members; empty for direct findings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binary_members: Vec<PathBuf>,
}

impl Finding {
    pub fn binary_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FindingKind::BinaryFile,
            binary_members: Vec::new(),
        }
    }

    pub fn binary_archive(path: impl Into<PathBuf>, binary_members: Vec<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FindingKind::BinaryArchive,
            binary_members,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FindingKind::BinaryFile => write!(f, "Binary file found: {}", self.path.display()),
            FindingKind::BinaryArchive => {
                write!(f, "Binary archive found: {}", self.path.display())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    UnsupportedFormat,
    UnsupportedInnerFormat,
    ExtractionFailed,
    /// The inspector could not even start (e.g. no scratch directory).
    InspectionError,
}

/// A non-fatal per-entry condition. `message` is the literal stderr line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic for a failure verdict; `None` for clean/contains-binary.
    pub fn from_verdict(path: &Path, verdict: &ArchiveVerdict) -> Option<Self> {
        let kind = match verdict {
            ArchiveVerdict::ContainsBinary | ArchiveVerdict::Clean => return None,
            ArchiveVerdict::ExtractionFailed { .. } => DiagnosticKind::ExtractionFailed,
            ArchiveVerdict::UnsupportedInnerFormat { .. } => DiagnosticKind::UnsupportedInnerFormat,
            ArchiveVerdict::UnsupportedFormat { .. } => DiagnosticKind::UnsupportedFormat,
        };
        Some(Self {
            path: path.to_path_buf(),
            kind,
            message: verdict.diagnostic()?,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Counters collected during one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_seen: u64,
    pub files_classified: u64,
    pub archives_inspected: u64,
    /// Entries that disappeared between enumeration and processing.
    pub vanished: u64,
    /// Entries that could not be read (permissions and the like).
    pub unreadable: u64,
    pub elapsed_ms: u64,
}

/// Everything one scan produced, in traversal order.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub root: PathBuf,
    pub target: PathBuf,
    pub source: TargetSource,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    target: String,
    source: &'a TargetSource,
    binary_file_list: Vec<String>,
    binary_archive_list: Vec<String>,
    archives: Vec<ArchiveDocument>,
    diagnostics: &'a [Diagnostic],
    stats: &'a ScanStats,
}

#[derive(Serialize)]
struct ArchiveDocument {
    path: String,
    binary_members: Vec<String>,
}

impl ScanReport {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn binary_file_list(&self) -> Vec<&Path> {
        self.paths_of(FindingKind::BinaryFile)
    }

    pub fn binary_archive_list(&self) -> Vec<&Path> {
        self.paths_of(FindingKind::BinaryArchive)
    }

    fn paths_of(&self, kind: FindingKind) -> Vec<&Path> {
        self.findings
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.path.as_path())
            .collect()
    }

    /// The machine-readable document printed by `--json`.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        let lossy = |p: &Path| p.to_string_lossy().into_owned();
        let doc = ReportDocument {
            target: lossy(&self.target),
            source: &self.source,
            binary_file_list: self.binary_file_list().into_iter().map(lossy).collect(),
            binary_archive_list: self.binary_archive_list().into_iter().map(lossy).collect(),
            archives: self
                .findings
                .iter()
                .filter(|f| f.kind == FindingKind::BinaryArchive)
                .map(|f| ArchiveDocument {
                    path: lossy(&f.path),
                    binary_members: f.binary_members.iter().map(|m| lossy(m)).collect(),
                })
                .collect(),
            diagnostics: &self.diagnostics,
            stats: &self.stats,
        };
        serde_json::to_value(doc)
    }
}
