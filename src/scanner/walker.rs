//! Tree walker: enumerate a scan target, dispatch each file to the archive
//! inspector or the classifier, and collect findings in traversal order.
//!
//! Enumeration runs on the calling thread and feeds a bounded channel; a
//! fixed pool of scoped worker threads probes files and runs archive jobs.
//! Every work item carries its enumeration sequence number, so results are
//! put back into traversal order once the pool drains. Each worker runs at
//! most one archive job at a time, bounding live scratch directories by the
//! worker count.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;

use crate::core::config::{MAX_PARALLELISM, ScannerConfig};
use crate::core::errors::{BcError, Result};
use crate::core::paths::relative_to;
use crate::logger::jsonl::{EventType, LogEntry, Severity, SharedJsonl};
use crate::scanner::archive::{ArchiveInspector, ArchiveVerdict, ContainerFormat, InspectorConfig};
use crate::scanner::classifier::classify_mime;
use crate::scanner::mime;
use crate::scanner::report::{
    Diagnostic, DiagnosticKind, FileEntry, Finding, FindingKind, ScanReport, ScanStats,
};
use crate::scanner::target::{ScanTarget, enumerate_files};

/// Walker configuration derived from `ScannerConfig`.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub parallelism: usize,
    pub probe_bytes: usize,
    pub scratch_root: Option<PathBuf>,
}

impl WalkerConfig {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            parallelism: config.parallelism,
            probe_bytes: config.header_probe_bytes,
            scratch_root: config.scratch_root.clone(),
        }
    }
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default())
    }
}

/// Item in the work queue: (sequence number, absolute path).
type WorkItem = (u64, PathBuf);

/// What happened to one enumerated file.
#[derive(Debug)]
enum Disposition {
    Vanished,
    Unreadable(BcError),
    Classified {
        entry: FileEntry,
        inspected: bool,
        finding: Option<Finding>,
        diagnostic: Option<Diagnostic>,
    },
}

#[derive(Debug)]
struct EntryResult {
    seq: u64,
    disposition: Disposition,
}

/// Scans one target at a time.
pub struct TreeWalker {
    config: WalkerConfig,
    inspector: ArchiveInspector,
    activity: Option<SharedJsonl>,
}

impl TreeWalker {
    pub fn new(config: WalkerConfig) -> Self {
        let inspector = ArchiveInspector::new(InspectorConfig {
            scratch_root: config.scratch_root.clone(),
            probe_bytes: config.probe_bytes,
        });
        Self {
            config,
            inspector,
            activity: None,
        }
    }

    /// Record scan events in a shared JSONL activity log.
    #[must_use]
    pub fn with_activity_log(mut self, log: SharedJsonl) -> Self {
        self.activity = Some(log);
        self
    }

    /// Scan `target` and return its findings in traversal order.
    ///
    /// Only an inaccessible root is an error; every per-entry problem is
    /// skipped or reported as a diagnostic.
    pub fn scan(&self, target: &ScanTarget) -> Result<ScanReport> {
        let started = Instant::now();
        self.log(LogEntry::new(EventType::ScanStart, Severity::Info).with_path(&target.display));

        let walked = if target.is_artifact {
            Ok(vec![self.process(0, &target.root, &target.display)])
        } else {
            self.scan_tree(target)
        };
        let mut results = match walked {
            Ok(results) => results,
            Err(err) => {
                self.log(
                    LogEntry::new(EventType::Error, Severity::Critical)
                        .with_path(&target.display)
                        .with_error(&err),
                );
                return Err(err);
            }
        };
        results.sort_unstable_by_key(|r| r.seq);

        let mut report = ScanReport {
            root: target.root.clone(),
            target: target.display.clone(),
            source: target.source.clone(),
            findings: Vec::new(),
            diagnostics: Vec::new(),
            stats: ScanStats::default(),
        };
        for result in results {
            self.collect(&mut report, result.disposition);
        }
        report.stats.elapsed_ms = started.elapsed().as_millis() as u64;

        let mut done = LogEntry::new(EventType::ScanComplete, Severity::Info)
            .with_path(&target.display)
            .with_details(format!(
                "files_seen={} archives_inspected={} diagnostics={}",
                report.stats.files_seen,
                report.stats.archives_inspected,
                report.diagnostics.len()
            ));
        done.count = Some(report.findings.len() as u64);
        done.duration_ms = Some(report.stats.elapsed_ms);
        done.ok = Some(true);
        self.log(done);
        if let Some(log) = &self.activity {
            log.lock().flush();
        }

        Ok(report)
    }

    fn scan_tree(&self, target: &ScanTarget) -> Result<Vec<EntryResult>> {
        // `WalkerConfig` can be built without going through `Config::validate`.
        let workers = self.config.parallelism.clamp(1, MAX_PARALLELISM);
        let (work_tx, work_rx) = channel::bounded::<WorkItem>(workers.saturating_mul(4));
        let (result_tx, result_rx) = channel::unbounded::<EntryResult>();
        let root = target.root.as_path();

        thread::scope(|scope| {
            for id in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                thread::Builder::new()
                    .name(format!("bc-scan-{id}"))
                    .spawn_scoped(scope, move || {
                        for (seq, path) in work_rx {
                            let display = relative_to(root, &path);
                            if result_tx.send(self.process(seq, &path, &display)).is_err() {
                                return;
                            }
                        }
                    })
                    .map_err(|e| BcError::Runtime {
                        details: format!("failed to spawn scan worker {id}: {e}"),
                    })?;
            }
            // Workers hold the only receivers/senders from here on.
            drop(work_rx);
            drop(result_tx);

            let mut seq = 0_u64;
            let mut disconnected = false;
            enumerate_files(root, target.exclusions, |path| {
                if work_tx.send((seq, path)).is_err() {
                    disconnected = true;
                    return false;
                }
                seq += 1;
                true
            })?;
            drop(work_tx);
            if disconnected {
                return Err(BcError::ChannelClosed {
                    component: "scan workers",
                });
            }
            Ok(())
        })?;

        Ok(result_rx.into_iter().collect())
    }

    /// Probe one file and dispatch it to the inspector or the classifier.
    fn process(&self, seq: u64, path: &Path, display: &Path) -> EntryResult {
        let mime = match mime::probe_path(path, self.config.probe_bytes) {
            Ok(mime) => mime,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return EntryResult {
                    seq,
                    disposition: Disposition::Vanished,
                };
            }
            Err(err) => {
                return EntryResult {
                    seq,
                    disposition: Disposition::Unreadable(BcError::io(display, err)),
                };
            }
        };

        if ContainerFormat::from_mime(&mime).is_none() {
            let classification = classify_mime(&mime);
            let finding = classification
                .is_binary()
                .then(|| Finding::binary_file(display));
            return EntryResult {
                seq,
                disposition: Disposition::Classified {
                    entry: FileEntry {
                        path: path.to_path_buf(),
                        display_path: display.to_path_buf(),
                        mime,
                        classification,
                    },
                    inspected: false,
                    finding,
                    diagnostic: None,
                },
            };
        }

        let (classification, finding, diagnostic) =
            match self.inspector.inspect_with_mime(path, &mime) {
                Ok(inspection) => {
                    if matches!(inspection.verdict, ArchiveVerdict::ExtractionFailed { .. })
                        && fs::symlink_metadata(path).is_err()
                    {
                        return EntryResult {
                            seq,
                            disposition: Disposition::Vanished,
                        };
                    }
                    let finding = (inspection.verdict == ArchiveVerdict::ContainsBinary)
                        .then(|| Finding::binary_archive(display, inspection.binary_members));
                    (
                        inspection.verdict.classification(),
                        finding,
                        Diagnostic::from_verdict(display, &inspection.verdict),
                    )
                }
                Err(err) => (
                    classify_mime(&mime),
                    None,
                    Some(Diagnostic {
                        path: display.to_path_buf(),
                        kind: DiagnosticKind::InspectionError,
                        message: format!("Error inspecting archive: {err}"),
                    }),
                ),
            };

        EntryResult {
            seq,
            disposition: Disposition::Classified {
                entry: FileEntry {
                    path: path.to_path_buf(),
                    display_path: display.to_path_buf(),
                    mime,
                    classification,
                },
                inspected: true,
                finding,
                diagnostic,
            },
        }
    }

    fn collect(&self, report: &mut ScanReport, disposition: Disposition) {
        report.stats.files_seen += 1;
        match disposition {
            Disposition::Vanished => report.stats.vanished += 1,
            Disposition::Unreadable(err) => {
                report.stats.unreadable += 1;
                self.log(LogEntry::new(EventType::Error, Severity::Warning).with_error(&err));
            }
            Disposition::Classified {
                entry,
                inspected,
                finding,
                diagnostic,
            } => {
                report.stats.files_classified += 1;
                if inspected {
                    report.stats.archives_inspected += 1;
                }
                if let Some(finding) = finding {
                    let event = match finding.kind {
                        FindingKind::BinaryFile => EventType::BinaryFile,
                        FindingKind::BinaryArchive => EventType::BinaryArchive,
                    };
                    let mut log = LogEntry::new(event, Severity::Warning).with_path(&finding.path);
                    log.mime = Some(entry.mime.to_string());
                    if finding.kind == FindingKind::BinaryArchive {
                        log.verdict = Some("contains-binary".to_string());
                        log.count = Some(finding.binary_members.len() as u64);
                    }
                    self.log(log);
                    report.findings.push(finding);
                }
                if let Some(diagnostic) = diagnostic {
                    let mut log = LogEntry::new(EventType::ArchiveDiagnostic, Severity::Warning)
                        .with_path(&diagnostic.path)
                        .with_details(diagnostic.message.clone());
                    log.mime = Some(entry.mime.to_string());
                    self.log(log);
                    report.diagnostics.push(diagnostic);
                }
            }
        }
    }

    fn log(&self, entry: LogEntry) {
        if let Some(log) = &self.activity {
            log.lock().write_entry(&entry);
        }
    }
}

/// Scan `target` with default settings and no activity log.
pub fn scan(target: &ScanTarget) -> Result<ScanReport> {
    TreeWalker::new(WalkerConfig::default()).scan(target)
}
