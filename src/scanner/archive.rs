//! Archive inspector: extract one archive into a private scratch directory,
//! classify every extracted file, and aggregate a single verdict.
//!
//! # Invariants
//! - Each [`ArchiveJob`] owns a fresh `TempDir`; no two jobs share one.
//! - The scratch directory is removed exactly once, when the job finishes,
//!   whatever the verdict. A panic mid-job still removes it via `Drop`.
//! - Only one level of wrapping is unpacked: gzip/bzip2 must wrap a tar
//!   stream. Archives found inside the extracted contents are classified by
//!   MIME like any other file and never recursed into.
//! - `.git` directories inside the extracted contents are ignored.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use serde::Serialize;
use tempfile::TempDir;

use crate::core::errors::{BcError, Result};
use crate::core::paths::relative_to;
use crate::scanner::classifier::{self, Classification};
use crate::scanner::mime::{self, MimeType};
use crate::scanner::target::{Exclusions, enumerate_files};

/// Directory inside the scratch area that receives extracted members.
const CONTENTS_DIR: &str = "contents";
/// Decompressed stream of a gzip/bzip2 wrapper.
const STREAM_FILE: &str = "stream";

/// Container formats the inspector can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Zip,
    Tar,
    Gzip,
    Bzip2,
}

impl ContainerFormat {
    /// Map a probed MIME type onto a supported container format.
    pub fn from_mime(mime: &MimeType) -> Option<Self> {
        if mime.category() != "application" {
            return None;
        }
        match mime.subtype() {
            "zip" => Some(Self::Zip),
            "x-tar" => Some(Self::Tar),
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "x-bzip2" => Some(Self::Bzip2),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }

    /// Single-stream compression that must be unwrapped to reach a tar.
    pub const fn is_wrapper(self) -> bool {
        matches!(self, Self::Gzip | Self::Bzip2)
    }
}

/// Aggregate result of inspecting one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum ArchiveVerdict {
    ContainsBinary,
    Clean,
    /// Decompression or member extraction failed.
    ExtractionFailed {
        format: ContainerFormat,
        details: String,
    },
    /// A wrapper decompressed to something other than a tar stream.
    UnsupportedInnerFormat {
        format: ContainerFormat,
        inner: MimeType,
    },
    /// The file is not a supported container at all.
    UnsupportedFormat { mime: MimeType },
}

impl ArchiveVerdict {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ContainsBinary => "contains-binary",
            Self::Clean => "clean",
            Self::ExtractionFailed { .. } => "extraction-failed",
            Self::UnsupportedInnerFormat { .. } => "unsupported-inner-format",
            Self::UnsupportedFormat { .. } => "unsupported-format",
        }
    }

    /// Literal diagnostic line for failure verdicts.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::ContainsBinary | Self::Clean => None,
            Self::ExtractionFailed { format, .. } if format.is_wrapper() => {
                Some(format!("Error decompressing {} file.", format.label()))
            }
            Self::ExtractionFailed { format, .. } => {
                Some(format!("Error extracting {} file.", format.label()))
            }
            Self::UnsupportedInnerFormat { format, inner } => Some(format!(
                "Unsupported inner file type of {}: {inner}",
                format.label()
            )),
            Self::UnsupportedFormat { mime } => {
                Some(format!("Unsupported compressed file type: {mime}"))
            }
        }
    }

    /// How the archive itself is classified as a file entry.
    pub const fn classification(&self) -> Classification {
        match self {
            Self::ContainsBinary => Classification::Binary,
            Self::Clean | Self::ExtractionFailed { .. } => Classification::Text,
            Self::UnsupportedInnerFormat { .. } | Self::UnsupportedFormat { .. } => {
                Classification::UnsupportedContainer
            }
        }
    }
}

/// Outcome of one inspection, including what the job looked at.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveInspection {
    pub source: PathBuf,
    pub format: Option<ContainerFormat>,
    /// Formats unwrapped in order, e.g. `[gzip, tar]`.
    pub chain: Vec<ContainerFormat>,
    pub verdict: ArchiveVerdict,
    /// Extracted files that were classified.
    pub entries_examined: usize,
    /// Binary members, relative to the archive root.
    pub binary_members: Vec<PathBuf>,
    /// Where the job extracted; already removed when this is returned.
    pub scratch_dir: Option<PathBuf>,
}

/// Inspector settings.
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// Parent for scratch directories; the system temp dir when `None`.
    pub scratch_root: Option<PathBuf>,
    /// Header window for MIME probes of extracted files.
    pub probe_bytes: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            probe_bytes: mime::DEFAULT_PROBE_BYTES,
        }
    }
}

/// Runs [`ArchiveJob`]s. Stateless apart from its config, so one inspector
/// can be shared by every worker thread.
#[derive(Debug, Clone, Default)]
pub struct ArchiveInspector {
    config: InspectorConfig,
}

impl ArchiveInspector {
    pub fn new(config: InspectorConfig) -> Self {
        Self { config }
    }

    /// Probe `path` and inspect it.
    pub fn inspect(&self, path: &Path) -> Result<ArchiveInspection> {
        let mime =
            mime::probe_path(path, self.config.probe_bytes).map_err(|e| BcError::io(path, e))?;
        self.inspect_with_mime(path, &mime)
    }

    /// Inspect `path` whose MIME type is already known.
    ///
    /// Errors only when no scratch directory can be created; every archive
    /// problem is reported through the verdict.
    pub fn inspect_with_mime(&self, path: &Path, mime: &MimeType) -> Result<ArchiveInspection> {
        let Some(format) = ContainerFormat::from_mime(mime) else {
            return Ok(ArchiveInspection {
                source: path.to_path_buf(),
                format: None,
                chain: Vec::new(),
                verdict: ArchiveVerdict::UnsupportedFormat { mime: mime.clone() },
                entries_examined: 0,
                binary_members: Vec::new(),
                scratch_dir: None,
            });
        };

        let scratch = self.create_scratch()?;
        let mut job = ArchiveJob::new(path, format, scratch);
        let outcome = job.run(self.config.probe_bytes);
        let chain = job.chain.clone();
        let scratch_dir = job.finish();

        Ok(ArchiveInspection {
            source: path.to_path_buf(),
            format: Some(format),
            chain,
            verdict: outcome.verdict,
            entries_examined: outcome.examined,
            binary_members: outcome.binary_members,
            scratch_dir: Some(scratch_dir),
        })
    }

    fn create_scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("binary-checker-");
        match &self.config.scratch_root {
            Some(root) => builder
                .tempdir_in(root)
                .map_err(|source| BcError::io(root, source)),
            None => builder
                .tempdir()
                .map_err(|source| BcError::io(std::env::temp_dir(), source)),
        }
    }
}

/// Inspect one archive with default settings.
pub fn inspect_archive(path: &Path) -> Result<ArchiveInspection> {
    ArchiveInspector::default().inspect(path)
}

struct JobOutcome {
    verdict: ArchiveVerdict,
    examined: usize,
    binary_members: Vec<PathBuf>,
}

/// One archive under inspection, owning its scratch directory.
pub struct ArchiveJob {
    source: PathBuf,
    format: ContainerFormat,
    scratch: TempDir,
    chain: Vec<ContainerFormat>,
}

impl ArchiveJob {
    fn new(source: &Path, format: ContainerFormat, scratch: TempDir) -> Self {
        Self {
            source: source.to_path_buf(),
            format,
            scratch,
            chain: vec![format],
        }
    }

    fn run(&mut self, probe_bytes: usize) -> JobOutcome {
        let contents = self.scratch.path().join(CONTENTS_DIR);
        let extracted = fs::create_dir(&contents)
            .map_err(|e| extraction_failed(self.format, e))
            .and_then(|()| self.extract(&contents, probe_bytes));
        if let Err(verdict) = extracted {
            return JobOutcome {
                verdict,
                examined: 0,
                binary_members: Vec::new(),
            };
        }
        relax_permissions(&contents);

        let mut examined = 0;
        let mut binary_members = Vec::new();
        let _ = enumerate_files(&contents, Exclusions::ArchiveContents, |path| {
            // Unreadable members are skipped like vanished ones.
            if let Ok(Some(class)) = classifier::classify_path(&path, probe_bytes) {
                examined += 1;
                if class.is_binary() {
                    binary_members.push(relative_to(&contents, &path));
                }
            }
            true
        });

        let verdict = if binary_members.is_empty() {
            ArchiveVerdict::Clean
        } else {
            ArchiveVerdict::ContainsBinary
        };
        JobOutcome {
            verdict,
            examined,
            binary_members,
        }
    }

    fn extract(&mut self, contents: &Path, probe_bytes: usize) -> std::result::Result<(), ArchiveVerdict> {
        match self.format {
            ContainerFormat::Zip => {
                extract_zip(&self.source, contents).map_err(|e| extraction_failed(self.format, e))
            }
            ContainerFormat::Tar => {
                unpack_tar(&self.source, contents).map_err(|e| extraction_failed(self.format, e))
            }
            wrapper @ (ContainerFormat::Gzip | ContainerFormat::Bzip2) => {
                let stream = self.scratch.path().join(STREAM_FILE);
                decompress(wrapper, &self.source, &stream)
                    .map_err(|e| extraction_failed(wrapper, e))?;
                let inner = mime::probe_path(&stream, probe_bytes)
                    .map_err(|e| extraction_failed(wrapper, e))?;
                if ContainerFormat::from_mime(&inner) != Some(ContainerFormat::Tar) {
                    return Err(ArchiveVerdict::UnsupportedInnerFormat {
                        format: wrapper,
                        inner,
                    });
                }
                self.chain.push(ContainerFormat::Tar);
                unpack_tar(&stream, contents)
                    .map_err(|e| extraction_failed(ContainerFormat::Tar, e))
            }
        }
    }

    /// Remove the scratch directory and return where it was.
    fn finish(self) -> PathBuf {
        let path = self.scratch.path().to_path_buf();
        relax_permissions(&path);
        if let Err(err) = self.scratch.close() {
            eprintln!(
                "[BC-ARCHIVE] failed to remove scratch dir {} for {}: {err}",
                path.display(),
                self.source.display()
            );
        }
        path
    }
}

fn extraction_failed(format: ContainerFormat, err: impl std::fmt::Display) -> ArchiveVerdict {
    ArchiveVerdict::ExtractionFailed {
        format,
        details: err.to_string(),
    }
}

/// Member-by-member zip extraction. Names that would resolve outside `dest`
/// are skipped and the remaining members still land, matching how the tar
/// codec treats them. Encrypted members fail: no password is ever tried.
fn extract_zip(source: &Path, dest: &Path) -> Result<()> {
    let file = File::open(source).map_err(|e| BcError::io(source, e))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| BcError::archive(source, e))?;
    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| BcError::archive(source, e))?;
        let Some(relative) = member.enclosed_name() else {
            continue;
        };
        let out = dest.join(relative);
        if member.is_dir() {
            fs::create_dir_all(&out).map_err(|e| BcError::io(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| BcError::io(parent, e))?;
        }
        let mut output = File::create(&out).map_err(|e| BcError::io(&out, e))?;
        io::copy(&mut member, &mut output).map_err(|e| BcError::archive(source, e))?;
    }
    Ok(())
}

/// Full tar member extraction.
fn unpack_tar(source: &Path, dest: &Path) -> Result<()> {
    let file = File::open(source).map_err(|e| BcError::io(source, e))?;
    tar::Archive::new(BufReader::new(file))
        .unpack(dest)
        .map_err(|e| BcError::archive(source, e))
}

/// Decompress a single-stream wrapper into `dest`.
fn decompress(format: ContainerFormat, source: &Path, dest: &Path) -> Result<u64> {
    let input = BufReader::new(File::open(source).map_err(|e| BcError::io(source, e))?);
    let mut decoder: Box<dyn Read> = match format {
        ContainerFormat::Gzip => Box::new(MultiGzDecoder::new(input)),
        ContainerFormat::Bzip2 => Box::new(MultiBzDecoder::new(input)),
        ContainerFormat::Zip | ContainerFormat::Tar => {
            return Err(BcError::archive(
                source,
                format!("{} is not a compression wrapper", format.label()),
            ));
        }
    };
    let mut output = File::create(dest).map_err(|e| BcError::io(dest, e))?;
    io::copy(&mut decoder, &mut output).map_err(|e| BcError::archive(source, e))
}

/// Give the owner access to everything an archive extracted. Member modes
/// such as `0o000` or `0o555` would otherwise hide files from the walk or
/// block removal of the scratch directory.
#[cfg(unix)]
fn relax_permissions(root: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(meta) = fs::symlink_metadata(&dir) else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        let mut perms = meta.permissions();
        if perms.mode() & 0o700 != 0o700 {
            perms.set_mode(perms.mode() | 0o700);
            let _ = fs::set_permissions(&dir, perms);
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file()
                && let Ok(meta) = entry.metadata()
            {
                let mut perms = meta.permissions();
                if perms.mode() & 0o400 == 0 {
                    perms.set_mode(perms.mode() | 0o400);
                    let _ = fs::set_permissions(entry.path(), perms);
                }
            }
        }
    }
}

#[cfg(not(unix))]
fn relax_permissions(_root: &Path) {}
