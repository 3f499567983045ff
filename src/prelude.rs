//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use binary_checker::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{BcError, Result};

// Logger
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter, SharedJsonl};

// Scanner
pub use crate::scanner::archive::{
    ArchiveInspection, ArchiveInspector, ArchiveVerdict, ContainerFormat, InspectorConfig,
    inspect_archive,
};
pub use crate::scanner::classifier::{Classification, classify};
pub use crate::scanner::mime::MimeType;
pub use crate::scanner::remote::{GitCloner, RemoteRepo};
pub use crate::scanner::report::{Diagnostic, Finding, FindingKind, ScanReport, ScanStats};
pub use crate::scanner::target::{Exclusions, ScanTarget};
pub use crate::scanner::walker::{TreeWalker, WalkerConfig, scan};
