//! Content classifier: binary vs. text from the coarse MIME category.
//!
//! The test is category-level on purpose. Every `application/*` subtype is
//! binary, including text-like ones such as `application/json`.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scanner::mime::{self, MimeType};

/// MIME categories reported as binary.
pub const BINARY_CATEGORIES: [&str; 4] = ["application", "image", "audio", "video"];

/// Classification of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Binary,
    Text,
    /// An archive whose container or inner format could not be handled.
    UnsupportedContainer,
}

impl Classification {
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Binary)
    }
}

/// Classify a MIME type. Pure function of the category.
pub fn classify_mime(mime: &MimeType) -> Classification {
    if BINARY_CATEGORIES.contains(&mime.category()) {
        Classification::Binary
    } else {
        Classification::Text
    }
}

/// Probe and classify the file at `path`.
///
/// Returns `Ok(None)` when the file vanished before it could be probed.
pub fn classify_path(path: &Path, probe_bytes: usize) -> std::io::Result<Option<Classification>> {
    match mime::probe_path(path, probe_bytes) {
        Ok(mime) => Ok(Some(classify_mime(&mime))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Probe and classify with the default header window.
pub fn classify(path: &Path) -> std::io::Result<Option<Classification>> {
    classify_path(path, mime::DEFAULT_PROBE_BYTES)
}
