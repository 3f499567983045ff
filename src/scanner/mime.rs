//! Library-level MIME sniffing.
//!
//! Probes a bounded header window: magic numbers first (via `infer`), then a
//! byte-level text heuristic for everything without a signature. The result
//! mirrors what `file --mime-type` reports for the cases the scanner cares
//! about: `inode/x-empty` for empty files, `text/plain` for readable text and
//! `application/octet-stream` for unrecognised binary data.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default header window in bytes.
pub const DEFAULT_PROBE_BYTES: usize = 8192;

/// MIME type of an empty file.
pub const EMPTY: &str = "inode/x-empty";
/// MIME type of readable text without a stronger signature.
pub const TEXT_PLAIN: &str = "text/plain";
/// MIME type of unrecognised binary data.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A probed media type such as `application/zip`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeType(String);

impl MimeType {
    /// Parse `type/subtype`, dropping any `; parameter` suffix.
    pub fn parse(raw: &str) -> Option<Self> {
        let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
        let (top, sub) = essence.split_once('/')?;
        if top.is_empty() || sub.is_empty() || sub.contains('/') {
            return None;
        }
        Some(Self(essence))
    }

    /// Top-level category, e.g. `application`.
    pub fn category(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(top, _)| top)
    }

    /// Subtype, e.g. `zip` or `x-tar`.
    pub fn subtype(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, sub)| sub)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_static(raw: &'static str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probe the MIME type of the file at `path` from its first `limit` bytes.
///
/// A vanished file surfaces as `ErrorKind::NotFound`; callers skip it.
pub fn probe_path(path: &Path, limit: usize) -> io::Result<MimeType> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut header)?;
    Ok(probe_bytes(&header))
}

/// Probe the MIME type of an in-memory header window.
pub fn probe_bytes(header: &[u8]) -> MimeType {
    if header.is_empty() {
        return MimeType::from_static(EMPTY);
    }
    if let Some(kind) = infer::get(header)
        && let Some(mime) = MimeType::parse(kind.mime_type())
    {
        return mime;
    }
    if looks_like_text(header) {
        MimeType::from_static(TEXT_PLAIN)
    } else {
        MimeType::from_static(OCTET_STREAM)
    }
}

/// Byte-level text heuristic for headers without a magic signature.
///
/// A UTF-16 byte-order mark routes the window through a UTF-16 decode, since
/// such text is full of NUL bytes. Otherwise any NUL byte means binary, and
/// the window is text when it is valid UTF-8 (a multi-byte sequence cut off
/// by the window edge is tolerated) or, for legacy 8-bit encodings, when
/// under 10% of its bytes are control bytes.
fn looks_like_text(header: &[u8]) -> bool {
    if let Some(text) = decode_utf16_bom(header) {
        return text.is_some_and(|chars| mostly_printable(chars.into_iter()));
    }
    if memchr::memchr(0, header).is_some() {
        return false;
    }
    match std::str::from_utf8(header) {
        Ok(_) => true,
        Err(e) if e.error_len().is_none() => true,
        Err(_) => mostly_printable(header.iter().map(|&b| char::from(b))),
    }
}

/// `None` without a UTF-16 BOM; `Some(None)` when the BOM is followed by
/// invalid UTF-16. A trailing odd byte or cut surrogate at the window edge is
/// dropped.
fn decode_utf16_bom(header: &[u8]) -> Option<Option<Vec<char>>> {
    let big_endian = match header {
        [0xff, 0xfe, ..] => false,
        [0xfe, 0xff, ..] => true,
        _ => return None,
    };
    let units = header[2..].chunks_exact(2).map(|pair| {
        let bytes = [pair[0], pair[1]];
        if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    });
    let mut chars = Vec::new();
    let mut decoded = char::decode_utf16(units).peekable();
    while let Some(unit) = decoded.next() {
        match unit {
            Ok(c) => chars.push(c),
            Err(_) if decoded.peek().is_none() => break,
            Err(_) => return Some(None),
        }
    }
    Some(Some(chars))
}

/// Under 10% of the characters are control characters other than common
/// whitespace, form feed and escape.
fn mostly_printable(chars: impl Iterator<Item = char>) -> bool {
    let (mut total, mut control) = (0_usize, 0_usize);
    for c in chars {
        total += 1;
        if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r' | '\x0c' | '\x1b') {
            control += 1;
        }
    }
    control * 10 < total.max(1)
}
