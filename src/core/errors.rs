//! BC-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, BcError>;

/// Top-level error type for the binary checker.
#[derive(Debug, Error)]
pub enum BcError {
    #[error("[BC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BC-2001] invalid scan target {target:?}: {details}")]
    InvalidTarget { target: String, details: String },

    #[error("[BC-2002] scan root is not accessible: {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BC-2003] clone of {url} failed: {details}")]
    CloneFailed { url: String, details: String },

    #[error("[BC-2004] git executable not available: {binary}")]
    GitNotFound { binary: String },

    #[error("[BC-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BC-3002] archive failure at {path}: {details}")]
    Archive { path: PathBuf, details: String },

    #[error("[BC-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[BC-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BC-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl BcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BC-1001",
            Self::MissingConfig { .. } => "BC-1002",
            Self::ConfigParse { .. } => "BC-1003",
            Self::InvalidTarget { .. } => "BC-2001",
            Self::RootInaccessible { .. } => "BC-2002",
            Self::CloneFailed { .. } => "BC-2003",
            Self::GitNotFound { .. } => "BC-2004",
            Self::Io { .. } => "BC-3001",
            Self::Archive { .. } => "BC-3002",
            Self::ChannelClosed { .. } => "BC-3003",
            Self::Serialization { .. } => "BC-3101",
            Self::Runtime { .. } => "BC-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::CloneFailed { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for archive codec failures.
    #[must_use]
    pub fn archive(path: impl AsRef<Path>, details: impl std::fmt::Display) -> Self {
        Self::Archive {
            path: path.as_ref().to_path_buf(),
            details: details.to_string(),
        }
    }
}

impl From<serde_json::Error> for BcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for BcError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
