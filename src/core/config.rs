//! Configuration system: TOML file + env var overrides + smart defaults.
//!
//! Exclusion rules (`.git`, `test`) are deliberately absent: they are fixed
//! constants of the walker, see [`crate::scanner::target`].

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{BcError, Result};

/// Smallest header window that still covers the tar `ustar` magic at offset 257.
pub const MIN_HEADER_PROBE_BYTES: usize = 512;

/// Upper bound on worker threads, and with it on live scratch directories.
pub const MAX_PARALLELISM: usize = 256;

/// Full binary-checker configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub remote: RemoteConfig,
    pub paths: PathsConfig,
}

/// Walker and archive-inspection knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Worker threads; also the upper bound on live scratch directories.
    pub parallelism: usize,
    /// Parent directory for archive scratch directories (system temp when unset).
    pub scratch_root: Option<PathBuf>,
    /// Bytes read from each file for MIME sniffing.
    pub header_probe_bytes: usize,
}

/// Remote repository resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Directory that receives clones; an existing same-named checkout is reused.
    pub clone_dir: PathBuf,
    pub git_binary: String,
    pub depth: u32,
}

/// Filesystem paths used by the checker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// JSONL activity log. Logging is off when unset.
    pub jsonl_log: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map_or(2, |n| n.get().saturating_div(2).max(1)),
            scratch_root: None,
            header_probe_bytes: 8192,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            clone_dir: PathBuf::from("."),
            git_binary: "git".to_string(),
            depth: 1,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[BC-CONFIG] WARNING: HOME not set, falling back to /tmp for config path"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir
                .join(".config")
                .join("binary-checker")
                .join("config.toml"),
            jsonl_log: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| BcError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(BcError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // scanner
        if let Some(raw) = lookup("BC_SCANNER_PARALLELISM") {
            self.scanner.parallelism = parse_env("BC_SCANNER_PARALLELISM", &raw)?;
        }
        if let Some(raw) = lookup("BC_SCANNER_SCRATCH_ROOT") {
            self.scanner.scratch_root = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("BC_SCANNER_HEADER_PROBE_BYTES") {
            self.scanner.header_probe_bytes = parse_env("BC_SCANNER_HEADER_PROBE_BYTES", &raw)?;
        }

        // remote
        if let Some(raw) = lookup("BC_REMOTE_CLONE_DIR") {
            self.remote.clone_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("BC_REMOTE_GIT_BINARY") {
            self.remote.git_binary = raw;
        }
        if let Some(raw) = lookup("BC_REMOTE_DEPTH") {
            self.remote.depth = parse_env("BC_REMOTE_DEPTH", &raw)?;
        }

        // paths
        if let Some(raw) = lookup("BC_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = Some(PathBuf::from(raw));
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scanner.parallelism == 0 {
            return Err(BcError::InvalidConfig {
                details: "scanner.parallelism must be >= 1".to_string(),
            });
        }
        if self.scanner.parallelism > MAX_PARALLELISM {
            return Err(BcError::InvalidConfig {
                details: format!(
                    "scanner.parallelism ({}) must be <= {MAX_PARALLELISM}",
                    self.scanner.parallelism
                ),
            });
        }
        if self.scanner.header_probe_bytes < MIN_HEADER_PROBE_BYTES {
            return Err(BcError::InvalidConfig {
                details: format!(
                    "scanner.header_probe_bytes ({}) must be >= {MIN_HEADER_PROBE_BYTES}",
                    self.scanner.header_probe_bytes
                ),
            });
        }
        if let Some(root) = &self.scanner.scratch_root
            && root.as_os_str().is_empty()
        {
            return Err(BcError::InvalidConfig {
                details: "scanner.scratch_root must not be empty when set".to_string(),
            });
        }
        if self.remote.depth == 0 {
            return Err(BcError::InvalidConfig {
                details: "remote.depth must be >= 1".to_string(),
            });
        }
        if self.remote.git_binary.trim().is_empty() {
            return Err(BcError::InvalidConfig {
                details: "remote.git_binary must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| BcError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
