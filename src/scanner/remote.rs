//! Remote targets: repository URL parsing and shallow anonymous clones.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use regex::Regex;
use serde::Serialize;

use crate::core::config::RemoteConfig;
use crate::core::errors::{BcError, Result};

/// Scheme prefixes that mark a target as a repository URL.
const REMOTE_PREFIXES: [&str; 5] = ["https://", "http://", "git://", "ssh://", "git@"];

/// `scheme://host/.../<name>[.git]` or scp-style `git@host:owner/<name>[.git]`.
const URL_PATTERN: &str =
    r"^(?:(?:https?|git|ssh)://[^/\s]+(?:/[^/\s]+)*/|git@[^:\s]+:(?:[^/\s]+/)*)([^/\s]+?)(?:\.git)?/?$";

/// Whether `input` names a remote repository rather than a local path.
pub fn is_remote(input: &str) -> bool {
    REMOTE_PREFIXES.iter().any(|p| input.starts_with(p))
}

/// A repository URL and the checkout directory name derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRepo {
    pub url: String,
    /// Last path segment with any `.git` suffix removed.
    pub name: String,
}

impl RemoteRepo {
    pub fn parse(input: &str) -> Result<Self> {
        let re = Regex::new(URL_PATTERN).map_err(|err| BcError::Runtime {
            details: format!("repository URL pattern failed to compile: {err}"),
        })?;
        let invalid = |details: &str| BcError::InvalidTarget {
            target: input.to_string(),
            details: details.to_string(),
        };
        let caps = re
            .captures(input.trim())
            .ok_or_else(|| invalid("not a recognised repository URL"))?;
        let name = caps.get(1).map_or("", |m| m.as_str());
        if name.is_empty() || name == "." || name == ".." {
            return Err(invalid("repository name is empty"));
        }
        Ok(Self {
            url: input.trim().to_string(),
            name: name.to_string(),
        })
    }
}

/// Local checkout produced by [`GitCloner::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRepo {
    pub path: PathBuf,
    /// An existing same-named path was used and no clone ran.
    pub reused: bool,
}

/// Runs `git clone --depth=N` with prompts disabled.
#[derive(Debug, Clone)]
pub struct GitCloner {
    git_binary: String,
    depth: u32,
}

impl Default for GitCloner {
    fn default() -> Self {
        Self::from_config(&RemoteConfig::default())
    }
}

impl GitCloner {
    pub fn new(git_binary: impl Into<String>, depth: u32) -> Self {
        Self {
            git_binary: git_binary.into(),
            depth: depth.max(1),
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(config.git_binary.clone(), config.depth)
    }

    /// Make `repo` available under `clone_dir/<name>`.
    ///
    /// Any existing path of that name is reused as-is, without fetching.
    pub fn fetch(&self, repo: &RemoteRepo, clone_dir: &Path) -> Result<FetchedRepo> {
        let dest = clone_dir.join(&repo.name);
        if fs::symlink_metadata(&dest).is_ok() {
            return Ok(FetchedRepo {
                path: dest,
                reused: true,
            });
        }
        fs::create_dir_all(clone_dir).map_err(|source| BcError::io(clone_dir, source))?;
        self.clone_into(&repo.url, &dest)?;
        Ok(FetchedRepo {
            path: dest,
            reused: false,
        })
    }

    fn clone_into(&self, url: &str, dest: &Path) -> Result<()> {
        let output = Command::new(&self.git_binary)
            .arg("clone")
            .arg(format!("--depth={}", self.depth))
            .arg(url)
            .arg(dest)
            // Anonymous access only: never block on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "/bin/true")
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    BcError::GitNotFound {
                        binary: self.git_binary.clone(),
                    }
                } else {
                    BcError::CloneFailed {
                        url: url.to_string(),
                        details: err.to_string(),
                    }
                }
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(BcError::CloneFailed {
            url: url.to_string(),
            details: format!(
                "{} clone exited with code {}: {}",
                self.git_binary,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detects_remote_inputs() {
        assert!(is_remote("https://github.com/acme/widget.git"));
        assert!(is_remote("git@gitee.com:acme/widget.git"));
        assert!(is_remote("ssh://git@example.org/acme/widget"));
        assert!(!is_remote("./widget"));
        assert!(!is_remote("/srv/repos/widget"));
    }

    #[test]
    fn parse_extracts_repository_name() {
        for (url, name) in [
            ("https://github.com/acme/widget.git", "widget"),
            ("https://gitcode.com/acme/widget", "widget"),
            ("http://example.org/group/sub/widget.git/", "widget"),
            ("git@github.com:acme/widget.git", "widget"),
            ("ssh://git@example.org:2222/acme/widget.git", "widget"),
            ("git://example.org/widget-core.rs.git", "widget-core.rs"),
        ] {
            let repo = RemoteRepo::parse(url).unwrap();
            assert_eq!(repo.name, name, "{url}");
            assert_eq!(repo.url, url);
        }
    }

    #[test]
    fn parse_rejects_non_repository_urls() {
        for bad in ["https://github.com", "https://github.com/", "git@github.com:", "widget"] {
            let err = RemoteRepo::parse(bad).unwrap_err();
            assert_eq!(err.code(), "BC-2001", "{bad}");
        }
    }

    #[test]
    fn existing_checkout_is_reused_without_git() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("widget")).unwrap();
        let cloner = GitCloner::new("/nonexistent/bin/git", 1);
        let repo = RemoteRepo::parse("https://github.com/acme/widget.git").unwrap();

        let fetched = cloner.fetch(&repo, tmp.path()).unwrap();
        assert!(fetched.reused);
        assert_eq!(fetched.path, tmp.path().join("widget"));
    }

    #[test]
    fn missing_git_binary_is_reported() {
        let tmp = TempDir::new().unwrap();
        let cloner = GitCloner::new("/nonexistent/bin/git", 1);
        let repo = RemoteRepo::parse("https://github.com/acme/widget.git").unwrap();

        let err = cloner.fetch(&repo, tmp.path()).unwrap_err();
        assert_eq!(err.code(), "BC-2004");
    }

    #[cfg(unix)]
    #[test]
    fn failing_clone_is_reported() {
        let tmp = TempDir::new().unwrap();
        let cloner = GitCloner::new("false", 1);
        let repo = RemoteRepo::parse("https://github.com/acme/widget.git").unwrap();

        let err = cloner.fetch(&repo, &tmp.path().join("clones")).unwrap_err();
        assert_eq!(err.code(), "BC-2003");
        assert!(tmp.path().join("clones").is_dir());
    }

    #[test]
    fn depth_is_at_least_one() {
        let cloner = GitCloner::new("git", 0);
        assert_eq!(cloner.depth, 1);
    }
}
