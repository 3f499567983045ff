//! Scan targets, fixed exclusion rules and file enumeration.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{BcError, Result};
use crate::core::paths::resolve_absolute_path;

/// Version-control metadata directory, excluded everywhere.
pub const GIT_DIR: &str = ".git";
/// Path components containing this token are excluded from tree walks.
pub const TEST_SEGMENT: &str = "test";

/// Which fixed exclusion set applies to an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusions {
    /// Top-level walks: `.git` and any component containing `test`.
    Tree,
    /// Extracted archive contents: `.git` only.
    ArchiveContents,
}

impl Exclusions {
    /// Whether a single path component is excluded.
    pub fn excludes_component(self, name: &str) -> bool {
        name == GIT_DIR || (self == Self::Tree && name.contains(TEST_SEGMENT))
    }

    /// Whether any component of a root-relative path is excluded.
    pub fn excludes(self, relative: &Path) -> bool {
        relative.components().any(|c| match c {
            Component::Normal(name) => self.excludes_component(&name.to_string_lossy()),
            _ => false,
        })
    }
}

/// Where the scan root came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSource {
    Local,
    Remote { url: String },
}

/// A resolved scan target. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct ScanTarget {
    /// Absolute root: the directory to walk, or the single artifact.
    pub root: PathBuf,
    /// The path as the user supplied it; single artifacts are reported by it.
    pub display: PathBuf,
    pub source: TargetSource,
    /// The target is a single regular file rather than a directory.
    pub is_artifact: bool,
    pub exclusions: Exclusions,
}

impl ScanTarget {
    /// Resolve a local path. Fails when the root cannot be accessed at all.
    pub fn local(path: &Path) -> Result<Self> {
        Self::from_path(path, TargetSource::Local)
    }

    /// Wrap a local checkout of a remote repository.
    pub fn cloned(path: &Path, url: &str) -> Result<Self> {
        Self::from_path(
            path,
            TargetSource::Remote {
                url: url.to_string(),
            },
        )
    }

    fn from_path(path: &Path, source: TargetSource) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|source| BcError::RootInaccessible {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() && !meta.is_file() {
            return Err(BcError::InvalidTarget {
                target: path.display().to_string(),
                details: "not a regular file or directory".to_string(),
            });
        }
        Ok(Self {
            root: resolve_absolute_path(path),
            display: path.to_path_buf(),
            source,
            is_artifact: meta.is_file(),
            exclusions: Exclusions::Tree,
        })
    }
}

/// Enumerate regular files under `root` in pinned depth-first order.
///
/// Entries of each directory are visited sorted by file name. Symlinks are
/// never followed. Excluded components prune their whole subtree. Unreadable
/// subdirectories are skipped; only an unreadable `root` is an error.
pub fn enumerate_files<F>(root: &Path, exclusions: Exclusions, mut visit: F) -> Result<()>
where
    F: FnMut(PathBuf) -> bool,
{
    let top = fs::read_dir(root).map_err(|source| BcError::RootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;
    let mut stack: Vec<std::vec::IntoIter<fs::DirEntry>> = vec![sorted(top).into_iter()];

    while let Some(level) = stack.last_mut() {
        let Some(entry) = level.next() else {
            stack.pop();
            continue;
        };
        if exclusions.excludes_component(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let Ok(ft) = entry.file_type() else {
            continue;
        };
        if ft.is_dir() {
            // Vanished or unreadable subdirectories are skipped.
            if let Ok(children) = fs::read_dir(entry.path()) {
                stack.push(sorted(children).into_iter());
            }
        } else if ft.is_file() && !visit(entry.path()) {
            return Ok(());
        }
    }
    Ok(())
}

/// Collect [`enumerate_files`] output into a vector.
pub fn list_files(root: &Path, exclusions: Exclusions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    enumerate_files(root, exclusions, |path| {
        files.push(path);
        true
    })?;
    Ok(files)
}

fn sorted(entries: fs::ReadDir) -> Vec<fs::DirEntry> {
    let mut entries: Vec<fs::DirEntry> = entries.flatten().collect();
    entries.sort_by_key(fs::DirEntry::file_name);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn rel_list(root: &Path, exclusions: Exclusions) -> Vec<String> {
        list_files(root, exclusions)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn component_rules() {
        assert!(Exclusions::Tree.excludes_component(".git"));
        assert!(Exclusions::Tree.excludes_component("test"));
        assert!(Exclusions::Tree.excludes_component("tests"));
        assert!(Exclusions::Tree.excludes_component("unittest_data"));
        assert!(!Exclusions::Tree.excludes_component(".github"));
        assert!(!Exclusions::Tree.excludes_component("Testing"));
        assert!(Exclusions::ArchiveContents.excludes_component(".git"));
        assert!(!Exclusions::ArchiveContents.excludes_component("tests"));
    }

    #[test]
    fn relative_path_rules() {
        assert!(Exclusions::Tree.excludes(Path::new("src/tests/fixture.bin")));
        assert!(Exclusions::Tree.excludes(Path::new(".git/objects/ab/cdef")));
        assert!(!Exclusions::Tree.excludes(Path::new("src/main.rs")));
        assert!(!Exclusions::ArchiveContents.excludes(Path::new("pkg/test/a.bin")));
    }

    #[test]
    fn enumeration_is_sorted_depth_first() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.txt");
        touch(tmp.path(), "a/z.txt");
        touch(tmp.path(), "a/m/n.txt");
        touch(tmp.path(), "c.txt");

        assert_eq!(
            rel_list(tmp.path(), Exclusions::Tree),
            vec!["a/m/n.txt", "a/z.txt", "b.txt", "c.txt"]
        );
    }

    #[test]
    fn enumeration_prunes_excluded_dirs() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), ".git/HEAD");
        touch(tmp.path(), "tests/data.bin");
        touch(tmp.path(), "src/test_helpers.rs");
        touch(tmp.path(), "src/lib.rs");

        assert_eq!(rel_list(tmp.path(), Exclusions::Tree), vec!["src/lib.rs"]);
        assert_eq!(
            rel_list(tmp.path(), Exclusions::ArchiveContents),
            vec!["src/lib.rs", "src/test_helpers.rs", "tests/data.bin"]
        );
    }

    #[test]
    fn root_with_test_in_its_own_path_is_still_walked() {
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("test-fixture-root");
        touch(&root, "lib.rs");
        assert_eq!(rel_list(&root, Exclusions::Tree), vec!["lib.rs"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "real/file.txt");
        std::os::unix::fs::symlink(tmp.path().join("real"), tmp.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("real/file.txt"),
            tmp.path().join("file-link"),
        )
        .unwrap();

        assert_eq!(rel_list(tmp.path(), Exclusions::Tree), vec!["real/file.txt"]);
    }

    #[test]
    fn visitor_can_stop_early() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.txt");
        touch(tmp.path(), "b.txt");
        let mut seen = 0;
        enumerate_files(tmp.path(), Exclusions::Tree, |_| {
            seen += 1;
            false
        })
        .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn missing_root_is_inaccessible() {
        let err = list_files(Path::new("/nonexistent/bc/root"), Exclusions::Tree).unwrap_err();
        assert_eq!(err.code(), "BC-2002");
        let err = ScanTarget::local(Path::new("/nonexistent/bc/root")).unwrap_err();
        assert_eq!(err.code(), "BC-2002");
    }

    #[test]
    fn target_detects_artifacts() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "bundle.zip");

        let dir_target = ScanTarget::local(tmp.path()).unwrap();
        assert!(!dir_target.is_artifact);
        assert_eq!(dir_target.source, TargetSource::Local);

        let file_target = ScanTarget::local(&tmp.path().join("bundle.zip")).unwrap();
        assert!(file_target.is_artifact);
        assert!(file_target.root.is_absolute());
    }
}
