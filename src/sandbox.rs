use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

/// Resolves tool-supplied paths against the workspace root and rejects any
/// path that would land outside it.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Canonicalizes `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("workspace root {} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps `path` (relative to the root, or absolute) to an absolute path
    /// inside the workspace.
    ///
    /// `..` segments are folded lexically and checked before the filesystem
    /// is consulted, so an escaping path never touches the disk. The existing
    /// part of the result is then canonicalized to catch symlinks that point
    /// outside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let trimmed = path.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(self.root.clone());
        }

        let candidate = Path::new(trimmed);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let normalized = normalize_lexically(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(ToolError::OutsideWorkspace {
                path: trimmed.to_string(),
            });
        }

        let resolved = resolve_existing_prefix(&normalized)
            .map_err(|source| ToolError::io(&normalized, source))?;
        if !resolved.starts_with(&self.root) {
            return Err(ToolError::OutsideWorkspace {
                path: trimmed.to_string(),
            });
        }

        Ok(resolved)
    }

    /// Workspace-relative form of `path` with `/` separators; `.` for the root.
    pub fn relative(&self, path: &Path) -> String {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return path.display().to_string();
        };
        let parts: Vec<_> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    normalized
}

/// Canonicalizes the longest existing ancestor of `path` and re-attaches the
/// missing tail.
fn resolve_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    for ancestor in path.ancestors() {
        if ancestor.symlink_metadata().is_err() {
            continue;
        }
        let canonical = ancestor.canonicalize()?;
        let tail = path.strip_prefix(ancestor).unwrap_or_else(|_| Path::new(""));
        return Ok(if tail.as_os_str().is_empty() {
            canonical
        } else {
            canonical.join(tail)
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, PathSandbox) {
        let dir = tempfile::tempdir().expect("tempdir");
        let sandbox = PathSandbox::new(dir.path()).expect("sandbox");
        (dir, sandbox)
    }

    #[test]
    fn empty_and_dot_resolve_to_root() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(sandbox.resolve("").expect("empty"), sandbox.root());
        assert_eq!(sandbox.resolve(".").expect("dot"), sandbox.root());
        assert_eq!(sandbox.relative(sandbox.root()), ".");
    }

    #[test]
    fn missing_paths_inside_root_resolve() {
        let (_dir, sandbox) = sandbox();
        let resolved = sandbox.resolve("src/new/mod.rs").expect("inside");
        assert_eq!(resolved, sandbox.root().join("src/new/mod.rs"));
        assert_eq!(sandbox.relative(&resolved), "src/new/mod.rs");
    }

    #[test]
    fn parent_segments_that_stay_inside_are_folded() {
        let (_dir, sandbox) = sandbox();
        let resolved = sandbox.resolve("src/../lib.rs").expect("inside");
        assert_eq!(resolved, sandbox.root().join("lib.rs"));
    }

    #[test]
    fn escapes_are_rejected() {
        let (_dir, sandbox) = sandbox();
        for path in ["../outside.txt", "../../etc/passwd", "a/../../b", "/etc/passwd"] {
            let error = sandbox.resolve(path).expect_err("escape should fail");
            assert!(
                matches!(error, ToolError::OutsideWorkspace { .. }),
                "{path}: {error}"
            );
        }
    }

    #[test]
    fn absolute_paths_inside_root_are_accepted() {
        let (_dir, sandbox) = sandbox();
        let inside = sandbox.root().join("notes.md");
        let resolved = sandbox
            .resolve(&inside.display().to_string())
            .expect("absolute inside");
        assert_eq!(resolved, inside);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_pointing_outside_are_rejected() {
        let (dir, sandbox) = sandbox();
        let outside = tempfile::tempdir().expect("outside dir");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).expect("symlink");

        let error = sandbox
            .resolve("link/secret.txt")
            .expect_err("symlink escape should fail");
        assert!(matches!(error, ToolError::OutsideWorkspace { .. }));
    }

    #[test]
    fn root_must_be_a_directory() {
        let (dir, _sandbox) = sandbox();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").expect("write");
        assert!(PathSandbox::new(&file).is_err());
    }
}
