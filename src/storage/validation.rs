//! Path validation
//!
//! Every path argument is interpreted relative to the session root. A leading
//! `/` names the root itself, `.` is ignored and `..` may climb only as far as
//! the root; anything that would leave it is rejected. Symlinks are checked
//! after resolution by canonicalizing and comparing against the (canonical)
//! root.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Lexically resolves `requested` under `root`.
pub fn resolve_path(root: &Path, requested: &str) -> Result<PathBuf, StorageError> {
    if requested.contains('\0') {
        return Err(StorageError::PathEscape(requested.to_string()));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(StorageError::PathEscape(requested.to_string()));
                }
            }
            Component::Prefix(_) => {
                return Err(StorageError::PathEscape(requested.to_string()));
            }
        }
    }

    Ok(root.join(relative))
}

/// Canonicalizes an existing `path` and checks it is still under `root`.
///
/// `root` must already be canonical.
pub async fn ensure_within_root(
    root: &Path,
    path: &Path,
    requested: &str,
) -> Result<PathBuf, StorageError> {
    let canonical = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| io_to_storage(e, path, requested))?;

    if !canonical.starts_with(root) {
        return Err(StorageError::PathEscape(requested.to_string()));
    }
    Ok(canonical)
}

/// NotFound becomes a user-facing "not found"; everything else keeps the cause.
pub(crate) fn io_to_storage(err: io::Error, path: &Path, requested: &str) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(requested.to_string())
    } else {
        StorageError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_virtual_absolute_paths() {
        let root = Path::new("/srv/ftp");
        assert_eq!(resolve_path(root, "a.txt").unwrap(), root.join("a.txt"));
        assert_eq!(resolve_path(root, "/docs/a.txt").unwrap(), root.join("docs/a.txt"));
        assert_eq!(resolve_path(root, "./docs/../b").unwrap(), root.join("b"));
        assert_eq!(resolve_path(root, ".").unwrap(), root.to_path_buf());
        assert_eq!(resolve_path(root, "/").unwrap(), root.to_path_buf());
    }

    #[test]
    fn rejects_traversal_above_root() {
        let root = Path::new("/srv/ftp");
        for bad in ["..", "../../etc/passwd", "docs/../../x", "/../etc"] {
            assert!(
                matches!(resolve_path(root, bad), Err(StorageError::PathEscape(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_nul_bytes() {
        assert!(resolve_path(Path::new("/srv"), "a\0b").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"x").unwrap();

        let root_dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(root_dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let path = resolve_path(&root, "link/secret").unwrap();
        assert!(matches!(
            ensure_within_root(&root, &path, "link/secret").await,
            Err(StorageError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let root_dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(root_dir.path()).unwrap();
        let path = resolve_path(&root, "nope").unwrap();
        assert!(matches!(
            ensure_within_root(&root, &path, "nope").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
