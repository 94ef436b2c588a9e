//! Storage operations
//!
//! Filesystem preflight for LIST, RETR and STOR. Nothing here touches the
//! data connection; callers decide the reply from the returned error.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::validation::{ensure_within_root, io_to_storage, resolve_path};

/// Lists the entry names of a directory under `root`, sorted.
///
/// `requested` defaults to the root itself.
pub async fn list_directory(
    root: &Path,
    requested: Option<&str>,
) -> Result<Vec<String>, StorageError> {
    let requested = requested.unwrap_or(".");
    let path = resolve_path(root, requested)?;
    let real_path = ensure_within_root(root, &path, requested).await?;

    let metadata = tokio::fs::metadata(&real_path)
        .await
        .map_err(|e| io_to_storage(e, &real_path, requested))?;
    if !metadata.is_dir() {
        return Err(StorageError::NotADirectory(requested.to_string()));
    }

    let mut entries = tokio::fs::read_dir(&real_path)
        .await
        .map_err(|e| io_to_storage(e, &real_path, requested))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_to_storage(e, &real_path, requested))?
    {
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            // A lossy name could not be used in a later RETR or STOR.
            Err(raw) => warn!("Skipping non UTF-8 entry {:?} in {}", raw, real_path.display()),
        }
    }
    names.sort();

    info!(
        "Listed directory {} (real: {}) - {} entries",
        requested,
        real_path.display(),
        names.len()
    );
    Ok(names)
}

/// Prepares for file retrieval: the path must be a regular file under `root`.
pub async fn prepare_retrieval(root: &Path, requested: &str) -> Result<PathBuf, StorageError> {
    let path = resolve_path(root, requested)?;
    let real_path = ensure_within_root(root, &path, requested).await?;

    let metadata = tokio::fs::metadata(&real_path)
        .await
        .map_err(|e| io_to_storage(e, &real_path, requested))?;
    if !metadata.is_file() {
        return Err(StorageError::NotAFile(requested.to_string()));
    }

    debug!(
        "Prepared file retrieval for {} (real: {})",
        requested,
        real_path.display()
    );
    Ok(real_path)
}

/// Prepares for file storage.
///
/// The parent directory must already exist under `root`; the file itself is
/// created or overwritten later, once the data connection is open.
pub async fn prepare_storage(root: &Path, requested: &str) -> Result<PathBuf, StorageError> {
    let path = resolve_path(root, requested)?;

    let file_name = match path.file_name() {
        Some(name) if path.as_path() != root => name.to_os_string(),
        _ => return Err(StorageError::NotAFile(requested.to_string())),
    };
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::NotAFile(requested.to_string()))?;

    let real_parent = ensure_within_root(root, parent, requested).await?;
    let parent_meta = tokio::fs::metadata(&real_parent)
        .await
        .map_err(|e| io_to_storage(e, &real_parent, requested))?;
    if !parent_meta.is_dir() {
        return Err(StorageError::NotADirectory(requested.to_string()));
    }

    let target = real_parent.join(file_name);
    match tokio::fs::symlink_metadata(&target).await {
        Ok(meta) if meta.is_dir() => {
            return Err(StorageError::NotAFile(requested.to_string()));
        }
        Ok(meta) if meta.file_type().is_symlink() => {
            ensure_within_root(root, &target, requested).await?;
        }
        _ => {}
    }

    debug!(
        "Prepared file storage for {} (real: {})",
        requested,
        target.display()
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::write(root.join("b.txt"), b"bee").unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::create_dir(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/readme"), b"r").unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn lists_root_sorted() {
        let (_dir, root) = setup();
        let names = list_directory(&root, None).await.unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "docs"]);
    }

    #[tokio::test]
    async fn lists_subdirectory() {
        let (_dir, root) = setup();
        assert_eq!(list_directory(&root, Some("docs")).await.unwrap(), vec!["readme"]);
        assert_eq!(list_directory(&root, Some("/docs/")).await.unwrap(), vec!["readme"]);
    }

    #[tokio::test]
    async fn list_errors() {
        let (_dir, root) = setup();
        assert!(matches!(
            list_directory(&root, Some("missing")).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            list_directory(&root, Some("a.txt")).await,
            Err(StorageError::NotADirectory(_))
        ));
        assert!(matches!(
            list_directory(&root, Some("..")).await,
            Err(StorageError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn retrieval_requires_regular_file() {
        let (_dir, root) = setup();
        assert_eq!(prepare_retrieval(&root, "a.txt").await.unwrap(), root.join("a.txt"));
        assert!(matches!(
            prepare_retrieval(&root, "docs").await,
            Err(StorageError::NotAFile(_))
        ));
        assert!(matches!(
            prepare_retrieval(&root, "nope.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            prepare_retrieval(&root, "../../etc/passwd").await,
            Err(StorageError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn storage_target_rules() {
        let (_dir, root) = setup();
        assert_eq!(prepare_storage(&root, "new.bin").await.unwrap(), root.join("new.bin"));
        assert_eq!(prepare_storage(&root, "a.txt").await.unwrap(), root.join("a.txt"));
        assert_eq!(
            prepare_storage(&root, "docs/new").await.unwrap(),
            root.join("docs/new")
        );
        assert!(matches!(
            prepare_storage(&root, "nodir/new").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            prepare_storage(&root, "docs").await,
            Err(StorageError::NotAFile(_))
        ));
        assert!(matches!(
            prepare_storage(&root, "/").await,
            Err(StorageError::NotAFile(_))
        ));
        assert!(matches!(
            prepare_storage(&root, "../escape").await,
            Err(StorageError::PathEscape(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn listing_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_dir, root) = setup();
        std::fs::write(root.join(OsStr::from_bytes(b"bad\xffname")), b"x").unwrap();

        let names = list_directory(&root, None).await.unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "docs"]);
    }
}
