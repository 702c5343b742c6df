//! Filesystem helpers

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Given path does not seem to be in a git repository")]
    NotInRepository(PathBuf),

    #[error("Cannot resolve {}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Closest ancestor of `path` (itself included) holding a `.git` directory.
///
/// A file path starts the search at its parent directory.
pub fn repository_root(path: impl AsRef<Path>) -> Result<PathBuf, PathError> {
    let path = path.as_ref();
    let resolved = path.canonicalize().map_err(|source| PathError::Resolve {
        path: path.to_path_buf(),
        source,
    })?;

    let start: &Path = if resolved.is_file() {
        resolved.parent().unwrap_or(&resolved)
    } else {
        &resolved
    };

    start
        .ancestors()
        .find(|dir| dir.join(".git").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| PathError::NotInRepository(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn repository() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/nested/lib.rs"), "").unwrap();
        dir
    }

    #[test]
    fn test_root_from_root() {
        let repo = repository();
        let root = repository_root(repo.path()).unwrap();
        assert_eq!(root, repo.path().canonicalize().unwrap());
    }

    #[test]
    fn test_root_from_nested_dir() {
        let repo = repository();
        let root = repository_root(repo.path().join("src/nested")).unwrap();
        assert_eq!(root, repo.path().canonicalize().unwrap());
    }

    #[test]
    fn test_root_from_file() {
        let repo = repository();
        let root = repository_root(repo.path().join("src/nested/lib.rs")).unwrap();
        assert_eq!(root, repo.path().canonicalize().unwrap());
    }

    #[test]
    fn test_git_file_is_not_a_repository() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".git"), "gitdir: elsewhere").unwrap();

        // an enclosing checkout would make this ambiguous
        if let Ok(root) = repository_root(dir.path()) {
            assert_ne!(root, dir.path().canonicalize().unwrap());
        }
    }

    #[test]
    fn test_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = repository_root(dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PathError::Resolve { .. }));
    }

    #[test]
    fn test_not_in_repository_message() {
        let err = PathError::NotInRepository(PathBuf::from("/tmp"));
        assert_eq!(
            err.to_string(),
            "Given path does not seem to be in a git repository"
        );
    }
}
