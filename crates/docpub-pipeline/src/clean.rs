//! Recursive removal of build directories.

use std::fs;
use std::io;
use std::path::Path;

/// Recursively remove `dir`.
///
/// Returns `Ok(false)` when there was nothing to remove. Refuses to remove
/// `root` itself or any directory containing it.
pub fn remove_dir(dir: &Path, root: &Path) -> io::Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }

    let target = dir.canonicalize()?;
    if let Ok(root) = root.canonicalize() {
        if root.starts_with(&target) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to remove {}: contains the project root", dir.display()),
            ));
        }
    }

    if target.is_dir() {
        fs::remove_dir_all(dir)?;
    } else {
        fs::remove_file(dir)?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn removes_nested_tree() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("_build_temp");
        fs::create_dir_all(dir.join("a/b")).unwrap();
        fs::write(dir.join("a/b/file.txt"), "x").unwrap();

        assert!(remove_dir(&dir, temp.path()).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let temp = tempdir().unwrap();

        assert!(!remove_dir(&temp.path().join("missing"), temp.path()).unwrap());
    }

    #[test]
    fn refuses_to_remove_project_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("project");
        fs::create_dir_all(&root).unwrap();

        assert!(remove_dir(&root, &root).is_err());
        assert!(remove_dir(temp.path(), &root).is_err());
        assert!(root.exists());
    }
}
