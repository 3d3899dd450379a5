//! `.gitignore` maintenance for the output directory.

use std::fs;
use std::io;
use std::path::Path;

/// Name of the ignore file written into the output directory.
pub const IGNORE_FILE: &str = ".gitignore";

/// Ensure `dir/.gitignore` lists every entry in `entries`.
///
/// Creates `dir` and the file when missing. Lines already present are kept as
/// they are and missing entries are appended in order, so calling this twice
/// with the same entries leaves the file unchanged.
///
/// Returns `true` when the file was written.
pub fn ensure_ignore_entries<S: AsRef<str>>(dir: &Path, entries: &[S]) -> io::Result<bool> {
    fs::create_dir_all(dir)?;

    let path = dir.join(IGNORE_FILE);
    let existing = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let mut missing: Vec<&str> = Vec::new();
    for entry in entries {
        let entry = entry.as_ref().trim();
        if entry.is_empty() || missing.contains(&entry) {
            continue;
        }
        if !existing.lines().any(|line| line.trim() == entry) {
            missing.push(entry);
        }
    }

    if missing.is_empty() && path.exists() {
        return Ok(false);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for entry in &missing {
        content.push_str(entry);
        content.push('\n');
    }

    fs::write(&path, content)?;
    tracing::debug!("Updated {} with {:?}", path.display(), missing);

    Ok(true)
}
