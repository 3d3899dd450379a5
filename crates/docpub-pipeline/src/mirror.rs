//! Mirroring of the documentation sources into the output directory.
//!
//! Files are copied when missing or different in the destination, and each copy
//! takes its source's modification time. Files written by a previous mirror run
//! whose source has since disappeared are removed.
//! The set of mirrored files is tracked in a manifest inside the output
//! directory, so content written by the builder is never touched.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use docpub_publish::IGNORE_FILE;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Manifest of mirrored files, relative to the output directory.
pub const MANIFEST_FILE: &str = ".docpub-mirror.json";

/// Errors that can occur while mirroring.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Mirror source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Failed to read sources: {0}")]
    Read(String),

    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to update mirror manifest: {0}")]
    Manifest(String),
}

/// Result of a mirror run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorResult {
    /// Files copied into the output
    pub copied: usize,

    /// Files already up to date
    pub unchanged: usize,

    /// Stale files removed from the output
    pub removed: usize,
}

/// Something mirrored into the output directory.
#[derive(Debug, Clone)]
enum MirrorSource {
    /// A directory tree, placed under `dest`
    Tree { source: PathBuf, dest: PathBuf },

    /// A single file, placed at `dest`
    File { source: PathBuf, dest: PathBuf },
}

/// Files written by the previous mirror run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MirrorManifest {
    pub files: BTreeSet<PathBuf>,
}

impl MirrorManifest {
    /// Load the manifest from `output_dir`; missing or unreadable means empty.
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(MANIFEST_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Write the manifest into `output_dir`.
    pub fn save(&self, output_dir: &Path) -> Result<(), MirrorError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MirrorError::Manifest(e.to_string()))?;
        fs::write(output_dir.join(MANIFEST_FILE), json)
            .map_err(|e| MirrorError::Manifest(e.to_string()))
    }
}

/// Mirrors source trees and files into an output directory.
#[derive(Debug, Clone)]
pub struct Mirror {
    output_dir: PathBuf,
    sources: Vec<MirrorSource>,
}

impl Mirror {
    /// Create a mirror into `output_dir` with no sources.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sources: Vec::new(),
        }
    }

    /// Mirror the tree at `source` into `dest`, relative to the output.
    pub fn tree(mut self, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        self.sources.push(MirrorSource::Tree {
            source: source.into(),
            dest: dest.into(),
        });
        self
    }

    /// Mirror the file at `source` to `dest`, relative to the output.
    pub fn file(mut self, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        self.sources.push(MirrorSource::File {
            source: source.into(),
            dest: dest.into(),
        });
        self
    }

    /// The output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run the mirror.
    pub fn run(&self) -> Result<MirrorResult, MirrorError> {
        let entries = self.collect_entries()?;

        fs::create_dir_all(&self.output_dir).map_err(|e| MirrorError::Write(e.to_string()))?;

        let mut result = MirrorResult::default();
        let mut current = BTreeSet::new();

        for (source, relative) in entries {
            if is_reserved(&relative) {
                tracing::debug!("Skipping {}: kept by the output", relative.display());
                continue;
            }

            let dest = self.output_dir.join(&relative);

            if needs_copy(&source, &dest) {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| MirrorError::Write(e.to_string()))?;
                }
                copy_file(&source, &dest).map_err(|e| {
                    MirrorError::Write(format!("{} -> {}: {}", source.display(), dest.display(), e))
                })?;
                tracing::debug!("Copied {}", relative.display());
                result.copied += 1;
            } else {
                result.unchanged += 1;
            }

            current.insert(relative);
        }

        let previous = MirrorManifest::load(&self.output_dir);
        for stale in previous.files.difference(&current) {
            if self.remove_stale(stale)? {
                tracing::debug!("Removed {}", stale.display());
                result.removed += 1;
            }
        }

        MirrorManifest { files: current }.save(&self.output_dir)?;

        Ok(result)
    }

    /// Resolve every source into `(source file, output-relative path)` pairs.
    fn collect_entries(&self) -> Result<Vec<(PathBuf, PathBuf)>, MirrorError> {
        let mut entries = Vec::new();

        for source in &self.sources {
            match source {
                MirrorSource::File { source, dest } => {
                    if !source.is_file() {
                        return Err(MirrorError::SourceNotFound(source.clone()));
                    }
                    entries.push((source.clone(), dest.clone()));
                }
                MirrorSource::Tree { source, dest } => {
                    if !source.is_dir() {
                        return Err(MirrorError::SourceNotFound(source.clone()));
                    }

                    let walker = WalkDir::new(source)
                        .follow_links(true)
                        .sort_by_file_name()
                        .into_iter()
                        .filter_entry(|e| e.file_name() != ".git");

                    for entry in walker {
                        let entry = entry.map_err(|e| MirrorError::Read(e.to_string()))?;
                        if !entry.file_type().is_file() {
                            continue;
                        }

                        let relative = entry
                            .path()
                            .strip_prefix(source)
                            .map_err(|e| MirrorError::Read(e.to_string()))?;
                        entries.push((entry.path().to_path_buf(), dest.join(relative)));
                    }
                }
            }
        }

        Ok(entries)
    }

    /// Remove a previously mirrored file and any directories it leaves empty.
    fn remove_stale(&self, relative: &Path) -> Result<bool, MirrorError> {
        // The manifest lives in the output and may have been edited by hand.
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            tracing::warn!("Skipping invalid manifest entry: {}", relative.display());
            return Ok(false);
        }

        let path = self.output_dir.join(relative);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(MirrorError::Write(format!("{}: {}", path.display(), e))),
        }

        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.output_dir || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }

        Ok(true)
    }
}

/// Output-root files owned by the pipeline rather than the sources.
fn is_reserved(relative: &Path) -> bool {
    relative == Path::new(MANIFEST_FILE) || relative == Path::new(IGNORE_FILE)
}

/// Whether `dest` is missing or differs from `source` in length or mtime.
fn needs_copy(source: &Path, dest: &Path) -> bool {
    let (Ok(src), Ok(dst)) = (fs::metadata(source), fs::metadata(dest)) else {
        return true;
    };

    if src.len() != dst.len() {
        return true;
    }

    match (src.modified(), dst.modified()) {
        (Ok(src_time), Ok(dst_time)) => src_time != dst_time,
        _ => true,
    }
}

/// Copy `source` to `dest` and give the copy the source's mtime.
fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest)?;

    let modified = fs::metadata(source)?.modified()?;
    fs::File::options()
        .write(true)
        .open(dest)?
        .set_modified(modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup(root: &Path) -> Mirror {
        write_file(&root.join("docs_source/index.rst"), "Home");
        write_file(&root.join("docs_source/api/module.rst"), "API");
        write_file(&root.join("README.md"), "# Project");

        Mirror::new(root.join("docs"))
            .tree(root.join("docs_source"), "")
            .file(root.join("README.md"), "README.md")
    }

    #[test]
    fn copies_tree_and_readme() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());

        let result = mirror.run().unwrap();

        assert_eq!(
            result,
            MirrorResult {
                copied: 3,
                unchanged: 0,
                removed: 0
            }
        );
        let out = temp.path().join("docs");
        assert_eq!(fs::read_to_string(out.join("index.rst")).unwrap(), "Home");
        assert_eq!(fs::read_to_string(out.join("api/module.rst")).unwrap(), "API");
        assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "# Project");
    }

    #[test]
    fn second_run_copies_nothing() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());

        mirror.run().unwrap();
        let result = mirror.run().unwrap();

        assert_eq!(
            result,
            MirrorResult {
                copied: 0,
                unchanged: 3,
                removed: 0
            }
        );
    }

    #[test]
    fn removes_stale_files_but_keeps_unrelated_content() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        let out = temp.path().join("docs");

        mirror.run().unwrap();
        write_file(&out.join("index.html"), "<h1>Built</h1>");
        write_file(&out.join("api/module.html"), "<h1>Built</h1>");
        fs::remove_dir_all(temp.path().join("docs_source/api")).unwrap();

        let result = mirror.run().unwrap();

        assert_eq!(result.removed, 1);
        assert!(!out.join("api/module.rst").exists());
        assert!(out.join("api/module.html").exists());
        assert!(out.join("index.html").exists());
        assert!(out.join("index.rst").exists());
    }

    #[test]
    fn prunes_directories_left_empty() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        let out = temp.path().join("docs");

        mirror.run().unwrap();
        fs::remove_dir_all(temp.path().join("docs_source/api")).unwrap();
        mirror.run().unwrap();

        assert!(!out.join("api").exists());
        assert!(out.exists());
    }

    #[test]
    fn recopies_changed_sources() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());

        mirror.run().unwrap();
        fs::write(temp.path().join("docs_source/index.rst"), "Home, revised").unwrap();
        let result = mirror.run().unwrap();

        assert_eq!(result.copied, 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("docs/index.rst")).unwrap(),
            "Home, revised"
        );
    }

    #[test]
    fn recopies_same_length_edit_with_older_mtime() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        let source = temp.path().join("docs_source/index.rst");
        fs::write(&source, "AAAA").unwrap();

        mirror.run().unwrap();
        fs::write(&source, "BBBB").unwrap();
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();
        let result = mirror.run().unwrap();

        assert_eq!(result.copied, 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("docs/index.rst")).unwrap(),
            "BBBB"
        );
        assert_eq!(mirror.run().unwrap().copied, 0);
    }

    #[test]
    fn restores_mirrored_files_edited_in_output() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        let copy = temp.path().join("docs/index.rst");

        mirror.run().unwrap();
        fs::write(&copy, "Edit").unwrap();
        let result = mirror.run().unwrap();

        assert_eq!(result.copied, 1);
        assert_eq!(fs::read_to_string(&copy).unwrap(), "Home");
    }

    #[test]
    fn keeps_output_ignore_file() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        let out = temp.path().join("docs");
        write_file(&temp.path().join("docs_source/.gitignore"), "_build\n");
        write_file(&temp.path().join("docs_source/api/.gitignore"), "*.tmp\n");
        docpub_publish::ensure_ignore_entries(&out, &[".doctrees", MANIFEST_FILE]).unwrap();
        let marker = fs::read_to_string(out.join(IGNORE_FILE)).unwrap();

        mirror.run().unwrap();
        let second = mirror.run().unwrap();

        assert_eq!(fs::read_to_string(out.join(IGNORE_FILE)).unwrap(), marker);
        assert!(marker.contains(".doctrees"));
        assert_eq!(
            fs::read_to_string(out.join("api/.gitignore")).unwrap(),
            "*.tmp\n"
        );
        assert_eq!(second.copied, 0);
    }

    #[test]
    fn skips_git_directories() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        write_file(&temp.path().join("docs_source/.git/HEAD"), "ref: refs/heads/main");

        mirror.run().unwrap();

        assert!(!temp.path().join("docs/.git").exists());
    }

    #[test]
    fn ignores_manifest_entries_outside_output() {
        let temp = tempdir().unwrap();
        let mirror = setup(temp.path());
        let out = temp.path().join("docs");
        fs::create_dir_all(&out).unwrap();
        fs::write(
            out.join(MANIFEST_FILE),
            r#"{ "files": ["../README.md"] }"#,
        )
        .unwrap();

        let result = mirror.run().unwrap();

        assert_eq!(result.removed, 0);
        assert!(temp.path().join("README.md").exists());
    }

    #[test]
    fn missing_source_is_an_error() {
        let temp = tempdir().unwrap();
        let mirror = Mirror::new(temp.path().join("docs")).tree(temp.path().join("missing"), "");

        assert!(matches!(mirror.run(), Err(MirrorError::SourceNotFound(_))));
    }
}
