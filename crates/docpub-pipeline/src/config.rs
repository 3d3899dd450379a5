//! Pipeline configuration.

use std::path::{Path, PathBuf};

use docpub_publish::PublishConfig;

use crate::builder::{BuildPaths, BuilderConfig};
use crate::mirror::MANIFEST_FILE;

/// Configuration for a pipeline run.
///
/// Relative paths are resolved against `root`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project root; working directory of the builder
    pub root: PathBuf,

    /// Documentation source tree
    pub source_dir: PathBuf,

    /// Include paths handed to the builder
    pub include_dirs: Vec<PathBuf>,

    /// Staging directory used by the builder
    pub staging_dir: PathBuf,

    /// Output (publish) directory
    pub output_dir: PathBuf,

    /// README mirrored into the output root
    pub readme: PathBuf,

    /// Sub-directory of the output receiving the source tree
    pub mirror_dest: PathBuf,

    /// External builder settings
    pub builder: BuilderConfig,

    /// Git publish settings
    pub publish: PublishConfig,

    /// Stop at the first failed step
    pub fail_fast: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            source_dir: PathBuf::from("docs_source"),
            include_dirs: vec![PathBuf::from("docs_source"), PathBuf::from("../tutorials")],
            staging_dir: PathBuf::from("_build_temp"),
            output_dir: PathBuf::from("docs"),
            readme: PathBuf::from("README.md"),
            mirror_dest: PathBuf::new(),
            builder: BuilderConfig::default(),
            publish: PublishConfig::default(),
            fail_fast: false,
        }
    }
}

impl PipelineConfig {
    /// Resolve `path` against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source_dir)
    }

    pub fn staging_path(&self) -> PathBuf {
        self.resolve(&self.staging_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn readme_path(&self) -> PathBuf {
        self.resolve(&self.readme)
    }

    /// Paths handed to the builder.
    pub fn build_paths(&self) -> BuildPaths {
        BuildPaths {
            source: self.source_path(),
            includes: self.include_dirs.iter().map(|p| self.resolve(p)).collect(),
            staging: self.staging_path(),
            output: self.output_path(),
        }
    }

    /// Entries the output `.gitignore` must list.
    pub fn ignore_entries(&self) -> Vec<String> {
        let mut entries = Vec::new();
        if !self.builder.cache_dir.is_empty() {
            entries.push(self.builder.cache_dir.clone());
        }
        entries.push(MANIFEST_FILE.to_string());
        entries
    }
}
