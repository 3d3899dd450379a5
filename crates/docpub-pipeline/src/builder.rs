//! Invocation of the external documentation builder.

use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Argument that expands to the include paths, each preceded by the include flag.
const INCLUDES_PLACEHOLDER: &str = "{includes}";

/// Configuration for the external documentation builder.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// Program to run
    pub program: String,

    /// Output format passed as `{format}`
    pub format: String,

    /// Argument template
    pub args: Vec<String>,

    /// Flag repeated before each include path; `None` passes bare paths
    pub include_flag: Option<String>,

    /// Name of the builder's cache directory inside the output
    pub cache_dir: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            program: "sphinx-multibuild".to_string(),
            format: "html".to_string(),
            args: [
                "-c", "{source}", "{includes}", "-s", "{staging}", "-o", "{output}", "-a", "-b",
                "{format}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            include_flag: Some("-i".to_string()),
            cache_dir: ".doctrees".to_string(),
        }
    }
}

/// Paths handed to the builder.
#[derive(Debug, Clone)]
pub struct BuildPaths {
    pub source: PathBuf,
    pub includes: Vec<PathBuf>,
    pub staging: PathBuf,
    pub output: PathBuf,
}

/// Errors that can occur when running the builder.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("Failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with {status}")]
    Status { program: String, status: String },
}

/// Runs the configured documentation builder.
pub struct DocBuilder {
    config: BuilderConfig,
}

impl DocBuilder {
    /// Create a new builder runner.
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// The builder configuration.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Expand the argument template for `paths`.
    pub fn arguments(&self, paths: &BuildPaths) -> Vec<String> {
        let mut args = Vec::with_capacity(self.config.args.len());

        for arg in &self.config.args {
            if arg == INCLUDES_PLACEHOLDER {
                for include in &paths.includes {
                    if let Some(flag) = &self.config.include_flag {
                        args.push(flag.clone());
                    }
                    args.push(include.display().to_string());
                }
                continue;
            }

            let expanded = arg
                .replace("{source}", &paths.source.display().to_string())
                .replace("{staging}", &paths.staging.display().to_string())
                .replace("{output}", &paths.output.display().to_string())
                .replace("{format}", &self.config.format);
            args.push(expanded);
        }

        args
    }

    /// The full command line, for logging.
    pub fn command_line(&self, paths: &BuildPaths) -> String {
        std::iter::once(self.config.program.clone())
            .chain(self.arguments(paths))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the builder in `working_dir` and wait for it to exit.
    pub async fn run(&self, paths: &BuildPaths, working_dir: &Path) -> Result<(), BuilderError> {
        tracing::debug!("Running {}", self.command_line(paths));

        let status = Command::new(&self.config.program)
            .args(self.arguments(paths))
            .current_dir(working_dir)
            .status()
            .await
            .map_err(|e| BuilderError::Spawn {
                program: self.config.program.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(BuilderError::Status {
                program: self.config.program.clone(),
                status: status.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn paths() -> BuildPaths {
        BuildPaths {
            source: PathBuf::from("docs_source"),
            includes: vec![PathBuf::from("docs_source"), PathBuf::from("../tutorials")],
            staging: PathBuf::from("_build_temp"),
            output: PathBuf::from("docs"),
        }
    }

    #[test]
    fn expands_default_template() {
        let builder = DocBuilder::new(BuilderConfig::default());

        assert_eq!(
            builder.arguments(&paths()),
            vec![
                "-c",
                "docs_source",
                "-i",
                "docs_source",
                "-i",
                "../tutorials",
                "-s",
                "_build_temp",
                "-o",
                "docs",
                "-a",
                "-b",
                "html"
            ]
        );
        assert_eq!(
            builder.command_line(&paths()),
            "sphinx-multibuild -c docs_source -i docs_source -i ../tutorials \
             -s _build_temp -o docs -a -b html"
        );
    }

    #[test]
    fn expands_includes_and_embedded_placeholders() {
        let builder = DocBuilder::new(BuilderConfig {
            program: "docgen".to_string(),
            format: "dirhtml".to_string(),
            args: ["--out={output}", "{includes}", "--fmt", "{format}"]
                .into_iter()
                .map(String::from)
                .collect(),
            include_flag: None,
            ..Default::default()
        });

        assert_eq!(
            builder.arguments(&paths()),
            vec!["--out=docs", "docs_source", "../tutorials", "--fmt", "dirhtml"]
        );
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let temp = tempdir().unwrap();
        let builder = DocBuilder::new(BuilderConfig {
            program: "docpub-test-no-such-builder".to_string(),
            ..Default::default()
        });

        let result = builder.run(&paths(), temp.path()).await;

        assert!(matches!(result, Err(BuilderError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let temp = tempdir().unwrap();
        let builder = DocBuilder::new(BuilderConfig {
            program: "false".to_string(),
            args: vec![],
            ..Default::default()
        });

        let result = builder.run(&paths(), temp.path()).await;

        assert!(matches!(result, Err(BuilderError::Status { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_include_paths_on_the_command_line() {
        let temp = tempdir().unwrap();
        let builder = DocBuilder::new(BuilderConfig {
            program: "sh".to_string(),
            args: ["-c", "printf '%s ' \"$@\" > args.txt", "sh", "{includes}"]
                .into_iter()
                .map(String::from)
                .collect(),
            include_flag: Some("--include".to_string()),
            ..Default::default()
        });

        builder.run(&paths(), temp.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join("args.txt")).unwrap(),
            "--include docs_source --include ../tutorials "
        );
    }
}
