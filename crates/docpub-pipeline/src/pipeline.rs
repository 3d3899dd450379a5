//! Step planning and execution.

use std::fmt;

use docpub_publish::{ensure_ignore_entries, PublishError, Publisher};

use crate::builder::{BuilderError, DocBuilder};
use crate::clean;
use crate::config::PipelineConfig;
use crate::mirror::{Mirror, MirrorError};
use crate::mode::{CleanTarget, Mode};

/// A single pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Ensure the output `.gitignore` lists the builder cache
    WriteIgnore,
    /// Remove a build directory
    Clean(CleanTarget),
    /// Run the documentation builder
    Build,
    /// Mirror sources and README into the output
    Mirror,
    /// Publish the output as a fresh git history
    Publish,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::WriteIgnore => "write-ignore",
            Step::Clean(CleanTarget::Staging) => "clean-staging",
            Step::Clean(CleanTarget::Output) => "clean-output",
            Step::Build => "build",
            Step::Mirror => "mirror",
            Step::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Ordered steps of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Plan the steps for `mode`.
    pub fn for_mode(mode: Mode) -> Self {
        let mut steps = vec![Step::WriteIgnore];
        steps.extend(mode.clean_targets().iter().copied().map(Step::Clean));
        steps.push(Step::Build);
        steps.push(Step::Mirror);
        if mode.publishes() {
            steps.push(Step::Publish);
        }

        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Errors that can occur in a pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to write ignore file: {0}")]
    Ignore(String),

    #[error("Failed to remove {path}: {message}")]
    Clean { path: String, message: String },

    #[error(transparent)]
    Build(#[from] BuilderError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Background task failed: {0}")]
    Join(String),
}

/// Outcome of one step.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step succeeded, with a short summary
    Done(String),
    /// The step failed
    Failed(PipelineError),
    /// The step did not run because an earlier step failed
    Skipped,
}

/// Report for one step.
#[derive(Debug)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Result of a pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// Whether the last executed step succeeded.
    pub fn succeeded(&self) -> bool {
        self.steps
            .iter()
            .rev()
            .find(|r| !matches!(r.outcome, StepOutcome::Skipped))
            .map_or(true, |r| matches!(r.outcome, StepOutcome::Done(_)))
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&Step, &PipelineError)> {
        self.steps.iter().filter_map(|r| match &r.outcome {
            StepOutcome::Failed(e) => Some((&r.step, e)),
            _ => None,
        })
    }

    /// Outcome of `step`, if it was planned.
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.outcome)
    }
}

/// Runs planned steps against a configuration.
pub struct Pipeline {
    config: PipelineConfig,
    builder: DocBuilder,
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(config: PipelineConfig) -> Self {
        let builder = DocBuilder::new(config.builder.clone());
        Self { config, builder }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Plan and run `mode`.
    pub async fn run(&self, mode: Mode) -> RunReport {
        self.run_plan(&Plan::for_mode(mode)).await
    }

    /// Run the steps of `plan` in order.
    ///
    /// A failed step is logged and the next step still runs, unless
    /// `fail_fast` is set, in which case the remaining steps are skipped.
    pub async fn run_plan(&self, plan: &Plan) -> RunReport {
        let mut report = RunReport::default();
        let mut halted = false;

        for &step in plan.steps() {
            if halted {
                report.steps.push(StepReport {
                    step,
                    outcome: StepOutcome::Skipped,
                });
                continue;
            }

            tracing::info!("[{}] {}", step, self.describe(step));

            let outcome = match self.execute(step).await {
                Ok(summary) => {
                    tracing::info!("[{}] {}", step, summary);
                    StepOutcome::Done(summary)
                }
                Err(e) => {
                    tracing::error!("[{}] {}", step, e);
                    halted = self.config.fail_fast;
                    StepOutcome::Failed(e)
                }
            };

            report.steps.push(StepReport { step, outcome });
        }

        report
    }

    /// Describe what `step` will do, for logging and dry runs.
    pub fn describe(&self, step: Step) -> String {
        match step {
            Step::WriteIgnore => format!(
                "ensure {} lists {}",
                self.config
                    .output_path()
                    .join(docpub_publish::IGNORE_FILE)
                    .display(),
                self.config.ignore_entries().join(", ")
            ),
            Step::Clean(target) => {
                format!("remove {}", self.clean_path(target).display())
            }
            Step::Build => self.builder.command_line(&self.config.build_paths()),
            Step::Mirror => format!(
                "mirror {} and {} into {}",
                self.config.source_path().display(),
                self.config.readme_path().display(),
                self.config.output_path().display()
            ),
            Step::Publish => format!(
                "publish {} to {} ({})",
                self.config.output_path().display(),
                if self.config.publish.remote_url.is_empty() {
                    "<no remote url>"
                } else {
                    self.config.publish.remote_url.as_str()
                },
                self.config.publish.branch
            ),
        }
    }

    async fn execute(&self, step: Step) -> Result<String, PipelineError> {
        match step {
            Step::WriteIgnore => {
                let written =
                    ensure_ignore_entries(&self.config.output_path(), &self.config.ignore_entries())
                        .map_err(|e| PipelineError::Ignore(e.to_string()))?;
                Ok(if written { "updated" } else { "unchanged" }.to_string())
            }
            Step::Clean(target) => {
                let path = self.clean_path(target);
                let removed = clean::remove_dir(&path, &self.config.root).map_err(|e| {
                    PipelineError::Clean {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(if removed { "removed" } else { "nothing to remove" }.to_string())
            }
            Step::Build => {
                self.builder
                    .run(&self.config.build_paths(), &self.config.root)
                    .await?;
                Ok("builder finished".to_string())
            }
            Step::Mirror => {
                let result = self.mirror().run()?;
                Ok(format!(
                    "{} copied, {} unchanged, {} removed",
                    result.copied, result.unchanged, result.removed
                ))
            }
            Step::Publish => {
                let mut publish = self.config.publish.clone();
                publish.ignore_entries = self.config.ignore_entries();
                let publisher = Publisher::new(publish);
                let dir = self.config.output_path();

                let outcome = tokio::task::spawn_blocking(move || publisher.publish(&dir))
                    .await
                    .map_err(|e| PipelineError::Join(e.to_string()))??;

                Ok(format!(
                    "{} files pushed as {} to {}",
                    outcome.files, outcome.commit, outcome.remote_ref
                ))
            }
        }
    }

    fn clean_path(&self, target: CleanTarget) -> std::path::PathBuf {
        match target {
            CleanTarget::Staging => self.config.staging_path(),
            CleanTarget::Output => self.config.output_path(),
        }
    }

    fn mirror(&self) -> Mirror {
        let readme_name = self
            .config
            .readme
            .file_name()
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| self.config.readme.clone());

        Mirror::new(self.config.output_path())
            .tree(self.config.source_path(), self.config.mirror_dest.clone())
            .file(self.config.readme_path(), readme_name)
    }
}
