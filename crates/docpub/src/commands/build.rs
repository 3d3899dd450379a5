//! Build (and optionally publish) command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docpub_pipeline::{Mode, Pipeline, PipelineConfig, Plan};
use serde::Deserialize;

/// Configuration file structure (docpub.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    paths: PathsSettings,
    #[serde(default)]
    builder: BuilderSettings,
    #[serde(default)]
    mirror: MirrorSettings,
    #[serde(default)]
    publish: PublishSettings,
    #[serde(default)]
    run: RunSettings,
}

#[derive(Debug, Deserialize, Default)]
struct PathsSettings {
    source: Option<PathBuf>,
    includes: Option<Vec<PathBuf>>,
    staging: Option<PathBuf>,
    output: Option<PathBuf>,
    readme: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct BuilderSettings {
    program: Option<String>,
    format: Option<String>,
    args: Option<Vec<String>>,
    include_flag: Option<String>,
    cache_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MirrorSettings {
    dest: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct PublishSettings {
    remote: Option<String>,
    url: Option<String>,
    branch: Option<String>,
    message: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RunSettings {
    fail_fast: Option<bool>,
}

impl ConfigFile {
    /// Apply the file's settings over the pipeline defaults.
    fn into_pipeline_config(self, root: PathBuf) -> PipelineConfig {
        let mut config = PipelineConfig {
            root,
            ..Default::default()
        };

        let paths = self.paths;
        if let Some(source) = paths.source {
            config.source_dir = source;
        }
        if let Some(includes) = paths.includes {
            config.include_dirs = includes;
        }
        if let Some(staging) = paths.staging {
            config.staging_dir = staging;
        }
        if let Some(output) = paths.output {
            config.output_dir = output;
        }
        if let Some(readme) = paths.readme {
            config.readme = readme;
        }

        let builder = self.builder;
        if let Some(program) = builder.program {
            config.builder.program = program;
        }
        if let Some(format) = builder.format {
            config.builder.format = format;
        }
        if let Some(args) = builder.args {
            config.builder.args = args;
        }
        if let Some(flag) = builder.include_flag {
            config.builder.include_flag = (!flag.is_empty()).then_some(flag);
        }
        if let Some(cache_dir) = builder.cache_dir {
            config.builder.cache_dir = cache_dir;
        }

        if let Some(dest) = self.mirror.dest {
            config.mirror_dest = dest;
        }

        let publish = self.publish;
        if let Some(remote) = publish.remote {
            config.publish.remote_name = remote;
        }
        if let Some(url) = publish.url {
            config.publish.remote_url = url;
        }
        if let Some(branch) = publish.branch {
            config.publish.branch = branch;
        }
        if let Some(message) = publish.message {
            config.publish.message = message;
        }
        config.publish.author_name = publish.author_name;
        config.publish.author_email = publish.author_email;

        if let Some(fail_fast) = self.run.fail_fast {
            config.fail_fast = fail_fast;
        }

        config
    }
}

/// Parse docpub.toml content into a pipeline configuration rooted at `root`.
pub fn parse_config(content: &str, root: PathBuf) -> Result<PipelineConfig> {
    let file: ConfigFile = toml::from_str(content).context("Failed to parse config")?;
    Ok(file.into_pipeline_config(root))
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
fn load_config(path: &Path) -> Result<PipelineConfig> {
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !path.exists() {
        tracing::info!("No {} found, using defaults", path.display());
        return Ok(PipelineConfig {
            root,
            ..Default::default()
        });
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = parse_config(&content, root)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());

    Ok(config)
}

/// Options for the build command.
#[derive(Debug)]
pub struct BuildOptions {
    pub config: PathBuf,
    pub mode: Mode,
    pub dry_run: bool,
    pub fail_fast: bool,
}

/// Run the build command. Returns whether the last executed step succeeded.
pub async fn run(options: BuildOptions) -> Result<bool> {
    let mut config = load_config(&options.config)?;
    if options.fail_fast {
        config.fail_fast = true;
    }

    let pipeline = Pipeline::new(config);
    let plan = Plan::for_mode(options.mode);

    if options.dry_run {
        tracing::info!("Dry run ({:?}), planned steps:", options.mode);
        for &step in plan.steps() {
            tracing::info!("[{}] {}", step, pipeline.describe(step));
        }
        return Ok(true);
    }

    let report = pipeline.run_plan(&plan).await;

    let failures = report.failures().count();
    if failures > 0 {
        tracing::warn!("{} of {} steps failed", failures, report.steps.len());
    } else {
        tracing::info!(
            "Done: {}",
            pipeline.config().output_path().display()
        );
    }

    Ok(report.succeeded())
}
