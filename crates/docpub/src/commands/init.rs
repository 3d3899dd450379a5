//! Write a default configuration file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing docpub...");

    if config_path.exists() && !yes {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    fs::write(config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    tracing::info!("Created {}", config_path.display());
    tracing::info!("Set [publish] url before running 'docpub -o'.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# docpub configuration
#
# Relative paths are resolved against the directory of this file.

[paths]
# Documentation source tree
source = "docs_source"

# Include paths handed to the builder as {includes}
includes = ["docs_source", "../tutorials"]

# Staging directory removed by -t and -D
staging = "_build_temp"

# Output directory removed by -d and -D, published by -o
output = "docs"

# Mirrored into the output root
readme = "README.md"

[builder]
program = "sphinx-multibuild"
format = "html"
# Placeholders: {source} {staging} {output} {format}, and {includes} as a whole argument
args = ["-c", "{source}", "{includes}", "-s", "{staging}", "-o", "{output}", "-a", "-b", "{format}"]
# Repeated before each include path; "" passes bare paths
include_flag = "-i"
# Builder cache directory kept out of the published history
cache_dir = ".doctrees"

[mirror]
# Sub-directory of the output receiving the source tree ("" = output root)
dest = ""

[publish]
remote = "origin"
# url = "git@github.com:owner/project-docs.git"
branch = "main"
message = "Publish documentation"

[run]
# Stop at the first failed step instead of continuing
fail_fast = false
"#;
