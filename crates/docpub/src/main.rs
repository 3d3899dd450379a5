//! docpub CLI - documentation build-and-publish orchestrator.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use docpub_pipeline::{Mode, ModeFlag};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "docpub")]
#[command(about = "Build documentation and publish it to a git remote")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    mode: ModeFlags,

    /// Path to docpub.toml config file
    #[arg(short, long, default_value = "docpub.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the planned steps without running them
    #[arg(long)]
    dry_run: bool,

    /// Stop at the first failed step
    #[arg(long)]
    fail_fast: bool,
}

/// Mode flags. Only one may be given; combinations run a plain build.
#[derive(Args, Debug)]
struct ModeFlags {
    /// Remove the staging directory before building
    #[arg(short = 't')]
    clean_temp: bool,

    /// Remove the output directory before building
    #[arg(short = 'd')]
    clean_output: bool,

    /// Remove staging and output directories before building
    #[arg(short = 'D')]
    clean_all: bool,

    /// Publish the output directory as a fresh git history after building
    #[arg(short = 'o')]
    publish: bool,
}

impl ModeFlags {
    fn flags(&self) -> Vec<ModeFlag> {
        [
            (self.clean_temp, ModeFlag::CleanTemp),
            (self.clean_output, ModeFlag::CleanOutput),
            (self.clean_all, ModeFlag::CleanAll),
            (self.publish, ModeFlag::Publish),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default docpub.toml
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Execute command
    match cli.command {
        Some(Commands::Init { yes }) => {
            commands::init::run(&cli.config, yes).await?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let flags = cli.mode.flags();
            let mode = Mode::resolve(&flags);
            if flags.len() > 1 {
                let given: Vec<_> = flags.iter().map(ModeFlag::as_str).collect();
                tracing::warn!(
                    "Flags {} cannot be combined; running without cleanup or publish",
                    given.join(" ")
                );
            }

            let options = commands::build::BuildOptions {
                config: cli.config,
                mode,
                dry_run: cli.dry_run,
                fail_fast: cli.fail_fast,
            };

            if commands::build::run(options).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn mode_of(args: &[&str]) -> Mode {
        let cli = Cli::try_parse_from(args).unwrap();
        Mode::resolve(&cli.mode.flags())
    }

    #[test]
    fn verifies_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn single_flags_select_modes() {
        assert_eq!(mode_of(&["docpub"]), Mode::Plain);
        assert_eq!(mode_of(&["docpub", "-t"]), Mode::CleanTemp);
        assert_eq!(mode_of(&["docpub", "-d"]), Mode::CleanOutput);
        assert_eq!(mode_of(&["docpub", "-D"]), Mode::CleanAll);
        assert_eq!(mode_of(&["docpub", "-o"]), Mode::Publish);
    }

    #[test]
    fn combined_flags_run_plain() {
        assert_eq!(mode_of(&["docpub", "-d", "-o"]), Mode::Plain);
        assert_eq!(mode_of(&["docpub", "-tD"]), Mode::Plain);
    }

    #[test]
    fn ambient_options_do_not_change_mode() {
        assert_eq!(
            mode_of(&["docpub", "-v", "--config", "site.toml", "-o"]),
            Mode::Publish
        );
    }

    #[test]
    fn parses_init_subcommand() {
        let cli = Cli::try_parse_from(["docpub", "init", "--yes"]).unwrap();

        assert!(matches!(cli.command, Some(Commands::Init { yes: true })));
    }

    #[test]
    fn build_options_are_rejected_with_init() {
        assert!(Cli::try_parse_from(["docpub", "-o", "init"]).is_err());
        assert!(Cli::try_parse_from(["docpub", "--dry-run", "init"]).is_err());
        assert!(Cli::try_parse_from(["docpub", "init", "-o"]).is_err());

        let cli = Cli::try_parse_from(["docpub", "init", "--config", "site.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("site.toml"));
    }
}
