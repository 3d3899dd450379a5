//! Run mode resolution from command-line mode flags.

use std::fmt;

/// A single mode flag as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlag {
    /// `-t`
    CleanTemp,
    /// `-d`
    CleanOutput,
    /// `-D`
    CleanAll,
    /// `-o`
    Publish,
}

impl ModeFlag {
    /// The flag as typed by the user.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeFlag::CleanTemp => "-t",
            ModeFlag::CleanOutput => "-d",
            ModeFlag::CleanAll => "-D",
            ModeFlag::Publish => "-o",
        }
    }
}

impl fmt::Display for ModeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run does besides building and mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Build and mirror only
    #[default]
    Plain,
    /// Remove the staging directory first
    CleanTemp,
    /// Remove the output directory first
    CleanOutput,
    /// Remove staging and output directories first
    CleanAll,
    /// Publish the output directory after mirroring
    Publish,
}

/// Directory removed by a cleanup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanTarget {
    Staging,
    Output,
}

impl Mode {
    /// Resolve the mode from every mode flag of one invocation.
    ///
    /// A mode is only selected when exactly one flag was given. Combinations
    /// such as `-d -o` select [`Mode::Plain`]: no cleanup and no publish.
    pub fn resolve(flags: &[ModeFlag]) -> Self {
        match flags {
            [ModeFlag::CleanTemp] => Mode::CleanTemp,
            [ModeFlag::CleanOutput] => Mode::CleanOutput,
            [ModeFlag::CleanAll] => Mode::CleanAll,
            [ModeFlag::Publish] => Mode::Publish,
            _ => Mode::Plain,
        }
    }

    /// Directories removed before the build, in removal order.
    pub fn clean_targets(&self) -> &'static [CleanTarget] {
        match self {
            Mode::CleanTemp => &[CleanTarget::Staging],
            Mode::CleanOutput => &[CleanTarget::Output],
            Mode::CleanAll => &[CleanTarget::Staging, CleanTarget::Output],
            Mode::Plain | Mode::Publish => &[],
        }
    }

    /// Whether the run ends with a publish.
    pub fn publishes(&self) -> bool {
        matches!(self, Mode::Publish)
    }
}
