//! Documentation build-and-publish pipeline.
//!
//! Sequences the ignore marker, optional cleanup, the external documentation
//! builder, the source mirror and the optional git publish.

pub mod builder;
pub mod clean;
pub mod config;
pub mod mirror;
pub mod mode;
pub mod pipeline;

pub use builder::{BuildPaths, BuilderConfig, BuilderError, DocBuilder};
pub use config::PipelineConfig;
pub use mirror::{Mirror, MirrorError, MirrorResult, MANIFEST_FILE};
pub use mode::{CleanTarget, Mode, ModeFlag};
pub use pipeline::{Pipeline, PipelineError, Plan, RunReport, Step, StepOutcome, StepReport};
