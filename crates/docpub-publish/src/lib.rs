//! Git publishing for built documentation.
//!
//! Replaces the history of an output directory with a single fresh commit and
//! force-pushes it to a remote branch. Also owns the `.gitignore` marker the
//! orchestrator writes before every build.

pub mod ignore;
pub mod publisher;

pub use ignore::{ensure_ignore_entries, IGNORE_FILE};
pub use publisher::{PublishConfig, PublishError, PublishOutcome, Publisher};
