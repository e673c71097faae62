//! Logical backup and restore of a single MySQL database through SQL text.

pub mod backup;
pub mod config;
pub mod errors;
pub mod restore;
pub mod utils;

pub use backup::logic::{Attachment, DumpArtifact, DumpOrchestrator};
pub use config::{AppConfig, ConfigInput, Configuration};
pub use errors::{BackupError, Result};
pub use restore::logic::{RestoreOrchestrator, SqlSource};
pub use restore::report::{RestoreReport, StatementFailure};
pub use restore::splitter::SplitMode;
