use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("No tables found on {database}")]
    EmptyCatalog { database: String },

    #[error("Directory \"{}\" was not created: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error performing query: {statement} {message}")]
    StatementExecution { statement: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),
}

impl BackupError {
    /// True for the errors that must end an export before any artifact exists.
    pub fn is_fatal_for_export(&self) -> bool {
        matches!(self, BackupError::EmptyCatalog { .. })
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
