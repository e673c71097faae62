// sqlbackup/src/restore/report.rs
use std::fmt;

use crate::errors::BackupError;

pub const IMPORT_SUCCEEDED: &str = "Importing finished successfully.";

/// One statement the engine rejected during a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    /// Zero-based position among the executed statements.
    pub index: usize,
    pub statement: String,
    pub message: String,
}

impl fmt::Display for StatementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} -> {}", self.index + 1, self.statement, self.message)
    }
}

impl From<StatementFailure> for BackupError {
    fn from(failure: StatementFailure) -> Self {
        BackupError::StatementExecution {
            statement: failure.statement,
            message: failure.message,
        }
    }
}

/// Outcome of a best-effort restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub dropped_tables: Vec<String>,
    pub drop_failures: Vec<StatementFailure>,
    /// Statements sent to the engine, failed ones included.
    pub executed: usize,
    pub failures: Vec<StatementFailure>,
    /// Text after the last terminator; never executed.
    pub trailing_fragment: Option<String>,
    pub message: String,
}

impl RestoreReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.executed - self.failures.len()
    }

    /// Failures as errors, in execution order.
    pub fn errors(&self) -> Vec<BackupError> {
        self.failures.iter().cloned().map(BackupError::from).collect()
    }

    pub(crate) fn finish(&mut self) {
        self.message = if self.is_success() {
            IMPORT_SUCCEEDED.to_string()
        } else {
            format!(
                "Importing finished with {} failed statement(s) out of {}.",
                self.failures.len(),
                self.executed
            )
        };
    }

    /// Human-readable summary naming every failed statement.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} {} statement(s) executed, {} failed, {} table(s) dropped beforehand.",
            self.message,
            self.executed,
            self.failures.len(),
            self.dropped_tables.len()
        );
        for error in self.errors() {
            summary.push_str("\n  ");
            summary.push_str(&error.to_string());
        }
        if let Some(fragment) = &self.trailing_fragment {
            summary.push_str("\n  Unterminated text was not executed: ");
            summary.push_str(fragment);
        }
        summary
    }
}
