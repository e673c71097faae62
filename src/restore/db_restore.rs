// sqlbackup/src/restore/db_restore.rs
use regex::Regex;
use std::collections::HashSet;

use crate::errors::Result;
use crate::restore::report::{RestoreReport, StatementFailure};
use crate::utils::quote_identifier;
use crate::utils::setting::SqlConnection;

/// Matches the quoted name of every `CREATE TABLE` that starts a line. The
/// name must be backticked on that same line; unquoted names are not found.
const CREATE_TABLE_PATTERN: &str = r"(?i)\nCREATE TABLE([^`\n]*?)`([^`\n]*?)`";

const DISABLE_FOREIGN_KEY_CHECKS: &str = "SET foreign_key_checks = 0";

/// Names of the tables the dump is going to create, first occurrence first.
pub fn discover_drop_targets(sql: &str) -> Result<Vec<String>> {
    let pattern = Regex::new(CREATE_TABLE_PATTERN)?;
    let haystack = format!("\n{}", sql);

    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for caps in pattern.captures_iter(&haystack) {
        let Some(name) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };
        if !name.is_empty() && seen.insert(name) {
            targets.push(name.to_string());
        }
    }
    Ok(targets)
}

pub async fn disable_integrity_checks<C>(conn: &mut C) -> Result<()>
where
    C: SqlConnection + ?Sized,
{
    conn.execute(DISABLE_FOREIGN_KEY_CHECKS).await?;
    Ok(())
}

/// Drops each table if it exists. Failures are recorded, never fatal.
pub async fn drop_tables<C>(conn: &mut C, tables: &[String], report: &mut RestoreReport)
where
    C: SqlConnection + ?Sized,
{
    for (index, table) in tables.iter().enumerate() {
        let statement = format!("DROP TABLE IF EXISTS {}", quote_identifier(table));
        match conn.execute(&statement).await {
            Ok(_) => report.dropped_tables.push(table.clone()),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "failed to drop table before restore");
                report.drop_failures.push(StatementFailure {
                    index,
                    statement,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Executes statements one by one; a failed statement is recorded and the
/// loop moves on.
pub async fn execute_statements<C, I>(conn: &mut C, statements: I, report: &mut RestoreReport)
where
    C: SqlConnection + ?Sized,
    I: IntoIterator<Item = String>,
{
    for statement in statements {
        let index = report.executed;
        report.executed += 1;

        match conn.execute(&statement).await {
            Ok(rows) => tracing::debug!(index, rows, "statement executed"),
            Err(e) => {
                tracing::warn!(index, error = %e, "Error performing query: {}", statement);
                report.failures.push(StatementFailure {
                    index,
                    statement,
                    message: e.to_string(),
                });
            }
        }
    }
}
