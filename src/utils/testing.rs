//! In-memory stand-in for a MySQL server, used by unit tests.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;

use crate::config::Configuration;
use crate::errors::{BackupError, Result};
use crate::utils::setting::{Connector, SqlConnection, SqlValue};

pub(crate) fn test_config() -> Configuration {
    Configuration {
        db_name: "shop".to_string(),
        db_user: "root".to_string(),
        db_password: "secret".to_string(),
        ..Configuration::default()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    tables: Vec<String>,
    rows: HashMap<String, Vec<Vec<SqlValue>>>,
    executed: Vec<String>,
    failing: Vec<String>,
    connections: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
    refuse: bool,
}

impl MemoryEngine {
    pub(crate) fn with_tables(tables: &[&str]) -> Self {
        let engine = MemoryEngine::default();
        engine.lock().tables = tables.iter().map(|t| t.to_string()).collect();
        engine
    }

    /// Any executed statement containing `pattern` fails.
    pub(crate) fn fail_on(self, pattern: &str) -> Self {
        self.lock().failing.push(pattern.to_string());
        self
    }

    pub(crate) fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub(crate) fn with_rows(self, table: &str, rows: Vec<Vec<SqlValue>>) -> Self {
        self.lock().rows.insert(table.to_string(), rows);
        self
    }

    pub(crate) fn open(&self) -> MemoryConnection {
        self.lock().connections += 1;
        MemoryConnection {
            state: Arc::clone(&self.state),
        }
    }

    pub(crate) fn tables(&self) -> Vec<String> {
        self.lock().tables.clone()
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub(crate) fn connections(&self) -> usize {
        self.lock().connections
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Connector for MemoryEngine {
    type Connection = MemoryConnection;

    async fn connect(&self, config: &Configuration) -> Result<MemoryConnection> {
        if self.refuse {
            return Err(BackupError::Connection(format!(
                "Access denied for user '{}'@'{}'",
                config.db_user, config.host
            )));
        }
        Ok(self.open())
    }
}

pub(crate) struct MemoryConnection {
    state: Arc<Mutex<EngineState>>,
}

fn engine_error(message: String) -> BackupError {
    BackupError::Sqlx(sqlx::Error::Protocol(message))
}

fn backticked(sql: &str, prefix: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?is)^\s*{}\s+`([^`]+)`", prefix)).unwrap();
    pattern.captures(sql).map(|caps| caps[1].to_string())
}

#[async_trait]
impl SqlConnection for MemoryConnection {
    async fn query(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue>>> {
        let state = self.state.lock().unwrap();
        if sql.trim().eq_ignore_ascii_case("SHOW TABLES") {
            return Ok(state
                .tables
                .iter()
                .map(|t| vec![SqlValue::Text(t.clone())])
                .collect());
        }
        if let Some(table) = backticked(sql, "SHOW CREATE TABLE") {
            if !state.tables.contains(&table) {
                return Err(engine_error(format!("Table 'shop.{}' doesn't exist", table)));
            }
            let ddl = format!(
                "CREATE TABLE `{}` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
                table
            );
            return Ok(vec![vec![SqlValue::Text(table), SqlValue::Text(ddl)]]);
        }
        if let Some(table) = backticked(sql, "SELECT \\* FROM") {
            return Ok(state.rows.get(&table).cloned().unwrap_or_default());
        }
        Err(engine_error(format!("unsupported query: {}", sql)))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());

        if state.failing.iter().any(|pattern| sql.contains(pattern.as_str())) {
            return Err(engine_error(format!(
                "You have an error in your SQL syntax near '{}'",
                sql
            )));
        }

        if let Some(table) = backticked(sql, "DROP TABLE IF EXISTS") {
            state.tables.retain(|t| *t != table);
        } else if let Some(table) = backticked(sql, "CREATE TABLE(?:\\s+IF NOT EXISTS)?") {
            if state.tables.contains(&table) {
                return Err(engine_error(format!("Table '{}' already exists", table)));
            }
            state.tables.push(table);
        } else if let Some(table) = backticked(sql, "INSERT INTO") {
            if !state.tables.contains(&table) {
                return Err(engine_error(format!("Table 'shop.{}' doesn't exist", table)));
            }
            return Ok(1);
        }
        Ok(0)
    }

    async fn server_version(&mut self) -> Result<String> {
        Ok("8.0.36".to_string())
    }
}
