// sqlbackup/src/utils/setting.rs
//! Connection driver seam and its MySQL implementation.
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{Column, Connection, Executor, MySqlConnection, Row, TypeInfo, ValueRef};

use crate::config::Configuration;
use crate::errors::{BackupError, Result};
use crate::utils::{quote_identifier, quote_string};

/// A single cell read back from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    /// Numeric value in its textual form, written unquoted.
    Number(String),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn into_text(self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Number(s) | SqlValue::Text(s) => Some(s),
            SqlValue::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    /// SQL literal for an INSERT value list.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Number(n) => n.clone(),
            SqlValue::Text(s) => quote_string(s),
            SqlValue::Bytes(bytes) if bytes.is_empty() => "''".to_string(),
            SqlValue::Bytes(bytes) => format!("0x{}", hex::encode_upper(bytes)),
        }
    }
}

/// What the orchestrators need from a live connection.
///
/// Every call blocks the orchestration until the engine answers; nothing is
/// pipelined. Errors carry the engine's message in their `Display` form.
#[async_trait]
pub trait SqlConnection: Send {
    /// Runs a statement and returns its rows.
    async fn query(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue>>>;

    /// Runs a statement with no result set and returns the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    async fn server_version(&mut self) -> Result<String>;

    async fn select_database(&mut self, name: &str) -> Result<()> {
        self.execute(&format!("USE {}", quote_identifier(name)))
            .await
            .map(|_| ())
    }

    async fn set_charset(&mut self, charset: &str) -> Result<()> {
        self.execute(&format!("SET NAMES {}", quote_string(charset)))
            .await
            .map(|_| ())
    }
}

/// Opens one connection per orchestration call.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: SqlConnection + 'static;

    async fn connect(&self, config: &Configuration) -> Result<Self::Connection>;
}

/// Connects with sqlx to a MySQL or MariaDB server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlSession;

    async fn connect(&self, config: &Configuration) -> Result<MySqlSession> {
        MySqlSession::connect(config).await
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
}

impl MySqlSession {
    pub async fn connect(config: &Configuration) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.db_user)
            .password(&config.db_password)
            .database(&config.db_name)
            .charset("utf8mb4");

        let conn = MySqlConnection::connect_with(&options).await.map_err(|e| {
            BackupError::Connection(format!(
                "Failed to connect to {}:{} as {}: {}",
                config.host, config.port, config.db_user, e
            ))
        })?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.db_name,
            "connected to MySQL"
        );
        Ok(MySqlSession { conn })
    }
}

#[async_trait]
impl SqlConnection for MySqlSession {
    async fn query(&mut self, sql: &str) -> Result<Vec<Vec<SqlValue>>> {
        // A bare &str goes over the text protocol, so statements that cannot
        // be prepared still run.
        let rows = self.conn.fetch_all(sql).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let done = self.conn.execute(sql).await?;
        Ok(done.rows_affected())
    }

    async fn server_version(&mut self) -> Result<String> {
        let rows = self.query("SELECT VERSION()").await?;
        rows.into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .and_then(SqlValue::into_text)
            .ok_or_else(|| BackupError::Sqlx(sqlx::Error::RowNotFound))
    }
}

fn decode_row(row: &MySqlRow) -> Result<Vec<SqlValue>> {
    (0..row.len()).map(|index| decode_cell(row, index)).collect()
}

/// Serializes one column of a row, trying the common MySQL types in turn.
fn decode_cell(row: &MySqlRow, index: usize) -> Result<SqlValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let type_name = row.column(index).type_info().name().to_ascii_uppercase();
    if type_name.contains("BLOB") || type_name.contains("BINARY") || type_name == "BIT" {
        if let Ok(val) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(SqlValue::Bytes(val));
        }
    }

    if let Ok(val) = row.try_get::<String, _>(index) {
        return Ok(SqlValue::Text(val));
    }

    // Integers, signed then unsigned
    if let Ok(val) = row.try_get::<i64, _>(index) {
        return Ok(SqlValue::Number(val.to_string()));
    }
    if let Ok(val) = row.try_get::<u64, _>(index) {
        return Ok(SqlValue::Number(val.to_string()));
    }

    if let Ok(val) = row.try_get::<Decimal, _>(index) {
        return Ok(SqlValue::Number(val.to_string()));
    }
    if let Ok(val) = row.try_get::<f64, _>(index) {
        return Ok(SqlValue::Number(val.to_string()));
    }
    if let Ok(val) = row.try_get::<f32, _>(index) {
        return Ok(SqlValue::Number(val.to_string()));
    }
    if let Ok(val) = row.try_get::<bool, _>(index) {
        return Ok(SqlValue::Number(if val { "1" } else { "0" }.to_string()));
    }

    if let Ok(val) = row.try_get::<NaiveDateTime, _>(index) {
        return Ok(SqlValue::Text(val.format("%Y-%m-%d %H:%M:%S%.f").to_string()));
    }
    if let Ok(val) = row.try_get::<DateTime<Utc>, _>(index) {
        return Ok(SqlValue::Text(
            val.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        ));
    }
    if let Ok(val) = row.try_get::<NaiveDate, _>(index) {
        return Ok(SqlValue::Text(val.to_string()));
    }
    if let Ok(val) = row.try_get::<NaiveTime, _>(index) {
        return Ok(SqlValue::Text(val.to_string()));
    }

    if let Ok(val) = row.try_get::<serde_json::Value, _>(index) {
        return Ok(SqlValue::Text(val.to_string()));
    }

    // Text protocol cells are plain bytes, whatever the column type claims.
    // Zero dates, out-of-range TIME, YEAR and spatial values end up here.
    match row.try_get_unchecked::<Vec<u8>, _>(index) {
        Ok(raw) => Ok(undecoded_cell(raw)),
        Err(e) => Err(BackupError::Sqlx(sqlx::Error::Decode(
            format!(
                "Unsupported data type {} for column {}: {}",
                type_name,
                row.column(index).name(),
                e
            )
            .into(),
        ))),
    }
}

/// Keeps a cell no typed decoder accepted: as text when it is UTF-8, as a
/// binary literal otherwise.
fn undecoded_cell(raw: Vec<u8>) -> SqlValue {
    match String::from_utf8(raw) {
        Ok(text) => SqlValue::Text(text),
        Err(e) => SqlValue::Bytes(e.into_bytes()),
    }
}
