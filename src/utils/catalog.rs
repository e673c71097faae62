// sqlbackup/src/utils/catalog.rs
use crate::config::Configuration;
use crate::errors::{BackupError, Result};
use crate::utils::setting::{SqlConnection, SqlValue};

/// Character set applied to every orchestration connection.
pub const CONNECTION_CHARSET: &str = "utf8mb4";

/// Lists the tables of the configured database in catalog order.
///
/// Selects the database and sets the connection character set first. When
/// an allow-list is configured only the tables named in it survive.
///
/// # Errors
/// `Connection` if the database cannot be selected, `EmptyCatalog` if no
/// table is left.
pub async fn list_tables<C>(conn: &mut C, config: &Configuration) -> Result<Vec<String>>
where
    C: SqlConnection + ?Sized,
{
    conn.select_database(&config.db_name).await.map_err(|e| {
        BackupError::Connection(format!(
            "Cannot select database {}: {}",
            config.db_name, e
        ))
    })?;
    conn.set_charset(CONNECTION_CHARSET).await?;

    let catalog: Vec<String> = conn
        .query("SHOW TABLES")
        .await?
        .into_iter()
        .filter_map(|row| row.into_iter().next().and_then(SqlValue::into_text))
        .collect();

    let tables = apply_allow_list(catalog, config.tables.as_deref());
    if tables.is_empty() {
        return Err(BackupError::EmptyCatalog {
            database: config.db_name.clone(),
        });
    }

    tracing::debug!(database = %config.db_name, tables = ?tables, "resolved table catalog");
    Ok(tables)
}

/// Keeps catalog order; names absent from the catalog are ignored.
pub fn apply_allow_list(catalog: Vec<String>, allow_list: Option<&[String]>) -> Vec<String> {
    match allow_list {
        Some(allowed) => catalog
            .into_iter()
            .filter(|table| allowed.contains(table))
            .collect(),
        None => catalog,
    }
}

/// Fails when the configured database has nothing to export.
///
/// Exporting zero tables is a caller error, never retried.
pub async fn require_non_empty_catalog<C>(
    conn: &mut C,
    config: &Configuration,
) -> Result<Vec<String>>
where
    C: SqlConnection + ?Sized,
{
    list_tables(conn, config).await.inspect_err(|e| {
        if let BackupError::EmptyCatalog { database } = e {
            tracing::error!(database = %database, "No tables found on {}", database);
        }
    })
}
