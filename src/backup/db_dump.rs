// sqlbackup/src/backup/db_dump.rs
use async_trait::async_trait;
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::Configuration;
use crate::errors::{BackupError, Result};
use crate::utils::quote_identifier;
use crate::utils::setting::{SqlConnection, SqlValue};

/// First line of every dump the content dumper writes. Post-processing
/// replaces it with our own header, so the text must not change.
pub const DUMPER_BANNER: &str = "-- mysqldump-php https://github.com/ifsnop/mysqldump-php";

/// Prefix of the server-version comment the dumper writes; post-processing
/// strips the whole line.
pub const SERVER_VERSION_PREFIX: &str = "-- Server version";

/// Writes schema and row data for a set of tables to a file.
#[async_trait]
pub trait ContentDumper: Send + Sync {
    async fn start(
        &self,
        conn: &mut dyn SqlConnection,
        tables: &[String],
        destination: &Path,
    ) -> Result<()>;
}

/// Dumper speaking the mysqldump-php output format over a live connection.
#[derive(Debug, Clone)]
pub struct MySqlContentDumper {
    host: String,
    db_name: String,
    insert_chunk: usize,
}

impl MySqlContentDumper {
    pub fn init(config: &Configuration) -> Self {
        MySqlContentDumper {
            host: config.host.clone(),
            db_name: config.db_name.clone(),
            insert_chunk: config.insert_chunk.max(1),
        }
    }

    async fn dump_table(
        &self,
        conn: &mut dyn SqlConnection,
        out: &mut BufWriter<File>,
        table: &str,
    ) -> Result<()> {
        let quoted = quote_identifier(table);
        let definition = conn
            .query(&format!("SHOW CREATE TABLE {}", quoted))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackupError::Sqlx(sqlx::Error::RowNotFound))?;

        // Views come back with four columns instead of two.
        let is_view = definition.len() > 2;
        let create_sql = definition
            .into_iter()
            .nth(1)
            .and_then(SqlValue::into_text)
            .ok_or_else(|| BackupError::Sqlx(sqlx::Error::RowNotFound))?;

        if is_view {
            writeln!(out, "--\n-- View structure for view {}\n--\n", quoted)?;
            writeln!(out, "DROP VIEW IF EXISTS {};", quoted)?;
            writeln!(out, "{};\n", create_sql)?;
            return Ok(());
        }

        writeln!(out, "--\n-- Table structure for table {}\n--\n", quoted)?;
        writeln!(out, "DROP TABLE IF EXISTS {};", quoted)?;
        writeln!(out, "/*!40101 SET @saved_cs_client     = @@character_set_client */;")?;
        writeln!(out, "/*!40101 SET character_set_client = utf8mb4 */;")?;
        writeln!(out, "{};", create_sql)?;
        writeln!(out, "/*!40101 SET character_set_client = @saved_cs_client */;\n")?;

        let rows = conn.query(&format!("SELECT * FROM {}", quoted)).await?;
        tracing::debug!(table = %table, rows = rows.len(), "dumping table data");

        writeln!(out, "--\n-- Dumping data for table {}\n--\n", quoted)?;
        if rows.is_empty() {
            return Ok(());
        }

        writeln!(out, "/*!40000 ALTER TABLE {} DISABLE KEYS */;", quoted)?;
        writeln!(out, "SET autocommit=0;")?;
        for chunk in rows.chunks(self.insert_chunk) {
            let values = chunk
                .iter()
                .map(|row| {
                    let literals: Vec<String> = row.iter().map(SqlValue::to_sql_literal).collect();
                    format!("({})", literals.join(","))
                })
                .collect::<Vec<_>>()
                .join(",");
            writeln!(out, "INSERT INTO {} VALUES {};", quoted, values)?;
        }
        writeln!(out, "/*!40000 ALTER TABLE {} ENABLE KEYS */;", quoted)?;
        writeln!(out, "COMMIT;\n")?;
        Ok(())
    }
}

#[async_trait]
impl ContentDumper for MySqlContentDumper {
    async fn start(
        &self,
        conn: &mut dyn SqlConnection,
        tables: &[String],
        destination: &Path,
    ) -> Result<()> {
        let server_version = conn.server_version().await?;
        let file = File::create(destination)?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{}", DUMPER_BANNER)?;
        writeln!(out, "--")?;
        writeln!(out, "-- Host: {}\tDatabase: {}", self.host, self.db_name)?;
        writeln!(out, "-- ------------------------------------------------------")?;
        writeln!(out, "{} \t{}", SERVER_VERSION_PREFIX, server_version)?;
        writeln!(out)?;
        writeln!(out, "/*!40014 SET @OLD_UNIQUE_CHECKS=@@UNIQUE_CHECKS, UNIQUE_CHECKS=0 */;")?;
        writeln!(out, "/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;")?;
        writeln!(out, "/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE='NO_AUTO_VALUE_ON_ZERO' */;")?;
        writeln!(out)?;

        for table in tables {
            self.dump_table(conn, &mut out, table).await?;
        }

        writeln!(out, "/*!40101 SET SQL_MODE=@OLD_SQL_MODE */;")?;
        writeln!(out, "/*!40014 SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS */;")?;
        writeln!(out, "/*!40014 SET UNIQUE_CHECKS=@OLD_UNIQUE_CHECKS */;")?;
        writeln!(out)?;
        writeln!(out, "-- Dump completed on: {}", Local::now().format("%a, %d %b %Y %H:%M:%S %z"))?;
        out.flush()?;

        tracing::info!(
            tables = tables.len(),
            destination = %destination.display(),
            "content dump written"
        );
        Ok(())
    }
}
