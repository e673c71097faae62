// sqlbackup/src/restore/logic.rs
use std::fs;
use std::path::PathBuf;

use crate::config::{ConfigInput, Configuration};
use crate::errors::{BackupError, Result};
use crate::restore::db_restore::{
    discover_drop_targets, disable_integrity_checks, drop_tables, execute_statements,
};
use crate::restore::report::RestoreReport;
use crate::restore::splitter::{BYTE_ORDER_MARK, SplitMode, split_statements};
use crate::utils::catalog::{CONNECTION_CHARSET, list_tables};
use crate::utils::setting::{Connector, MySqlConnector, SqlConnection};

/// Where the dump to restore comes from. The caller states it explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlSource {
    Text(String),
    Path(PathBuf),
}

impl SqlSource {
    pub fn from_text(sql: impl Into<String>) -> Self {
        SqlSource::Text(sql.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        SqlSource::Path(path.into())
    }

    fn into_sql(self) -> Result<String> {
        let sql = match self {
            SqlSource::Text(sql) => sql,
            SqlSource::Path(path) => fs::read_to_string(&path)?,
        };
        match sql.strip_prefix(BYTE_ORDER_MARK) {
            Some(rest) => Ok(rest.to_string()),
            None => Ok(sql),
        }
    }
}

/// Replays a dump against a live database, one statement at a time.
pub struct RestoreOrchestrator<K = MySqlConnector> {
    config: Configuration,
    connector: K,
    split_mode: SplitMode,
}

impl RestoreOrchestrator {
    pub fn new(config: Configuration) -> Self {
        Self::with_connector(config, MySqlConnector)
    }
}

impl<K: Connector> RestoreOrchestrator<K> {
    pub fn with_connector(config: Configuration, connector: K) -> Self {
        RestoreOrchestrator {
            config,
            connector,
            split_mode: SplitMode::default(),
        }
    }

    pub fn with_split_mode(mut self, split_mode: SplitMode) -> Self {
        self.split_mode = split_mode;
        self
    }

    /// Restores `source`, optionally under a configuration resolved for this
    /// call only.
    ///
    /// Tables the dump creates are dropped first with foreign key checks off.
    /// Statement failures end up in the report; only loading, connecting and
    /// session setup errors abort the call.
    pub async fn import(
        &self,
        source: SqlSource,
        overrides: Option<&ConfigInput>,
    ) -> Result<RestoreReport> {
        let config = match overrides {
            Some(input) => Configuration::resolve(input)?,
            None => self.config.clone(),
        };

        let sql = source.into_sql()?;
        config.validate()?;
        let mut conn = self.connector.connect(&config).await?;

        match list_tables(&mut conn, &config).await {
            Ok(tables) => tracing::info!(
                database = %config.db_name,
                existing = tables.len(),
                "restoring over existing tables"
            ),
            Err(BackupError::EmptyCatalog { database }) => {
                tracing::info!(database = %database, "restoring into an empty database")
            }
            Err(e) => return Err(e),
        }

        let mut report = RestoreReport::default();

        disable_integrity_checks(&mut conn).await?;
        let targets = discover_drop_targets(&sql)?;
        drop_tables(&mut conn, &targets, &mut report).await;

        disable_integrity_checks(&mut conn).await?;
        conn.set_charset(CONNECTION_CHARSET).await?;

        let split = split_statements(&sql, self.split_mode);
        tracing::info!(
            statements = split.statements.len(),
            dropped = report.dropped_tables.len(),
            "executing dump statements"
        );
        execute_statements(&mut conn, split.statements, &mut report).await;

        if let Some(fragment) = split.trailing {
            tracing::warn!(fragment = %fragment, "dump ends with an unterminated statement; skipped");
            report.trailing_fragment = Some(fragment);
        }

        report.finish();
        tracing::info!(
            executed = report.executed,
            failed = report.failures.len(),
            "{}",
            report.message
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::db_dump::MySqlContentDumper;
    use crate::backup::logic::DumpOrchestrator;
    use crate::utils::setting::SqlValue;
    use crate::utils::testing::{MemoryEngine, test_config};
    use serde_json::json;

    fn restorer(engine: &MemoryEngine) -> RestoreOrchestrator<MemoryEngine> {
        RestoreOrchestrator::with_connector(test_config(), engine.clone())
    }

    fn sorted(mut tables: Vec<String>) -> Vec<String> {
        tables.sort();
        tables
    }

    #[tokio::test]
    async fn test_import_executes_only_statements() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["existing"]);

        let report = restorer(&engine)
            .import(SqlSource::from_text("-- comment\nSELECT 1;\nSELECT 2;\n"), None)
            .await?;

        assert_eq!(report.executed, 2);
        assert!(report.is_success());
        let executed = engine.executed();
        assert_eq!(&executed[executed.len() - 2..], ["SELECT 1;", "SELECT 2;"]);
        assert!(!executed.iter().any(|s| s.contains("comment")));
        assert_eq!(engine.tables(), vec!["existing".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_of_empty_text_succeeds_with_nothing_executed() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["existing"]);

        let report = restorer(&engine).import(SqlSource::from_text(""), None).await?;

        assert_eq!(report.executed, 0);
        assert!(report.failures.is_empty());
        assert_eq!(report.message, crate::restore::report::IMPORT_SUCCEEDED);
        Ok(())
    }

    #[tokio::test]
    async fn test_session_setup_precedes_statements() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["users"]);

        restorer(&engine)
            .import(SqlSource::from_text("CREATE TABLE `users` (id int);\n"), None)
            .await?;

        assert_eq!(
            engine.executed(),
            vec![
                "USE `shop`",
                "SET NAMES 'utf8mb4'",
                "SET foreign_key_checks = 0",
                "DROP TABLE IF EXISTS `users`",
                "SET foreign_key_checks = 0",
                "SET NAMES 'utf8mb4'",
                "CREATE TABLE `users` (id int);",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_one_malformed_statement_among_valid_ones() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&[]).fail_on("BROKEN");
        let sql = "CREATE TABLE `a` (id int);\nTHIS IS BROKEN;\nCREATE TABLE `b` (id int);\n";

        let report = restorer(&engine).import(SqlSource::from_text(sql), None).await?;

        assert_eq!(report.executed, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].statement, "THIS IS BROKEN;");
        assert!(report.summary().contains("THIS IS BROKEN;"));
        assert_eq!(sorted(engine.tables()), vec!["a".to_string(), "b".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_restoring_twice_is_idempotent() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["unrelated"]);
        let sql = "CREATE TABLE `users` (id int);\nINSERT INTO `users` VALUES (1);\nCREATE TABLE `orders` (id int);\n";

        let first = restorer(&engine).import(SqlSource::from_text(sql), None).await?;
        let after_first = sorted(engine.tables());
        let second = restorer(&engine).import(SqlSource::from_text(sql), None).await?;

        assert!(first.is_success());
        assert!(second.is_success());
        assert_eq!(sorted(engine.tables()), after_first);
        assert_eq!(after_first, vec!["orders", "unrelated", "users"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_export_then_restore_round_trip() -> anyhow::Result<()> {
        let source = MemoryEngine::with_tables(&["users", "orders", "items"]).with_rows(
            "users",
            vec![
                vec![SqlValue::Number("1".into()), SqlValue::Text("a;\nb".into())],
                vec![SqlValue::Number("2".into()), SqlValue::Null],
            ],
        );
        let config = test_config();
        let exporter = DumpOrchestrator::with_parts(
            config.clone(),
            source.clone(),
            MySqlContentDumper::init(&config),
        );
        let dir = tempfile::tempdir()?;
        let path = exporter.store(dir.path(), Some("round_trip")).await?;

        let target = MemoryEngine::with_tables(&[]);
        let report = restorer(&target).import(SqlSource::from_path(&path), None).await?;

        assert!(report.is_success(), "{}", report.summary());
        assert_eq!(report.trailing_fragment, None);
        assert_eq!(sorted(target.tables()), vec!["items", "orders", "users"]);
        assert!(target
            .executed()
            .iter()
            .any(|s| s == "INSERT INTO `users` VALUES (1,'a;\\nb'),(2,NULL);"));
        Ok(())
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_connection_error() {
        let engine = MemoryEngine::with_tables(&["users"]).refuse_connections();

        let err = restorer(&engine)
            .import(SqlSource::from_text("SELECT 1;"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::Connection(_)));
        assert!(engine.executed().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let engine = MemoryEngine::with_tables(&["users"]);

        let err = restorer(&engine)
            .import(SqlSource::from_path("/definitely/not/here.sql"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::Io(_)));
        assert_eq!(engine.connections(), 0);
    }

    #[tokio::test]
    async fn test_override_config_applies_to_this_call_only() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["users"]);
        let orchestrator = restorer(&engine);
        let overrides = ConfigInput::from_value(&json!(["warehouse", "admin", "pw"]));

        orchestrator
            .import(SqlSource::from_text("SELECT 1;"), Some(&overrides))
            .await?;
        orchestrator.import(SqlSource::from_text("SELECT 1;"), None).await?;

        let uses: Vec<String> = engine
            .executed()
            .into_iter()
            .filter(|s| s.starts_with("USE "))
            .collect();
        assert_eq!(uses, vec!["USE `warehouse`", "USE `shop`"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_quote_aware_mode_keeps_multi_line_literals() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["notes"]);
        let sql = "INSERT INTO `notes` VALUES ('first;\nsecond');\n";

        let naive = restorer(&engine).import(SqlSource::from_text(sql), None).await?;
        let aware = restorer(&engine)
            .with_split_mode(SplitMode::QuoteAware)
            .import(SqlSource::from_text(sql), None)
            .await?;

        assert_eq!(naive.executed, 2);
        assert_eq!(aware.executed, 1);
        assert!(aware.is_success());
        Ok(())
    }

    #[tokio::test]
    async fn test_dump_file_with_byte_order_mark() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&[]);
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bom.sql");
        fs::write(
            &path,
            "\u{feff}CREATE TABLE `users` (id int);\n-- comment\nINSERT INTO `users` VALUES (1);\n",
        )?;

        let report = restorer(&engine).import(SqlSource::from_path(&path), None).await?;

        assert!(report.is_success(), "{}", report.summary());
        assert_eq!(report.executed, 2);
        assert_eq!(report.dropped_tables, vec!["users".to_string()]);
        assert_eq!(engine.tables(), vec!["users".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_reported_not_executed() -> anyhow::Result<()> {
        let engine = MemoryEngine::with_tables(&["users"]);

        let report = restorer(&engine)
            .import(SqlSource::from_text("SELECT 1;\nSELECT 2"), None)
            .await?;

        assert_eq!(report.executed, 1);
        assert_eq!(report.trailing_fragment.as_deref(), Some("SELECT 2"));
        assert!(!engine.executed().iter().any(|s| s == "SELECT 2"));
        Ok(())
    }
}
