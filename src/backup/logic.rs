// sqlbackup/src/backup/logic.rs
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::backup::db_dump::{ContentDumper, DUMPER_BANNER, MySqlContentDumper, SERVER_VERSION_PREFIX};
use crate::backup::header::format_header;
use crate::config::Configuration;
use crate::errors::{BackupError, Result};
use crate::utils::catalog::require_non_empty_catalog;
use crate::utils::setting::{Connector, MySqlConnector, SqlConnection};

pub const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";
pub const EXPORT_COMPLETED: &str = "Export completed successfully";

/// A finished, headered dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpArtifact {
    pub tables: Vec<String>,
    contents: String,
}

impl DumpArtifact {
    pub fn as_bytes(&self) -> &[u8] {
        self.contents.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// Metadata of an artifact streamed to a caller as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_length: usize,
}

impl Attachment {
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", ATTACHMENT_CONTENT_TYPE.to_string()),
            ("Content-Transfer-Encoding", "Binary".to_string()),
            ("Content-Length", self.content_length.to_string()),
            (
                "Content-Disposition",
                format!(
                    "attachment; filename=\"{}\"",
                    self.file_name.replace('\\', "\\\\").replace('"', "\\\"")
                ),
            ),
        ]
    }
}

/// `<db>_db_backup_(<HH-MM-SS>_<DD-MM-YYYY>).sql`, or the caller's name with a
/// single `.sql` suffix. Caller names must be plain file names.
pub fn backup_file_name(db_name: &str, name: Option<&str>, at: NaiveDateTime) -> Result<String> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            if name.contains(['/', '\\']) || name.contains("..") {
                return Err(BackupError::Config(format!(
                    "backup name {:?} must not contain path separators or \"..\"",
                    name
                )));
            }
            Ok(format!("{}.sql", name.strip_suffix(".sql").unwrap_or(name)))
        }
        None => Ok(format!(
            "{}_db_backup_({}_{}).sql",
            db_name,
            at.format("%H-%M-%S"),
            at.format("%d-%m-%Y")
        )),
    }
}

/// Swaps the dumper's banner for our header and drops its server-version line.
pub fn post_process(raw_dump: &str, header: &str) -> String {
    let replaced = raw_dump.replace(DUMPER_BANNER, header);
    let mut processed = String::with_capacity(replaced.len());
    for line in replaced.split_inclusive('\n') {
        if line.starts_with(SERVER_VERSION_PREFIX) {
            continue;
        }
        processed.push_str(line);
    }
    processed
}

/// Exports one database per call over a connection it opens itself.
pub struct DumpOrchestrator<K = MySqlConnector, D = MySqlContentDumper> {
    config: Configuration,
    connector: K,
    dumper: D,
}

impl DumpOrchestrator {
    pub fn new(config: Configuration) -> Self {
        let dumper = MySqlContentDumper::init(&config);
        DumpOrchestrator {
            config,
            connector: MySqlConnector,
            dumper,
        }
    }
}

impl<K: Connector, D: ContentDumper> DumpOrchestrator<K, D> {
    pub fn with_parts(config: Configuration, connector: K, dumper: D) -> Self {
        DumpOrchestrator {
            config,
            connector,
            dumper,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    async fn open(&self) -> Result<K::Connection> {
        self.config.validate()?;
        self.connector.connect(&self.config).await
    }

    /// Dumps every catalog table into `destination` and returns the headered
    /// artifact. `destination` ends up holding exactly the artifact.
    pub async fn export(&self, destination: &Path) -> Result<DumpArtifact> {
        let mut conn = self.open().await?;
        let tables = require_non_empty_catalog(&mut conn, &self.config).await?;
        let artifact = self.export_tables(&mut conn, tables, destination).await?;
        fs::write(destination, artifact.as_bytes())?;
        Ok(artifact)
    }

    async fn export_tables(
        &self,
        conn: &mut K::Connection,
        tables: Vec<String>,
        working_file: &Path,
    ) -> Result<DumpArtifact> {
        let engine_version = conn.server_version().await?;
        let header = format_header(&engine_version, &self.config);

        self.dumper.start(conn, &tables, working_file).await?;

        let raw_dump = fs::read_to_string(working_file)?;
        Ok(DumpArtifact {
            tables,
            contents: post_process(&raw_dump, &header),
        })
    }

    /// Writes the artifact to `dir/<name>` and returns that path.
    ///
    /// The catalog is checked before anything touches the filesystem. The
    /// final file appears atomically, so a failed export never leaves a
    /// partial artifact under the final name.
    pub async fn store(&self, dir: &Path, name: Option<&str>) -> Result<PathBuf> {
        let mut conn = self.open().await?;
        let tables = require_non_empty_catalog(&mut conn, &self.config).await?;

        let file_name = backup_file_name(&self.config.db_name, name, Local::now().naive_local())?;
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| BackupError::DirectoryCreation {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let working = tempfile::Builder::new()
            .prefix(".sqlbackup-")
            .suffix(".sql.part")
            .tempfile_in(dir)?;
        let artifact = self.export_tables(&mut conn, tables, working.path()).await?;

        let mut output = tempfile::Builder::new()
            .prefix(".sqlbackup-")
            .suffix(".sql")
            .tempfile_in(dir)?;
        output.write_all(artifact.as_bytes())?;
        output.flush()?;

        let destination = dir.join(&file_name);
        output.persist(&destination).map_err(|e| e.error)?;
        working.close()?;

        tracing::info!(
            path = %destination.display(),
            bytes = artifact.len(),
            tables = artifact.tables.len(),
            "{}",
            EXPORT_COMPLETED
        );
        Ok(destination)
    }

    /// Streams the artifact into `sink` as a download and describes it.
    ///
    /// The working file lives in the system temp directory and is removed
    /// whether or not delivery succeeds.
    pub async fn deliver<W>(&self, name: Option<&str>, sink: &mut W) -> Result<Attachment>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut conn = self.open().await?;
        let tables = require_non_empty_catalog(&mut conn, &self.config).await?;

        let file_name = backup_file_name(&self.config.db_name, name, Local::now().naive_local())?;
        let working = tempfile::Builder::new()
            .prefix("sqlbackup-")
            .suffix(".sql")
            .tempfile()?;

        let delivered = async {
            let artifact = self.export_tables(&mut conn, tables, working.path()).await?;
            let attachment = Attachment {
                file_name,
                content_length: artifact.len(),
            };
            sink.write_all(artifact.as_bytes()).await?;
            sink.flush().await?;
            Ok::<_, BackupError>(attachment)
        }
        .await;

        if let Err(e) = working.close() {
            tracing::warn!(error = %e, "failed to remove working dump file");
        }

        let attachment = delivered?;
        tracing::info!(
            file_name = %attachment.file_name,
            bytes = attachment.content_length,
            "{}",
            EXPORT_COMPLETED
        );
        Ok(attachment)
    }
}
