//! SQL-family writer (SQLite, PostgreSQL, MySQL).
//!
//! All three dialects go through the sqlx `Any` driver over a single
//! connection that is closed before `write` returns.

use super::identifiers::quote_identifier;
use super::{ColumnKind, ExportTable, TableWriter, export_runtime};
use crate::config::{BackendKind, ConflictPolicy, DbConfig};
use crate::credentials::Secret;
use crate::error::{PipelineError, Result};
use crate::types::CellValue;
use sqlx::any::AnyArguments;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::PgConnectOptions;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, ConnectOptions, Connection};
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default SQLite database file inside the data directory.
pub const DEFAULT_SQLITE_DATABASE: &str = "data.db";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on bind parameters per INSERT statement.
const MAX_BIND_PARAMS: usize = 900;

/// Writes tables over one sqlx `Any` connection.
pub struct SqlWriter {
    backend: BackendKind,
    url: Secret,
    db_file: Option<PathBuf>,
}

impl SqlWriter {
    /// Resolve connection parameters for a SQL backend.
    ///
    /// SQLite databases live in `sqlite_dir` (file name from `database`,
    /// default `data.db`). PostgreSQL and MySQL require host, port,
    /// username, password and database.
    pub fn from_config(backend: BackendKind, db: &DbConfig, sqlite_dir: &Path) -> Result<Self> {
        match backend {
            BackendKind::Sqlite => {
                let name = db.database.as_deref().unwrap_or(DEFAULT_SQLITE_DATABASE);
                if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
                    return Err(PipelineError::Config(format!(
                        "sqlite database must be a plain file name, got '{name}'"
                    )));
                }
                std::fs::create_dir_all(sqlite_dir)?;
                let path = sqlite_dir.join(name);
                Ok(Self {
                    backend,
                    url: Secret::new(format!("sqlite://{}?mode=rwc", path.display())),
                    db_file: Some(path),
                })
            }
            BackendKind::Postgres | BackendKind::MySql => {
                let host = db.require("host", &db.host)?;
                let port = db.port.ok_or_else(|| {
                    PipelineError::Config(format!("'port' is required for {}", db.db_type))
                })?;
                let username = db.require("username", &db.username)?;
                let password = db
                    .password
                    .as_ref()
                    .ok_or_else(|| {
                        PipelineError::Config(format!("'password' is required for {}", db.db_type))
                    })?
                    .expose();
                let database = db.require("database", &db.database)?;
                if username.contains(['/', '?', '#']) {
                    return Err(PipelineError::Config(format!(
                        "'username' for {} cannot contain '/', '?' or '#'",
                        db.db_type
                    )));
                }

                let host = url_host(host);
                let mut url = match backend {
                    BackendKind::MySql => MySqlConnectOptions::new()
                        .host(&host)
                        .port(port)
                        .username(username)
                        .password(password)
                        .database(database)
                        .charset("utf8mb4")
                        .to_url_lossy(),
                    _ => PgConnectOptions::new()
                        .host(&host)
                        .port(port)
                        .username(username)
                        .password(password)
                        .database(database)
                        .to_url_lossy(),
                };
                // The generated authority carries the username verbatim.
                url.set_username(username).map_err(|()| {
                    PipelineError::Config(format!("invalid 'username' for {}", db.db_type))
                })?;
                Ok(Self {
                    backend,
                    url: Secret::new(url.to_string()),
                    db_file: None,
                })
            }
            BackendKind::Mongo => Err(PipelineError::Internal(
                "document backend routed to the SQL writer".to_string(),
            )),
        }
    }

    fn dialect(&self) -> Dialect {
        Dialect(self.backend)
    }

    async fn connect(&self) -> Result<AnyConnection> {
        sqlx::any::install_default_drivers();
        let backend = self.backend.as_str();
        match tokio::time::timeout(CONNECT_TIMEOUT, AnyConnection::connect(self.url.expose())).await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(PipelineError::connection(backend, e)),
            Err(_) => Err(PipelineError::connection(
                backend,
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no connection after {}s", CONNECT_TIMEOUT.as_secs()),
                ),
            )),
        }
    }

    async fn write_async(
        &self,
        table: &ExportTable,
        destination: &str,
        policy: ConflictPolicy,
    ) -> Result<usize> {
        let mut conn = self.connect().await?;
        let result = self.write_with(&mut conn, table, destination, policy).await;
        if let Err(e) = conn.close().await {
            warn!("Failed to close {} connection cleanly: {}", self.backend, e);
        }
        result
    }

    async fn write_with(
        &self,
        conn: &mut AnyConnection,
        table: &ExportTable,
        destination: &str,
        policy: ConflictPolicy,
    ) -> Result<usize> {
        let dialect = self.dialect();
        let quoted_table = dialect.quote(destination);

        match policy {
            ConflictPolicy::Replace => {
                sqlx::query::<Any>(&format!("DROP TABLE IF EXISTS {quoted_table}"))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query::<Any>(&dialect.create_table(&quoted_table, table, false))
                    .execute(&mut *conn)
                    .await?;
            }
            ConflictPolicy::Append => {
                sqlx::query::<Any>(&dialect.create_table(&quoted_table, table, true))
                    .execute(&mut *conn)
                    .await?;
            }
            ConflictPolicy::Fail => {
                if Self::table_exists(conn, &quoted_table).await {
                    return Err(PipelineError::TableExists(destination.to_string()));
                }
                sqlx::query::<Any>(&dialect.create_table(&quoted_table, table, false))
                    .execute(&mut *conn)
                    .await?;
            }
        }

        let chunk_rows = (MAX_BIND_PARAMS / table.columns.len().max(1)).max(1);
        let mut written = 0;
        for chunk in table.rows.chunks(chunk_rows) {
            let sql = dialect.insert(&quoted_table, table, chunk.len());
            let mut query = sqlx::query::<Any>(&sql);
            for row in chunk {
                for (cell, (_, kind)) in row.iter().zip(&table.columns) {
                    query = bind_cell(query, cell, *kind);
                }
            }
            query.execute(&mut *conn).await?;
            written += chunk.len();
            debug!("Inserted {} rows into {}", written, quoted_table);
        }

        Ok(written)
    }

    /// A zero-row select succeeds exactly when the table exists.
    async fn table_exists(conn: &mut AnyConnection, quoted_table: &str) -> bool {
        sqlx::query::<Any>(&format!("SELECT 1 FROM {quoted_table} WHERE 1 = 0"))
            .execute(&mut *conn)
            .await
            .is_ok()
    }
}

impl TableWriter for SqlWriter {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn db_file(&self) -> Option<&Path> {
        self.db_file.as_deref()
    }

    fn write(&self, table: &ExportTable, destination: &str, policy: ConflictPolicy) -> Result<usize> {
        if table.columns.is_empty() {
            return Err(PipelineError::Config(
                "cannot export a table without columns".to_string(),
            ));
        }

        info!(
            "Exporting {} rows to {} table '{}' ({})",
            table.rows.len(),
            self.backend,
            destination,
            policy.as_str()
        );
        export_runtime()?.block_on(self.write_async(table, destination, policy))
    }
}

/// Statement text for one SQL backend.
#[derive(Debug, Clone, Copy)]
struct Dialect(BackendKind);

impl Dialect {
    fn quote(&self, name: &str) -> String {
        match self.0 {
            BackendKind::MySql => quote_identifier(name, '`'),
            _ => quote_identifier(name, '"'),
        }
    }

    fn placeholder(&self, index: usize) -> String {
        match self.0 {
            BackendKind::Postgres => format!("${index}"),
            _ => "?".to_string(),
        }
    }

    fn create_table(&self, quoted_table: &str, table: &ExportTable, if_not_exists: bool) -> String {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|(name, kind)| format!("{} {}", self.quote(name), kind.sql_type()))
            .collect();
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        format!("CREATE TABLE {guard}{quoted_table} ({})", columns.join(", "))
    }

    fn insert(&self, quoted_table: &str, table: &ExportTable, rows: usize) -> String {
        let width = table.columns.len();
        let columns: Vec<String> = table.columns.iter().map(|(n, _)| self.quote(n)).collect();
        let values: Vec<String> = (0..rows)
            .map(|row| {
                let params: Vec<String> = (0..width)
                    .map(|col| self.placeholder(row * width + col + 1))
                    .collect();
                format!("({})", params.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {quoted_table} ({}) VALUES {}",
            columns.join(", "),
            values.join(", ")
        )
    }
}

fn bind_cell<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    cell: &CellValue,
    kind: ColumnKind,
) -> Query<'q, Any, AnyArguments<'q>> {
    match cell {
        CellValue::Int(v) => query.bind(*v),
        CellValue::Float(v) => query.bind(*v),
        CellValue::Bool(v) => query.bind(*v),
        CellValue::Text(v) => query.bind(v.clone()),
        CellValue::Null => match kind {
            ColumnKind::Integer => query.bind(None::<i64>),
            ColumnKind::Float => query.bind(None::<f64>),
            ColumnKind::Boolean => query.bind(None::<bool>),
            ColumnKind::Text => query.bind(None::<String>),
        },
    }
}

/// IPv6 literals are bracketed inside a URL authority.
fn url_host(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}
