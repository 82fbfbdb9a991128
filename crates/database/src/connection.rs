use crate::error::DbError;
use crate::rows;
use async_trait::async_trait;
use configuration::DatabaseSettings;
use core_types::{Backend, QueryResult, Row};
use futures::TryStreamExt;
use futures::stream::BoxStream;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Either};
use std::str::FromStr;
use std::time::Duration;

/// One live database session.
///
/// A connection is only ever driven by the single caller that checked it out
/// of the pool, so every method takes `&mut self`.
#[async_trait]
pub trait SqlConnection: Send + 'static {
    /// Executes `sql` exactly as given, with no escaping, parameter binding or
    /// statement-type restriction, and collects every row it produced.
    async fn execute_raw(&mut self, sql: &str) -> Result<QueryResult, DbError>;

    /// Runs the engine's table-enumeration query for the connected database.
    /// Each row carries the table name in its first column.
    async fn list_tables(&mut self) -> Result<QueryResult, DbError>;

    /// The cheapest possible round trip.
    async fn ping(&mut self) -> Result<(), DbError> {
        self.execute_raw("SELECT 1").await.map(|_| ())
    }

    /// Gracefully ends the session.
    async fn close(self) -> Result<(), DbError>;
}

/// Opens new sessions for a pool.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: SqlConnection;

    async fn connect(&self) -> Result<Self::Connection, DbError>;
}

#[derive(Debug, Clone)]
enum Target {
    Mysql(MySqlConnectOptions),
    Postgres(PgConnectOptions),
    Sqlite(SqliteConnectOptions),
}

/// The production `ConnectionManager`, backed by `sqlx` drivers.
#[derive(Debug, Clone)]
pub struct SqlxManager {
    target: Target,
    connect_timeout: Duration,
}

impl SqlxManager {
    /// Builds connect options from settings. Nothing is opened yet.
    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let port = settings.port();
        let target = match settings.backend {
            Backend::Mysql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&settings.host)
                    .username(&settings.user)
                    .password(&settings.password);
                if let Some(port) = port {
                    options = options.port(port);
                }
                if !settings.name.is_empty() {
                    options = options.database(&settings.name);
                }
                Target::Mysql(options.disable_statement_logging())
            }
            Backend::Postgres => {
                let mut options = PgConnectOptions::new()
                    .host(&settings.host)
                    .username(&settings.user)
                    .password(&settings.password);
                if let Some(port) = port {
                    options = options.port(port);
                }
                if !settings.name.is_empty() {
                    options = options.database(&settings.name);
                }
                Target::Postgres(options.disable_statement_logging())
            }
            Backend::Sqlite => {
                let options = if settings.name == ":memory:" {
                    SqliteConnectOptions::from_str("sqlite::memory:")
                        .map_err(|e| DbError::ConnectionConfigError(e.to_string()))?
                } else if settings.name.is_empty() {
                    return Err(DbError::ConnectionConfigError(
                        "a database file is required for sqlite".to_string(),
                    ));
                } else {
                    SqliteConnectOptions::new()
                        .filename(&settings.name)
                        .create_if_missing(true)
                };
                Target::Sqlite(options.disable_statement_logging())
            }
        };

        Ok(Self {
            target,
            connect_timeout: settings.connect_timeout(),
        })
    }

    pub fn backend(&self) -> Backend {
        match self.target {
            Target::Mysql(_) => Backend::Mysql,
            Target::Postgres(_) => Backend::Postgres,
            Target::Sqlite(_) => Backend::Sqlite,
        }
    }
}

#[async_trait]
impl ConnectionManager for SqlxManager {
    type Connection = DbConnection;

    async fn connect(&self) -> Result<DbConnection, DbError> {
        let attempt = async {
            match &self.target {
                Target::Mysql(options) => options.connect().await.map(DbConnection::Mysql),
                Target::Postgres(options) => options.connect().await.map(DbConnection::Postgres),
                Target::Sqlite(options) => options.connect().await.map(DbConnection::Sqlite),
            }
        };

        tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| DbError::ConnectTimeout(self.connect_timeout))?
            .map_err(DbError::ConnectionError)
    }
}

/// A live session on one of the supported engines.
#[derive(Debug)]
pub enum DbConnection {
    Mysql(MySqlConnection),
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

const MYSQL_LIST_TABLES: &str = "SHOW TABLES";
const POSTGRES_LIST_TABLES: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
     ORDER BY table_name";
const SQLITE_LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";

#[async_trait]
impl SqlConnection for DbConnection {
    async fn execute_raw(&mut self, sql: &str) -> Result<QueryResult, DbError> {
        match self {
            DbConnection::Mysql(conn) => {
                collect(
                    sqlx::raw_sql(sql).fetch_many(&mut *conn),
                    |done| done.rows_affected(),
                    rows::mysql_row,
                )
                .await
            }
            DbConnection::Postgres(conn) => {
                collect(
                    sqlx::raw_sql(sql).fetch_many(&mut *conn),
                    |done| done.rows_affected(),
                    rows::postgres_row,
                )
                .await
            }
            DbConnection::Sqlite(conn) => {
                collect(
                    sqlx::raw_sql(sql).fetch_many(&mut *conn),
                    |done| done.rows_affected(),
                    rows::sqlite_row,
                )
                .await
            }
        }
    }

    async fn list_tables(&mut self) -> Result<QueryResult, DbError> {
        let sql = match self {
            DbConnection::Mysql(_) => MYSQL_LIST_TABLES,
            DbConnection::Postgres(_) => POSTGRES_LIST_TABLES,
            DbConnection::Sqlite(_) => SQLITE_LIST_TABLES,
        };
        self.execute_raw(sql).await
    }

    async fn close(self) -> Result<(), DbError> {
        let closed = match self {
            DbConnection::Mysql(conn) => conn.close().await,
            DbConnection::Postgres(conn) => conn.close().await,
            DbConnection::Sqlite(conn) => conn.close().await,
        };
        closed.map_err(DbError::ConnectionError)
    }
}

/// Drains a multi-result stream into rows plus the total affected-row count.
async fn collect<Q, R>(
    mut stream: BoxStream<'_, Result<Either<Q, R>, sqlx::Error>>,
    rows_affected: impl Fn(&Q) -> u64,
    decode: impl Fn(&R) -> Result<Row, DbError>,
) -> Result<QueryResult, DbError> {
    let mut result = QueryResult::default();
    while let Some(item) = stream.try_next().await.map_err(DbError::ExecutionError)? {
        match item {
            Either::Left(done) => result.rows_affected += rows_affected(&done),
            Either::Right(row) => result.rows.push(decode(&row)?),
        }
    }
    Ok(result)
}
