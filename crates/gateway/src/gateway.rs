use crate::envelope::{QueryPayload, ResponseEnvelope, TablesPayload, TestPayload};
use crate::error::{GatewayError, Rejection};
use configuration::Settings;
use core_types::{ErrorDetail, QueryResult};
use database::{
    ConnectionManager, ConnectionPool, DbError, PoolOptions, SqlConnection, SqlxManager,
};
use serde_json::Value;

/// The connectivity probe run by [`QueryGateway::test`].
pub const TEST_SQL: &str = "SELECT 1 + 1 AS result";

const TEST_OK: &str = "Database connection successful";
const TEST_FAILED: &str = "Database connection failed";
const TABLES_FAILED: &str = "Failed to fetch tables";
const QUERY_FAILED: &str = "Query execution failed";
const PASSTHROUGH_DISABLED: &str = "Query passthrough is disabled";

/// Either the success envelope or the classified failure.
pub type Outcome<T> = Result<ResponseEnvelope<T>, Rejection>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    /// Reported alongside table listings.
    pub database_name: String,
    /// When false, `run_query` is refused before touching the pool.
    pub allow_passthrough: bool,
    pub error_detail: ErrorDetail,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            database_name: String::new(),
            allow_passthrough: true,
            error_detail: ErrorDetail::Verbatim,
        }
    }
}

impl GatewayOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            database_name: settings.database.name.clone(),
            allow_passthrough: settings.gateway.allow_passthrough,
            error_detail: settings.gateway.error_detail,
        }
    }
}

enum Statement<'a> {
    Raw(&'a str),
    ListTables,
}

/// Runs the service's operations on connections from a shared pool.
pub struct QueryGateway<M: ConnectionManager> {
    pool: ConnectionPool<M>,
    options: GatewayOptions,
}

impl<M: ConnectionManager> Clone for QueryGateway<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            options: self.options.clone(),
        }
    }
}

impl QueryGateway<SqlxManager> {
    /// Builds the production pool from settings. No connection is opened yet.
    pub fn from_settings(settings: &Settings) -> Result<Self, DbError> {
        let manager = SqlxManager::from_settings(&settings.database)?;
        let pool = ConnectionPool::new(manager, PoolOptions::from_settings(&settings.pool));
        Ok(Self::new(pool, GatewayOptions::from_settings(settings)))
    }
}

impl<M: ConnectionManager> QueryGateway<M> {
    pub fn new(pool: ConnectionPool<M>, options: GatewayOptions) -> Self {
        Self { pool, options }
    }

    pub fn pool(&self) -> &ConnectionPool<M> {
        &self.pool
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Round-trips `SELECT 1 + 1 AS result` and returns the scalar.
    pub async fn test(&self) -> Outcome<TestPayload> {
        let result = self
            .execute(Statement::Raw(TEST_SQL))
            .await
            .map_err(|e| self.reject(TEST_FAILED, e))?;

        let result = result.scalar().cloned().unwrap_or(Value::Null);
        Ok(ResponseEnvelope::success(Some(TEST_OK), TestPayload { result }))
    }

    /// Lists the tables of the configured database, in engine order.
    pub async fn list_tables(&self) -> Outcome<TablesPayload> {
        let result = self
            .execute(Statement::ListTables)
            .await
            .map_err(|e| self.reject(TABLES_FAILED, e))?;

        let tables = result.first_column();
        Ok(ResponseEnvelope::success(
            None,
            TablesPayload {
                database: self.options.database_name.clone(),
                count: tables.len(),
                tables,
            },
        ))
    }

    /// Executes caller-supplied SQL exactly as given.
    ///
    /// `None`, empty and whitespace-only input are rejected before a
    /// connection is acquired. Nothing else about the statement is checked.
    pub async fn run_query(&self, sql: Option<&str>) -> Outcome<QueryPayload> {
        if !self.options.allow_passthrough {
            return Err(self.reject(PASSTHROUGH_DISABLED, GatewayError::PassthroughDisabled));
        }
        let Some(sql) = sql.filter(|s| !s.trim().is_empty()) else {
            let error = GatewayError::MissingSql;
            return Err(self.reject(&error.to_string(), error));
        };

        let result = self
            .execute(Statement::Raw(sql))
            .await
            .map_err(|e| self.reject(QUERY_FAILED, e))?;

        let affected_rows = result.rows.is_empty().then_some(result.rows_affected);
        Ok(ResponseEnvelope::success(
            None,
            QueryPayload {
                count: result.count(),
                data: result.rows,
                affected_rows,
            },
        ))
    }

    /// Acquires a connection, runs one statement and gives the connection
    /// back before the outcome is inspected.
    async fn execute(&self, statement: Statement<'_>) -> Result<QueryResult, GatewayError> {
        let mut conn = self.pool.acquire().await?;
        let outcome = match statement {
            Statement::Raw(sql) => conn.execute_raw(sql).await,
            Statement::ListTables => conn.list_tables().await,
        };
        match &outcome {
            Err(e) if e.is_connection_lost() => conn.discard(),
            _ => conn.release(),
        }
        Ok(outcome?)
    }

    fn reject(&self, message: &str, error: GatewayError) -> Rejection {
        let detail = match (&error, self.options.error_detail) {
            (GatewayError::Database(e), ErrorDetail::Verbatim) => Some(e.to_string()),
            _ => None,
        };
        Rejection {
            envelope: ResponseEnvelope::failure(message, detail),
            error,
        }
    }
}
