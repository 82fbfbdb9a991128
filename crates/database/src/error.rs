use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database configuration: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Timed out after {0:?} connecting to the database")]
    ConnectTimeout(Duration),

    #[error("No connection became available within {0:?}")]
    PoolExhausted(Duration),

    #[error("The connection pool has been closed")]
    PoolClosed,

    /// The driver rejected or failed the statement. Displayed verbatim.
    #[error("{0}")]
    ExecutionError(#[source] sqlx::Error),

    #[error("Failed to decode column `{column}`: {source}")]
    DecodeError {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}

impl DbError {
    /// True for failures to obtain a working connection, as opposed to
    /// failures of the SQL that ran on one.
    pub fn is_connection_error(&self) -> bool {
        match self {
            DbError::ConnectionConfigError(_)
            | DbError::ConnectionError(_)
            | DbError::ConnectTimeout(_)
            | DbError::PoolExhausted(_)
            | DbError::PoolClosed => true,
            DbError::ExecutionError(e) => is_transport_error(e),
            DbError::DecodeError { .. } => false,
        }
    }

    /// True when the connection that produced this error can no longer be
    /// trusted and must not go back into the pool.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, DbError::ExecutionError(e) if is_transport_error(e))
    }
}

fn is_transport_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_)
    )
}
