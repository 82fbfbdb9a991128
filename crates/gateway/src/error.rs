use crate::envelope::ResponseEnvelope;
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("SQL query parameter is required")]
    MissingSql,

    #[error("Raw query passthrough is disabled")]
    PassthroughDisabled,

    /// Displays the underlying driver or pool error unchanged.
    #[error("{0}")]
    Database(#[from] DbError),
}

/// The failure classes a transport maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed.
    Validation,
    /// The operation is switched off by configuration.
    Forbidden,
    /// No working connection could be obtained.
    Connection,
    /// The database rejected or failed the statement.
    Execution,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::MissingSql => ErrorKind::Validation,
            GatewayError::PassthroughDisabled => ErrorKind::Forbidden,
            GatewayError::Database(e) if e.is_connection_error() => ErrorKind::Connection,
            GatewayError::Database(_) => ErrorKind::Execution,
        }
    }
}

/// A failed operation: the error that caused it plus the envelope to send.
#[derive(Debug)]
pub struct Rejection {
    pub error: GatewayError,
    pub envelope: ResponseEnvelope<()>,
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
