//! A scripted [`ConnectionManager`] for exercising pool and gateway behaviour
//! without a database server. Enabled for this crate's own tests and, through
//! the `testing` feature, for dependants.

use crate::connection::{ConnectionManager, SqlConnection};
use crate::error::DbError;
use async_trait::async_trait;
use core_types::{QueryResult, Row};
use parking_lot::Mutex;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// How the next statements on a scripted connection should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    /// The engine rejects the statement; the session stays usable.
    Execution,
    /// The socket dies mid-statement.
    ConnectionLost,
}

#[derive(Debug, Default)]
struct ScriptedState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_connect: AtomicBool,
    fault: Mutex<Fault>,
    latency: Mutex<Duration>,
    tables: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
}

/// Hands out [`ScriptedConnection`]s and records what they were asked to run.
///
/// Clones share state, so a test can keep one handle while the pool owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedManager {
    state: Arc<ScriptedState>,
}

impl ScriptedManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fault(&self, fault: Fault) {
        *self.state.fault.lock() = fault;
    }

    /// Delay applied to every statement before it completes.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = latency;
    }

    pub fn set_tables(&self, tables: &[&str]) {
        *self.state.tables.lock() = tables.iter().map(|t| t.to_string()).collect();
    }

    /// Connections opened so far.
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Connections closed gracefully so far.
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Every statement executed, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.executed.lock().clone()
    }
}

#[async_trait]
impl ConnectionManager for ScriptedManager {
    type Connection = ScriptedConnection;

    async fn connect(&self) -> Result<ScriptedConnection, DbError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(DbError::ConnectionError(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        let id = self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedConnection {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    /// Sequence number in open order, starting at zero.
    pub id: usize,
    state: Arc<ScriptedState>,
}

impl ScriptedConnection {
    async fn run(&self, sql: &str) -> Result<(), DbError> {
        self.state.executed.lock().push(sql.to_string());
        let latency = *self.state.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match *self.state.fault.lock() {
            Fault::None => Ok(()),
            Fault::Execution => Err(DbError::ExecutionError(sqlx::Error::Database(Box::new(
                ScriptedDbError(format!("You have an error in your SQL syntax near '{sql}'")),
            )))),
            Fault::ConnectionLost => Err(DbError::ExecutionError(sqlx::Error::Io(
                io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
            ))),
        }
    }
}

#[async_trait]
impl SqlConnection for ScriptedConnection {
    /// Answers every statement with a single `{"result": 2}` row.
    async fn execute_raw(&mut self, sql: &str) -> Result<QueryResult, DbError> {
        self.run(sql).await?;
        let mut row = Row::new();
        row.insert("result".to_string(), Value::from(2));
        Ok(QueryResult::new(vec![row], 0))
    }

    async fn list_tables(&mut self) -> Result<QueryResult, DbError> {
        self.run("SHOW TABLES").await?;
        let rows = self
            .state
            .tables
            .lock()
            .iter()
            .map(|name| {
                let mut row = Row::new();
                row.insert("Tables_in_scripted".to_string(), Value::from(name.as_str()));
                row
            })
            .collect();
        Ok(QueryResult::new(rows, 0))
    }

    async fn close(self) -> Result<(), DbError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An engine-side rejection, as a driver would report it.
#[derive(Debug)]
struct ScriptedDbError(String);

impl fmt::Display for ScriptedDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ScriptedDbError {}

impl sqlx::error::DatabaseError for ScriptedDbError {
    fn message(&self) -> &str {
        &self.0
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("42000"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::Other
    }
}
