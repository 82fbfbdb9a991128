use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single result row: column name to decoded value.
pub type Row = Map<String, Value>;

/// The outcome of executing one SQL string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Rows in the order the engine returned them.
    pub rows: Vec<Row>,
    /// Rows changed by data-modifying statements. Zero for plain reads.
    pub rows_affected: u64,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>, rows_affected: u64) -> Self {
        Self { rows, rows_affected }
    }

    /// Number of rows returned.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// The first column of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.values().next())
    }

    /// The first column of every row, in order. Used for single-column
    /// listings such as table names.
    pub fn first_column(&self) -> Vec<Value> {
        self.rows
            .iter()
            .filter_map(|row| row.values().next().cloned())
            .collect()
    }
}

/// The result of one round trip through the pool to the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    /// Time spent acquiring a connection and running the probe.
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Maximum number of connections that may be checked out at once.
    pub capacity: usize,
    /// Connections currently held by callers.
    pub active: usize,
    /// Open connections parked in the pool.
    pub idle: usize,
    /// Callers queued for a connection.
    pub waiting: usize,
}
