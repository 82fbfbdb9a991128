//! # SQLGate Database Crate
//!
//! Owns every live database session in the system.
//!
//! ## Architectural Principles
//!
//! - **Bounded & Fair:** `ConnectionPool` never hands out more connections than
//!   its capacity, and callers that have to wait are served strictly in arrival
//!   order.
//! - **Ownership-Enforced Release:** a checked-out connection is a
//!   `PooledConnection` handle. Releasing consumes it, and dropping it on any
//!   other path releases it, so a connection can never be returned twice or
//!   leaked by an early return.
//! - **Engine-Agnostic:** the pool is generic over a `ConnectionManager`. The
//!   production manager, `SqlxManager`, speaks MySQL, PostgreSQL and SQLite
//!   through `sqlx` and decodes rows into ordered JSON objects.
//!
//! ## Public API
//!
//! - `ConnectionPool` / `PoolOptions`: acquisition, status, health check and
//!   teardown.
//! - `PooledConnection`: the exclusive handle returned by `acquire`.
//! - `SqlConnection` / `ConnectionManager`: the seams a backend plugs into.
//! - `SqlxManager` / `DbConnection`: the `sqlx`-backed implementation.
//! - `DbError`: the specific error types that can be returned from this crate.

pub mod connection;
pub mod error;
mod health;
pub mod pool;
mod rows;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::{ConnectionManager, DbConnection, SqlConnection, SqlxManager};
pub use error::DbError;
pub use pool::{ConnectionPool, PoolOptions, PooledConnection};
