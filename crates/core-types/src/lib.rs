//! # Sqlgate Core Types
//!
//! Layer 0 of the workspace. Every other crate speaks in these types: the
//! database crate produces `QueryResult`s and `HealthReport`s, the gateway
//! wraps them in envelopes, and the configuration crate uses the enums to
//! pick a backend and an error-detail policy.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{Backend, ErrorDetail};
pub use error::CoreError;
pub use structs::{HealthReport, PoolStatus, QueryResult, Row};
