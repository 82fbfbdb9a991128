//! # SQLGate Gateway Crate
//!
//! The three operations the service exposes (connectivity test, table listing
//! and raw query passthrough) implemented against a shared `ConnectionPool`.
//!
//! ## Architectural Principles
//!
//! - **Acquire, Execute, Release:** every operation checks out exactly one
//!   connection and returns it on every exit path, including failures.
//! - **One Response Shape:** successes and failures alike come back as a
//!   `ResponseEnvelope`, so transports only decide the status code.
//! - **Silent Core:** the gateway does not log. Failures are returned with a
//!   classified `ErrorKind` and the caller decides what is worth recording.

pub mod envelope;
pub mod error;
pub mod gateway;

pub use envelope::{QueryPayload, ResponseEnvelope, TablesPayload, TestPayload};
pub use error::{ErrorKind, GatewayError, Rejection};
pub use gateway::{GatewayOptions, Outcome, QueryGateway};
