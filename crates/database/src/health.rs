use crate::connection::{ConnectionManager, SqlConnection};
use crate::pool::ConnectionPool;
use core_types::HealthReport;
use std::time::Instant;

impl<M: ConnectionManager> ConnectionPool<M> {
    /// Acquires a connection, performs a trivial round trip and releases it.
    ///
    /// Never fails: an unreachable database, an exhausted pool or a failed
    /// ping all come back as an unhealthy report carrying the error text.
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();

        let outcome = match self.acquire().await {
            Ok(mut conn) => {
                let pinged = conn.ping().await;
                match &pinged {
                    Err(e) if e.is_connection_lost() => conn.discard(),
                    _ => conn.release(),
                }
                pinged
            }
            Err(e) => Err(e),
        };

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(()) => HealthReport {
                healthy: true,
                latency_ms,
                error: None,
            },
            Err(e) => {
                tracing::debug!(error = %e, "Database health check failed.");
                HealthReport {
                    healthy: false,
                    latency_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
