use crate::connection::{ConnectionManager, SqlConnection};
use crate::error::DbError;
use configuration::PoolSettings;
use core_types::PoolStatus;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Capacity and wait policy for a [`ConnectionPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of connections checked out at the same time.
    pub max_connections: usize,
    /// Upper bound on queueing for a connection. `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl PoolOptions {
    pub fn from_settings(settings: &PoolSettings) -> Self {
        Self {
            max_connections: settings.max_connections,
            acquire_timeout: settings.acquire_timeout(),
        }
    }
}

/// A bounded pool of database sessions with a strictly FIFO wait queue.
///
/// Capacity is enforced by a fair semaphore: each checked-out connection holds
/// one permit, and a released permit is handed to the longest-waiting caller
/// before any newcomer can take it. Connections are opened lazily and parked in
/// an idle set between uses.
///
/// Cloning is cheap and yields a handle to the same pool.
pub struct ConnectionPool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    options: PoolOptions,
    idle: Mutex<Vec<M::Connection>>,
    permits: Arc<Semaphore>,
    waiting: AtomicUsize,
    closed: AtomicBool,
}

impl<M: ConnectionManager> ConnectionPool<M> {
    /// Creates the pool. No connection is opened until the first `acquire`.
    pub fn new(manager: M, options: PoolOptions) -> Self {
        let capacity = options.max_connections.max(1);
        Self {
            inner: Arc::new(PoolInner {
                manager,
                options: PoolOptions {
                    max_connections: capacity,
                    ..options
                },
                idle: Mutex::new(Vec::with_capacity(capacity)),
                permits: Arc::new(Semaphore::new(capacity)),
                waiting: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Checks out a connection for the caller's exclusive use.
    ///
    /// Returns immediately while the pool has spare capacity. Otherwise the
    /// caller joins the back of the wait queue until a holder releases, or
    /// fails with [`DbError::PoolExhausted`] once the acquire timeout elapses.
    /// Dropping the returned future leaves the queue.
    pub async fn acquire(&self) -> Result<PooledConnection<M>, DbError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(DbError::PoolClosed);
        }

        let permit = self.acquire_permit().await?;

        let parked = self.inner.idle.lock().pop();
        let conn = match parked {
            Some(conn) => conn,
            // On failure the permit is dropped here and the slot frees up.
            None => {
                let conn = self.inner.manager.connect().await?;
                tracing::debug!("Opened a new database connection.");
                conn
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            discard: false,
            _permit: permit,
        })
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, DbError> {
        let permits = Arc::clone(&self.inner.permits);
        if let Ok(permit) = Arc::clone(&permits).try_acquire_owned() {
            return Ok(permit);
        }

        let _waiting = WaitingGuard::enter(&self.inner.waiting);
        let acquire = permits.acquire_owned();
        let permit = match self.inner.options.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| DbError::PoolExhausted(limit))?,
            None => acquire.await,
        };
        permit.map_err(|_| DbError::PoolClosed)
    }

    /// A snapshot of pool occupancy.
    pub fn status(&self) -> PoolStatus {
        let capacity = self.inner.options.max_connections;
        PoolStatus {
            capacity,
            active: capacity.saturating_sub(self.inner.permits.available_permits()),
            idle: self.inner.idle.lock().len(),
            waiting: self.inner.waiting.load(Ordering::Acquire),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Tears the pool down.
    ///
    /// Queued callers are woken with [`DbError::PoolClosed`], idle connections
    /// are closed gracefully, and connections still checked out are dropped
    /// when their holders let go of them.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.permits.close();

        let parked = std::mem::take(&mut *self.inner.idle.lock());
        let count = parked.len();
        for conn in parked {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "Failed to close an idle connection cleanly.");
            }
        }
        tracing::info!(closed = count, "Connection pool closed.");
    }
}

/// Counts a caller as queued for as long as it is alive.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// The holder owns the session exclusively. It goes back to the pool exactly
/// once: through [`release`](Self::release), [`discard`](Self::discard), or
/// when the handle is dropped on any other exit path.
pub struct PooledConnection<M: ConnectionManager> {
    conn: Option<M::Connection>,
    pool: Arc<PoolInner<M>>,
    discard: bool,
    // Declared last so the permit is returned after `drop` has parked the
    // connection; the next waiter then finds it idle.
    _permit: OwnedSemaphorePermit,
}

impl<M: ConnectionManager> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("present", &self.conn.is_some())
            .field("discard", &self.discard)
            .finish_non_exhaustive()
    }
}

impl<M: ConnectionManager> PooledConnection<M> {
    /// Returns the connection to the pool for reuse.
    pub fn release(self) {}

    /// Frees the slot but closes the connection instead of reusing it. Used
    /// when the session is known to be broken.
    pub fn discard(mut self) {
        self.discard = true;
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("connection is present until the handle is dropped")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("connection is present until the handle is dropped")
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.discard || self.pool.closed.load(Ordering::Acquire) {
            tracing::debug!("Dropping a database connection instead of reusing it.");
            return;
        }
        self.pool.idle.lock().push(conn);
    }
}
