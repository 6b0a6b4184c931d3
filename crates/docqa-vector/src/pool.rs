//! Bounded pool of vector-store clients.
//!
//! A semaphore caps the number of clients in use; idle clients wait in a
//! mutex-guarded list. The lock covers only list manipulation, never a
//! network call.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tracing::{debug, warn};

use docqa_core::{Error, Result};

use crate::store::Connector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub capacity: usize,
    /// Clients currently alive, idle or checked out.
    pub open: usize,
    pub idle: usize,
    pub in_use: usize,
}

pub struct ConnectionPool<C: Connector> {
    connector: C,
    capacity: usize,
    permits: Semaphore,
    idle: Mutex<Vec<C::Client>>,
    open: AtomicUsize,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            connector,
            capacity,
            permits: Semaphore::new(capacity),
            idle: Mutex::new(Vec::with_capacity(capacity)),
            open: AtomicUsize::new(0),
        }
    }

    /// Check out a client, waiting while all of them are in use.
    pub async fn acquire(&self) -> Result<PooledConnection<'_, C>> {
        let permit = match self.permits.try_acquire() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                warn!(target: "docqa::pool", capacity = self.capacity, "pool_exhausted");
                self.permits.acquire().await.map_err(|e| closed(e.into()))?
            }
            Err(e @ TryAcquireError::Closed) => return Err(closed(e.into())),
        };

        let reused = self.idle.lock().pop();
        let client = match reused {
            Some(client) => client,
            None => {
                let client = self.connector.connect().await.map_err(|source| Error::StoreUnavailable {
                    operation: "connect",
                    items: 0,
                    source,
                })?;
                let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(target: "docqa::pool", open, capacity = self.capacity, "connection opened");
                client
            }
        };
        Ok(PooledConnection { pool: self, client: Some(client), _permit: permit })
    }

    pub fn status(&self) -> PoolStatus {
        let idle = self.idle.lock().len();
        PoolStatus {
            capacity: self.capacity,
            open: self.open.load(Ordering::SeqCst),
            idle,
            in_use: self.capacity - self.permits.available_permits(),
        }
    }
}

fn closed(source: anyhow::Error) -> Error {
    Error::StoreUnavailable { operation: "acquire_connection", items: 0, source }
}

/// A checked-out client. Dropping it returns the client to the pool.
pub struct PooledConnection<'a, C: Connector> {
    pool: &'a ConnectionPool<C>,
    client: Option<C::Client>,
    _permit: SemaphorePermit<'a>,
}

impl<C: Connector> PooledConnection<'_, C> {
    /// Close the client instead of returning it, e.g. after a timeout left
    /// it in an unknown state.
    pub fn discard(mut self) {
        if self.client.take().is_some() {
            let open = self.pool.open.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!(target: "docqa::pool", open, "connection discarded");
        }
    }
}

impl<C: Connector> Deref for PooledConnection<'_, C> {
    type Target = C::Client;

    fn deref(&self) -> &C::Client {
        // Only `discard` and `drop` take the client, and both consume the guard.
        self.client.as_ref().unwrap_or_else(|| unreachable!("pooled client already released"))
    }
}

impl<C: Connector> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.idle.lock().push(client);
        }
    }
}
