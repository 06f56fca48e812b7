//! Resource pool implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lease::Lease;

/// A fixed-capacity pool of long-lived resources.
///
/// The pool is filled once, at construction, by calling a factory up to
/// `capacity` times. It never creates replacements afterwards: a resource
/// that is detached or destroyed permanently shrinks the pool.
///
/// The pool owns the only strong reference to its shared state. Every
/// [`Lease`] holds a weak reference, so dropping the pool while leases are
/// outstanding is fine: those leases destroy their resource instead of
/// returning it.
pub struct ResourcePool<T> {
    shared: Arc<PoolShared<T>>,
}

/// State shared between the pool and its leases.
pub(crate) struct PoolShared<T> {
    capacity: usize,
    state: Mutex<PoolState<T>>,
    /// Signalled whenever a resource goes back on the idle stack.
    released: Condvar,
    acquired: AtomicU64,
    exhausted: AtomicU64,
    timeouts: AtomicU64,
}

struct PoolState<T> {
    /// Idle resources; the top of the stack is handed out next.
    idle: Vec<T>,
    leased: usize,
    /// Resources the pool still accounts for: `idle.len() + leased`.
    live: usize,
    closed: bool,
}

impl<T> PoolShared<T> {
    /// Put a resource back on the idle stack.
    ///
    /// Only called from [`Lease`]'s drop. On a closed pool the resource is
    /// destroyed instead.
    pub(crate) fn release(&self, item: T) {
        let mut state = self.state.lock();
        state.leased -= 1;

        if state.closed {
            state.live -= 1;
            drop(state);
            tracing::trace!("pool closed, destroying returned resource");
            drop(item);
            return;
        }

        state.idle.push(item);
        drop(state);
        self.released.notify_one();
        tracing::trace!("resource returned to pool");
    }

    /// Stop accounting for a leased resource that will never come back.
    pub(crate) fn forget(&self) {
        let mut state = self.state.lock();
        state.leased -= 1;
        state.live -= 1;
    }
}

impl<T> ResourcePool<T> {
    /// Create a pool and fill it by calling `factory` up to `capacity` times.
    ///
    /// Factory failures are logged and skipped, so the pool may start with
    /// fewer resources than `capacity`. Returns the pool together with the
    /// number of resources actually created.
    pub fn new<F, E>(capacity: usize, mut factory: F) -> (Self, usize)
    where
        F: FnMut() -> Result<T, E>,
        E: std::fmt::Display,
    {
        let mut idle = Vec::with_capacity(capacity);

        for slot in 0..capacity {
            match factory() {
                Ok(item) => idle.push(item),
                Err(e) => {
                    let err = PoolError::ResourceCreation(e.to_string());
                    tracing::warn!(slot, error = %err, "skipping pool slot");
                }
            }
        }

        let created = idle.len();
        if created < capacity {
            tracing::warn!(created, capacity, "pool started below capacity");
        } else {
            tracing::info!(created, capacity, "pool populated");
        }

        let shared = PoolShared {
            capacity,
            state: Mutex::new(PoolState {
                idle,
                leased: 0,
                live: created,
                closed: false,
            }),
            released: Condvar::new(),
            acquired: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        };

        (
            Self {
                shared: Arc::new(shared),
            },
            created,
        )
    }

    /// Create a pool sized by `config`, validating it first.
    pub fn from_config<F, E>(config: &PoolConfig, factory: F) -> Result<(Self, usize), PoolError>
    where
        F: FnMut() -> Result<T, E>,
        E: std::fmt::Display,
    {
        config.validate()?;
        Ok(Self::new(config.capacity, factory))
    }

    /// Take a resource without waiting.
    ///
    /// Hands out the most recently returned resource. Fails with
    /// [`PoolError::Exhausted`] when every resource is leased.
    pub fn acquire(&self) -> Result<Lease<T>, PoolError> {
        let mut state = self.shared.state.lock();
        let result = self.take(&mut state);
        if matches!(result, Err(PoolError::Exhausted)) {
            self.shared.exhausted.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Take a resource, waiting up to `timeout` for one to be released.
    ///
    /// Waiting threads are woken by releases in no particular order; a
    /// thread may lose the race to another caller and go back to waiting
    /// until its own deadline passes.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<T>, PoolError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();

        loop {
            match self.take(&mut state) {
                Err(PoolError::Exhausted) => {}
                other => return other,
            }

            let timed_out = match deadline {
                Some(deadline) => self.shared.released.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.shared.released.wait(&mut state);
                    false
                }
            };

            if timed_out {
                return match self.take(&mut state) {
                    Err(PoolError::Exhausted) => {
                        self.shared.timeouts.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(?timeout, "timed out waiting for pooled resource");
                        Err(PoolError::Timeout(timeout))
                    }
                    other => other,
                };
            }
        }
    }

    fn take(&self, state: &mut PoolState<T>) -> Result<Lease<T>, PoolError> {
        if state.closed {
            return Err(PoolError::Closed);
        }

        let item = state.idle.pop().ok_or(PoolError::Exhausted)?;
        state.leased += 1;
        self.shared.acquired.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(available = state.idle.len(), "resource leased");

        Ok(Lease::new(item, Arc::downgrade(&self.shared)))
    }

    /// Number of idle resources right now.
    ///
    /// Only a snapshot: another thread may change it immediately.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Maximum number of resources this pool was built for.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of resources currently leased.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.shared.state.lock().leased
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock();
        PoolStatus {
            available: state.idle.len(),
            in_use: state.leased,
            total: state.live,
            capacity: self.shared.capacity,
            acquired: self.shared.acquired.load(Ordering::Relaxed),
            exhausted: self.shared.exhausted.load(Ordering::Relaxed),
            timeouts: self.shared.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Close the pool.
    ///
    /// Idle resources are destroyed right away; leased ones are destroyed
    /// when their lease is dropped. Threads waiting in
    /// [`acquire_timeout`](Self::acquire_timeout) wake up with
    /// [`PoolError::Closed`].
    pub fn close(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained = std::mem::take(&mut state.idle);
            state.live -= drained.len();
            drained
        };
        self.shared.released.notify_all();

        tracing::info!(closed = drained.len(), "resource pool closed");
        drop(drained);
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl<T> Drop for ResourcePool<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> std::fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("status", &self.status())
            .finish()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle resources available.
    pub available: usize,
    /// Number of resources currently leased.
    pub in_use: usize,
    /// Resources the pool still accounts for (`available + in_use`).
    pub total: usize,
    /// Capacity the pool was built with.
    pub capacity: usize,
    /// Successful acquisitions since construction.
    pub acquired: u64,
    /// Non-blocking acquisitions that found the pool empty.
    pub exhausted: u64,
    /// Waiting acquisitions that hit their deadline.
    pub timeouts: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread;

    fn numbered(capacity: usize) -> ResourcePool<usize> {
        let mut next = 0;
        let (pool, created) = ResourcePool::new(capacity, || {
            next += 1;
            Ok::<_, String>(next)
        });
        assert_eq!(created, capacity);
        pool
    }

    #[test]
    fn test_factory_failures_shrink_pool() {
        let mut calls = 0;
        let (pool, created) = ResourcePool::new(4, || {
            calls += 1;
            if calls % 2 == 0 {
                Err("connection refused")
            } else {
                Ok(calls)
            }
        });

        assert_eq!(created, 2);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.status().total, 2);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_exhaustion_then_lifo_reuse() {
        let pool = numbered(2);

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert!(matches!(pool.acquire(), Err(PoolError::Exhausted)));

        let returned = *first;
        drop(first);

        let again = pool.acquire().unwrap();
        assert_eq!(*again, returned);
        drop(second);
    }

    #[test]
    fn test_status_accounting() {
        let pool = numbered(3);
        let lease = pool.acquire().unwrap();

        let status = pool.status();
        assert_eq!(status.available, 2);
        assert_eq!(status.in_use, 1);
        assert_eq!(status.total, 3);
        assert_eq!(status.acquired, 1);

        drop(lease);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.size(), 3);
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let pool = numbered(1);
        let _held = pool.acquire().unwrap();

        let started = Instant::now();
        let result = pool.acquire_timeout(Duration::from_millis(30));

        assert!(matches!(result, Err(PoolError::Timeout(_))));
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(pool.status().timeouts, 1);
    }

    #[test]
    fn test_acquire_timeout_woken_by_release() {
        let pool = Arc::new(numbered(1));
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_timeout(Duration::from_secs(5)).map(|l| *l))
        };

        thread::sleep(Duration::from_millis(20));
        drop(held);

        assert_eq!(waiter.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_close_wakes_waiters() {
        let pool = Arc::new(numbered(1));
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire_timeout(Duration::from_secs(5)).map(|_| ()))
        };

        thread::sleep(Duration::from_millis(20));
        pool.close();

        assert!(matches!(waiter.join().unwrap(), Err(PoolError::Closed)));
        drop(held);
        assert_eq!(pool.status().total, 0);
    }

    #[test]
    fn test_from_config_rejects_zero_capacity() {
        let result = ResourcePool::from_config(&PoolConfig::new().capacity(0), || {
            Ok::<_, String>(0u8)
        });
        assert!(matches!(result, Err(PoolError::Configuration(_))));
    }
}
