//! Exclusive leases on pooled resources.

use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use crate::pool::PoolShared;

/// A resource leased from a [`ResourcePool`](crate::ResourcePool).
///
/// The lease is the sole owner of its resource until it is dropped. On drop
/// the resource goes back to the pool if the pool still exists and is open;
/// otherwise it is destroyed. This happens exactly once per lease.
///
/// A lease can be moved (including to another thread when `T: Send`) but
/// never cloned.
#[must_use = "dropping a lease returns the resource to the pool immediately"]
pub struct Lease<T> {
    /// `Some` while held; only ever `None` inside `Drop`.
    item: Option<T>,
    pool: Weak<PoolShared<T>>,
}

impl<T> Lease<T> {
    pub(crate) fn new(item: T, pool: Weak<PoolShared<T>>) -> Self {
        Self {
            item: Some(item),
            pool,
        }
    }

    /// Take the resource out of the pool for good.
    ///
    /// The pool stops accounting for it, so the pool's effective size
    /// drops by one until restart.
    pub fn detach(mut self) -> T {
        if let Some(pool) = self.pool.upgrade() {
            pool.forget();
        }
        self.pool = Weak::new();
        self.take_item()
    }

    /// Check whether the originating pool is still alive.
    #[must_use]
    pub fn pool_alive(&self) -> bool {
        self.pool.strong_count() > 0
    }

    #[allow(clippy::expect_used)]
    fn take_item(&mut self) -> T {
        self.item.take().expect("lease holds its resource until dropped")
    }
}

#[allow(clippy::expect_used)]
impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item
            .as_ref()
            .expect("lease holds its resource until dropped")
    }
}

#[allow(clippy::expect_used)]
impl<T> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item
            .as_mut()
            .expect("lease holds its resource until dropped")
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        let Some(item) = self.item.take() else {
            return;
        };

        match self.pool.upgrade() {
            Some(pool) => pool.release(item),
            None => {
                tracing::trace!("pool gone, destroying leased resource");
                drop(item);
            }
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("item", &self.item)
            .field("pool_alive", &self.pool_alive())
            .finish()
    }
}
