//! Pooled model sessions.
//!
//! Pages corrected in parallel each need a classifier call. A
//! [`SessionPool`] keeps several sessions of one model, sharing ort's
//! [`PrepackedWeights`], so those calls do not queue behind one `Session`.

use std::sync::atomic::{AtomicUsize, Ordering};

use ort::session::builder::PrepackedWeights;
use parking_lot::{Mutex, MutexGuard};

use crate::inference::InferenceError;

/// N interchangeable model instances, each behind its own [`Mutex`].
pub struct SessionPool<T> {
    instances: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> SessionPool<T> {
    /// Builds `pool_size` instances (at least one) with `init`.
    pub fn new<F>(pool_size: usize, init: F) -> Result<Self, InferenceError>
    where
        F: Fn(&PrepackedWeights) -> Result<T, InferenceError>,
    {
        let weights = PrepackedWeights::new();
        let instances = (0..pool_size.max(1))
            .map(|_| init(&weights).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            instances,
            next: AtomicUsize::new(0),
        })
    }

    /// Tries every slot once starting after the last one handed out, then
    /// blocks on the starting slot.
    fn acquire(&self) -> MutexGuard<'_, T> {
        let len = self.instances.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            if let Some(guard) = self.instances[(start + offset) % len].try_lock() {
                return guard;
            }
        }
        self.instances[start].lock()
    }

    /// Runs `f` with exclusive access to one instance.
    pub fn with<F, R>(&self, f: F) -> Result<R, InferenceError>
    where
        F: FnOnce(&mut T) -> Result<R, InferenceError>,
    {
        let mut guard = self.acquire();
        f(&mut guard)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

