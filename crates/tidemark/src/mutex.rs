#[cfg(feature = "parking-lot")]
pub use parking_lot::{Condvar, Mutex, MutexGuard};
#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::Result;

/// Acquires `mutex`, mapping std poisoning to [`Error::LockPoisoned`].
///
/// [`Error::LockPoisoned`]: crate::Error
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    #[cfg(feature = "parking-lot")]
    {
        Ok(mutex.lock())
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        Ok(mutex.lock()?)
    }
}

/// Acquires `mutex` even if a previous holder panicked.
///
/// Teardown paths use this: they only flip flags and must always progress.
#[inline]
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    #[cfg(feature = "parking-lot")]
    {
        mutex.lock()
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Blocks on `condvar`, releasing the lock while suspended.
#[inline]
pub(crate) fn wait<'a, T>(
    condvar: &Condvar,
    #[allow(unused_mut)] mut guard: MutexGuard<'a, T>,
) -> Result<MutexGuard<'a, T>> {
    #[cfg(feature = "parking-lot")]
    {
        condvar.wait(&mut guard);
        Ok(guard)
    }
    #[cfg(not(feature = "parking-lot"))]
    {
        Ok(condvar.wait(guard)?)
    }
}
