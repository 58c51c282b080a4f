//! Deadline-bounded lock acquisition.
//!
//! Store operations must fail with [`CallListError::Timeout`] rather than
//! block a request worker indefinitely. Acquisition spins on `try_read`/
//! `try_write` with a short backoff until the deadline passes. A failed
//! acquisition takes no locks and writes nothing, so a timed-out operation
//! is equivalent to one never attempted.

use crate::{CallListError, CallListResult};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::{Duration, Instant};

const BACKOFF: Duration = Duration::from_micros(100);

pub(crate) fn read_within<T>(
    lock: &RwLock<T>,
    timeout: Duration,
) -> CallListResult<RwLockReadGuard<'_, T>> {
    let deadline = Instant::now() + timeout;
    loop {
        match lock.try_read() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(CallListError::Timeout(timeout));
                }
                std::thread::sleep(BACKOFF);
            }
        }
    }
}

pub(crate) fn write_within<T>(
    lock: &RwLock<T>,
    timeout: Duration,
) -> CallListResult<RwLockWriteGuard<'_, T>> {
    let deadline = Instant::now() + timeout;
    loop {
        match lock.try_write() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(CallListError::Timeout(timeout));
                }
                std::thread::sleep(BACKOFF);
            }
        }
    }
}
