//! Engine-wide reentrancy guard.
//!
//! One writer at a time. A nested entry from the thread that already holds
//! the guard (e.g. a transfer callback calling back into the engine) is
//! rejected with [`FarmError::ReentrantCall`]; entries from other threads
//! wait for the writer slot. Release happens on drop of [`Entered`].

use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};
use weir_core::error::FarmError;

#[derive(Debug, Default)]
pub struct CallGuard {
    writer: Mutex<()>,
    owner: Mutex<Option<ThreadId>>,
}

/// Proof of entry. Dropping it releases the guard.
#[must_use = "the guard is released as soon as this is dropped"]
pub struct Entered<'a> {
    guard: &'a CallGuard,
    _writer: MutexGuard<'a, ()>,
}

impl CallGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the writer slot for the current thread.
    ///
    /// # Errors
    ///
    /// [`FarmError::ReentrantCall`] if this thread already holds the guard.
    pub fn enter(&self) -> Result<Entered<'_>, FarmError> {
        let me = thread::current().id();
        if *self.owner.lock() == Some(me) {
            return Err(FarmError::ReentrantCall);
        }
        let writer = self.writer.lock();
        *self.owner.lock() = Some(me);
        Ok(Entered {
            guard: self,
            _writer: writer,
        })
    }

    /// Whether any thread is inside a transaction.
    pub fn is_entered(&self) -> bool {
        self.owner.lock().is_some()
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        *self.guard.owner.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn nested_entry_rejected() {
        let guard = CallGuard::new();
        let _outer = guard.enter().unwrap();
        assert_eq!(guard.enter().err(), Some(FarmError::ReentrantCall));
    }

    #[test]
    fn released_on_drop() {
        let guard = CallGuard::new();
        {
            let _e = guard.enter().unwrap();
            assert!(guard.is_entered());
        }
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn released_on_early_return() {
        fn failing(guard: &CallGuard) -> Result<(), FarmError> {
            let _e = guard.enter()?;
            Err(FarmError::ZeroAmount)
        }
        let guard = CallGuard::new();
        assert!(failing(&guard).is_err());
        assert!(!guard.is_entered());
    }

    #[test]
    fn other_threads_wait_instead_of_failing() {
        let guard = Arc::new(CallGuard::new());
        let entered = guard.enter().unwrap();
        let g = guard.clone();
        let handle = std::thread::spawn(move || g.enter().map(|_| ()));
        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(entered);
        assert!(handle.join().unwrap().is_ok());
    }
}
