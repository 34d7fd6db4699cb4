//! Teardown handles.
//!
//! A [`Disposer`] stops whatever it was created for. It is idempotent: the
//! teardown runs on the first [`Disposer::dispose`] call only, and the call
//! may race with other callers or with an in-flight change notification.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, PoisonError};

use crate::error::PersistError;

type Teardown = Box<dyn FnOnce() -> Result<(), PersistError> + Send>;

/// Idempotent teardown handle.
pub struct Disposer {
    teardown: Mutex<Option<Teardown>>,
}

impl Disposer {
    /// Wraps a teardown closure.
    #[must_use]
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() -> Result<(), PersistError> + Send + 'static,
    {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Runs the teardown if it has not run yet.
    ///
    /// # Errors
    ///
    /// Returns the teardown's error on the first call; later calls are
    /// always `Ok`.
    pub fn dispose(&self) -> Result<(), PersistError> {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match teardown {
            Some(run) => run(),
            None => Ok(()),
        }
    }

    /// Returns `true` once the teardown has been taken.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Combines several disposers into one.
///
/// The composite invokes every contained disposer exactly once. A disposer
/// that errors or panics does not stop the others; failures are logged and
/// reported together as [`PersistError::DisposeFailed`].
#[must_use]
pub fn use_disposers(disposers: Vec<Disposer>) -> Disposer {
    Disposer::new(move || {
        let total = disposers.len();
        let mut failed = 0usize;
        for (index, disposer) in disposers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| disposer.dispose())) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(index, %error, "disposer failed");
                    failed = failed.saturating_add(1);
                }
                Err(_) => {
                    tracing::error!(index, "disposer panicked");
                    failed = failed.saturating_add(1);
                }
            }
        }
        if failed == 0 {
            Ok(())
        } else {
            Err(PersistError::DisposeFailed { failed, total })
        }
    })
}
