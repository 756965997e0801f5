//! Error types for the bounded `try_*` list operations.
//!
//! The plain operations (`push_front`, `pop_back`, ...) never fail; only the
//! variants that give up after a retry budget, or that report arena
//! exhaustion instead of panicking, return these.

use std::fmt;

/// Why a `try_*` operation did not apply its effect.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    /// Every node handle is in use (live or waiting for reclamation).
    #[error("node arena exhausted: all {capacity} handles are in use")]
    CapacityExhausted { capacity: u32 },
    /// The anchor CAS kept losing to other threads.
    #[error("gave up after {attempts} contended attempts")]
    Contended { attempts: u32 },
}

/// A rejected push. Carries the value back to the caller.
pub struct PushError<T> {
    value: T,
    error: ListError,
}

impl<T> PushError<T> {
    pub(crate) fn new(value: T, error: ListError) -> Self {
        PushError { value, error }
    }

    /// Why the push was rejected.
    pub fn error(&self) -> ListError {
        self.error
    }

    /// Recover the value that was not pushed.
    pub fn into_inner(self) -> T {
        self.value
    }
}

// Manual impls so that `T: Debug` is not required.
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push rejected: {}", self.error)
    }
}

impl<T> std::error::Error for PushError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
