//! Ambient error type.
//!
//! Conditions spec.md classifies as fatal misuse (an out-of-range queue
//! index, a main-thread-only call from another thread) panic at the call
//! site, matching how the rest of the crate treats programmer error. Posting
//! after shutdown is not one of these: it is specified as a silent no-op, so
//! [`crate::Manager::enqueue`] just drops the task instead of erroring. This
//! type exists only for the one condition left over: a malformed
//! [`crate::SchedulerConfig`] handed to [`crate::Manager::new`].

use thiserror::Error;

/// Errors returned by fallible, ambient (non-scheduling) operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// [`crate::SchedulerConfig`] described zero queues; a manager with no
    /// queues could never run anything.
    #[error("scheduler config must declare at least one queue")]
    NoQueuesConfigured,
}
