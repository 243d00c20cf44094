//! Deterministic building blocks for exercising a [`crate::Manager`] without
//! real time or a real host application.

pub use crate::clock::ManualClock;
pub use crate::selector::ScriptedSelector;

/// A [`crate::HostLoop`] with no background thread: whichever thread calls
/// `run`/`run_until_idle` drives it. Tests drive a manager to quiescence
/// with [`crate::host_loop::SingleThreadHostLoop::run_until_idle`] instead
/// of sleeping on a real event loop.
pub use crate::host_loop::SingleThreadHostLoop as MockHostLoop;
