//! A multi-queue cooperative task scheduler for a single execution thread.
//!
//! A [`Manager`] owns a fixed set of task queues, each with its own pump and
//! wakeup policy, and drives them from a host application's existing event
//! loop via the [`HostLoop`] trait - the manager never spawns a thread of
//! its own. Callers get a [`Runner`] per queue and post closures to it from
//! any thread; the manager decides when and in what order they actually
//! run on the loop's thread.

pub mod clock;
mod config;
mod error;
pub mod host_loop;
mod manager;
mod observer;
mod policy;
mod queue;
mod runner;
pub mod selector;
mod task;
pub mod testing;

pub use clock::{Tick, TickClock};
pub use config::{QueueConfig, SchedulerConfig};
pub use error::SchedulerError;
pub use host_loop::{DestructionObserver, HostLoop};
pub use manager::Manager;
pub use observer::TaskObserver;
pub use policy::{PumpPolicy, QueueState, WakeupPolicy};
pub use runner::Runner;
pub use selector::{RoundRobinSelector, Selector, SelectorObserver, WorkQueueView};
pub use task::TaskMetadata;
