//! Per-queue policy enums and their tracing wire-format strings.

use std::fmt;

/// Governs when tasks posted to a queue's incoming buffer become runnable.
///
/// Keep the `Display` impl in sync with this enum - its output is the wire
/// format tracing relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpPolicy {
    /// Tasks are moved from incoming to work automatically whenever the work
    /// buffer runs dry.
    Auto,
    /// Tasks are moved from incoming to work only after some other queue
    /// with [`WakeupPolicy::CanWakeOtherQueues`] has executed a task during
    /// the same do-work batch (or the queue was already "awake" when the
    /// task was posted, see the design notes on posting-while-running).
    AfterWakeup,
    /// Tasks are moved from incoming to work only via an explicit
    /// [`crate::Manager::pump`] call.
    Manual,
}

impl fmt::Display for PumpPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PumpPolicy::Auto => "AUTO",
            PumpPolicy::AfterWakeup => "AFTER_WAKEUP",
            PumpPolicy::Manual => "MANUAL",
        })
    }
}

/// Governs whether a queue's executing tasks can wake up
/// [`PumpPolicy::AfterWakeup`] queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupPolicy {
    /// A task run on this queue causes AFTER_WAKEUP queues to be considered
    /// for pumping on the next iteration of the same do-work batch.
    CanWakeOtherQueues,
    /// A task run on this queue never wakes other queues.
    DontWakeOtherQueues,
}

impl fmt::Display for WakeupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WakeupPolicy::CanWakeOtherQueues => "CAN_WAKE_OTHER_QUEUES",
            WakeupPolicy::DontWakeOtherQueues => "DONT_WAKE_OTHER_QUEUES",
        })
    }
}

/// A point-in-time classification of a queue, returned by
/// [`crate::Manager::queue_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Both buffers and the delayed heap are empty.
    Empty,
    /// The work buffer is empty but the incoming buffer has tasks, or a
    /// delayed task's time has already expired.
    NeedsPumping,
    /// The work buffer has runnable tasks.
    HasWork,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueState::Empty => "EMPTY",
            QueueState::NeedsPumping => "NEEDS_PUMPING",
            QueueState::HasWork => "HAS_WORK",
        })
    }
}
