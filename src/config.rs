//! Manager construction configuration.

use crate::error::SchedulerError;
use crate::policy::{PumpPolicy, WakeupPolicy};

/// The initial policy and name for one queue, supplied at construction.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Name used in logging and diagnostics; need not be unique.
    pub name: String,
    pub pump_policy: PumpPolicy,
    pub wakeup_policy: WakeupPolicy,
}

impl QueueConfig {
    /// Creates a queue config with the common default policies: AUTO pump,
    /// CAN_WAKE_OTHER_QUEUES wakeup.
    pub fn new(name: impl Into<String>) -> Self {
        QueueConfig {
            name: name.into(),
            pump_policy: PumpPolicy::Auto,
            wakeup_policy: WakeupPolicy::CanWakeOtherQueues,
        }
    }

    /// Overrides the pump policy.
    pub fn with_pump_policy(mut self, policy: PumpPolicy) -> Self {
        self.pump_policy = policy;
        self
    }

    /// Overrides the wakeup policy.
    pub fn with_wakeup_policy(mut self, policy: WakeupPolicy) -> Self {
        self.wakeup_policy = policy;
        self
    }
}

/// Construction parameters for a [`crate::Manager`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// One entry per queue, in index order.
    pub queues: Vec<QueueConfig>,
    /// Maximum number of tasks run per do-work batch before yielding back to
    /// the host loop, even if more work is ready.
    pub work_batch_size: usize,
}

impl SchedulerConfig {
    /// Creates a config with `count` AUTO/CAN_WAKE_OTHER_QUEUES queues named
    /// `queue-0`, `queue-1`, ... and a work batch size of 4.
    pub fn with_queue_count(count: usize) -> Self {
        SchedulerConfig {
            queues: (0..count).map(|i| QueueConfig::new(format!("queue-{i}"))).collect(),
            work_batch_size: 4,
        }
    }

    /// Overrides the work batch size.
    pub fn with_work_batch_size(mut self, size: usize) -> Self {
        self.work_batch_size = size;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SchedulerError> {
        if self.queues.is_empty() {
            return Err(SchedulerError::NoQueuesConfigured);
        }
        Ok(())
    }
}
