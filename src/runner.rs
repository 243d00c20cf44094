//! The per-queue handle used to post tasks.

use crate::clock::Tick;
use crate::manager::Manager;
use crate::queue::Queue;
use crate::task::{Task, TaskFn};
use std::panic::Location;
use std::sync::{Arc, Weak};

/// A handle for posting tasks to one of a [`Manager`]'s queues.
///
/// Cloning a `Runner` is cheap and shares the same underlying queue; runners
/// are `Send + Sync` and may be posted to from any thread, including the
/// main thread itself.
#[derive(Clone)]
pub struct Runner {
    queue: Arc<Queue>,
    manager: Weak<Manager>,
}

impl Runner {
    pub(crate) fn new(queue: Arc<Queue>, manager: Weak<Manager>) -> Self {
        Runner { queue, manager }
    }

    /// The index of the queue this runner posts to.
    pub fn queue_index(&self) -> usize {
        self.queue.index()
    }

    /// Posts a task to run as soon as this queue's policy allows, preserving
    /// the relative order of same-queue immediate posts.
    #[track_caller]
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.post_task(Box::new(task), None, true, Location::caller());
    }

    /// Posts a task that must not run nested inside another task's call
    /// stack; if the manager is currently running nested, this task waits
    /// for the outermost do-work to resume.
    #[track_caller]
    pub fn post_non_nestable(&self, task: impl FnOnce() + Send + 'static) {
        self.post_task(Box::new(task), None, false, Location::caller());
    }

    /// Posts a task to run no sooner than `delay_ticks` from now, as
    /// measured by the manager's clock.
    #[track_caller]
    pub fn post_delayed(&self, task: impl FnOnce() + Send + 'static, delay_ticks: Tick) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let now = manager.now();
        self.post_task(
            Box::new(task),
            Some(now + delay_ticks.max(0)),
            true,
            Location::caller(),
        );
    }

    /// Posts a task to run at an absolute tick rather than a relative
    /// delay.
    #[track_caller]
    pub fn post_delayed_at(&self, task: impl FnOnce() + Send + 'static, run_at: Tick) {
        self.post_task(Box::new(task), Some(run_at), true, Location::caller());
    }

    /// Returns true if called from the thread currently running this
    /// runner's manager do-work loop.
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        self.manager
            .upgrade()
            .map(|m| m.runs_tasks_on_current_thread())
            .unwrap_or(false)
    }

    fn post_task(
        &self,
        closure: TaskFn,
        delayed_run_time: Option<Tick>,
        nestable: bool,
        location: &'static Location<'static>,
    ) {
        let Some(manager) = self.manager.upgrade() else {
            // The manager has already been torn down; posting to a queue
            // with nobody left to run it is a silent no-op, matching the
            // shutdown-drops-pending-tasks contract.
            return;
        };
        let sequence = manager.next_sequence();
        let task = Task::new(closure, sequence, delayed_run_time, nestable, location);
        manager.enqueue(self.queue.index(), task);
    }
}
