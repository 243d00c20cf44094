//! The task record and its ordering.

use crate::clock::Tick;
use std::cmp::Ordering;
use std::fmt;
use std::panic::Location;

/// The closure a task wraps. Boxed because tasks of different sizes and
/// captures must live in the same queue; `Send` because tasks are posted
/// from arbitrary threads and run on the main thread; `FnOnce` because a
/// task runs exactly once.
pub(crate) type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// An immutable record of posted work.
///
/// Tasks are ordered by `(delayed_run_time ascending, sequence ascending)`;
/// an immediate task (no delayed run time) always compares as earlier than a
/// delayed one, so a newly-expired delayed task never jumps ahead of an
/// older immediate task in the same heap. See [`Task::cmp`].
pub(crate) struct Task {
    pub(crate) closure: Option<TaskFn>,
    pub(crate) sequence: u32,
    pub(crate) delayed_run_time: Option<Tick>,
    pub(crate) nestable: bool,
    pub(crate) location: &'static Location<'static>,
}

impl Task {
    pub(crate) fn new(
        closure: TaskFn,
        sequence: u32,
        delayed_run_time: Option<Tick>,
        nestable: bool,
        location: &'static Location<'static>,
    ) -> Self {
        Task {
            closure: Some(closure),
            sequence,
            delayed_run_time,
            nestable,
            location,
        }
    }

    /// Takes the closure out of the task, leaving it unrunnable. Panics if
    /// called twice on the same task; a `Task` is always run or reposted
    /// exactly once.
    pub(crate) fn take_closure(&mut self) -> TaskFn {
        self.closure
            .take()
            .expect("Task::take_closure called more than once")
    }

    pub(crate) fn metadata(&self) -> TaskMetadata {
        TaskMetadata {
            sequence: self.sequence,
            delayed_run_time: self.delayed_run_time,
            nestable: self.nestable,
            location: self.location,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("sequence", &self.sequence)
            .field("delayed_run_time", &self.delayed_run_time)
            .field("nestable", &self.nestable)
            .field("location", &self.location)
            .finish()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        // Sequence numbers are globally unique, so they identify a task
        // record uniquely for the purposes of heap/ordering operations.
        self.sequence == other.sequence
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.delayed_run_time, other.delayed_run_time) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.sequence.cmp(&other.sequence)),
            // A delayed task is always "greater" (later) than an immediate
            // one, regardless of sequence: a newly-expired delayed task must
            // never cut in front of an older already-immediate task.
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self.sequence.cmp(&other.sequence),
        }
    }
}

/// A snapshot of a [`Task`]'s metadata, handed to
/// [`crate::observer::TaskObserver`] callbacks. Observers see this instead
/// of the task itself since the closure is consumed by the time it runs.
#[derive(Debug, Clone, Copy)]
pub struct TaskMetadata {
    /// Sequence number assigned at post time; globally unique and
    /// monotonic across all queues.
    pub sequence: u32,
    /// Absolute tick the task was scheduled to run at, if delayed.
    pub delayed_run_time: Option<Tick>,
    /// Whether the task may run inside a nested host-loop invocation.
    pub nestable: bool,
    /// Source location of the `post`/`post_delayed` call, for diagnostics.
    pub location: &'static Location<'static>,
}
