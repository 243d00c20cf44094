//! A single task queue: its three buffers and the policies governing how
//! tasks move between them.

use crate::clock::Tick;
use crate::policy::{PumpPolicy, QueueState, WakeupPolicy};
use crate::selector::WorkQueueView;
use crate::task::Task;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

struct Inner {
    /// Tasks posted but not yet promoted to `work`. Immediate tasks land
    /// here directly; delayed tasks land here once expired.
    incoming: VecDeque<Task>,
    /// Delayed tasks not yet due, ordered earliest-first.
    delayed: BinaryHeap<Reverse<Task>>,
    /// Tasks eligible to run now, in run order.
    work: VecDeque<Task>,
    /// Set when a task is posted to an AFTER_WAKEUP queue while the manager
    /// is mid do-work batch; consumed (and cleared) the next time this queue
    /// is considered for promotion, letting it promote without waiting for
    /// another queue to wake it.
    posted_while_awake: bool,
    /// The `when` of the delayed host-loop wake currently armed for this
    /// queue, if any - so posting several delayed tasks for the same tick
    /// arms only one timer.
    scheduled_wake: Option<Tick>,
}

/// One of the manager's N task queues.
///
/// A queue never references the [`crate::Manager`] that owns it; all
/// cross-queue coordination (wakeups, do-work reposting) is the manager's
/// job, not the queue's.
pub(crate) struct Queue {
    index: usize,
    name: String,
    pump_policy: Mutex<PumpPolicy>,
    wakeup_policy: Mutex<WakeupPolicy>,
    inner: Mutex<Inner>,
}

impl Queue {
    pub(crate) fn new(
        index: usize,
        name: impl Into<String>,
        pump_policy: PumpPolicy,
        wakeup_policy: WakeupPolicy,
    ) -> Self {
        Queue {
            index,
            name: name.into(),
            pump_policy: Mutex::new(pump_policy),
            wakeup_policy: Mutex::new(wakeup_policy),
            inner: Mutex::new(Inner {
                incoming: VecDeque::new(),
                delayed: BinaryHeap::new(),
                work: VecDeque::new(),
                posted_while_awake: false,
                scheduled_wake: None,
            }),
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn pump_policy(&self) -> PumpPolicy {
        *self.pump_policy.lock()
    }

    pub(crate) fn set_pump_policy(&self, policy: PumpPolicy) {
        *self.pump_policy.lock() = policy;
    }

    pub(crate) fn wakeup_policy(&self) -> WakeupPolicy {
        *self.wakeup_policy.lock()
    }

    pub(crate) fn set_wakeup_policy(&self, policy: WakeupPolicy) {
        *self.wakeup_policy.lock() = policy;
    }

    /// Adds a freshly-posted task. Returns true if this queue now needs a
    /// do-work batch posted on its behalf: always for AUTO queues, and for
    /// AFTER_WAKEUP queues when the manager was already mid-batch (so this
    /// queue would otherwise have to wait for a wakeup that already passed
    /// it by).
    pub(crate) fn enqueue(&self, task: Task, do_work_running: bool) -> bool {
        let policy = self.pump_policy();
        let mut inner = self.inner.lock();
        if task.delayed_run_time.is_some() {
            inner.delayed.push(Reverse(task));
        } else {
            inner.incoming.push_back(task);
        }
        match policy {
            PumpPolicy::Auto => true,
            PumpPolicy::AfterWakeup => {
                if do_work_running {
                    inner.posted_while_awake = true;
                    true
                } else {
                    false
                }
            }
            PumpPolicy::Manual => false,
        }
    }

    /// Moves every delayed task whose time has come into `incoming`. Runs
    /// unconditionally regardless of pump policy - even a MANUAL queue's
    /// delayed tasks expire on schedule, they just don't promote further
    /// into `work` without an explicit pump.
    pub(crate) fn expire_delayed(&self, now: Tick) {
        let mut inner = self.inner.lock();
        while let Some(Reverse(top)) = inner.delayed.peek() {
            match top.delayed_run_time {
                Some(when) if when <= now => {
                    let Reverse(task) = inner.delayed.pop().unwrap();
                    inner.incoming.push_back(task);
                }
                _ => break,
            }
        }
    }

    /// Promotes `incoming` into `work` if this queue's policy allows it
    /// right now. `wakeup_source` is the index of the queue whose task ran
    /// immediately before this call, if that queue's wakeup policy is
    /// [`WakeupPolicy::CanWakeOtherQueues`]. A queue never wakes itself: if
    /// `wakeup_source` is this queue's own index, it is treated the same as
    /// no wakeup at all.
    pub(crate) fn promote_if_ready(&self, wakeup_source: Option<usize>) {
        let policy = self.pump_policy();
        let mut inner = self.inner.lock();
        let should_promote = match policy {
            PumpPolicy::Auto => true,
            PumpPolicy::AfterWakeup => {
                let woken_by_other = matches!(wakeup_source, Some(src) if src != self.index);
                let awake = woken_by_other || inner.posted_while_awake;
                inner.posted_while_awake = false;
                awake
            }
            PumpPolicy::Manual => false,
        };
        if should_promote {
            inner.work.extend(inner.incoming.drain(..));
        }
    }

    /// Promotes `incoming` into `work` unconditionally, as if by an explicit
    /// [`crate::Manager::pump`] call.
    pub(crate) fn force_pump(&self) {
        let mut inner = self.inner.lock();
        inner.posted_while_awake = false;
        inner.work.extend(inner.incoming.drain(..));
    }

    /// Pops the front task from the work buffer, if any. The selector only
    /// hands back an index once that queue's work buffer is non-empty, so
    /// this should not normally return `None` in practice; nestable-vs-nested
    /// handling happens one level up, in the manager's do-work loop, since it
    /// decides whether to run the task here or repost it to the host loop.
    pub(crate) fn pop_next_runnable_work(&self) -> Option<Task> {
        self.inner.lock().work.pop_front()
    }

    pub(crate) fn work_is_empty(&self) -> bool {
        self.inner.lock().work.is_empty()
    }

    pub(crate) fn incoming_is_empty(&self) -> bool {
        self.inner.lock().incoming.is_empty()
    }

    pub(crate) fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.incoming.is_empty() && inner.delayed.is_empty() && inner.work.is_empty()
    }

    pub(crate) fn next_delayed_time(&self) -> Option<Tick> {
        self.inner
            .lock()
            .delayed
            .peek()
            .and_then(|Reverse(t)| t.delayed_run_time)
    }

    /// Claims the right to arm a host-loop wake for `when`. Returns false
    /// (and claims nothing) if a wake for this exact tick is already armed.
    pub(crate) fn try_claim_wake(&self, when: Tick) -> bool {
        let mut inner = self.inner.lock();
        if inner.scheduled_wake == Some(when) {
            return false;
        }
        inner.scheduled_wake = Some(when);
        true
    }

    /// Releases the armed-wake marker if it still matches `when`.
    pub(crate) fn clear_scheduled_wake_if(&self, when: Tick) {
        let mut inner = self.inner.lock();
        if inner.scheduled_wake == Some(when) {
            inner.scheduled_wake = None;
        }
    }

    /// Releases the armed-wake marker unconditionally, e.g. once this
    /// queue's delayed heap has drained entirely.
    pub(crate) fn clear_scheduled_wake(&self) {
        self.inner.lock().scheduled_wake = None;
    }

    pub(crate) fn queue_state(&self, now: Tick) -> QueueState {
        let inner = self.inner.lock();
        if !inner.work.is_empty() {
            return QueueState::HasWork;
        }
        let delayed_ready = matches!(
            inner.delayed.peek(),
            Some(Reverse(t)) if t.delayed_run_time.is_some_and(|w| w <= now)
        );
        if !inner.incoming.is_empty() || delayed_ready {
            return QueueState::NeedsPumping;
        }
        QueueState::Empty
    }

    /// Drops every pending task without running it, for manager shutdown.
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.incoming.clear();
        inner.delayed.clear();
        inner.work.clear();
        inner.posted_while_awake = false;
        inner.scheduled_wake = None;
    }
}

impl WorkQueueView for Queue {
    fn is_empty(&self) -> bool {
        self.work_is_empty()
    }
}
