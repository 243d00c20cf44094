//! The scheduler's core: owns the queues, drives `do_work`, and is the only
//! thing that talks to the host loop.

use crate::clock::{Tick, TickClock};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::host_loop::{DestructionObserver, HostLoop};
use crate::observer::{ObserverList, TaskObserver};
use crate::policy::{PumpPolicy, QueueState, WakeupPolicy};
use crate::queue::Queue;
use crate::runner::Runner;
use crate::selector::{Selector, SelectorObserver, WorkQueueView};
use crate::task::Task;
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::Duration;

/// Owns a fixed set of task queues and drives them to completion in
/// cooperation with a [`HostLoop`].
///
/// A `Manager` is always held behind an `Arc`; construct one with
/// [`Manager::new`] and hand out [`Runner`]s via [`Manager::runner_for`] to
/// let other code post work.
pub struct Manager {
    queues: Vec<Arc<Queue>>,
    selector: Mutex<Box<dyn Selector>>,
    clock: RwLock<Arc<dyn TickClock>>,
    host_loop: Arc<dyn HostLoop>,
    self_weak: Weak<Manager>,
    main_thread: ThreadId,
    sequence: AtomicU32,
    work_batch_size: AtomicUsize,
    do_work_running: AtomicBool,
    pending_do_work: AtomicBool,
    shut_down: AtomicBool,
    observers: ObserverList,
    task_ran_bitmap: AtomicU64,
}

impl Manager {
    /// Builds a manager from `config`, driven by `host_loop`, choosing which
    /// queue to service next via `selector`, and reading time from `clock`.
    ///
    /// Fails only if `config` describes zero queues; every other piece of
    /// manager state starts from a value `config` or its defaults supply.
    pub fn new(
        config: SchedulerConfig,
        host_loop: Arc<dyn HostLoop>,
        mut selector: Box<dyn Selector>,
        clock: Arc<dyn TickClock>,
    ) -> Result<Arc<Self>, SchedulerError> {
        config.validate()?;

        let queues: Vec<Arc<Queue>> = config
            .queues
            .iter()
            .enumerate()
            .map(|(i, qc)| Arc::new(Queue::new(i, qc.name.clone(), qc.pump_policy, qc.wakeup_policy)))
            .collect();
        let views: Vec<Arc<dyn WorkQueueView>> = queues
            .iter()
            .map(|q| q.clone() as Arc<dyn WorkQueueView>)
            .collect();
        selector.register_work_queues(views);

        let manager = Arc::new_cyclic(|weak: &Weak<Manager>| {
            selector.set_observer(weak.clone() as Weak<dyn SelectorObserver>);
            Manager {
                queues,
                selector: Mutex::new(selector),
                clock: RwLock::new(clock),
                host_loop,
                self_weak: weak.clone(),
                main_thread: std::thread::current().id(),
                sequence: AtomicU32::new(0),
                work_batch_size: AtomicUsize::new(config.work_batch_size.max(1)),
                do_work_running: AtomicBool::new(false),
                pending_do_work: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                observers: ObserverList::new(),
                task_ran_bitmap: AtomicU64::new(0),
            }
        });
        manager
            .host_loop
            .add_destruction_observer(manager.clone() as Arc<dyn DestructionObserver>);
        debug!("scheduler manager constructed with {} queues", manager.queues.len());
        Ok(manager)
    }

    /// Returns a handle for posting tasks to `queue_index`. Panics if the
    /// index is out of range.
    pub fn runner_for(&self, queue_index: usize) -> Runner {
        self.check_index(queue_index);
        Runner::new(self.queues[queue_index].clone(), self.self_weak.clone())
    }

    /// The number of queues this manager was constructed with.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// The diagnostic name given to `queue_index` at construction.
    pub fn queue_name(&self, queue_index: usize) -> &str {
        self.check_index(queue_index);
        self.queues[queue_index].name()
    }

    /// Current tick as read from this manager's clock.
    pub fn now(&self) -> Tick {
        self.clock.read().now()
    }

    /// Swaps the clock a running manager reads from. Intended for tests that
    /// need to install a [`crate::testing::ManualClock`](crate::clock::ManualClock)
    /// after construction.
    pub fn set_clock(&self, clock: Arc<dyn TickClock>) {
        *self.clock.write() = clock;
    }

    /// Overrides the pump policy for `queue_index`. Switching from MANUAL or
    /// AFTER_WAKEUP to AUTO immediately pumps the queue once, so tasks piled
    /// up while it was gated can run without waiting for another trigger.
    ///
    /// Main-thread only: off-thread calls panic in debug builds and are a
    /// silent no-op in release, per the invalid-use contract.
    pub fn set_pump_policy(self: &Arc<Self>, queue_index: usize, policy: PumpPolicy) {
        if !self.assert_main_thread("set_pump_policy") {
            return;
        }
        self.check_index(queue_index);
        let queue = &self.queues[queue_index];
        let previous = queue.pump_policy();
        queue.set_pump_policy(policy);
        if policy == PumpPolicy::Auto && previous != PumpPolicy::Auto {
            queue.force_pump();
            self.maybe_post_do_work();
        }
    }

    /// Overrides the wakeup policy for `queue_index`. Main-thread only; see
    /// [`Manager::set_pump_policy`].
    pub fn set_wakeup_policy(self: &Arc<Self>, queue_index: usize, policy: WakeupPolicy) {
        if !self.assert_main_thread("set_wakeup_policy") {
            return;
        }
        self.check_index(queue_index);
        self.queues[queue_index].set_wakeup_policy(policy);
    }

    /// Explicitly promotes `queue_index`'s pending tasks into its work
    /// buffer, regardless of its pump policy, and arranges for them to run.
    /// Main-thread only; see [`Manager::set_pump_policy`].
    pub fn pump(self: &Arc<Self>, queue_index: usize) {
        if !self.assert_main_thread("pump") {
            return;
        }
        self.check_index(queue_index);
        self.queues[queue_index].force_pump();
        self.maybe_post_do_work();
    }

    /// True if `queue_index` has no pending, delayed, or runnable tasks.
    pub fn is_empty(&self, queue_index: usize) -> bool {
        self.check_index(queue_index);
        self.queues[queue_index].is_empty()
    }

    /// A point-in-time classification of `queue_index`.
    pub fn queue_state(&self, queue_index: usize) -> QueueState {
        self.check_index(queue_index);
        self.queues[queue_index].queue_state(self.now())
    }

    /// The earliest future absolute tick at which any queue has a delayed
    /// task waiting to expire. Already-expired delayed tasks (due now or in
    /// the past, just not yet drained into a work buffer) are not of
    /// interest here and are ignored.
    pub fn next_pending_delayed_time(&self) -> Option<Tick> {
        let now = self.now();
        self.earliest_delayed_any().filter(|&t| t > now)
    }

    fn earliest_delayed_any(&self) -> Option<Tick> {
        self.queues.iter().filter_map(|q| q.next_delayed_time()).min()
    }

    /// Sets the maximum number of tasks run per do-work batch. Clamped to at
    /// least 1; a batch size of zero would make the manager unable to make
    /// progress. Main-thread only; see [`Manager::set_pump_policy`].
    pub fn set_work_batch_size(&self, size: usize) {
        if !self.assert_main_thread("set_work_batch_size") {
            return;
        }
        self.work_batch_size.store(size.max(1), Ordering::SeqCst);
    }

    /// Registers a [`TaskObserver`] to be notified around every task this
    /// manager runs, across all queues. Main-thread only; see
    /// [`Manager::set_pump_policy`].
    pub fn add_observer(&self, observer: Arc<dyn TaskObserver>) {
        if !self.assert_main_thread("add_observer") {
            return;
        }
        self.observers.add(observer);
    }

    /// Unregisters a previously-added observer. Main-thread only; see
    /// [`Manager::set_pump_policy`].
    pub fn remove_observer(&self, observer: &Arc<dyn TaskObserver>) {
        if !self.assert_main_thread("remove_observer") {
            return;
        }
        self.observers.remove(observer);
    }

    /// Returns a bitmap with bit `i` set iff queue `i` ran at least one task
    /// since the last call to this method, then clears it. Queue indices
    /// past 63 are not represented; managers with that many queues should
    /// rely on [`TaskObserver`] instead.
    pub fn get_and_clear_task_ran_bitmap(&self) -> u64 {
        self.task_ran_bitmap.swap(0, Ordering::SeqCst)
    }

    /// True if called from the thread this manager was constructed on, which
    /// is assumed to be the same thread driving the host loop.
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        std::thread::current().id() == self.main_thread
    }

    /// Thread-affinity check for a main-thread-only operation. Panics in
    /// debug builds when called off-thread (the invalid-use contract calls
    /// this fatal); returns whether the caller is on the main thread so
    /// release builds can silently skip the operation instead.
    fn assert_main_thread(&self, op: &str) -> bool {
        let on_main_thread = self.runs_tasks_on_current_thread();
        debug_assert!(on_main_thread, "{op} called off the scheduler's main thread");
        on_main_thread
    }

    /// Marks the manager as shut down. Already-posted do-work batches in
    /// flight notice on their next iteration and stop; queues are left
    /// intact (use [`Manager::drain_on_shutdown`] to also drop pending
    /// tasks).
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        debug!("scheduler manager shut down");
    }

    /// Shuts down and drops every pending, delayed, and runnable task
    /// without running it.
    pub fn drain_on_shutdown(&self) {
        self.shutdown();
        for queue in &self.queues {
            queue.clear();
        }
    }

    /// True once [`Manager::shutdown`] (or [`Manager::drain_on_shutdown`])
    /// has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub(crate) fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn enqueue(self: &Arc<Self>, queue_index: usize, task: Task) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        self.check_index(queue_index);
        let is_delayed = task.delayed_run_time.is_some();
        let do_work_running = self.do_work_running.load(Ordering::SeqCst);
        let wants_do_work = self.queues[queue_index].enqueue(task, do_work_running);
        if wants_do_work {
            self.maybe_post_do_work();
        }
        // Reading the clock at all is only warranted when a delayed post
        // just happened; an all-immediate workload must never touch it.
        if is_delayed {
            self.schedule_next_delayed_wake_if_any();
        }
    }

    fn check_index(&self, queue_index: usize) {
        assert!(
            queue_index < self.queues.len(),
            "queue index {} out of range (have {})",
            queue_index,
            self.queues.len()
        );
    }

    /// Expires due delayed tasks and promotes each queue's incoming buffer
    /// into its work buffer according to that queue's pump policy.
    /// `wakeup_source` is the index of the queue that ran a task in the
    /// immediately preceding iteration of this batch, if that queue can
    /// wake others.
    fn update_work_queues(&self, wakeup_source: Option<usize>) {
        let now = self.now();
        for queue in &self.queues {
            queue.expire_delayed(now);
            queue.promote_if_ready(wakeup_source);
        }
    }

    fn any_queue_has_work_or_ready_delayed(&self) -> bool {
        let now = self.now();
        self.queues.iter().any(|q| match q.queue_state(now) {
            QueueState::HasWork => true,
            // A queue stuck behind MANUAL or AFTER_WAKEUP can't resolve
            // NEEDS_PUMPING on its own; reposting do-work for it would spin
            // forever without making progress.
            QueueState::NeedsPumping => q.pump_policy() == PumpPolicy::Auto,
            QueueState::Empty => false,
        })
    }

    fn maybe_post_do_work(self: &Arc<Self>) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        if self.pending_do_work.swap(true, Ordering::SeqCst) {
            // A do-work batch is already queued; let it handle this.
            return;
        }
        let weak = self.self_weak.clone();
        trace!("posting do-work");
        self.host_loop.post(Box::new(move || {
            if let Some(manager) = weak.upgrade() {
                manager.pending_do_work.store(false, Ordering::SeqCst);
                manager.do_work();
            }
        }));
    }

    /// Arms a delayed host-loop wake for each queue with a pending delayed
    /// task, deduplicated per queue on `when` so that several delayed posts
    /// sharing a tick arm exactly one timer each.
    fn schedule_next_delayed_wake_if_any(self: &Arc<Self>) {
        let now = self.now();
        for (idx, queue) in self.queues.iter().enumerate() {
            let Some(when) = queue.next_delayed_time() else {
                queue.clear_scheduled_wake();
                continue;
            };
            if !queue.try_claim_wake(when) {
                continue;
            }
            let delay = (when - now).max(0) as u64;
            let weak = self.self_weak.clone();
            trace!("scheduling delayed wake for queue {idx} at tick {when}");
            self.host_loop.post_delayed(
                Box::new(move || {
                    if let Some(manager) = weak.upgrade() {
                        manager.on_delayed_wake(idx, when);
                    }
                }),
                Duration::from_micros(delay),
            );
        }
    }

    fn on_delayed_wake(self: &Arc<Self>, queue_index: usize, when: Tick) {
        self.queues[queue_index].clear_scheduled_wake_if(when);
        self.maybe_post_do_work();
    }

    fn mark_ran(&self, queue_index: usize) {
        if queue_index < u64::BITS as usize {
            self.task_ran_bitmap.fetch_or(1 << queue_index, Ordering::SeqCst);
        }
    }

    /// Runs up to one batch of tasks, selecting which queue to service each
    /// iteration via the configured [`Selector`], then reposts itself if
    /// there's more work to do and arms the next delayed wake.
    ///
    /// Takes `self` by value rather than `&Arc<Self>` so that the strong
    /// reference backing this call can be dropped before a task's closure
    /// runs: if the task drops the manager's last other `Arc`, `self_weak`
    /// stops upgrading and the loop returns immediately without touching any
    /// more manager state or invoking further observer callbacks.
    fn do_work(mut self: Arc<Self>) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        self.do_work_running.store(true, Ordering::SeqCst);

        let weak = self.self_weak.clone();
        let batch_size = self.work_batch_size.load(Ordering::SeqCst);
        let mut wakeup_source: Option<usize> = None;
        let mut tasks_run = 0usize;

        while tasks_run < batch_size {
            if self.shut_down.load(Ordering::SeqCst) {
                break;
            }
            self.update_work_queues(wakeup_source);
            wakeup_source = None;

            let selected = self.selector.lock().select();
            let Some(idx) = selected else { break };
            let Some(mut task) = self.queues[idx].pop_next_runnable_work() else {
                // The selector offered a queue that turned out to have
                // nothing in its work buffer after all.
                break;
            };
            tasks_run += 1;

            if !task.nestable && self.host_loop.is_nested() {
                trace!("reposting non-nestable task {} to the outer loop", task.metadata().sequence);
                self.repost_non_nestable(idx, task);
                continue;
            }

            let meta = task.metadata();
            trace!("running task {} on queue {}", meta.sequence, idx);
            self.observers.notify_will_process(idx, &meta);
            let closure = task.take_closure();
            self.mark_ran(idx);
            let can_wake = self.queues[idx].wakeup_policy() == WakeupPolicy::CanWakeOtherQueues;

            drop(self);
            closure();
            self = match weak.upgrade() {
                Some(manager) => manager,
                // The task deleted the manager: no further callbacks, no
                // further batch iterations.
                None => return,
            };

            self.observers.notify_did_process(idx, &meta);
            if can_wake {
                wakeup_source = Some(idx);
            }
        }

        self.do_work_running.store(false, Ordering::SeqCst);

        if !self.shut_down.load(Ordering::SeqCst) {
            if self.any_queue_has_work_or_ready_delayed() {
                self.maybe_post_do_work();
            }
            self.schedule_next_delayed_wake_if_any();
        }
    }

    /// Defers a non-nestable task selected while the host loop is nested:
    /// posts it to the host loop's outer-only queue instead of running it
    /// here, so it runs once the nesting depth drops back to zero.
    fn repost_non_nestable(self: &Arc<Self>, idx: usize, task: Task) {
        let weak = self.self_weak.clone();
        self.host_loop.post_non_nestable(Box::new(move || {
            if let Some(manager) = weak.upgrade() {
                manager.run_reposted_task(idx, task);
            }
        }));
    }

    /// Runs a task deferred by [`Manager::repost_non_nestable`], applying
    /// the same observer dispatch, run-bitmap bookkeeping, and self-deletion
    /// safety `do_work` applies to a task it runs directly.
    fn run_reposted_task(self: Arc<Self>, idx: usize, mut task: Task) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        let meta = task.metadata();
        trace!("running deferred non-nestable task {} on queue {idx}", meta.sequence);
        self.observers.notify_will_process(idx, &meta);
        let closure = task.take_closure();
        self.mark_ran(idx);
        let can_wake = self.queues[idx].wakeup_policy() == WakeupPolicy::CanWakeOtherQueues;
        let weak = self.self_weak.clone();

        drop(self);
        closure();
        let Some(manager) = weak.upgrade() else {
            return;
        };

        manager.observers.notify_did_process(idx, &meta);
        if can_wake {
            manager.maybe_post_do_work();
        }
    }
}

impl SelectorObserver for Manager {
    fn on_task_queue_enabled(&self) {
        if let Some(manager) = self.self_weak.upgrade() {
            manager.maybe_post_do_work();
        }
    }
}

impl DestructionObserver for Manager {
    fn will_destroy_current_message_loop(&self) {
        // Host-loop teardown must clean up every queue, not just flip the
        // shut-down flag; otherwise buffered task closures linger until the
        // whole manager is eventually dropped.
        self.drain_on_shutdown();
    }
}
