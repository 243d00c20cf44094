//! The host application's run loop, abstracted so the manager never assumes
//! it owns the thread it runs on.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

/// A unit of work the host loop runs on its own thread, outside of any
/// scheduler bookkeeping. The manager uses this to post its own `do_work`
/// continuations; it is also exposed so other subsystems can share the same
/// loop.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Notified when the host loop is about to shut down, so subsystems can
/// release resources that must not outlive the loop.
pub trait DestructionObserver: Send + Sync {
    /// Called once, from the thread running the loop, before `run` returns.
    fn will_destroy_current_message_loop(&self);
}

/// The host application's event loop, as seen by the scheduler.
///
/// A real application has exactly one of these driving its main thread; the
/// manager never spawns threads of its own and never assumes it is the only
/// thing posting to the loop.
pub trait HostLoop: Send + Sync {
    /// Posts a job to run as soon as the loop is free, possibly nested
    /// inside the job currently running.
    fn post(&self, job: Job);

    /// Posts a job to run no sooner than `delay` from now.
    fn post_delayed(&self, job: Job, delay: Duration);

    /// Posts a job that must not run nested inside another job; it is
    /// deferred to the outermost loop iteration currently pending.
    fn post_non_nestable(&self, job: Job);

    /// Returns true if called from within a job that is itself running
    /// nested inside another job's call stack.
    fn is_nested(&self) -> bool;

    /// Registers an observer to be notified when the loop is about to stop.
    /// Held weakly: registering does not keep `observer` (or whatever it
    /// transitively owns) alive, so a manager that is otherwise dropped
    /// before the loop tears down can still actually go away.
    fn add_destruction_observer(&self, observer: Arc<dyn DestructionObserver>);
}

struct DelayedJob {
    run_at: Instant,
    sequence: u64,
    job: Job,
}

impl PartialEq for DelayedJob {
    fn eq(&self, other: &Self) -> bool {
        self.run_at == other.run_at && self.sequence == other.sequence
    }
}
impl Eq for DelayedJob {}

impl PartialOrd for DelayedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.run_at
            .cmp(&other.run_at)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

// BinaryHeap is a max-heap; wrap so the heap pops the *earliest* delayed job.
struct EarliestFirst(DelayedJob);

impl PartialEq for EarliestFirst {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for EarliestFirst {}
impl PartialOrd for EarliestFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for EarliestFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

#[derive(Default)]
struct LoopState {
    immediate: VecDeque<Job>,
    delayed: BinaryHeap<EarliestFirst>,
    outer_only: VecDeque<Job>,
    next_delayed_sequence: u64,
    stopped: bool,
}

/// A single-thread [`HostLoop`]: whichever thread calls [`run`](Self::run) or
/// [`run_until_idle`](Self::run_until_idle) is the loop. There is no
/// background worker; posting from another thread only wakes the thread
/// already blocked inside `run`.
///
/// Non-nestable jobs posted while a job is running nested are held in
/// `outer_only` and released only when the nesting depth drops back to zero,
/// matching the host loop's own non-nestable-task contract.
pub struct SingleThreadHostLoop {
    state: Mutex<LoopState>,
    condvar: Condvar,
    nesting_depth: AtomicUsize,
    destruction_observers: Mutex<Vec<Weak<dyn DestructionObserver>>>,
}

impl SingleThreadHostLoop {
    /// Creates an idle loop. Call `run` or `run_until_idle` from the thread
    /// that should own it.
    pub fn new() -> Arc<Self> {
        Arc::new(SingleThreadHostLoop {
            state: Mutex::new(LoopState::default()),
            condvar: Condvar::new(),
            nesting_depth: AtomicUsize::new(0),
            destruction_observers: Mutex::new(Vec::new()),
        })
    }

    /// Runs until `stop` is called, blocking the calling thread whenever
    /// there is no work due.
    pub fn run(self: &Arc<Self>) {
        self.run_inner(true);
    }

    /// Runs every job currently ready (and any jobs those jobs post, in
    /// turn) without blocking for future delayed work, then returns. Used by
    /// tests to drive the scheduler to quiescence deterministically.
    pub fn run_until_idle(self: &Arc<Self>) {
        self.run_inner(false);
    }

    /// Stops the loop; a `run` blocked on this loop returns once it next
    /// wakes.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        self.condvar.notify_all();
    }

    /// Runs the single earliest-registered delayed job immediately,
    /// ignoring how much real time has actually elapsed. Returns `false` if
    /// no delayed job is registered.
    ///
    /// Pairs with [`crate::clock::ManualClock`]: a test advances the manual
    /// clock, then calls this to make the scheduler's delayed wake fire
    /// without sleeping in real time.
    pub fn fire_next_delayed(self: &Arc<Self>) -> bool {
        let job = {
            let mut state = self.state.lock().unwrap();
            state.delayed.pop().map(|EarliestFirst(d)| d.job)
        };
        match job {
            Some(job) => {
                self.nesting_depth.fetch_add(1, AtomicOrdering::SeqCst);
                job();
                self.nesting_depth.fetch_sub(1, AtomicOrdering::SeqCst);
                true
            }
            None => false,
        }
    }

    fn run_inner(self: &Arc<Self>, block_for_delayed: bool) {
        loop {
            let job = {
                let mut state = self.state.lock().unwrap();
                loop {
                    if state.stopped {
                        self.notify_destruction();
                        return;
                    }
                    if let Some(job) = state.immediate.pop_front() {
                        break Some(job);
                    }
                    if self.nesting_depth.load(AtomicOrdering::SeqCst) == 0 {
                        if let Some(job) = state.outer_only.pop_front() {
                            break Some(job);
                        }
                    }
                    let now = Instant::now();
                    if let Some(EarliestFirst(top)) = state.delayed.peek() {
                        if top.run_at <= now {
                            let EarliestFirst(due) = state.delayed.pop().unwrap();
                            break Some(due.job);
                        }
                        if !block_for_delayed {
                            return;
                        }
                        let wait = top.run_at - now;
                        let (guard, _) = self.condvar.wait_timeout(state, wait).unwrap();
                        state = guard;
                        continue;
                    }
                    if !block_for_delayed {
                        return;
                    }
                    state = self.condvar.wait(state).unwrap();
                }
            };
            if let Some(job) = job {
                self.nesting_depth.fetch_add(1, AtomicOrdering::SeqCst);
                job();
                self.nesting_depth.fetch_sub(1, AtomicOrdering::SeqCst);
            }
        }
    }

    fn notify_destruction(&self) {
        for observer in self.destruction_observers.lock().unwrap().drain(..) {
            if let Some(observer) = observer.upgrade() {
                observer.will_destroy_current_message_loop();
            }
        }
    }
}

impl HostLoop for SingleThreadHostLoop {
    fn post(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        state.immediate.push_back(job);
        self.condvar.notify_all();
    }

    fn post_delayed(&self, job: Job, delay: Duration) {
        let mut state = self.state.lock().unwrap();
        let sequence = state.next_delayed_sequence;
        state.next_delayed_sequence += 1;
        state.delayed.push(EarliestFirst(DelayedJob {
            run_at: Instant::now() + delay,
            sequence,
            job,
        }));
        self.condvar.notify_all();
    }

    fn post_non_nestable(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        state.outer_only.push_back(job);
        self.condvar.notify_all();
    }

    fn is_nested(&self) -> bool {
        self.nesting_depth.load(AtomicOrdering::SeqCst) > 1
    }

    fn add_destruction_observer(&self, observer: Arc<dyn DestructionObserver>) {
        self.destruction_observers
            .lock()
            .unwrap()
            .push(Arc::downgrade(&observer));
    }
}
