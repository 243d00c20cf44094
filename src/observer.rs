//! Task observer plumbing.

use crate::task::TaskMetadata;
use parking_lot::Mutex;
use std::sync::Arc;

/// A hook invoked around every task the manager runs.
///
/// Both methods default to doing nothing, so an observer interested only in
/// completion doesn't need to implement `will_process_task`.
pub trait TaskObserver: Send + Sync {
    /// Called on the main thread immediately before a task runs.
    fn will_process_task(&self, _queue_index: usize, _task: &TaskMetadata) {}

    /// Called on the main thread immediately after a task returns.
    fn did_process_task(&self, _queue_index: usize, _task: &TaskMetadata) {}
}

/// The manager's registered observers.
///
/// Dispatch snapshots the list (cloning `Arc`s, not observers) before
/// iterating, so an observer may add or remove observers - including
/// itself - from within a callback without invalidating the in-progress
/// dispatch.
#[derive(Default)]
pub(crate) struct ObserverList {
    observers: Mutex<Vec<Arc<dyn TaskObserver>>>,
}

impl ObserverList {
    pub(crate) fn new() -> Self {
        ObserverList {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, observer: Arc<dyn TaskObserver>) {
        self.observers.lock().push(observer);
    }

    pub(crate) fn remove(&self, observer: &Arc<dyn TaskObserver>) {
        let mut observers = self.observers.lock();
        if let Some(pos) = observers.iter().position(|o| Arc::ptr_eq(o, observer)) {
            observers.remove(pos);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn TaskObserver>> {
        self.observers.lock().clone()
    }

    pub(crate) fn notify_will_process(&self, queue_index: usize, task: &TaskMetadata) {
        for observer in self.snapshot() {
            observer.will_process_task(queue_index, task);
        }
    }

    pub(crate) fn notify_did_process(&self, queue_index: usize, task: &TaskMetadata) {
        for observer in self.snapshot() {
            observer.did_process_task(queue_index, task);
        }
    }
}
