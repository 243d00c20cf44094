use cotask::clock::ManualClock;
use cotask::testing::MockHostLoop;
use cotask::{Manager, PumpPolicy, QueueConfig, SchedulerConfig, Selector, WakeupPolicy};
use std::sync::{Arc, Mutex};

/// Builds a manager over `queues`, a `MockHostLoop`, and `selector`, with a
/// fresh `ManualClock` starting at tick 0.
pub fn build(queues: Vec<QueueConfig>, selector: Box<dyn Selector>) -> (Arc<Manager>, Arc<MockHostLoop>, ManualClock) {
    // Safe to call once per test binary process; ignore failure from a
    // second call in another test's thread racing this one.
    let _ = env_logger::try_init();
    let clock = ManualClock::new();
    let config = SchedulerConfig {
        queues,
        work_batch_size: 4,
    };
    let host_loop = MockHostLoop::new();
    let manager = Manager::new(config, host_loop.clone(), selector, Arc::new(clock.clone()))
        .expect("valid config");
    (manager, host_loop, clock)
}

pub fn auto_queue(name: &str) -> QueueConfig {
    QueueConfig::new(name)
}

pub fn queue_with(name: &str, pump: PumpPolicy, wakeup: WakeupPolicy) -> QueueConfig {
    QueueConfig::new(name).with_pump_policy(pump).with_wakeup_policy(wakeup)
}

/// A shared, thread-safe recorder tasks push their identity into, so a test
/// can assert on execution order after the fact.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<i32>>>);

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    pub fn push(&self, value: i32) -> impl FnOnce() + Send + 'static {
        let recorder = self.clone();
        move || recorder.0.lock().unwrap().push(value)
    }

    pub fn order(&self) -> Vec<i32> {
        self.0.lock().unwrap().clone()
    }
}
