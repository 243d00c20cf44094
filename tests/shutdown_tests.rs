mod common;

mod shutdown_tests {
    use crate::common::{auto_queue, build, Recorder};
    use cotask::selector::RoundRobinSelector;
    use cotask::{QueueConfig, TaskMetadata, TaskObserver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn task_shutting_down_the_manager_stops_the_batch_cleanly() {
        let (manager, host_loop, _clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);
        let shutting_down = manager.clone();
        runner.post(move || shutting_down.shutdown());
        runner.post(recorder.push(2));
        runner.post(recorder.push(3));

        host_loop.run_until_idle();

        assert!(manager.is_shut_down());
        assert!(recorder.order().is_empty(), "no task after the shutdown call may run");
    }

    #[test]
    fn manager_deleted_inside_a_task_stops_the_batch_without_further_callbacks() {
        let (manager, host_loop, _clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let observer = Arc::new(CountingObserver::default());
        manager.add_observer(observer.clone() as Arc<dyn TaskObserver>);
        let runner = manager.runner_for(0);

        // Move the only strong handle to the manager into a slot a task can
        // empty itself, so the drop happens from inside `do_work`'s own
        // closure call rather than after the test is done with it.
        let last_handle = Arc::new(Mutex::new(Some(manager)));
        let dropper = last_handle.clone();
        runner.post(move || {
            dropper.lock().unwrap().take();
        });
        runner.post(|| panic!("must not run once the manager is gone"));

        host_loop.run_until_idle();

        assert!(last_handle.lock().unwrap().is_none());
        assert_eq!(observer.will.load(Ordering::SeqCst), 1, "will_process_task runs before the closure");
        assert_eq!(observer.did.load(Ordering::SeqCst), 0, "did_process_task must be skipped for the deleting task");
    }

    #[test]
    fn drain_on_shutdown_drops_pending_tasks_and_future_posts_are_silent() {
        let (manager, host_loop, _clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);
        runner.post(recorder.push(1));

        manager.drain_on_shutdown();
        assert!(manager.is_shut_down());
        assert!(manager.is_empty(0), "drain_on_shutdown must drop the pending task");

        runner.post(recorder.push(2));
        host_loop.run_until_idle();

        assert!(recorder.order().is_empty());
    }

    #[derive(Default)]
    struct CountingObserver {
        will: AtomicUsize,
        did: AtomicUsize,
    }

    impl TaskObserver for CountingObserver {
        fn will_process_task(&self, _queue_index: usize, _task: &TaskMetadata) {
            self.will.fetch_add(1, Ordering::SeqCst);
        }

        fn did_process_task(&self, _queue_index: usize, _task: &TaskMetadata) {
            self.did.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn observer_is_notified_once_per_task_run() {
        let (manager, host_loop, _clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let observer = Arc::new(CountingObserver::default());
        manager.add_observer(observer.clone() as Arc<dyn TaskObserver>);
        let runner = manager.runner_for(0);
        runner.post(|| {});
        runner.post(|| {});
        runner.post(|| {});

        host_loop.run_until_idle();

        assert_eq!(observer.will.load(Ordering::SeqCst), 3);
        assert_eq!(observer.did.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn removed_observer_stops_receiving_callbacks() {
        let (manager, host_loop, _clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let observer = Arc::new(CountingObserver::default());
        let as_trait: Arc<dyn TaskObserver> = observer.clone();
        manager.add_observer(as_trait.clone());
        let runner = manager.runner_for(0);
        runner.post(|| {});
        host_loop.run_until_idle();

        manager.remove_observer(&as_trait);
        runner.post(|| {});
        host_loop.run_until_idle();

        assert_eq!(observer.did.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn task_ran_bitmap_is_cleared_on_read() {
        let (manager, host_loop, _clock) = build(
            vec![auto_queue("a"), auto_queue("b")],
            Box::new(RoundRobinSelector::new()),
        );
        manager.runner_for(1).post(|| {});

        host_loop.run_until_idle();

        assert_eq!(manager.get_and_clear_task_ran_bitmap(), 0b10);
        assert_eq!(manager.get_and_clear_task_ran_bitmap(), 0, "a second read with nothing new must be 0");
    }

    #[test]
    fn work_batch_size_of_one_still_runs_every_task_in_order() {
        let (manager, host_loop, _clock) =
            build(vec![QueueConfig::new("q")], Box::new(RoundRobinSelector::new()));
        manager.set_work_batch_size(1);
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);
        runner.post(recorder.push(1));
        runner.post(recorder.push(2));
        runner.post(recorder.push(3));

        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![1, 2, 3]);
    }

    #[test]
    fn work_batch_size_zero_is_clamped_to_one() {
        let (manager, host_loop, _clock) =
            build(vec![QueueConfig::new("q")], Box::new(RoundRobinSelector::new()));
        manager.set_work_batch_size(0);
        let recorder = Recorder::new();
        manager.runner_for(0).post(recorder.push(1));

        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![1]);
    }
}
