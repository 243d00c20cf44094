mod common;

mod delayed_tests {
    use crate::common::{auto_queue, build, Recorder};
    use cotask::selector::RoundRobinSelector;

    fn fire(host_loop: &std::sync::Arc<cotask::testing::MockHostLoop>) {
        assert!(host_loop.fire_next_delayed(), "expected a pending delayed wake");
        host_loop.run_until_idle();
    }

    #[test]
    fn delayed_tasks_run_in_due_time_order() {
        let (manager, host_loop, clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);

        runner.post_delayed(recorder.push(1), 10_000);
        runner.post_delayed(recorder.push(2), 8_000);
        runner.post_delayed(recorder.push(3), 5_000);

        assert_eq!(manager.next_pending_delayed_time(), Some(5_000));

        clock.advance(5_000);
        fire(&host_loop);
        assert_eq!(recorder.order(), vec![3]);

        clock.advance(3_000);
        fire(&host_loop);
        assert_eq!(recorder.order(), vec![3, 2]);

        clock.advance(2_000);
        fire(&host_loop);
        assert_eq!(recorder.order(), vec![3, 2, 1]);

        assert_eq!(manager.next_pending_delayed_time(), None);
    }

    #[test]
    fn next_pending_delayed_time_ignores_expired_delays() {
        let (manager, host_loop, clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let runner = manager.runner_for(0);
        runner.post_delayed(|| {}, 1_000);

        clock.advance(5_000);
        // The delay has already expired but not yet been drained into a
        // work buffer; it must not be reported as a *future* wake.
        assert_eq!(manager.next_pending_delayed_time(), None);

        fire(&host_loop);
        assert_eq!(manager.next_pending_delayed_time(), None);
    }

    #[test]
    fn several_delayed_posts_sharing_a_tick_arm_one_wake() {
        let (manager, host_loop, clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);

        runner.post_delayed(recorder.push(1), 5_000);
        runner.post_delayed(recorder.push(2), 5_000);

        clock.advance(5_000);
        assert!(host_loop.fire_next_delayed());
        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![1, 2]);
        // Both tasks were due at the same tick and shared a single armed
        // wake; nothing further is pending.
        assert!(!host_loop.fire_next_delayed());
    }

    #[test]
    fn zero_delay_post_is_due_in_the_same_batch() {
        let (manager, host_loop, _clock) =
            build(vec![auto_queue("q")], Box::new(RoundRobinSelector::new()));
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);

        runner.post(recorder.push(1));
        runner.post_delayed(recorder.push(2), 0);

        host_loop.run_until_idle();

        // A zero-delay post expires as soon as do-work looks at it, landing
        // behind the already-posted immediate task in arrival order.
        assert_eq!(recorder.order(), vec![1, 2]);
    }
}
