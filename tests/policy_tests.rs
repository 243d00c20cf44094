mod common;

mod policy_tests {
    use crate::common::{build, queue_with, Recorder};
    use cotask::selector::ScriptedSelector;
    use cotask::{PumpPolicy, QueueConfig, WakeupPolicy};

    #[test]
    fn after_wakeup_queue_stays_quiescent_until_woken() {
        let (manager, host_loop, _clock) = build(
            vec![
                queue_with("q0", PumpPolicy::AfterWakeup, WakeupPolicy::CanWakeOtherQueues),
                QueueConfig::new("q1"),
            ],
            Box::new(ScriptedSelector::new([1, 0, 0])),
        );
        let recorder = Recorder::new();
        let r0 = manager.runner_for(0);
        let r1 = manager.runner_for(1);

        r0.post(recorder.push(1));
        r0.post(recorder.push(2));
        assert!(recorder.order().is_empty(), "AFTER_WAKEUP queue must not run on its own");

        r1.post(recorder.push(3));
        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![3, 1, 2]);
    }

    #[test]
    fn dont_wake_other_queues_suppresses_after_wakeup_sibling() {
        let (manager, host_loop, _clock) = build(
            vec![
                queue_with("q0", PumpPolicy::AfterWakeup, WakeupPolicy::CanWakeOtherQueues),
                queue_with("q1", PumpPolicy::Auto, WakeupPolicy::DontWakeOtherQueues),
                QueueConfig::new("q2"),
            ],
            Box::new(ScriptedSelector::new([1, 2, 0])),
        );
        let recorder = Recorder::new();
        let r0 = manager.runner_for(0);
        let r1 = manager.runner_for(1);
        let r2 = manager.runner_for(2);

        r0.post(recorder.push(1));
        r1.post(recorder.push(2));
        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![2], "q1 cannot wake q0, and q2 has nothing posted yet");

        r2.post(recorder.push(3));
        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![2, 3, 1]);
    }

    #[test]
    fn after_wakeup_queue_never_wakes_itself() {
        // A lone AFTER_WAKEUP/CAN_WAKE queue whose own task just ran must not
        // mistake that for a wakeup from another queue: a second task stuck
        // in its incoming buffer stays stuck, it doesn't get swept up just
        // because something ran on the same queue moments earlier.
        let (manager, host_loop, _clock) = build(
            vec![queue_with("solo", PumpPolicy::AfterWakeup, WakeupPolicy::CanWakeOtherQueues)],
            Box::new(cotask::RoundRobinSelector::new()),
        );
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);

        runner.post(recorder.push(1));
        manager.pump(0); // force task 1 straight into the work buffer
        runner.post(recorder.push(2)); // posted while idle: lands in `incoming`, not promoted

        host_loop.run_until_idle();

        // Task 1 runs and, being CAN_WAKE_OTHER_QUEUES, sets this queue's own
        // index as the wakeup source for the next do-work iteration. Since a
        // queue can't wake itself, task 2 stays stuck in `incoming`.
        assert_eq!(recorder.order(), vec![1]);
        assert_eq!(manager.queue_state(0), cotask::QueueState::NeedsPumping);
    }

    #[test]
    fn manual_queue_only_runs_via_explicit_pump() {
        let (manager, host_loop, _clock) = build(
            vec![queue_with("manual", PumpPolicy::Manual, WakeupPolicy::CanWakeOtherQueues)],
            Box::new(cotask::RoundRobinSelector::new()),
        );
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);
        runner.post(recorder.push(1));
        runner.post(recorder.push(2));

        host_loop.run_until_idle();
        assert!(recorder.order().is_empty(), "MANUAL queue must not run without an explicit pump");

        manager.pump(0);
        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![1, 2]);
    }

    #[test]
    fn set_pump_policy_to_auto_flushes_pending_tasks() {
        let (manager, host_loop, _clock) = build(
            vec![queue_with("q", PumpPolicy::Manual, WakeupPolicy::CanWakeOtherQueues)],
            Box::new(cotask::RoundRobinSelector::new()),
        );
        let recorder = Recorder::new();
        let runner = manager.runner_for(0);
        runner.post(recorder.push(1));
        runner.post(recorder.push(2));

        manager.set_pump_policy(0, PumpPolicy::Auto);
        host_loop.run_until_idle();

        assert_eq!(recorder.order(), vec![1, 2]);
    }

    #[test]
    fn set_pump_policy_auto_to_auto_is_a_no_op() {
        let (manager, host_loop, _clock) = build(
            vec![QueueConfig::new("q")],
            Box::new(cotask::RoundRobinSelector::new()),
        );
        // Flipping AUTO to AUTO must not spuriously force-pump or post an
        // extra do-work; posting nothing and running should stay idle.
        manager.set_pump_policy(0, PumpPolicy::Auto);
        host_loop.run_until_idle();
        assert_eq!(manager.queue_state(0), cotask::QueueState::Empty);
    }
}
