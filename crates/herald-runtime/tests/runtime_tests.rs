#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use herald_core::{ActionKind, EventBus, HeraldError, Message, Result, RoleId, RuntimeEvent};
    use herald_runtime::*;
    use tokio::sync::{broadcast, mpsc};

    // ── Helpers ────────────────────────────────────────────────

    /// Replies with a fixed text and counts its runs.
    struct Echo {
        kind: ActionKind,
        reply: &'static str,
        runs: Arc<AtomicUsize>,
    }

    impl Echo {
        fn new(kind: ActionKind, reply: &'static str) -> Self {
            Self {
                kind,
                reply,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Action for Echo {
        fn kind(&self) -> ActionKind {
            self.kind
        }

        async fn run(&self, _ctx: &ActionContext<'_>) -> Result<ActionOutput> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(ActionOutput::text(self.reply))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Action for AlwaysFails {
        fn kind(&self) -> ActionKind {
            ActionKind::SubAction
        }

        async fn run(&self, _ctx: &ActionContext<'_>) -> Result<ActionOutput> {
            Err(HeraldError::action(ActionKind::SubAction, "boom"))
        }
    }

    struct NeverReturns;

    #[async_trait]
    impl SubscriptionCallback for NeverReturns {
        async fn call(&self, _message: Message) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Signals that it started, then never finishes.
    struct Stalls {
        started: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Action for Stalls {
        fn kind(&self) -> ActionKind {
            ActionKind::SubAction
        }

        async fn run(&self, _ctx: &ActionContext<'_>) -> Result<ActionOutput> {
            let _ = self.started.send(());
            std::future::pending::<()>().await;
            Ok(ActionOutput::text("unreachable"))
        }
    }

    struct PanicsInAction;

    #[async_trait]
    impl Action for PanicsInAction {
        fn kind(&self) -> ActionKind {
            ActionKind::SubAction
        }

        async fn run(&self, _ctx: &ActionContext<'_>) -> Result<ActionOutput> {
            panic!("parser exploded");
        }
    }

    struct PanicsInCallback;

    #[async_trait]
    impl SubscriptionCallback for PanicsInCallback {
        async fn call(&self, _message: Message) -> Result<()> {
            panic!("consumer exploded");
        }
    }

    fn stalling_role() -> (Role, mpsc::UnboundedReceiver<()>) {
        let (started, rx) = mpsc::unbounded_channel();
        let role = Role::builder("Stuck", "Tester")
            .action(Stalls { started })
            .watch([ActionKind::UserRequirement])
            .build()
            .unwrap();
        (role, rx)
    }

    fn echo_role(name: &str, kind: ActionKind) -> Role {
        Role::builder(name, "Tester")
            .action(Echo::new(kind, "done"))
            .watch([ActionKind::UserRequirement])
            .build()
            .unwrap()
    }

    fn failing_role() -> Role {
        Role::builder("Broken", "Tester")
            .action(AlwaysFails)
            .watch([ActionKind::UserRequirement])
            .build()
            .unwrap()
    }

    async fn wait_for_stop(events: &mut broadcast::Receiver<RuntimeEvent>, role_id: RoleId) -> String {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(RuntimeEvent::SubscriptionStopped { role_id: id, reason, .. }) =
                    events.recv().await
                {
                    if id == role_id {
                        return reason;
                    }
                }
            }
        })
        .await
        .expect("subscription did not stop")
    }

    // ── Role ───────────────────────────────────────────────────

    mod role {
        use super::*;

        #[tokio::test]
        async fn test_user_requirement_yields_one_transition_and_one_message() {
            let bus = EventBus::new(16);
            let mut events = bus.subscribe();
            let mut role = Role::builder("Coder", "Crawler Engineer")
                .action(Echo::new(ActionKind::WriteCrawlerCode, "# a.com\ndef parse(soup): ..."))
                .watch([ActionKind::UserRequirement])
                .events(bus)
                .build()
                .unwrap();

            let out = role.run(Some(Message::new("crawl a.com"))).await.unwrap().unwrap();
            assert_eq!(out.cause_by(), ActionKind::WriteCrawlerCode);
            assert_eq!(out.role(), Some("Crawler Engineer"));
            assert_eq!(role.state(), Some(0));
            assert_eq!(role.memory().len(), 2);
            assert_eq!(role.memory().get_by_cause(ActionKind::WriteCrawlerCode).len(), 1);

            let mut transitions = 0;
            while let Ok(event) = events.try_recv() {
                if let RuntimeEvent::RoleStateChanged { from, to, .. } = event {
                    assert_eq!((from, to), (None, 0));
                    transitions += 1;
                }
            }
            assert_eq!(transitions, 1);
        }

        #[tokio::test]
        async fn test_unwatched_cause_is_a_noop() {
            let mut role = Role::builder("Coder", "Crawler Engineer")
                .action(Echo::new(ActionKind::WriteCrawlerCode, "code"))
                .watch([ActionKind::ParseSubRequirement])
                .build()
                .unwrap();

            let out = role.run(Some(Message::new("hello"))).await.unwrap();
            assert!(out.is_none());
            assert_eq!(role.memory().len(), 1);
            assert_eq!(role.state(), None);

            let out = role.run(None).await.unwrap();
            assert!(out.is_none());
            assert_eq!(role.memory().len(), 1);
        }

        #[tokio::test]
        async fn test_routing_table_suppresses_same_state() {
            let parse = Echo::new(ActionKind::ParseSubRequirement, "parsed");
            let parse_runs = Arc::clone(&parse.runs);
            let mut role = Role::builder("Grace", "Subscription Assistant")
                .action(parse)
                .action(Echo::new(ActionKind::RunSubscription, "subscribed"))
                .watch([ActionKind::UserRequirement, ActionKind::WriteCrawlerCode])
                .route(ActionKind::UserRequirement, 0)
                .route(ActionKind::WriteCrawlerCode, 1)
                .build()
                .unwrap();

            let out = role.run(Some(Message::new("first"))).await.unwrap().unwrap();
            assert_eq!(out.cause_by(), ActionKind::ParseSubRequirement);
            assert!(role.run(Some(Message::new("second"))).await.unwrap().is_none());
            assert_eq!(parse_runs.load(Ordering::SeqCst), 1);

            let code = Message::caused_by("code", ActionKind::WriteCrawlerCode);
            let out = role.run(Some(code)).await.unwrap().unwrap();
            assert_eq!(out.cause_by(), ActionKind::RunSubscription);
            assert_eq!(role.state(), Some(1));
        }

        #[tokio::test]
        async fn test_single_capability_acts_every_cycle() {
            let echo = Echo::new(ActionKind::SubAction, "news");
            let runs = Arc::clone(&echo.runs);
            let mut role = Role::builder("Sub", "Subscriber")
                .action(echo)
                .watch([ActionKind::UserRequirement])
                .build()
                .unwrap();
            assert_eq!(role.routing(), &Routing::EveryCycle);

            for _ in 0..3 {
                assert!(role.run(Some(Message::new(""))).await.unwrap().is_some());
            }
            assert_eq!(runs.load(Ordering::SeqCst), 3);
            assert_eq!(role.memory().count_by_cause(ActionKind::SubAction), 3);
        }

        #[tokio::test]
        async fn test_failed_action_leaves_state_untouched() {
            let mut role = failing_role();
            let err = role.run(Some(Message::new("go"))).await.unwrap_err();
            assert!(matches!(err, HeraldError::Action { .. }));
            assert_eq!(role.state(), None);
            assert_eq!(role.memory().len(), 1);
        }

        #[test]
        fn test_builder_rejects_bad_shapes() {
            let no_actions = Role::builder("Empty", "Nobody").build();
            assert!(matches!(no_actions, Err(HeraldError::InvalidRole { .. })));

            let no_routes = Role::builder("Two", "Twice")
                .action(Echo::new(ActionKind::SubAction, "a"))
                .action(Echo::new(ActionKind::SubAction, "b"))
                .watch([ActionKind::UserRequirement])
                .build();
            assert!(no_routes.is_err());

            let out_of_range = Role::builder("One", "Once")
                .action(Echo::new(ActionKind::SubAction, "a"))
                .watch([ActionKind::UserRequirement])
                .route(ActionKind::UserRequirement, 3)
                .build();
            assert!(out_of_range.is_err());

            let unwatched = Role::builder("One", "Once")
                .action(Echo::new(ActionKind::SubAction, "a"))
                .route(ActionKind::UserRequirement, 0)
                .build();
            let err = unwatched.unwrap_err().to_string();
            assert!(err.contains("unwatched"), "{err}");
        }

        #[test]
        fn test_system_prompt_introduces_role() {
            let memory = herald_memory::Memory::new();
            let ctx = ActionContext {
                memory: &memory,
                name: "Grace",
                profile: "Subscription Assistant",
                goal: "help",
                constraints: "be brief",
            };
            assert_eq!(
                ctx.system_prompt(),
                "You are a Subscription Assistant, named Grace, your goal is help. The constraint is be brief."
            );
        }
    }

    // ── Triggers ───────────────────────────────────────────────

    mod trigger {
        use super::*;

        #[test]
        fn test_cron_instants_are_chronological() {
            let cron = CronTrigger::new("*/5 * * * *").unwrap();
            let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 2, 30).unwrap();
            let instants = cron.upcoming(start, 5);
            assert_eq!(instants.len(), 5);
            assert_eq!(instants[0], Utc.with_ymd_and_hms(2025, 3, 1, 10, 5, 0).unwrap());
            for pair in instants.windows(2) {
                assert!(pair[0] < pair[1]);
                assert_eq!(pair[1] - pair[0], chrono::Duration::minutes(5));
            }
        }

        #[test]
        fn test_every_minute_fires_on_the_minute() {
            let cron = CronTrigger::new("* * * * *").unwrap();
            let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 2, 0).unwrap();
            let next = cron.next_after(start).unwrap();
            assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 1, 10, 3, 0).unwrap());
        }

        #[test]
        fn test_crontab_sunday_numbering() {
            // 2025-03-02 is a Sunday.
            let cron = CronTrigger::new("0 9 * * 0").unwrap();
            let start = Utc.with_ymd_and_hms(2025, 2, 27, 0, 0, 0).unwrap();
            assert_eq!(
                cron.next_after(start).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()
            );
        }

        #[test]
        fn test_fixed_offset_timezone() {
            let tz: ScheduleTz = "+08:00".parse().unwrap();
            let cron = CronTrigger::with_timezone("0 9 * * *", tz).unwrap();
            let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 30, 0).unwrap();
            // 09:00 at +08:00 is 01:00 UTC.
            assert_eq!(
                cron.next_after(start).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap()
            );
        }

        #[test]
        fn test_invalid_cron_fails_at_construction() {
            assert!(matches!(
                CronTrigger::new("61 * * * *"),
                Err(HeraldError::InvalidSchedule { .. })
            ));
            assert!(CronTrigger::new("not a schedule").is_err());
        }

        #[tokio::test]
        async fn test_cron_next_fires_in_order() {
            let mut cron = CronTrigger::new("* * * * * *").unwrap();
            let msg = cron.next().await.unwrap();
            assert_eq!(msg.cause_by(), ActionKind::UserRequirement);
            let first = cron.last_fired().unwrap();
            cron.next().await.unwrap();
            let second = cron.last_fired().unwrap();
            assert!(second > first);
            assert!(Utc::now() >= second);
        }

        #[tokio::test(start_paused = true)]
        async fn test_interval_first_tick_after_one_period() {
            let mut interval = IntervalTrigger::new(Duration::from_secs(60)).unwrap();
            let start = tokio::time::Instant::now();
            interval.next().await.unwrap();
            assert!(start.elapsed() >= Duration::from_secs(60));
            interval.next().await.unwrap();
            assert!(start.elapsed() >= Duration::from_secs(120));
        }

        #[test]
        fn test_zero_interval_rejected() {
            assert!(IntervalTrigger::new(Duration::ZERO).is_err());
        }

        #[tokio::test]
        async fn test_closed_channel_is_an_error() {
            let (tx, mut trigger) = ChannelTrigger::channel(1);
            tx.send(Message::new("one")).await.unwrap();
            drop(tx);
            assert_eq!(trigger.next().await.unwrap().content(), "one");
            assert!(matches!(trigger.next().await, Err(HeraldError::Trigger(_))));
        }
    }

    // ── Subscription runner ────────────────────────────────────

    mod runner {
        use super::*;

        #[tokio::test]
        async fn test_event_reaches_callback() {
            let runner = SubscriptionRunner::default();
            let (tx, trigger) = ChannelTrigger::channel(4);
            let (out_tx, mut out_rx) = mpsc::channel(4);
            let role = echo_role("Coder", ActionKind::WriteCrawlerCode);
            let role_id = role.id();

            runner.subscribe(role, trigger, ChannelCallback::new(out_tx)).unwrap();
            assert!(runner.is_subscribed(role_id));
            assert_eq!(runner.len(), 1);

            tx.send(Message::new("go")).await.unwrap();
            let produced = out_rx.recv().await.unwrap();
            assert_eq!(produced.cause_by(), ActionKind::WriteCrawlerCode);
            assert_eq!(produced.content(), "done");

            let role = runner.unsubscribe(role_id).await.unwrap();
            assert_eq!(role.memory().len(), 2);
            assert_eq!(role.state(), Some(0));
        }

        #[tokio::test]
        async fn test_unsubscribe_is_idempotent() {
            let runner = SubscriptionRunner::default();
            let (_tx, trigger) = ChannelTrigger::channel(1);
            let role = echo_role("Idle", ActionKind::SubAction);
            let role_id = role.id();
            runner.subscribe(role, trigger, LogCallback).unwrap();

            assert!(runner.unsubscribe(role_id).await.is_some());
            assert!(runner.unsubscribe(role_id).await.is_none());
            assert!(runner.is_empty());
            assert!(runner.unsubscribe(RoleId::new()).await.is_none());
        }

        #[tokio::test]
        async fn test_duplicate_subscribe_rejected() {
            let runner = SubscriptionRunner::default();
            let id = RoleId::new();
            let build = || {
                Role::builder("Twin", "Tester")
                    .id(id)
                    .action(Echo::new(ActionKind::SubAction, "x"))
                    .watch([ActionKind::UserRequirement])
                    .build()
                    .unwrap()
            };
            let (_tx1, first) = ChannelTrigger::channel(1);
            let (_tx2, second) = ChannelTrigger::channel(1);

            let sub = runner.subscribe(build(), first, LogCallback).unwrap();
            let err = runner.subscribe(build(), second, LogCallback).unwrap_err();
            assert!(matches!(err, HeraldError::AlreadySubscribed(_)));
            assert_eq!(runner.len(), 1);
            assert_eq!(runner.subscriptions()[0].id, sub);
            runner.shutdown().await;
        }

        #[tokio::test]
        async fn test_failing_sibling_does_not_disturb_others() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let runner = SubscriptionRunner::with_events(RunnerOptions::default(), bus);

            let (bad_tx, bad_trigger) = ChannelTrigger::channel(4);
            let bad = failing_role();
            let bad_id = bad.id();
            runner.subscribe(bad, bad_trigger, LogCallback).unwrap();

            let (good_tx, good_trigger) = ChannelTrigger::channel(4);
            let (out_tx, mut out_rx) = mpsc::channel(4);
            let good = echo_role("Steady", ActionKind::SubAction);
            let good_id = good.id();
            runner.subscribe(good, good_trigger, ChannelCallback::new(out_tx)).unwrap();

            bad_tx.send(Message::new("fail")).await.unwrap();
            let reason = wait_for_stop(&mut events, bad_id).await;
            assert!(reason.contains("action failed"), "{reason}");
            assert!(!runner.is_subscribed(bad_id));

            for _ in 0..2 {
                good_tx.send(Message::new("tick")).await.unwrap();
                assert_eq!(out_rx.recv().await.unwrap().content(), "done");
            }
            assert!(runner.is_subscribed(good_id));
            assert_eq!(runner.len(), 1);
            runner.shutdown().await;
        }

        #[tokio::test]
        async fn test_restart_policy_tolerates_failures_up_to_limit() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let options = RunnerOptions {
                failure_policy: FailurePolicy::Restart { max_consecutive: 2 },
                ..Default::default()
            };
            let runner = SubscriptionRunner::with_events(options, bus);
            let (tx, trigger) = ChannelTrigger::channel(4);
            let role = failing_role();
            let role_id = role.id();
            runner.subscribe(role, trigger, LogCallback).unwrap();

            tx.send(Message::new("1")).await.unwrap();
            tx.send(Message::new("2")).await.unwrap();
            wait_for_stop(&mut events, role_id).await;
            assert!(!runner.is_subscribed(role_id));
        }

        #[tokio::test]
        async fn test_restart_policy_reports_restarting_flag() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let options = RunnerOptions {
                failure_policy: FailurePolicy::Restart { max_consecutive: 2 },
                ..Default::default()
            };
            let runner = SubscriptionRunner::with_events(options, bus);
            let (tx, trigger) = ChannelTrigger::channel(4);
            runner.subscribe(failing_role(), trigger, LogCallback).unwrap();
            tx.send(Message::new("1")).await.unwrap();
            tx.send(Message::new("2")).await.unwrap();

            let mut flags = Vec::new();
            while flags.len() < 2 {
                if let Ok(RuntimeEvent::SubscriptionFailed { restarting, stage, .. }) =
                    events.recv().await
                {
                    assert_eq!(stage, "action");
                    flags.push(restarting);
                }
            }
            assert_eq!(flags, vec![true, false]);
        }

        #[tokio::test]
        async fn test_callback_timeout_tears_down() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let options = RunnerOptions {
                callback_timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            };
            let runner = SubscriptionRunner::with_events(options, bus);
            let (tx, trigger) = ChannelTrigger::channel(1);
            let role = echo_role("Slow", ActionKind::SubAction);
            let role_id = role.id();
            runner.subscribe(role, trigger, NeverReturns).unwrap();

            tx.send(Message::new("go")).await.unwrap();
            let reason = wait_for_stop(&mut events, role_id).await;
            assert!(reason.starts_with("callback failed"), "{reason}");
            assert!(reason.contains("timed out"), "{reason}");
        }

        #[tokio::test]
        async fn test_cycle_timeout_fails_only_that_subscription() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let options = RunnerOptions {
                cycle_timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            };
            let runner = SubscriptionRunner::with_events(options, bus);

            let (tx, trigger) = ChannelTrigger::channel(1);
            let (role, _started) = stalling_role();
            let role_id = role.id();
            runner.subscribe(role, trigger, LogCallback).unwrap();

            let (other_tx, other_trigger) = ChannelTrigger::channel(1);
            let (out_tx, mut out_rx) = mpsc::channel(1);
            let other = echo_role("Quick", ActionKind::SubAction);
            let other_id = other.id();
            runner.subscribe(other, other_trigger, ChannelCallback::new(out_tx)).unwrap();

            tx.send(Message::new("go")).await.unwrap();
            let mut stage = None;
            while stage.is_none() {
                if let Ok(RuntimeEvent::SubscriptionFailed { role_id: id, stage: s, error, .. }) =
                    events.recv().await
                {
                    assert_eq!(id, role_id);
                    assert!(error.contains("timed out"), "{error}");
                    stage = Some(s);
                }
            }
            assert_eq!(stage.as_deref(), Some("action"));
            let reason = wait_for_stop(&mut events, role_id).await;
            assert!(reason.starts_with("action failed"), "{reason}");
            assert!(!runner.is_subscribed(role_id));

            other_tx.send(Message::new("tick")).await.unwrap();
            assert_eq!(out_rx.recv().await.unwrap().content(), "done");
            assert!(runner.is_subscribed(other_id));
            runner.shutdown().await;
        }

        #[tokio::test]
        async fn test_unsubscribe_mid_action_returns_role_unchanged() {
            let runner = SubscriptionRunner::default();
            let (tx, trigger) = ChannelTrigger::channel(1);
            let (role, mut started) = stalling_role();
            let role_id = role.id();
            runner.subscribe(role, trigger, LogCallback).unwrap();

            tx.send(Message::new("go")).await.unwrap();
            started.recv().await.unwrap();

            let role = tokio::time::timeout(Duration::from_secs(5), runner.unsubscribe(role_id))
                .await
                .expect("unsubscribe blocked on the action")
                .unwrap();
            assert_eq!(role.state(), None);
            assert_eq!(role.memory().len(), 1);
            assert!(role.memory().get_by_cause(ActionKind::SubAction).is_empty());
            assert!(!runner.is_subscribed(role_id));
        }

        #[tokio::test]
        async fn test_panicking_callback_tears_down() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let runner = SubscriptionRunner::with_events(RunnerOptions::default(), bus);
            let id = RoleId::new();
            let build = || {
                Role::builder("Fragile", "Tester")
                    .id(id)
                    .action(Echo::new(ActionKind::SubAction, "x"))
                    .watch([ActionKind::UserRequirement])
                    .build()
                    .unwrap()
            };
            let (tx, trigger) = ChannelTrigger::channel(1);
            runner.subscribe(build(), trigger, PanicsInCallback).unwrap();
            tx.send(Message::new("go")).await.unwrap();

            let mut failed_stage = None;
            while failed_stage.is_none() {
                if let Ok(RuntimeEvent::SubscriptionFailed { stage, restarting, error, .. }) =
                    events.recv().await
                {
                    assert!(!restarting);
                    assert!(error.contains("consumer exploded"), "{error}");
                    failed_stage = Some(stage);
                }
            }
            assert_eq!(failed_stage.as_deref(), Some("panic"));
            let reason = wait_for_stop(&mut events, id).await;
            assert!(reason.starts_with("panicked"), "{reason}");

            assert!(!runner.is_subscribed(id));
            assert!(runner.is_empty());
            tokio::time::timeout(Duration::from_millis(500), runner.run())
                .await
                .expect("run() did not return after the panic");

            let (_tx, again) = ChannelTrigger::channel(1);
            assert!(runner.subscribe(build(), again, LogCallback).is_ok());
            runner.shutdown().await;
        }

        #[tokio::test]
        async fn test_panicking_action_ignores_restart_policy() {
            let bus = EventBus::new(64);
            let mut events = bus.subscribe();
            let options = RunnerOptions {
                failure_policy: FailurePolicy::Restart { max_consecutive: 5 },
                ..Default::default()
            };
            let runner = SubscriptionRunner::with_events(options, bus);
            let role = Role::builder("Fragile", "Tester")
                .action(PanicsInAction)
                .watch([ActionKind::UserRequirement])
                .build()
                .unwrap();
            let role_id = role.id();
            let (tx, trigger) = ChannelTrigger::channel(1);
            runner.subscribe(role, trigger, LogCallback).unwrap();
            tx.send(Message::new("go")).await.unwrap();

            let reason = wait_for_stop(&mut events, role_id).await;
            assert!(reason.contains("parser exploded"), "{reason}");
            assert!(!runner.is_subscribed(role_id));
        }

        #[tokio::test]
        async fn test_trigger_error_tears_down() {
            let runner = SubscriptionRunner::default();
            let (tx, trigger) = ChannelTrigger::channel(1);
            let role = echo_role("Orphan", ActionKind::SubAction);
            runner.subscribe(role, trigger, LogCallback).unwrap();
            drop(tx);

            tokio::time::timeout(Duration::from_secs(5), runner.run())
                .await
                .expect("runner did not drain");
            assert!(runner.is_empty());
        }

        #[tokio::test]
        async fn test_rebind_keeps_role_and_callback() {
            let runner = SubscriptionRunner::default();
            let (out_tx, mut out_rx) = mpsc::channel(4);
            let (tx_old, old) = ChannelTrigger::channel(1);
            let role = echo_role("Mover", ActionKind::SubAction);
            let role_id = role.id();
            let first = runner.subscribe(role, old, ChannelCallback::new(out_tx)).unwrap();

            tx_old.send(Message::new("before")).await.unwrap();
            out_rx.recv().await.unwrap();

            let (tx_new, new) = ChannelTrigger::channel(1);
            let second = runner.rebind(role_id, new).await.unwrap();
            assert_ne!(first, second);
            assert!(runner.subscriptions()[0].trigger.contains("channel"));

            tx_new.send(Message::new("after")).await.unwrap();
            assert_eq!(out_rx.recv().await.unwrap().content(), "done");

            let role = runner.unsubscribe(role_id).await.unwrap();
            assert_eq!(role.memory().len(), 4);

            let (_tx, spare) = ChannelTrigger::channel(1);
            assert!(matches!(
                runner.rebind(role_id, spare).await,
                Err(HeraldError::NotSubscribed(_))
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn test_interval_subscription_cycles() {
            let runner = SubscriptionRunner::default();
            let (out_tx, mut out_rx) = mpsc::channel(8);
            let role = echo_role("Ticker", ActionKind::SubAction);
            let trigger = IntervalTrigger::new(Duration::from_secs(3600)).unwrap();
            runner.subscribe(role, trigger, ChannelCallback::new(out_tx)).unwrap();

            for _ in 0..3 {
                assert_eq!(out_rx.recv().await.unwrap().cause_by(), ActionKind::SubAction);
            }
            runner.shutdown().await;
            assert!(runner.is_empty());
        }

        #[tokio::test]
        async fn test_shutdown_stops_everything() {
            let runner = SubscriptionRunner::default();
            let mut senders = Vec::new();
            for i in 0..3 {
                let (tx, trigger) = ChannelTrigger::channel(1);
                senders.push(tx);
                runner
                    .subscribe(echo_role(&format!("r{i}"), ActionKind::SubAction), trigger, LogCallback)
                    .unwrap();
            }
            assert_eq!(runner.len(), 3);

            let waiter = {
                let runner = runner.clone();
                tokio::spawn(async move { runner.run().await })
            };
            runner.shutdown().await;
            tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .expect("run() did not return")
                .unwrap();
            assert!(runner.is_empty());
        }

        #[tokio::test]
        async fn test_from_fn_callback() {
            let runner = SubscriptionRunner::default();
            let seen = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&seen);
            let (done_tx, mut done_rx) = mpsc::channel(1);
            let callback = from_fn(move |_msg: Message| {
                let counter = Arc::clone(&counter);
                let done_tx = done_tx.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = done_tx.send(()).await;
                    Ok(())
                }
            });
            let (tx, trigger) = ChannelTrigger::channel(1);
            runner.subscribe(echo_role("Fn", ActionKind::SubAction), trigger, callback).unwrap();
            tx.send(Message::new("go")).await.unwrap();
            done_rx.recv().await.unwrap();
            assert_eq!(seen.load(Ordering::SeqCst), 1);
            runner.shutdown().await;
        }
    }
}
