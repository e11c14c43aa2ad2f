//! Orchestrator lifecycle integration tests.
//!
//! These tests drive a full session lifecycle through the orchestrator with
//! mock collaborators and a real signal bus:
//! idle -> starting -> active -> stopping -> idle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use questline_core::{
    executor::{ApplicationExecutable, DetectableApplication},
    orchestrator::{
        OrchestratorEvent, QueueKind, QuestKind, SessionPhase, SessionStatus, StopReason,
    },
    testing::{fixtures, ExecutorCall, MockExecutor, MockGateway},
    ExecutorSignal, GameQuestMode, MemoryPreferenceStore, OrchestratorConfig, OrchestratorError,
    Preferences, QuestOrchestrator, SignalBus,
};

/// Test helper wiring the orchestrator to mocks.
struct TestHarness {
    orchestrator: QuestOrchestrator,
    gateway: Arc<MockGateway>,
    executor: Arc<MockExecutor>,
    bus: SignalBus,
}

impl TestHarness {
    async fn new(gateway: MockGateway) -> Self {
        let gateway = Arc::new(gateway);
        let executor = Arc::new(MockExecutor::new());
        let bus = SignalBus::default();

        let config = OrchestratorConfig {
            install_dir: Some("/tmp/questline-games".into()),
            ..Default::default()
        };

        let orchestrator = QuestOrchestrator::new(
            config,
            Arc::clone(&gateway) as Arc<dyn questline_core::QuestGateway>,
            Arc::clone(&executor) as Arc<dyn questline_core::TaskExecutor>,
            Arc::new(bus.clone()),
            Arc::new(MemoryPreferenceStore::new()),
            Preferences::default(),
        );
        orchestrator.start().await;

        Self {
            orchestrator,
            gateway,
            executor,
            bus,
        }
    }

    async fn phase(&self) -> SessionPhase {
        self.orchestrator.status().await.phase
    }

    async fn active_quest(&self) -> Option<String> {
        self.orchestrator.status().await.quest_id
    }

    fn position(&self, predicate: impl Fn(&ExecutorCall) -> bool) -> Option<usize> {
        self.executor.calls().iter().position(predicate)
    }
}

/// Poll the status on virtual time until `condition` holds or ~10 minutes pass.
async fn wait_for(h: &TestHarness, condition: impl Fn(&SessionStatus) -> bool) -> bool {
    for _ in 0..6_000 {
        if condition(&h.orchestrator.status().await) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

fn drain(rx: &mut broadcast::Receiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_local_progress_never_lags_authoritative() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator.start_video("v1", 6000.0, 0.0).await.unwrap();

    let mut previous_local = 0.0;
    for pushed in [5.0, 3.0, 20.0, 60.0, 55.0, 90.0] {
        h.bus.publish(ExecutorSignal::Progress(pushed));

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(250)).await;
            let status = h.orchestrator.status().await;
            assert!(status.local_progress_pct >= status.authoritative_progress_pct);
            assert!(status.local_progress_pct <= 100.0);
            assert!(status.local_progress_pct >= previous_local);
            previous_local = status.local_progress_pct;
        }
    }

    let status = h.orchestrator.status().await;
    assert_eq!(status.authoritative_progress_pct, 90.0);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_progress_caps_at_hundred() {
    let h = TestHarness::new(MockGateway::new()).await;
    // 7x speed over a 60s target saturates in under 9 seconds
    h.orchestrator.start_video("v1", 60.0, 0.0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;

    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Active);
    assert_eq!(status.local_progress_pct, 100.0);
    assert_eq!(status.authoritative_progress_pct, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_new_start_supersedes_active_session() {
    let h = TestHarness::new(MockGateway::new()).await;
    let mut events = h.orchestrator.subscribe_events();

    h.orchestrator.start_video("a", 600.0, 0.0).await.unwrap();
    h.orchestrator.start_video("b", 600.0, 0.0).await.unwrap();

    let stop_idx = h
        .position(|c| *c == ExecutorCall::StopTask)
        .expect("previous session was stopped");
    let start_b_idx = h
        .position(|c| matches!(c, ExecutorCall::StartDuration { quest_id, .. } if quest_id == "b"))
        .expect("second session started");
    assert!(stop_idx < start_b_idx);

    let events = drain(&mut events);
    let stopped_a = events.iter().position(|e| {
        matches!(e, OrchestratorEvent::SessionStopped { quest_id, reason }
            if quest_id == "a" && *reason == StopReason::Superseded)
    });
    let started_b = events.iter().position(|e| {
        matches!(e, OrchestratorEvent::SessionStarted { quest_id, .. } if quest_id == "b")
    });
    assert!(stopped_a.unwrap() < started_b.unwrap());
    assert_eq!(h.active_quest().await.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn test_video_queue_advances_on_completion() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator
        .enqueue(QueueKind::Video, fixtures::video_quest("a", 600.0, 0.0))
        .await;
    h.orchestrator
        .enqueue(QueueKind::Video, fixtures::video_quest("b", 600.0, 0.0))
        .await;

    h.orchestrator.start_queue(QueueKind::Video).await.unwrap();
    assert_eq!(h.active_quest().await.as_deref(), Some("a"));

    h.bus.publish(ExecutorSignal::Complete);
    assert!(wait_for(&h, |s| s.quest_id.as_deref() == Some("b")).await);

    let queue = h.orchestrator.queue_status(QueueKind::Video).await;
    assert!(queue.running);
    assert_eq!(queue.quest_ids, vec!["b"]);

    h.bus.publish(ExecutorSignal::Complete);
    assert!(wait_for(&h, |s| s.phase == SessionPhase::Idle && !s.video_queue.running).await);

    let queue = h.orchestrator.queue_status(QueueKind::Video).await;
    assert!(queue.quest_ids.is_empty());
    assert!(!queue.running);
    // Completion never flushes progress
    assert_eq!(
        h.executor.count(|c| matches!(c, ExecutorCall::ForceSubmit { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_queue_skips_completed_and_failed_heads() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator
        .enqueue(
            QueueKind::Video,
            fixtures::completed(fixtures::video_quest("done", 600.0, 600.0)),
        )
        .await;
    h.orchestrator
        .enqueue(QueueKind::Video, fixtures::video_quest("broken", 600.0, 0.0))
        .await;
    h.orchestrator
        .enqueue(QueueKind::Video, fixtures::video_quest("good", 600.0, 0.0))
        .await;

    // The first start call (for "broken") is rejected
    h.executor
        .fail_next(questline_core::ExecutorError::Rejected("expired".to_string()));
    h.orchestrator.start_queue(QueueKind::Video).await.unwrap();

    assert_eq!(h.active_quest().await.as_deref(), Some("good"));
    let queue = h.orchestrator.queue_status(QueueKind::Video).await;
    assert_eq!(queue.quest_ids, vec!["good"]);
    assert!(queue.running);
}

#[tokio::test(start_paused = true)]
async fn test_clearing_idle_queue_halts_running_queue() {
    let h = TestHarness::new(MockGateway::new()).await;
    for id in ["v1", "v2"] {
        h.orchestrator
            .enqueue(QueueKind::Video, fixtures::video_quest(id, 600.0, 0.0))
            .await;
    }
    h.orchestrator.start_queue(QueueKind::Video).await.unwrap();
    assert_eq!(h.active_quest().await.as_deref(), Some("v1"));

    h.orchestrator.clear_queue(QueueKind::Play).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Idle);
    assert!(!status.video_queue.running);
    assert_eq!(status.video_queue.quest_ids, vec!["v1", "v2"]);

    // The halted queue can be started again from its head
    h.orchestrator.start_queue(QueueKind::Video).await.unwrap();
    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Active);
    assert_eq!(status.quest_id.as_deref(), Some("v1"));
    assert!(status.video_queue.running);
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_idle_is_noop() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator
        .enqueue(QueueKind::Video, fixtures::video_quest("a", 600.0, 0.0))
        .await;

    assert!(!h.orchestrator.stop().await);

    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Idle);
    assert_eq!(status.video_queue.quest_ids, vec!["a"]);
    assert!(h.executor.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_video_start_progress_and_reset_on_completion() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator.start_video("v1", 600.0, 150.0).await.unwrap();

    assert_eq!(
        h.executor.calls()[0],
        ExecutorCall::StartDuration {
            quest_id: "v1".to_string(),
            target_seconds: 600.0,
            initial_progress_pct: 25.0,
            speed_multiplier: 7,
            heartbeat_interval_secs: 3,
        }
    );

    h.bus.publish(ExecutorSignal::Complete);
    assert!(wait_for(&h, |s| s.phase == SessionPhase::Idle).await);

    let status = h.orchestrator.status().await;
    assert!(status.quest_id.is_none());
    assert!(status.kind.is_none());
    assert_eq!(status.authoritative_progress_pct, 0.0);
    assert_eq!(status.local_progress_pct, 0.0);
    assert_eq!(status.target_seconds, 0.0);
    assert!(status.bound_executable.is_none());

    // Aborted forwarders drop their receivers on the next scheduler pass
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.bus.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_mode_skips_catalog_and_executable() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator
        .set_game_mode(GameQuestMode::Heartbeat)
        .await
        .unwrap();

    let quest = fixtures::play_quest("g1", "123", 300.0, 0.0);
    h.orchestrator.start_play(&quest, 300.0, 0.0).await.unwrap();

    assert_eq!(
        h.executor.calls(),
        vec![ExecutorCall::StartHeartbeat {
            quest_id: "g1".to_string(),
            app_id: "123".to_string(),
            target_seconds: 300.0,
            initial_progress_pct: 0.0,
        }]
    );
    assert_eq!(h.gateway.catalog_calls(), 0);
    assert_eq!(
        h.orchestrator.status().await.kind,
        Some(QuestKind::GameHeartbeat)
    );
}

#[tokio::test(start_paused = true)]
async fn test_simulate_mode_call_order() {
    let gateway = MockGateway::new().with_catalog(vec![fixtures::detectable_app(
        "123",
        "Some Game",
        "somegame.exe",
    )]);
    let h = TestHarness::new(gateway).await;

    let quest = fixtures::play_quest("g1", "123", 300.0, 0.0);
    h.orchestrator.start_play(&quest, 300.0, 0.0).await.unwrap();

    assert_eq!(h.gateway.catalog_calls(), 1);
    assert_eq!(
        h.executor.call_names(),
        vec![
            "create_fake_executable",
            "launch_fake_executable",
            "open_activity_presence"
        ]
    );

    let calls = h.executor.calls();
    assert_eq!(
        calls[0],
        ExecutorCall::CreateExecutable {
            install_path: "/tmp/questline-games".to_string(),
            executable_name: "somegame.exe".to_string(),
            app_id: "123".to_string(),
        }
    );
    let ExecutorCall::OpenPresence {
        activity_json,
        action,
    } = &calls[2]
    else {
        panic!("expected presence call, got {:?}", calls[2]);
    };
    assert_eq!(action, "connect");
    let activity: serde_json::Value = serde_json::from_str(activity_json).unwrap();
    assert_eq!(activity["app_id"], "123");
    assert_eq!(activity["details"], "Playing Some Game");

    let status = h.orchestrator.status().await;
    assert_eq!(status.kind, Some(QuestKind::GameSimulated));
    assert_eq!(status.bound_executable.as_deref(), Some("somegame.exe"));
}

#[tokio::test(start_paused = true)]
async fn test_catalog_miss_aborts_before_executable() {
    let h = TestHarness::new(MockGateway::new()).await;

    let quest = fixtures::play_quest("g1", "123", 300.0, 0.0);
    let err = h
        .orchestrator
        .start_play(&quest, 300.0, 0.0)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::CatalogMiss(_)));
    assert!(h.executor.calls().is_empty());
    assert_eq!(h.phase().await, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_missing_platform_executable_aborts_before_executable() {
    // Listed in the catalog, but only with a linux build
    let gateway = MockGateway::new().with_catalog(vec![DetectableApplication {
        id: "123".to_string(),
        name: "Some Game".to_string(),
        executables: vec![ApplicationExecutable {
            name: "somegame".to_string(),
            os: "linux".to_string(),
        }],
    }]);
    let h = TestHarness::new(gateway).await;

    let quest = fixtures::play_quest("g1", "123", 300.0, 0.0);
    let err = h
        .orchestrator
        .start_play(&quest, 300.0, 0.0)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::CatalogMiss(_)));
    assert_eq!(h.gateway.catalog_calls(), 1);
    assert_eq!(
        h.executor
            .count(|c| matches!(c, ExecutorCall::CreateExecutable { .. })),
        0
    );
    assert!(h.executor.calls().is_empty());
    assert_eq!(h.phase().await, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_cleans_up_executable() {
    let gateway = MockGateway::new().with_catalog(vec![fixtures::detectable_app(
        "123",
        "Some Game",
        "somegame.exe",
    )]);
    let h = TestHarness::new(gateway).await;
    h.executor
        .fail_on("launch_fake_executable", "spawn failed");

    let quest = fixtures::play_quest("g1", "123", 300.0, 0.0);
    let err = h
        .orchestrator
        .start_play(&quest, 300.0, 0.0)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::StartFailure { .. }));
    assert_eq!(
        h.executor.call_names(),
        vec![
            "create_fake_executable",
            "launch_fake_executable",
            "terminate_fake_executable"
        ]
    );
    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Idle);
    assert!(status.bound_executable.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_force_submits_once_before_stop_task() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator.start_video("v1", 600.0, 240.0).await.unwrap();
    assert_eq!(h.orchestrator.status().await.local_progress_pct, 40.0);

    assert!(h.orchestrator.stop().await);
    // A second stop finds nothing to do
    assert!(!h.orchestrator.stop().await);

    let submits: Vec<_> = h
        .executor
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ExecutorCall::ForceSubmit { .. }))
        .collect();
    assert_eq!(
        submits,
        vec![ExecutorCall::ForceSubmit {
            quest_id: "v1".to_string(),
            elapsed_seconds: 240.0,
        }]
    );

    let submit_idx = h
        .position(|c| matches!(c, ExecutorCall::ForceSubmit { .. }))
        .unwrap();
    let stop_idx = h.position(|c| *c == ExecutorCall::StopTask).unwrap();
    assert!(submit_idx < stop_idx);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_swallows_failures() {
    let gateway = MockGateway::new().with_catalog(vec![fixtures::detectable_app(
        "123",
        "Some Game",
        "somegame.exe",
    )]);
    let h = TestHarness::new(gateway).await;
    let quest = fixtures::play_quest("g1", "123", 300.0, 0.0);
    h.orchestrator.start_play(&quest, 300.0, 0.0).await.unwrap();

    h.executor.fail_on("terminate_fake_executable", "not running");
    h.executor.fail_on("emit_disconnect", "not connected");
    h.executor.fail_on("stop_task", "no quest running");

    assert!(h.orchestrator.stop().await);

    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Idle);
    assert!(status.last_error.is_none());
    assert_eq!(
        h.executor.count(|c| *c == ExecutorCall::StopTask),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_late_error_after_teardown_is_ignored() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator.start_video("v1", 600.0, 0.0).await.unwrap();
    assert!(h.orchestrator.stop().await);

    h.bus.publish(ExecutorSignal::Error("late failure".to_string()));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let status = h.orchestrator.status().await;
    assert_eq!(status.phase, SessionPhase::Idle);
    assert!(status.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_error_after_completion_is_ignored() {
    let h = TestHarness::new(MockGateway::new()).await;
    let mut events = h.orchestrator.subscribe_events();
    h.orchestrator.start_video("v1", 600.0, 0.0).await.unwrap();

    h.bus.publish(ExecutorSignal::Complete);
    assert!(wait_for(&h, |s| s.phase == SessionPhase::Idle).await);

    h.bus.publish(ExecutorSignal::Error("stale".to_string()));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stops: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            OrchestratorEvent::SessionStopped { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(stops, vec![StopReason::Completed]);
    assert!(h.orchestrator.status().await.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_executor_error_clears_without_flush() {
    let h = TestHarness::new(MockGateway::new()).await;
    h.orchestrator.start_video("v1", 600.0, 300.0).await.unwrap();

    h.bus.publish(ExecutorSignal::Error("heartbeat rejected".to_string()));
    assert!(wait_for(&h, |s| s.phase == SessionPhase::Idle).await);

    let status = h.orchestrator.status().await;
    assert_eq!(status.last_error.as_deref(), Some("heartbeat rejected"));
    assert_eq!(
        h.executor.count(|c| matches!(c, ExecutorCall::ForceSubmit { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_poll_detects_completion() {
    let gateway = MockGateway::new().with_quests(vec![fixtures::stream_quest("s1", 900.0, 0.0)]);
    let h = TestHarness::new(gateway).await;
    h.orchestrator.set_polling_interval(5).await.unwrap();
    let mut events = h.orchestrator.subscribe_events();

    h.orchestrator
        .start_stream("s1", "key", 900.0, 0.0)
        .await
        .unwrap();

    // First poll only sees progress
    h.gateway
        .update_quest("s1", |q| *q = fixtures::with_progress(q.clone(), 450.0));
    assert!(wait_for(&h, |s| s.authoritative_progress_pct == 50.0).await);

    h.gateway
        .update_quest("s1", |q| *q = fixtures::completed(q.clone()));
    assert!(wait_for(&h, |s| s.phase == SessionPhase::Idle).await);

    let stopped = drain(&mut events).into_iter().any(|e| {
        matches!(e, OrchestratorEvent::SessionStopped { reason: StopReason::AutoDetected, .. })
    });
    assert!(stopped);
}

#[tokio::test(start_paused = true)]
async fn test_poll_completion_advances_play_queue() {
    let gateway = MockGateway::new().with_quests(vec![
        fixtures::play_quest("g1", "1", 300.0, 0.0),
        fixtures::play_quest("g2", "2", 300.0, 0.0),
    ]);
    let h = TestHarness::new(gateway).await;
    h.orchestrator
        .set_game_mode(GameQuestMode::Heartbeat)
        .await
        .unwrap();
    h.orchestrator.refresh_quests(false).await.unwrap();

    for id in ["g1", "g2"] {
        assert!(h.orchestrator.enqueue_by_id(QueueKind::Play, id).await.unwrap());
    }
    h.orchestrator.start_queue(QueueKind::Play).await.unwrap();
    assert_eq!(h.active_quest().await.as_deref(), Some("g1"));

    h.gateway
        .update_quest("g1", |q| *q = fixtures::completed(q.clone()));
    assert!(wait_for(&h, |s| s.quest_id.as_deref() == Some("g2")).await);

    let queue = h.orchestrator.queue_status(QueueKind::Play).await;
    assert_eq!(queue.quest_ids, vec!["g2"]);
}
