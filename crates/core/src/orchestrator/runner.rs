//! Quest orchestrator implementation.
//!
//! Drives one quest session at a time:
//! - Start: supersede any live session, launch on the executor, then arm
//!   listeners, the progress simulator and (for kinds that need it) the poller.
//! - Signals: executor pushes and poll results are funnelled through one
//!   inbox and applied only if they belong to the live session.
//! - Stop: flush, terminate, disconnect, stop, clear, disarm. Never fails.
//! - Queues: a finished session advances the running queue after a settle delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::executor::{
    ExecutorError, QuestGateway, SessionSignal, SignalEnvelope, SignalKind, SignalSink,
    SignalSource, Subscription, TaskExecutor,
};
use crate::metrics;
use crate::preferences::{GameQuestMode, PreferenceStore, Preferences};
use crate::quest::{Quest, QuestSnapshot, QuestTaskType};

use super::config::OrchestratorConfig;
use super::polling::{self, PollVerdict};
use super::queue::QueueSet;
use super::recovery::{recover_executable, resolve_executable};
use super::session::{progress_pct, Session, SessionMachine, TickOutcome};
use super::simulator::ProgressSimulator;
use super::timer::TimerSlot;
use super::types::{
    EnrollmentSummary, OrchestratorError, OrchestratorEvent, QueueKind, QueueStatus, QuestKind,
    SessionPhase, SessionStatus, StopReason,
};

/// How a session is launched on the executor.
#[derive(Debug, Clone)]
enum Launch {
    Video,
    Stream { stream_key: String },
    Heartbeat { app_id: String },
    Simulated { app_id: String },
}

impl Launch {
    fn kind(&self) -> QuestKind {
        match self {
            Launch::Video => QuestKind::Video,
            Launch::Stream { .. } => QuestKind::Stream,
            Launch::Heartbeat { .. } => QuestKind::GameHeartbeat,
            Launch::Simulated { .. } => QuestKind::GameSimulated,
        }
    }
}

#[derive(Debug, Clone)]
struct StartRequest {
    quest_id: String,
    launch: Launch,
    target_seconds: f64,
    initial_progress_seconds: f64,
}

impl StartRequest {
    fn new(quest_id: &str, launch: Launch, target_seconds: f64, initial: f64) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            launch,
            target_seconds,
            initial_progress_seconds: initial,
        }
    }
}

/// Who asked for a start. Manual starts take the session away from a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOrigin {
    Manual,
    Queue,
}

/// One subscription slot per signal kind.
#[derive(Debug, Default)]
struct ListenerSlots {
    progress: Option<Subscription>,
    complete: Option<Subscription>,
    error: Option<Subscription>,
}

impl ListenerSlots {
    /// Unsubscribe every occupied slot. Returns how many were released.
    fn release(&mut self) -> usize {
        let mut released = 0;
        for slot in [&mut self.progress, &mut self.complete, &mut self.error] {
            if let Some(subscription) = slot.take() {
                subscription.unsubscribe();
                released += 1;
            }
        }
        released
    }

    fn is_empty(&self) -> bool {
        self.progress.is_none() && self.complete.is_none() && self.error.is_none()
    }
}

#[derive(Debug)]
struct SessionTimers {
    simulator: TimerSlot,
    poller: TimerSlot,
}

impl SessionTimers {
    fn new() -> Self {
        Self {
            simulator: TimerSlot::new("simulator"),
            poller: TimerSlot::new("poller"),
        }
    }

    fn disarm_all(&mut self) {
        self.simulator.disarm();
        self.poller.disarm();
    }
}

fn progress_event(session: &Session) -> OrchestratorEvent {
    OrchestratorEvent::SessionProgress {
        quest_id: session.quest_id.clone(),
        authoritative_pct: session.authoritative_pct,
        local_pct: session.local_pct,
    }
}

struct Inner {
    config: OrchestratorConfig,
    gateway: Arc<dyn QuestGateway>,
    executor: Arc<dyn TaskExecutor>,
    signals: Arc<dyn SignalSource>,
    store: Arc<dyn PreferenceStore>,

    /// Serializes start and stop. Taken before `session`.
    lifecycle: Mutex<()>,
    session: Mutex<SessionMachine>,
    timers: Mutex<SessionTimers>,
    listeners: Mutex<ListenerSlots>,
    queues: Mutex<QueueSet>,
    quests: RwLock<QuestSnapshot>,
    preferences: RwLock<Preferences>,
    loading: AtomicBool,
    last_error: RwLock<Option<String>>,

    events: broadcast::Sender<OrchestratorEvent>,
    signal_tx: mpsc::UnboundedSender<SignalEnvelope>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<SignalEnvelope>>>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// The quest orchestrator. Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct QuestOrchestrator {
    inner: Arc<Inner>,
}

impl QuestOrchestrator {
    /// Create a new orchestrator.
    ///
    /// Preferences are read from `store` once; `defaults` apply when nothing
    /// has been saved yet or the store cannot be read.
    pub fn new(
        config: OrchestratorConfig,
        gateway: Arc<dyn QuestGateway>,
        executor: Arc<dyn TaskExecutor>,
        signals: Arc<dyn SignalSource>,
        store: Arc<dyn PreferenceStore>,
        defaults: Preferences,
    ) -> Self {
        let preferences = match store.load() {
            Ok(Some(saved)) => match saved.validate() {
                Ok(()) => saved,
                Err(e) => {
                    warn!("Ignoring saved preferences: {}", e);
                    defaults
                }
            },
            Ok(None) => defaults,
            Err(e) => {
                warn!("Failed to load preferences, using defaults: {}", e);
                defaults
            }
        };

        let (events, _) = broadcast::channel(256);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            inner: Arc::new(Inner {
                config,
                gateway,
                executor,
                signals,
                store,
                lifecycle: Mutex::new(()),
                session: Mutex::new(SessionMachine::new()),
                timers: Mutex::new(SessionTimers::new()),
                listeners: Mutex::new(ListenerSlots::default()),
                queues: Mutex::new(QueueSet::default()),
                quests: RwLock::new(QuestSnapshot::default()),
                preferences: RwLock::new(preferences),
                loading: AtomicBool::new(false),
                last_error: RwLock::new(None),
                events,
                signal_tx,
                signal_rx: Mutex::new(Some(signal_rx)),
                running: AtomicBool::new(false),
                shutdown_tx,
            }),
        }
    }

    /// Start the orchestrator (spawns the signal loop).
    pub async fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!("Starting quest orchestrator");

        let Some(rx) = self.inner.signal_rx.lock().await.take() else {
            warn!("Signal loop is still shutting down");
            self.inner.running.store(false, Ordering::SeqCst);
            return;
        };
        self.spawn_signal_loop(rx);

        info!("Quest orchestrator started");
    }

    /// Stop the orchestrator gracefully, tearing down any live session.
    pub async fn shutdown(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping quest orchestrator");

        {
            let _guard = self.inner.lifecycle.lock().await;
            self.inner.halt_running_queue(false).await;
            self.inner.teardown(StopReason::Shutdown).await;
        }

        // Signal shutdown to the signal loop
        let _ = self.inner.shutdown_tx.send(());

        info!("Quest orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Relaxed)
    }

    fn spawn_signal_loop(&self, mut rx: mpsc::UnboundedReceiver<SignalEnvelope>) {
        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Signal loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Signal loop received shutdown signal");
                        break;
                    }
                    envelope = rx.recv() => {
                        match envelope {
                            Some(envelope) => inner.handle_signal(envelope).await,
                            None => break,
                        }
                    }
                }
            }
            // Hand the inbox back so a later start() can resume
            *inner.signal_rx.lock().await = Some(rx);
            info!("Signal loop stopped");
        });
    }

    /// Current session, queue and flag snapshot.
    pub async fn status(&self) -> SessionStatus {
        let inner = &self.inner;
        let mut status = SessionStatus::default();

        {
            let machine = inner.session.lock().await;
            status.phase = machine.phase();
            status.stopping = machine.phase() == SessionPhase::Stopping;
            if let Some(session) = machine.session() {
                status.quest_id = Some(session.quest_id.clone());
                status.kind = Some(session.kind);
                status.authoritative_progress_pct = session.authoritative_pct;
                status.local_progress_pct = session.local_pct;
                status.target_seconds = session.target_seconds;
                status.bound_executable = session.bound_executable.clone();
            }
        }

        status.loading = inner.loading.load(Ordering::Relaxed);
        status.last_error = inner.last_error.read().await.clone();

        let queues = inner.queues.lock().await;
        status.video_queue = queues.get(QueueKind::Video).status();
        status.play_queue = queues.get(QueueKind::Play).status();
        status
    }

    /// Subscribe to change notifications.
    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Quest list
    // =========================================================================

    /// The current quest snapshot.
    pub async fn quests(&self) -> QuestSnapshot {
        self.inner.quests.read().await.clone()
    }

    /// Re-fetch the quest list. Silent refreshes leave the loading flag alone.
    pub async fn refresh_quests(&self, silent: bool) -> Result<QuestSnapshot, OrchestratorError> {
        self.inner.refresh_quests(silent).await
    }

    /// Enroll in one quest and patch the local snapshot.
    pub async fn enroll(&self, quest_id: &str) -> Result<(), OrchestratorError> {
        self.inner.enroll(quest_id).await
    }

    /// Enroll in each quest in turn. Failures are counted, not propagated.
    pub async fn enroll_all(&self, quest_ids: &[String]) -> EnrollmentSummary {
        let inner = &self.inner;
        let delay = Duration::from_millis(inner.config.enroll_delay_ms);
        let mut summary = EnrollmentSummary::default();

        inner.loading.store(true, Ordering::Relaxed);
        for (idx, quest_id) in quest_ids.iter().enumerate() {
            match inner.enroll(quest_id).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    if idx + 1 < quest_ids.len() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!("Failed to enroll in quest {}: {}", quest_id, e);
                    summary.failed += 1;
                }
            }
        }
        inner.loading.store(false, Ordering::Relaxed);

        if summary.failed > 0 {
            *inner.last_error.write().await = Some(format!(
                "Enrolled in {} quests, failed {}",
                summary.succeeded, summary.failed
            ));
        }
        info!(
            "Bulk enrollment finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        summary
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Start a duration ("video") session.
    pub async fn start_video(
        &self,
        quest_id: &str,
        target_seconds: f64,
        initial_progress_seconds: f64,
    ) -> Result<(), OrchestratorError> {
        let request =
            StartRequest::new(quest_id, Launch::Video, target_seconds, initial_progress_seconds);
        self.inner.start_session(request, StartOrigin::Manual).await
    }

    /// Start a stream session.
    pub async fn start_stream(
        &self,
        quest_id: &str,
        stream_key: &str,
        target_seconds: f64,
        initial_progress_seconds: f64,
    ) -> Result<(), OrchestratorError> {
        let launch = Launch::Stream {
            stream_key: stream_key.to_string(),
        };
        let request = StartRequest::new(quest_id, launch, target_seconds, initial_progress_seconds);
        self.inner.start_session(request, StartOrigin::Manual).await
    }

    /// Start a play session in the configured game mode.
    pub async fn start_play(
        &self,
        quest: &Quest,
        target_seconds: f64,
        initial_progress_seconds: f64,
    ) -> Result<(), OrchestratorError> {
        let request = self
            .inner
            .play_request(quest, target_seconds, initial_progress_seconds)
            .await?;
        self.inner.start_session(request, StartOrigin::Manual).await
    }

    /// Start a quest from the current snapshot, picking the session kind from
    /// its task type and the target and progress from its record.
    pub async fn start_quest(
        &self,
        quest_id: &str,
        stream_key: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let quest = self
            .inner
            .quests
            .read()
            .await
            .find(quest_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::QuestNotFound(quest_id.to_string()))?;

        let target = quest.target_seconds();
        let initial = quest.progress_seconds();

        match quest.task_type() {
            QuestTaskType::Video => self.start_video(&quest.id, target, initial).await,
            QuestTaskType::Stream => {
                self.start_stream(&quest.id, stream_key.unwrap_or_default(), target, initial)
                    .await
            }
            QuestTaskType::Play => self.start_play(&quest, target, initial).await,
            QuestTaskType::Unknown => Err(OrchestratorError::UnsupportedTask {
                quest_id: quest.id.clone(),
                task_type: QuestTaskType::Unknown.as_str().to_string(),
            }),
        }
    }

    /// Stop the live session on the user's behalf.
    ///
    /// Halts (and empties) a running queue. Returns false, touching nothing,
    /// when no session is active.
    pub async fn stop(&self) -> bool {
        let inner = &self.inner;
        let _guard = inner.lifecycle.lock().await;

        if inner.session.lock().await.phase() != SessionPhase::Active {
            debug!("Stop requested with no active session");
            return false;
        }

        inner.halt_running_queue(true).await;
        inner.teardown(StopReason::UserRequested).await.is_some()
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Append a quest to a queue. Returns false if it was already queued.
    pub async fn enqueue(&self, kind: QueueKind, quest: Quest) -> bool {
        let quest_id = quest.id.clone();
        let (added, status) = {
            let mut queues = self.inner.queues.lock().await;
            let queue = queues.get_mut(kind);
            (queue.enqueue(quest), queue.status())
        };

        if added {
            debug!("Queued quest {} on {} queue", quest_id, kind);
            self.inner.emit_queue_changed(kind, &status);
        }
        added
    }

    /// Append a quest from the current snapshot to a queue.
    pub async fn enqueue_by_id(
        &self,
        kind: QueueKind,
        quest_id: &str,
    ) -> Result<bool, OrchestratorError> {
        let quest = self
            .inner
            .quests
            .read()
            .await
            .find(quest_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::QuestNotFound(quest_id.to_string()))?;
        Ok(self.enqueue(kind, quest).await)
    }

    pub async fn queue_status(&self, kind: QueueKind) -> QueueStatus {
        self.inner.queues.lock().await.get(kind).status()
    }

    /// Set a queue running and start its first pending item.
    ///
    /// Fails with `QueueBusy` while the other queue runs.
    pub async fn start_queue(&self, kind: QueueKind) -> Result<(), OrchestratorError> {
        let status = {
            let mut queues = self.inner.queues.lock().await;
            match queues.running() {
                Some(running) if running != kind => {
                    return Err(OrchestratorError::QueueBusy(running));
                }
                Some(_) => {
                    debug!("{} queue already running", kind);
                    return Ok(());
                }
                None => {}
            }
            let queue = queues.get_mut(kind);
            queue.set_running(true);
            queue.status()
        };

        info!("Starting {} queue with {} items", kind, status.quest_ids.len());
        self.inner.emit_queue_changed(kind, &status);
        self.inner.process_queue(kind).await;
        Ok(())
    }

    /// Empty a queue, clear its running flag and stop any live session.
    ///
    /// If the other queue owns the session it is halted with its entries
    /// kept, so a later `start_queue` picks up from its head.
    pub async fn clear_queue(&self, kind: QueueKind) {
        let inner = &self.inner;
        let _guard = inner.lifecycle.lock().await;

        let status = {
            let mut queues = inner.queues.lock().await;
            let queue = queues.get_mut(kind);
            queue.clear();
            queue.status()
        };
        info!("Cleared {} queue", kind);
        inner.emit_queue_changed(kind, &status);

        inner.halt_running_queue(false).await;
        inner.teardown(StopReason::QueueCleared).await;
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub async fn preferences(&self) -> Preferences {
        self.inner.preferences.read().await.clone()
    }

    /// Validate, persist and apply new preferences.
    ///
    /// A changed polling interval re-arms a running poller.
    pub async fn update_preferences(
        &self,
        preferences: Preferences,
    ) -> Result<(), OrchestratorError> {
        preferences.validate()?;

        let previous_polling = {
            let mut current = self.inner.preferences.write().await;
            self.inner.store.save(&preferences)?;
            let previous = current.polling_interval_secs;
            *current = preferences.clone();
            previous
        };
        info!("Preferences updated: {:?}", preferences);

        if previous_polling != preferences.polling_interval_secs {
            self.inner.rearm_poller().await;
        }
        Ok(())
    }

    pub async fn set_speed_multiplier(&self, speed: u32) -> Result<(), OrchestratorError> {
        let mut preferences = self.preferences().await;
        preferences.speed_multiplier = speed;
        self.update_preferences(preferences).await
    }

    pub async fn set_heartbeat_interval(&self, secs: u64) -> Result<(), OrchestratorError> {
        let mut preferences = self.preferences().await;
        preferences.heartbeat_interval_secs = secs;
        self.update_preferences(preferences).await
    }

    pub async fn set_polling_interval(&self, secs: u64) -> Result<(), OrchestratorError> {
        let mut preferences = self.preferences().await;
        preferences.polling_interval_secs = secs;
        self.update_preferences(preferences).await
    }

    pub async fn set_game_mode(&self, mode: GameQuestMode) -> Result<(), OrchestratorError> {
        let mut preferences = self.preferences().await;
        preferences.game_mode = mode;
        self.update_preferences(preferences).await
    }
}

impl Inner {
    fn emit(&self, event: OrchestratorEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn emit_queue_changed(&self, queue: QueueKind, status: &QueueStatus) {
        self.emit(OrchestratorEvent::QueueChanged {
            queue,
            running: status.running,
            length: status.quest_ids.len(),
        });
    }

    async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }

    async fn refresh_quests(&self, silent: bool) -> Result<QuestSnapshot, OrchestratorError> {
        if !silent {
            self.loading.store(true, Ordering::Relaxed);
        }
        let result = self.gateway.list_quests().await;
        if !silent {
            self.loading.store(false, Ordering::Relaxed);
        }

        match result {
            Ok(quests) => {
                let snapshot = QuestSnapshot::new(quests);
                *self.quests.write().await = snapshot.clone();
                debug!("Fetched {} quests from {}", snapshot.len(), self.gateway.name());
                self.emit(OrchestratorEvent::QuestsRefreshed {
                    count: snapshot.len(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!("Failed to fetch quests: {}", e);
                self.record_error(e.to_string()).await;
                Err(e.into())
            }
        }
    }

    fn spawn_refresh(self: &Arc<Self>, silent: bool) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            // Failure is already recorded as last_error
            let _ = inner.refresh_quests(silent).await;
        });
    }

    async fn enroll(&self, quest_id: &str) -> Result<(), OrchestratorError> {
        if let Err(e) = self.gateway.enroll_in_task(quest_id).await {
            self.record_error(e.to_string()).await;
            return Err(e.into());
        }

        let mut quests = self.quests.write().await;
        *quests = quests.with_enrollment(quest_id, Utc::now());
        info!("Enrolled in quest {}", quest_id);
        Ok(())
    }

    async fn play_request(
        &self,
        quest: &Quest,
        target_seconds: f64,
        initial_progress_seconds: f64,
    ) -> Result<StartRequest, OrchestratorError> {
        let app_id = quest
            .application_id()
            .ok_or_else(|| OrchestratorError::MissingApplication(quest.id.clone()))?
            .to_string();

        let launch = match self.preferences.read().await.game_mode {
            GameQuestMode::Heartbeat => Launch::Heartbeat { app_id },
            GameQuestMode::Simulate => Launch::Simulated { app_id },
        };
        Ok(StartRequest::new(
            &quest.id,
            launch,
            target_seconds,
            initial_progress_seconds,
        ))
    }

    // =========================================================================
    // Start path
    // =========================================================================

    async fn start_session(
        self: &Arc<Self>,
        request: StartRequest,
        origin: StartOrigin,
    ) -> Result<(), OrchestratorError> {
        if origin == StartOrigin::Manual {
            self.halt_running_queue(false).await;
        }

        let _guard = self.lifecycle.lock().await;

        if let Some(previous) = self.teardown(StopReason::Superseded).await {
            info!(
                "Quest {} superseded by quest {}",
                previous.quest_id, request.quest_id
            );
        }

        let kind = request.launch.kind();
        let Some(epoch) = self
            .session
            .lock()
            .await
            .begin_start(&request.quest_id, kind)
        else {
            return Err(OrchestratorError::SessionBusy);
        };

        let pct = progress_pct(request.initial_progress_seconds, request.target_seconds);
        info!(
            "Starting {} session for quest {} at {:.1}%",
            kind.as_str(),
            request.quest_id,
            pct
        );

        if let Err(e) = self.launch(&request, pct).await {
            let orphan = self.session.lock().await.abort_start();
            if let Some(exe) = orphan {
                if let Err(te) = self.executor.terminate_fake_executable(&exe).await {
                    warn!("Failed to clean up executable {}: {}", exe, te);
                }
            }
            error!("Failed to start quest {}: {}", request.quest_id, e);
            metrics::START_FAILURES
                .with_label_values(&[kind.as_str()])
                .inc();
            self.record_error(e.to_string()).await;
            return Err(e);
        }

        let Some(session) = self
            .session
            .lock()
            .await
            .activate(pct, request.target_seconds)
        else {
            return Err(OrchestratorError::SessionBusy);
        };

        self.arm(&session, epoch).await;
        *self.last_error.write().await = None;

        metrics::SESSIONS_STARTED
            .with_label_values(&[kind.as_str()])
            .inc();
        self.emit(OrchestratorEvent::SessionStarted {
            quest_id: session.quest_id.clone(),
            kind,
            progress_pct: session.authoritative_pct,
        });
        info!("Quest {} active", session.quest_id);
        Ok(())
    }

    async fn launch(&self, request: &StartRequest, pct: f64) -> Result<(), OrchestratorError> {
        let quest_id = request.quest_id.as_str();
        let target = request.target_seconds;
        let start_failure = |source: ExecutorError| OrchestratorError::StartFailure {
            quest_id: quest_id.to_string(),
            source,
        };

        match &request.launch {
            Launch::Video => {
                let preferences = self.preferences.read().await.clone();
                self.executor
                    .start_duration_task(
                        quest_id,
                        target,
                        pct,
                        preferences.speed_multiplier,
                        preferences.heartbeat_interval_secs,
                    )
                    .await
                    .map_err(start_failure)
            }
            Launch::Stream { stream_key } => self
                .executor
                .start_stream_task(quest_id, stream_key, target, pct)
                .await
                .map_err(start_failure),
            Launch::Heartbeat { app_id } => self
                .executor
                .start_process_heartbeat_task(quest_id, app_id, target, pct)
                .await
                .map_err(start_failure),
            Launch::Simulated { app_id } => self.launch_simulated(quest_id, app_id).await,
        }
    }

    /// Catalog lookup, then create, launch and announce a stand-in executable.
    async fn launch_simulated(&self, quest_id: &str, app_id: &str) -> Result<(), OrchestratorError> {
        let start_failure = |source: ExecutorError| OrchestratorError::StartFailure {
            quest_id: quest_id.to_string(),
            source,
        };

        let (name, exe) =
            resolve_executable(self.gateway.as_ref(), app_id, &self.config.executable_os).await?;
        let install_path = self
            .config
            .resolved_install_dir()
            .to_string_lossy()
            .into_owned();
        info!("Starting simulated game {} ({})", name, exe);

        self.executor
            .create_fake_executable(&install_path, &exe, app_id)
            .await
            .map_err(start_failure)?;
        self.session.lock().await.bind_executable(&exe);

        self.executor
            .launch_fake_executable(&name, &install_path, &exe, app_id)
            .await
            .map_err(start_failure)?;

        let activity = json!({
            "app_id": app_id,
            "state": "In Game",
            "details": format!("Playing {}", name),
            "largeImageKey": "logo",
            "largeImageText": name,
            "timestamp": Utc::now().timestamp_millis(),
        });
        self.executor
            .open_activity_presence(&activity.to_string(), "connect")
            .await
            .map_err(start_failure)
    }

    /// Subscribe listeners and start the session's timers.
    async fn arm(self: &Arc<Self>, session: &Session, epoch: u64) {
        {
            let mut listeners = self.listeners.lock().await;
            let stale = listeners.release();
            if stale > 0 {
                warn!("Released {} stale signal listeners", stale);
            }
            let sink = SignalSink::new(epoch, self.signal_tx.clone());
            listeners.progress = Some(self.signals.subscribe(SignalKind::Progress, sink.clone()));
            listeners.complete = Some(self.signals.subscribe(SignalKind::Complete, sink.clone()));
            listeners.error = Some(self.signals.subscribe(SignalKind::Error, sink));
        }

        let preferences = self.preferences.read().await.clone();
        let speed = match session.kind {
            QuestKind::Video => preferences.speed_multiplier,
            _ => 1,
        };

        let mut timers = self.timers.lock().await;
        timers
            .simulator
            .arm(self.spawn_simulator(epoch, speed, session.target_seconds));
        if session.kind.needs_polling() {
            timers.poller.arm(self.spawn_poller(
                epoch,
                session.quest_id.clone(),
                preferences.polling_interval_secs,
            ));
        }
    }

    fn spawn_simulator(self: &Arc<Self>, epoch: u64, speed: u32, target: f64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let tick = Duration::from_millis(self.config.tick_interval_ms.max(1));

        tokio::spawn(async move {
            let mut simulator = ProgressSimulator::new(speed, target);
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;

            let mut last_whole = -1_i64;
            loop {
                interval.tick().await;
                let delta = simulator.tick();

                let (outcome, snapshot) = {
                    let mut machine = inner.session.lock().await;
                    if !machine.accepts(epoch) {
                        break;
                    }
                    let outcome = machine.advance_local(delta);
                    (outcome, machine.session().cloned())
                };

                if let Some(session) = snapshot {
                    let whole = session.local_pct.floor() as i64;
                    if whole != last_whole {
                        last_whole = whole;
                        inner.emit(progress_event(&session));
                    }
                }

                if outcome == TickOutcome::Finished {
                    debug!("Simulator finished for session {}", epoch);
                    break;
                }
            }
        })
    }

    fn spawn_poller(self: &Arc<Self>, epoch: u64, quest_id: String, interval_secs: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        let period = Duration::from_secs(interval_secs.max(1));

        tokio::spawn(async move {
            debug!("Polling quest {} every {:?}", quest_id, period);
            loop {
                tokio::time::sleep(period).await;

                let target = {
                    let machine = inner.session.lock().await;
                    if !machine.accepts(epoch) {
                        break;
                    }
                    machine.session().map(|s| s.target_seconds).unwrap_or(0.0)
                };

                let quests = match inner.refresh_quests(true).await {
                    Ok(quests) => quests,
                    Err(e) => {
                        debug!("Poll for quest {} failed: {}", quest_id, e);
                        continue;
                    }
                };
                let Some(quest) = quests.find(&quest_id) else {
                    debug!("Quest {} missing from poll result", quest_id);
                    continue;
                };

                match polling::evaluate(quest, target) {
                    PollVerdict::Completed => {
                        info!("Poll detected completion of quest {}", quest_id);
                        // Teardown disarms this task, so it must not run here
                        let _ = inner.signal_tx.send(SignalEnvelope {
                            epoch,
                            signal: SessionSignal::CompletionDetected,
                        });
                        break;
                    }
                    PollVerdict::Progress(pct) => {
                        let event = {
                            let mut machine = inner.session.lock().await;
                            if !machine.accepts(epoch) {
                                break;
                            }
                            machine.apply_authoritative(pct).map(progress_event)
                        };
                        if let Some(event) = event {
                            inner.emit(event);
                        }
                    }
                    PollVerdict::Unchanged => {}
                }
            }
        })
    }

    /// Replace the armed poller after an interval change.
    async fn rearm_poller(self: &Arc<Self>) {
        let _guard = self.lifecycle.lock().await;

        let live = {
            let machine = self.session.lock().await;
            match machine.session() {
                Some(session) if machine.phase() == SessionPhase::Active => {
                    Some((session.clone(), machine.epoch()))
                }
                _ => None,
            }
        };
        let Some((session, epoch)) = live else {
            return;
        };
        if !session.kind.needs_polling() {
            return;
        }

        let secs = self.preferences.read().await.polling_interval_secs;
        let mut timers = self.timers.lock().await;
        if timers.poller.is_armed() {
            timers
                .poller
                .arm(self.spawn_poller(epoch, session.quest_id.clone(), secs));
            info!("Polling interval changed to {}s", secs);
        }
    }

    // =========================================================================
    // Signals
    // =========================================================================

    async fn handle_signal(self: &Arc<Self>, envelope: SignalEnvelope) {
        let SignalEnvelope { epoch, signal } = envelope;
        debug!(?signal, epoch, "Handling session signal");

        match signal {
            SessionSignal::Progress(pct) => {
                let event = {
                    let mut machine = self.session.lock().await;
                    if !machine.accepts(epoch) {
                        debug!("Ignoring progress for stale session {}", epoch);
                        return;
                    }
                    machine.apply_authoritative(pct).map(progress_event)
                };
                if let Some(event) = event {
                    self.emit(event);
                }
            }
            SessionSignal::Complete => self.finish(epoch, StopReason::Completed, None).await,
            SessionSignal::CompletionDetected => {
                self.finish(epoch, StopReason::AutoDetected, None).await
            }
            SessionSignal::Error(message) => {
                self.finish(epoch, StopReason::ExecutorError, Some(message))
                    .await
            }
        }
    }

    /// Tear down the session identified by `epoch` after it ended on its own.
    async fn finish(self: &Arc<Self>, epoch: u64, reason: StopReason, error: Option<String>) {
        let finished = {
            let _guard = self.lifecycle.lock().await;
            if !self.session.lock().await.accepts(epoch) {
                debug!("Ignoring {} for stale session {}", reason.as_str(), epoch);
                return;
            }
            if let Some(message) = error {
                warn!("Executor reported error: {}", message);
                self.record_error(message).await;
            }
            self.teardown(reason).await
        };

        if let Some(session) = finished {
            if reason.advances_queue() {
                self.advance_queue(&session).await;
            }
        }
    }

    // =========================================================================
    // Stop path
    // =========================================================================

    /// Tear down the active session. Caller holds `lifecycle`.
    ///
    /// Returns the session that was torn down, or `None` if none was active.
    /// Every step is best-effort; the session always ends up cleared.
    async fn teardown(&self, reason: StopReason) -> Option<Session> {
        let session = self.session.lock().await.begin_stop()?;
        info!(
            "Stopping {} session for quest {} ({})",
            session.kind.as_str(),
            session.quest_id,
            reason.as_str()
        );

        // 1. Flush accumulated video progress
        if session.kind == QuestKind::Video
            && reason.submits_progress()
            && session.local_pct > 0.0
            && session.target_seconds > 0.0
        {
            let elapsed = session.local_elapsed_seconds();
            match self
                .executor
                .force_submit_progress(&session.quest_id, elapsed)
                .await
            {
                Ok(()) => {
                    debug!("Submitted {:.0}s for quest {}", elapsed, session.quest_id);
                    metrics::FORCE_SUBMITS.inc();
                }
                Err(e) => warn!(
                    "Failed to submit final progress for quest {}: {}",
                    session.quest_id, e
                ),
            }
        }

        // 2. Terminate the stand-in executable, recovering its name if lost
        let executable = match session.bound_executable.clone() {
            Some(exe) => Some(exe),
            None if session.kind.is_process_backed() => {
                warn!(
                    "No executable bound to quest {}, attempting recovery",
                    session.quest_id
                );
                let quests = self.quests.read().await.clone();
                recover_executable(
                    self.gateway.as_ref(),
                    &quests,
                    &session.quest_id,
                    &self.config.executable_os,
                )
                .await
            }
            None => None,
        };
        if let Some(exe) = executable {
            if let Err(e) = self.executor.terminate_fake_executable(&exe).await {
                warn!("Failed to stop executable {}: {}", exe, e);
            }
            self.session.lock().await.clear_executable();
        }

        // 3. Disconnect activity presence
        if let Err(e) = self.executor.emit_disconnect().await {
            debug!("Disconnect failed: {}", e);
        }

        // 4. Stop the remote task; failure usually means nothing was running
        if let Err(e) = self.executor.stop_task().await {
            debug!("Stop task for quest {} returned: {}", session.quest_id, e);
        }

        // 5. Clear the session
        self.session.lock().await.finish_stop();

        // 6. Disarm timers and listeners
        self.timers.lock().await.disarm_all();
        let mut listeners = self.listeners.lock().await;
        listeners.release();
        debug_assert!(listeners.is_empty());
        drop(listeners);

        metrics::SESSIONS_ENDED
            .with_label_values(&[reason.as_str()])
            .inc();
        self.emit(OrchestratorEvent::SessionStopped {
            quest_id: session.quest_id.clone(),
            reason,
        });
        info!("Quest {} stopped", session.quest_id);
        Some(session)
    }

    // =========================================================================
    // Queue driving
    // =========================================================================

    /// Clear the running flag of whichever queue runs, optionally dropping
    /// its entries too.
    async fn halt_running_queue(&self, drop_entries: bool) {
        let halted = {
            let mut queues = self.queues.lock().await;
            let Some(kind) = queues.running() else {
                return;
            };
            let queue = queues.get_mut(kind);
            if drop_entries {
                queue.clear();
            } else {
                queue.set_running(false);
            }
            (kind, queue.status())
        };

        info!("Halted {} queue", halted.0);
        self.emit_queue_changed(halted.0, &halted.1);
    }

    /// Dequeue the finished head of the running queue and schedule the next.
    async fn advance_queue(self: &Arc<Self>, finished: &Session) {
        let advanced = {
            let mut queues = self.queues.lock().await;
            queues.running().map(|kind| {
                let queue = queues.get_mut(kind);
                if queue.pop_if_head(&finished.quest_id) {
                    metrics::QUEUE_ITEMS
                        .with_label_values(&[kind.as_str(), "finished"])
                        .inc();
                }
                (kind, queue.status())
            })
        };

        match advanced {
            Some((kind, status)) => {
                info!(
                    "{} queue item {} finished, {} remaining",
                    kind,
                    finished.quest_id,
                    status.quest_ids.len()
                );
                self.emit_queue_changed(kind, &status);
                self.spawn_refresh(true);
                self.schedule_queue(kind);
            }
            None => self.spawn_refresh(false),
        }
    }

    /// Process the queue's next head after the settle delay.
    fn schedule_queue(self: &Arc<Self>, kind: QueueKind) {
        let inner = Arc::clone(self);
        let delay = Duration::from_millis(self.config.settle_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.process_queue(kind).await;
        });
    }

    /// Start the first startable head; skip completed heads and drop heads
    /// that fail to start. Clears the running flag once the queue is empty.
    async fn process_queue(self: &Arc<Self>, kind: QueueKind) {
        loop {
            let (head, status) = {
                let mut queues = self.queues.lock().await;
                let queue = queues.get_mut(kind);
                if !queue.is_running() {
                    debug!("{} queue halted, not processing", kind);
                    return;
                }
                let head = queue.head().cloned();
                if head.is_none() {
                    queue.set_running(false);
                }
                (head, queue.status())
            };
            let Some(head) = head else {
                info!("{} queue drained", kind);
                self.emit_queue_changed(kind, &status);
                return;
            };

            if head.is_completed() {
                debug!("Skipping completed quest {} in {} queue", head.id, kind);
                self.drop_head(kind, &head.id, "skipped").await;
                continue;
            }

            let target = head.target_seconds();
            let initial = head.progress_seconds();
            let request = match kind {
                QueueKind::Video => Ok(StartRequest::new(&head.id, Launch::Video, target, initial)),
                QueueKind::Play => self.play_request(&head, target, initial).await,
            };

            let result = match request {
                Ok(request) => self.start_session(request, StartOrigin::Queue).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    metrics::QUEUE_ITEMS
                        .with_label_values(&[kind.as_str(), "started"])
                        .inc();
                    return;
                }
                Err(e) => {
                    warn!("{} queue skipping quest {}: {}", kind, head.id, e);
                    self.drop_head(kind, &head.id, "failed").await;
                }
            }
        }
    }

    async fn drop_head(&self, kind: QueueKind, quest_id: &str, outcome: &str) {
        let status = {
            let mut queues = self.queues.lock().await;
            let queue = queues.get_mut(kind);
            queue.pop_if_head(quest_id);
            queue.status()
        };
        metrics::QUEUE_ITEMS
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
        self.emit_queue_changed(kind, &status);
    }
}
