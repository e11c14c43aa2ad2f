pub mod config;
pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod preferences;
pub mod quest;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use executor::{
    DetectableApplication, ExecutorError, ExecutorSignal, HttpExecutorClient, QuestGateway,
    SignalBus, SignalSource, TaskExecutor,
};
pub use orchestrator::{
    EnrollmentSummary, OrchestratorConfig, OrchestratorError, OrchestratorEvent, QueueKind,
    QuestKind, QuestOrchestrator, SessionPhase, SessionStatus, StopReason,
};
pub use preferences::{
    GameQuestMode, MemoryPreferenceStore, PreferenceError, PreferenceStore, Preferences,
    SqlitePreferenceStore,
};
pub use quest::{Quest, QuestSnapshot, QuestTaskType};
