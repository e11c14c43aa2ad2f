use questline_core::{Config, QuestOrchestrator, SanitizedConfig, SignalBus};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: QuestOrchestrator,
    signals: SignalBus,
}

impl AppState {
    pub fn new(config: Config, orchestrator: QuestOrchestrator, signals: SignalBus) -> Self {
        Self {
            config,
            orchestrator,
            signals,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &QuestOrchestrator {
        &self.orchestrator
    }

    /// Where the executor webhook publishes pushed signals.
    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }
}
