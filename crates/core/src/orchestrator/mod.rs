//! Quest orchestrator: drives one quest session at a time.
//!
//! - **Session**: a single state machine owns every session field
//! - **Simulator / poller**: cancellable timer loops armed per session
//! - **Queues**: video and play backlogs advanced on completion
//! - **Teardown**: best-effort, always reaches idle

mod config;
mod polling;
mod queue;
mod recovery;
mod runner;
mod session;
mod simulator;
mod timer;
mod types;

pub use config::OrchestratorConfig;
pub use polling::{evaluate as evaluate_poll, PollVerdict};
pub use queue::{QuestQueue, QueueSet};
pub use runner::QuestOrchestrator;
pub use session::{progress_pct, Session, SessionMachine, TickOutcome};
pub use simulator::{increment_pct, ProgressSimulator};
pub use timer::TimerSlot;
pub use types::{
    EnrollmentSummary, OrchestratorError, OrchestratorEvent, QueueKind, QueueStatus, QuestKind,
    SessionPhase, SessionStatus, StopReason,
};
