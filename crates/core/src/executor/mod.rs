//! Boundary to the remote task executor and status gateway.
//!
//! The orchestrator talks to three collaborators:
//! - [`QuestGateway`]: authoritative quest list, application catalog, enrollment
//! - [`TaskExecutor`]: starts/stops the work itself
//! - [`SignalSource`]: pushed progress / completion / error signals

mod http;
mod signals;
mod types;

pub use http::HttpExecutorClient;
pub use signals::{ExecutorSignal, SignalBus, SignalKind, SignalSink, SignalSource, Subscription};
pub(crate) use signals::{SessionSignal, SignalEnvelope};
pub use types::*;
