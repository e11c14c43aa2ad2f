//! Quest records as reported by the remote status gateway.
//!
//! The orchestrator never mutates a quest in place: the list is held as an
//! immutable [`QuestSnapshot`] and replaced wholesale on refresh, or patched
//! copy-on-write for optimistic enrollment.

mod counters;
mod snapshot;
mod types;

pub use counters::NamedCounters;
pub use snapshot::QuestSnapshot;
pub use types::*;
