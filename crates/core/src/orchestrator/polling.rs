//! Authoritative status checks for the active quest.

use crate::quest::Quest;

use super::session::progress_pct;

/// What a status poll says about the active quest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollVerdict {
    /// The quest carries a completion timestamp.
    Completed,
    /// Progress recomputed from the first progress counter.
    Progress(f64),
    /// Nothing usable (no status, no counters, or no target).
    Unchanged,
}

/// Evaluate a freshly fetched quest record against the session target.
pub fn evaluate(quest: &Quest, target_seconds: f64) -> PollVerdict {
    if quest.is_completed() {
        return PollVerdict::Completed;
    }
    if target_seconds <= 0.0 {
        return PollVerdict::Unchanged;
    }
    match quest.first_progress_value() {
        Some(seconds) => PollVerdict::Progress(progress_pct(seconds, target_seconds)),
        None => PollVerdict::Unchanged,
    }
}
