//! The session state machine.
//!
//! `SessionMachine` is the only writer of session fields. It is a plain
//! synchronous value; the runner keeps it behind a lock and never holds that
//! lock across a remote call.
//!
//! Phases: `Idle -> Starting -> Active -> Stopping -> Idle`, with
//! `Starting -> Idle` when a start fails.

use serde::Serialize;

use super::types::{QuestKind, SessionPhase};

/// The live session. Exists only in `Active` and `Stopping`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub quest_id: String,
    pub kind: QuestKind,
    /// Last known remote progress; never decreases while the session lives.
    pub authoritative_pct: f64,
    /// UX estimate, kept within `authoritative_pct..=100`.
    pub local_pct: f64,
    /// Seconds needed for 100%. Zero disables percentage math.
    pub target_seconds: f64,
    /// Stand-in executable launched for a simulated game session.
    pub bound_executable: Option<String>,
}

impl Session {
    /// Elapsed seconds implied by local progress.
    pub fn local_elapsed_seconds(&self) -> f64 {
        self.local_pct / 100.0 * self.target_seconds
    }
}

#[derive(Debug)]
struct PendingStart {
    quest_id: String,
    kind: QuestKind,
    bound_executable: Option<String>,
}

/// Result of one simulator step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Local progress is now at the given value and still below 100.
    Advanced(f64),
    /// Nothing left to simulate: no active session, or 100% reached.
    Finished,
}

#[derive(Debug, Default)]
pub struct SessionMachine {
    phase: SessionPhase,
    pending: Option<PendingStart>,
    session: Option<Session>,
    epoch: u64,
}

fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Convert seconds of progress into a percentage of `target_seconds`.
pub fn progress_pct(progress_seconds: f64, target_seconds: f64) -> f64 {
    if target_seconds > 0.0 {
        progress_seconds / target_seconds * 100.0
    } else {
        0.0
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Identifies the current (or most recent) session's signal subscriptions.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True if a signal stamped with `epoch` belongs to the active session.
    pub fn accepts(&self, epoch: u64) -> bool {
        self.phase == SessionPhase::Active && self.epoch == epoch
    }

    /// `Idle -> Starting`. Returns the new session epoch, or `None` if not idle.
    pub fn begin_start(&mut self, quest_id: &str, kind: QuestKind) -> Option<u64> {
        if self.phase != SessionPhase::Idle {
            return None;
        }
        self.epoch += 1;
        self.phase = SessionPhase::Starting;
        self.pending = Some(PendingStart {
            quest_id: quest_id.to_string(),
            kind,
            bound_executable: None,
        });
        Some(self.epoch)
    }

    /// Record the stand-in executable created for the session.
    pub fn bind_executable(&mut self, name: &str) {
        if let Some(pending) = self.pending.as_mut() {
            pending.bound_executable = Some(name.to_string());
        } else if let Some(session) = self.session.as_mut() {
            session.bound_executable = Some(name.to_string());
        }
    }

    /// `Starting -> Active`, seeding both progress values.
    pub fn activate(&mut self, initial_pct: f64, target_seconds: f64) -> Option<Session> {
        if self.phase != SessionPhase::Starting {
            return None;
        }
        let pending = self.pending.take()?;
        let initial = clamp_pct(initial_pct);
        let session = Session {
            quest_id: pending.quest_id,
            kind: pending.kind,
            authoritative_pct: initial,
            local_pct: initial,
            target_seconds: target_seconds.max(0.0),
            bound_executable: pending.bound_executable,
        };
        self.session = Some(session.clone());
        self.phase = SessionPhase::Active;
        Some(session)
    }

    /// `Starting -> Idle` after a failed start. Returns the executable that was
    /// already created, if any, so the caller can clean it up.
    pub fn abort_start(&mut self) -> Option<String> {
        if self.phase != SessionPhase::Starting {
            return None;
        }
        self.phase = SessionPhase::Idle;
        self.pending.take().and_then(|p| p.bound_executable)
    }

    /// Raise authoritative progress. Lower values are ignored; local progress
    /// is re-anchored when it was behind. Returns the session if it changed.
    pub fn apply_authoritative(&mut self, pct: f64) -> Option<&Session> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        let session = self.session.as_mut()?;
        let pct = clamp_pct(pct);
        if pct <= session.authoritative_pct {
            return None;
        }
        session.authoritative_pct = pct;
        if session.local_pct < pct {
            session.local_pct = pct;
        }
        Some(session)
    }

    /// Add `delta_pct` to local progress, clamped to `authoritative..=100`.
    pub fn advance_local(&mut self, delta_pct: f64) -> TickOutcome {
        if self.phase != SessionPhase::Active {
            return TickOutcome::Finished;
        }
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Finished;
        };
        let delta = if delta_pct.is_finite() { delta_pct.max(0.0) } else { 0.0 };
        session.local_pct = (session.local_pct + delta)
            .max(session.authoritative_pct)
            .min(100.0);
        if session.local_pct >= 100.0 {
            TickOutcome::Finished
        } else {
            TickOutcome::Advanced(session.local_pct)
        }
    }

    /// `Active -> Stopping`. Returns a copy of the session being torn down, or
    /// `None` when there is nothing to stop (or a stop is already running).
    pub fn begin_stop(&mut self) -> Option<Session> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.phase = SessionPhase::Stopping;
        self.session.clone()
    }

    pub fn clear_executable(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.bound_executable = None;
        }
    }

    /// `Stopping -> Idle`, clearing every session field.
    pub fn finish_stop(&mut self) {
        if self.phase != SessionPhase::Stopping {
            return;
        }
        self.session = None;
        self.pending = None;
        self.phase = SessionPhase::Idle;
    }
}
