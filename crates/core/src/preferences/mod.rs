//! Persisted user preferences.
//!
//! Preferences are read once when the orchestrator is built and written back
//! whenever the user changes one. They never influence session correctness.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryPreferenceStore;
pub use sqlite::SqlitePreferenceStore;
pub use types::*;

/// Trait for preference storage.
pub trait PreferenceStore: Send + Sync {
    /// Load previously saved preferences, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<Preferences>, PreferenceError>;

    /// Persist the full preference set.
    fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError>;
}
