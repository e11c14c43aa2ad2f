//! In-memory preference store.

use std::sync::Mutex;

use super::{PreferenceError, PreferenceStore, Preferences};

/// Keeps preferences for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    saved: Mutex<Option<Preferences>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with preferences already saved.
    pub fn with(preferences: Preferences) -> Self {
        Self {
            saved: Mutex::new(Some(preferences)),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Option<Preferences>, PreferenceError> {
        let saved = self
            .saved
            .lock()
            .map_err(|e| PreferenceError::Database(e.to_string()))?;
        Ok(saved.clone())
    }

    fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| PreferenceError::Database(e.to_string()))?;
        *saved = Some(preferences.clone());
        Ok(())
    }
}
