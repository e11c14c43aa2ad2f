//! Immutable quest list snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Quest, UserStatus};

/// A shared, read-only view of the quest list.
///
/// Cloning is cheap. Updates build a new snapshot so holders of the old one
/// never observe a change underneath them.
#[derive(Debug, Clone, Default)]
pub struct QuestSnapshot {
    quests: Arc<[Quest]>,
}

impl QuestSnapshot {
    pub fn new(quests: Vec<Quest>) -> Self {
        Self {
            quests: quests.into(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == id)
    }

    pub fn as_slice(&self) -> &[Quest] {
        &self.quests
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Return a copy with `enrolled_at` set on one quest.
    ///
    /// Other status fields are preserved; a quest without status gets a fresh
    /// one. Unknown ids return an unchanged clone.
    pub fn with_enrollment(&self, id: &str, enrolled_at: DateTime<Utc>) -> Self {
        if self.find(id).is_none() {
            return self.clone();
        }

        let quests: Vec<Quest> = self
            .quests
            .iter()
            .map(|quest| {
                if quest.id != id {
                    return quest.clone();
                }
                let mut patched = quest.clone();
                let status = patched.user_status.get_or_insert_with(UserStatus::default);
                status.enrolled_at = Some(enrolled_at);
                patched
            })
            .collect();

        Self::new(quests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::{ProgressCounter, QuestConfig};

    fn quest(id: &str, status: Option<UserStatus>) -> Quest {
        Quest {
            id: id.to_string(),
            config: QuestConfig::default(),
            user_status: status,
        }
    }

    #[test]
    fn test_enrollment_is_copy_on_write() {
        let original = QuestSnapshot::new(vec![quest("a", None), quest("b", None)]);
        let now = Utc::now();
        let patched = original.with_enrollment("a", now);

        assert!(!original.find("a").unwrap().is_enrolled());
        assert!(patched.find("a").unwrap().is_enrolled());
        assert_eq!(patched.find("a").unwrap().user_status.as_ref().unwrap().enrolled_at, Some(now));
        assert!(!patched.find("b").unwrap().is_enrolled());
    }

    #[test]
    fn test_enrollment_preserves_progress() {
        let mut status = UserStatus::default();
        status
            .progress
            .insert("WATCH_VIDEO", ProgressCounter { value: Some(30.0) });
        let snapshot = QuestSnapshot::new(vec![quest("a", Some(status))]);

        let patched = snapshot.with_enrollment("a", Utc::now());
        assert_eq!(patched.find("a").unwrap().progress_seconds(), 30.0);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let snapshot = QuestSnapshot::new(vec![quest("a", None)]);
        let patched = snapshot.with_enrollment("zzz", Utc::now());
        assert_eq!(patched.len(), 1);
        assert!(!patched.find("a").unwrap().is_enrolled());
    }
}
