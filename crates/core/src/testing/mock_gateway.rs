//! Mock quest gateway for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::executor::{DetectableApplication, ExecutorError, QuestGateway};
use crate::quest::Quest;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock implementation of the QuestGateway trait.
///
/// Provides controllable behavior for testing:
/// - Serve a configurable quest list and application catalog
/// - Track enrollments for assertions
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let gateway = MockGateway::new()
///     .with_quests(vec![fixtures::video_quest("v1", 600.0, 0.0)]);
///
/// // Mark the quest complete on the "server"
/// gateway.update_quest("v1", |q| *q = fixtures::completed(q.clone()));
///
/// // Make the next call fail
/// gateway.fail_next(ExecutorError::Timeout);
/// ```
#[derive(Debug, Default)]
pub struct MockGateway {
    quests: Mutex<Vec<Quest>>,
    catalog: Mutex<Vec<DetectableApplication>>,
    /// Successfully enrolled quest ids, in call order.
    enrolled: Mutex<Vec<String>>,
    /// Quest ids whose enrollment is rejected.
    rejected: Mutex<Vec<String>>,
    /// If set, the next operation will fail with this error.
    next_error: Mutex<Option<ExecutorError>>,
    list_calls: AtomicUsize,
    catalog_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quests(self, quests: Vec<Quest>) -> Self {
        *lock(&self.quests) = quests;
        self
    }

    pub fn with_catalog(self, catalog: Vec<DetectableApplication>) -> Self {
        *lock(&self.catalog) = catalog;
        self
    }

    /// Replace the served quest list.
    pub fn set_quests(&self, quests: Vec<Quest>) {
        *lock(&self.quests) = quests;
    }

    /// Edit one served quest in place (e.g. to mark it completed).
    pub fn update_quest(&self, id: &str, update: impl FnOnce(&mut Quest)) {
        if let Some(quest) = lock(&self.quests).iter_mut().find(|q| q.id == id) {
            update(quest);
        }
    }

    pub fn fail_next(&self, error: ExecutorError) {
        *lock(&self.next_error) = Some(error);
    }

    /// Make every enrollment of `quest_id` fail.
    pub fn reject_enrollment(&self, quest_id: &str) {
        lock(&self.rejected).push(quest_id.to_string());
    }

    pub fn enrolled(&self) -> Vec<String> {
        lock(&self.enrolled).clone()
    }

    /// Number of `list_quests` calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_detectable_applications` calls so far.
    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    fn take_error(&self) -> Result<(), ExecutorError> {
        match lock(&self.next_error).take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QuestGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_quests(&self) -> Result<Vec<Quest>, ExecutorError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.take_error()?;
        Ok(lock(&self.quests).clone())
    }

    async fn list_detectable_applications(
        &self,
    ) -> Result<Vec<DetectableApplication>, ExecutorError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.take_error()?;
        Ok(lock(&self.catalog).clone())
    }

    async fn enroll_in_task(&self, quest_id: &str) -> Result<(), ExecutorError> {
        self.take_error()?;
        if lock(&self.rejected).iter().any(|id| id == quest_id) {
            return Err(ExecutorError::Rejected(format!(
                "quest {} is not enrollable",
                quest_id
            )));
        }
        lock(&self.enrolled).push(quest_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_fail_next_is_single_shot() {
        let gateway = MockGateway::new().with_quests(vec![fixtures::video_quest("v1", 60.0, 0.0)]);
        gateway.fail_next(ExecutorError::Timeout);

        assert!(gateway.list_quests().await.is_err());
        assert_eq!(gateway.list_quests().await.unwrap().len(), 1);
        assert_eq!(gateway.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_update_quest() {
        let gateway = MockGateway::new().with_quests(vec![fixtures::video_quest("v1", 60.0, 0.0)]);
        gateway.update_quest("v1", |q| *q = fixtures::completed(q.clone()));
        assert!(gateway.list_quests().await.unwrap()[0].is_completed());
    }
}
