//! Batch queues of quests processed one at a time.

use std::collections::VecDeque;

use crate::quest::Quest;

use super::types::{QueueKind, QueueStatus};

/// FIFO of quests with a running flag.
#[derive(Debug, Default)]
pub struct QuestQueue {
    items: VecDeque<Quest>,
    running: bool,
}

impl QuestQueue {
    /// Append unless a quest with the same id is already queued.
    pub fn enqueue(&mut self, quest: Quest) -> bool {
        if self.items.iter().any(|q| q.id == quest.id) {
            return false;
        }
        self.items.push_back(quest);
        true
    }

    pub fn head(&self) -> Option<&Quest> {
        self.items.front()
    }

    pub fn pop_head(&mut self) -> Option<Quest> {
        self.items.pop_front()
    }

    /// Dequeue the head only if it is the quest that just finished.
    pub fn pop_if_head(&mut self, quest_id: &str) -> bool {
        if self.head().is_some_and(|q| q.id == quest_id) {
            self.items.pop_front();
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            running: self.running,
            quest_ids: self.items.iter().map(|q| q.id.clone()).collect(),
        }
    }
}

/// The video and play queues.
#[derive(Debug, Default)]
pub struct QueueSet {
    video: QuestQueue,
    play: QuestQueue,
}

impl QueueSet {
    pub fn get(&self, kind: QueueKind) -> &QuestQueue {
        match kind {
            QueueKind::Video => &self.video,
            QueueKind::Play => &self.play,
        }
    }

    pub fn get_mut(&mut self, kind: QueueKind) -> &mut QuestQueue {
        match kind {
            QueueKind::Video => &mut self.video,
            QueueKind::Play => &mut self.play,
        }
    }

    /// The queue whose running flag is set, if any.
    pub fn running(&self) -> Option<QueueKind> {
        [QueueKind::Video, QueueKind::Play]
            .into_iter()
            .find(|kind| self.get(*kind).is_running())
    }
}
