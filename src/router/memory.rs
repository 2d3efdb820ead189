//! In-process queue store.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use super::{Cursor, QueueStore, StoreError};
use crate::message::StorageMessage;

/// [`QueueStore`] keeping every queue in memory as a FIFO.
///
/// Suitable for a single broker process; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    queues: HashMap<String, VecDeque<StorageMessage>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Number of messages held by `queue`, if it exists.
    #[must_use]
    pub fn depth(&self, queue: &str) -> Option<usize> { self.queues.get(queue).map(VecDeque::len) }
}

impl QueueStore for MemoryStore {
    fn exists(&mut self, queue: &str) -> Result<bool, StoreError> {
        Ok(self.queues.contains_key(queue))
    }

    fn create(&mut self, queue: &str) -> Result<(), StoreError> {
        self.queues.entry(queue.to_owned()).or_default();
        Ok(())
    }

    fn post(
        &mut self,
        queue: &str,
        messages: Vec<StorageMessage>,
        _client_id: Uuid,
    ) -> Result<(), StoreError> {
        let entries = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| StoreError::NotFound(queue.to_owned()))?;
        entries.extend(messages);
        Ok(())
    }

    fn list(&mut self, queue: &str) -> Result<Cursor, StoreError> {
        let entries = self
            .queues
            .get(queue)
            .ok_or_else(|| StoreError::NotFound(queue.to_owned()))?;
        Ok(Box::new(entries.clone().into_iter()))
    }

    fn delete(&mut self, queue: &str) -> Result<(), StoreError> {
        self.queues.remove(queue);
        Ok(())
    }
}
