//! A [`QueueStore`] that remembers how it was called.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use linkbroker::{
    StorageMessage,
    router::{Cursor, MemoryStore, QueueStore, StoreError},
};
use uuid::Uuid;

/// One call received by a [`RecordingStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Exists(String),
    Create(String),
    Post {
        queue: String,
        messages: Vec<StorageMessage>,
        client_id: Uuid,
    },
    List(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct State {
    store: MemoryStore,
    calls: Vec<StoreCall>,
    outage: Option<String>,
}

/// In-memory store whose clones share queues and call history.
///
/// Hand one clone to the broker and keep another to inspect what the broker
/// did with it.
#[derive(Clone, Debug, Default)]
pub struct RecordingStore {
    state: Arc<Mutex<State>>,
}

impl RecordingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put `messages` in `queue` without recording any call.
    pub fn seed(&self, queue: &str, messages: impl IntoIterator<Item = StorageMessage>) {
        let mut state = self.state();
        let client_id = Uuid::nil();
        let seeded = state
            .store
            .create(queue)
            .and_then(|()| state.store.post(queue, messages.into_iter().collect(), client_id));
        debug_assert!(seeded.is_ok(), "memory store refused seed: {seeded:?}");
    }

    /// Make every later call fail with [`StoreError::Unavailable`].
    pub fn fail_with_outage(&self, reason: &str) { self.state().outage = Some(reason.to_owned()); }

    /// Every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> { self.state().calls.clone() }

    /// Queue names and messages of every `post` call.
    #[must_use]
    pub fn posts(&self) -> Vec<(String, Vec<StorageMessage>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Post {
                    queue, messages, ..
                } => Some((queue, messages)),
                _ => None,
            })
            .collect()
    }

    /// Queue names of every `delete` call.
    #[must_use]
    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete(queue) => Some(queue),
                _ => None,
            })
            .collect()
    }

    /// Messages currently held by `queue`, if it exists.
    #[must_use]
    pub fn depth(&self, queue: &str) -> Option<usize> { self.state().store.depth(queue) }

    fn record(&self, call: StoreCall) -> Result<MutexGuard<'_, State>, StoreError> {
        let mut state = self.state();
        state.calls.push(call);
        match &state.outage {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(state),
        }
    }
}

impl QueueStore for RecordingStore {
    fn exists(&mut self, queue: &str) -> Result<bool, StoreError> {
        self.record(StoreCall::Exists(queue.to_owned()))?
            .store
            .exists(queue)
    }

    fn create(&mut self, queue: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Create(queue.to_owned()))?
            .store
            .create(queue)
    }

    fn post(
        &mut self,
        queue: &str,
        messages: Vec<StorageMessage>,
        client_id: Uuid,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Post {
            queue: queue.to_owned(),
            messages: messages.clone(),
            client_id,
        })?
        .store
        .post(queue, messages, client_id)
    }

    fn list(&mut self, queue: &str) -> Result<Cursor, StoreError> {
        self.record(StoreCall::List(queue.to_owned()))?
            .store
            .list(queue)
    }

    fn delete(&mut self, queue: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(queue.to_owned()))?
            .store
            .delete(queue)
    }
}
