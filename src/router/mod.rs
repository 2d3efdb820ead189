//! Routing of link traffic to queue storage.
//!
//! [`QueueRouter`] is the only caller of the [`QueueStore`] collaborator.
//! Each operation exists in two forms: a `try_` variant returning the
//! store's [`StoreError`], and the form used by links which logs the fault
//! and degrades to an empty or no-op result.

mod memory;
#[cfg(test)]
mod tests;

pub use memory::MemoryStore;
use log::{debug, error};
use thiserror::Error;
use uuid::Uuid;

use crate::message::StorageMessage;

/// Messages listed by a store, produced lazily.
pub type Cursor = Box<dyn Iterator<Item = StorageMessage>>;

/// Number of messages materialised per fetch when not configured.
pub const DEFAULT_FETCH_LIMIT: usize = 10;

/// Faults reported by a [`QueueStore`].
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The named queue does not exist.
    #[error("queue {0} does not exist")]
    NotFound(String),
    /// The backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Any other backend failure.
    #[error("storage error: {0}")]
    Other(String),
}

/// Durable queue storage.
///
/// Implementations own their own consistency; the router performs no
/// locking of its own.
#[cfg_attr(test, mockall::automock)]
pub trait QueueStore {
    /// Returns `true` if `queue` exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend cannot answer.
    fn exists(&mut self, queue: &str) -> Result<bool, StoreError>;

    /// Create `queue`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the queue cannot be created.
    fn create(&mut self, queue: &str) -> Result<(), StoreError>;

    /// Append `messages` to `queue`. `client_id` identifies the posting call.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the messages cannot be stored.
    fn post(
        &mut self,
        queue: &str,
        messages: Vec<StorageMessage>,
        client_id: Uuid,
    ) -> Result<(), StoreError>;

    /// List the pending messages of `queue`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the queue cannot be read.
    fn list(&mut self, queue: &str) -> Result<Cursor, StoreError>;

    /// Delete `queue` and everything in it.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the queue cannot be deleted.
    fn delete(&mut self, queue: &str) -> Result<(), StoreError>;
}

/// Post, fetch and drop operations keyed by queue name.
pub struct QueueRouter<S> {
    store: S,
    fetch_limit: usize,
}

impl<S: QueueStore> QueueRouter<S> {
    /// Wrap `store` using [`DEFAULT_FETCH_LIMIT`].
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    /// Cap the number of messages a single fetch materialises.
    #[must_use]
    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    /// Borrow the underlying store.
    #[must_use]
    pub fn store(&self) -> &S { &self.store }

    /// Post `message` to `address`, creating the queue first if needed.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] raised by the existence check,
    /// creation or post.
    pub fn try_post(&mut self, address: &str, message: StorageMessage) -> Result<(), StoreError> {
        let client_id = Uuid::new_v4();
        if !self.store.exists(address)? {
            debug!("creating queue: queue={address}");
            self.store.create(address)?;
        }
        self.store.post(address, vec![message], client_id)
    }

    /// Materialise up to the fetch limit of pending messages for `address`.
    ///
    /// A missing queue is reported as empty rather than as a fault.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for any fault other than a missing queue.
    pub fn try_fetch(&mut self, address: &str) -> Result<Vec<StorageMessage>, StoreError> {
        match self.store.list(address) {
            Ok(cursor) => Ok(cursor.take(self.fetch_limit).collect()),
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Delete the queue named by `address`.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] raised by the store.
    pub fn try_drop_queue(&mut self, address: &str) -> Result<(), StoreError> {
        self.store.delete(address)
    }

    /// Post `message` to `address`, logging any storage fault.
    ///
    /// Returns `true` if the store accepted the message.
    pub fn post(&mut self, address: &str, message: StorageMessage) -> bool {
        match self.try_post(address, message) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to post message: queue={address}, error={e}");
                crate::metrics::inc_errors(crate::metrics::ErrorKind::Storage);
                false
            }
        }
    }

    /// Fetch pending messages for `address`; storage faults yield an empty list.
    pub fn fetch(&mut self, address: &str) -> Vec<StorageMessage> {
        self.try_fetch(address).unwrap_or_else(|e| {
            error!("failed to fetch messages: queue={address}, error={e}");
            crate::metrics::inc_errors(crate::metrics::ErrorKind::Storage);
            Vec::new()
        })
    }

    /// Delete the queue named by `address`, logging any storage fault.
    ///
    /// This removes the whole queue, not a single message.
    pub fn drop_queue(&mut self, address: &str) {
        if let Err(e) = self.try_drop_queue(address) {
            error!("failed to delete queue: queue={address}, error={e}");
            crate::metrics::inc_errors(crate::metrics::ErrorKind::Storage);
        }
    }
}
