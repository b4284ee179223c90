use crate::entry::TimeSeriesEntry;
use async_trait::async_trait;

/// A single entry the store refused while accepting the rest of its chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryError {
    pub entry_id: String,
    pub error_code: String,
    pub error_message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The call itself failed: network, credentials, throttling or a service fault.
    #[error("store call failed: {0}")]
    Call(String),
    #[error("could not encode entry {entry_id}: {message}")]
    Encode { entry_id: String, message: String },
}

#[async_trait]
pub trait PropertyValueStore: Send + Sync {
    /// Submits one chunk. `Ok` carries the entries the store rejected; an empty
    /// list means the whole chunk was accepted.
    async fn batch_put(&self, entries: &[TimeSeriesEntry]) -> Result<Vec<EntryError>, StoreError>;
}
