use crate::entry::TimeSeriesEntry;
use crate::store::{EntryError, PropertyValueStore};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;

/// Upper bound the store accepts for one batch-put call.
pub const MAX_BATCH_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Accepted,
    PartiallyRejected(Vec<EntryError>),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub index: usize,
    pub size: usize,
    pub status: ChunkStatus,
}

impl ChunkOutcome {
    pub fn rejected_entries(&self) -> usize {
        match &self.status {
            ChunkStatus::Accepted => 0,
            ChunkStatus::PartiallyRejected(errors) => errors
                .iter()
                .map(|err| err.entry_id.as_str())
                .collect::<BTreeSet<_>>()
                .len()
                .min(self.size),
            ChunkStatus::Failed(_) => self.size,
        }
    }

    pub fn accepted_entries(&self) -> usize {
        match &self.status {
            ChunkStatus::Failed(_) => 0,
            _ => self.size - self.rejected_entries(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmitReport {
    pub chunks: Vec<ChunkOutcome>,
}

impl SubmitReport {
    pub fn entries_sent(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.size).sum()
    }

    pub fn entries_accepted(&self) -> usize {
        self.chunks.iter().map(ChunkOutcome::accepted_entries).sum()
    }

    pub fn entries_rejected(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| matches!(chunk.status, ChunkStatus::PartiallyRejected(_)))
            .map(ChunkOutcome::rejected_entries)
            .sum()
    }

    pub fn failed_chunks(&self) -> usize {
        self.failed_chunk_indices().len()
    }

    pub fn failed_chunk_indices(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|chunk| matches!(chunk.status, ChunkStatus::Failed(_)))
            .map(|chunk| chunk.index)
            .collect()
    }

    pub fn entry_errors(&self) -> impl Iterator<Item = &EntryError> {
        self.chunks.iter().flat_map(|chunk| match &chunk.status {
            ChunkStatus::PartiallyRejected(errors) => errors.as_slice(),
            _ => &[][..],
        })
    }
}

pub struct BatchSubmitter<'a> {
    store: &'a dyn PropertyValueStore,
    batch_size: usize,
    concurrency: usize,
}

impl<'a> BatchSubmitter<'a> {
    pub fn new(store: &'a dyn PropertyValueStore, batch_size: usize, concurrency: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.clamp(1, MAX_BATCH_ENTRIES),
            concurrency: concurrency.max(1),
        }
    }

    /// Submits `entries` in order-preserving chunks, one attempt per chunk.
    /// A failing chunk never stops the chunks after it.
    pub async fn submit(&self, entries: &[TimeSeriesEntry]) -> SubmitReport {
        let chunks = stream::iter(entries.chunks(self.batch_size).enumerate())
            .map(|(index, chunk)| self.submit_chunk(index, chunk))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        SubmitReport { chunks }
    }

    async fn submit_chunk(&self, index: usize, chunk: &[TimeSeriesEntry]) -> ChunkOutcome {
        let size = chunk.len();
        let status = match self.store.batch_put(chunk).await {
            Ok(errors) => {
                tracing::info!(chunk = index, size, "entries sent to SiteWise");
                if errors.is_empty() {
                    tracing::info!(chunk = index, "all entries accepted without errors");
                    ChunkStatus::Accepted
                } else {
                    for err in &errors {
                        tracing::error!(
                            chunk = index,
                            entry_id = %err.entry_id,
                            code = %err.error_code,
                            message = %err.error_message,
                            "SiteWise rejected entry"
                        );
                    }
                    ChunkStatus::PartiallyRejected(errors)
                }
            }
            Err(err) => {
                tracing::error!(chunk = index, size, error = %err, "failed to write batch to SiteWise");
                ChunkStatus::Failed(err.to_string())
            }
        };
        ChunkOutcome {
            index,
            size,
            status,
        }
    }
}
