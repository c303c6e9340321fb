//! Concurrent batch writes into a [`MemoryStore`].
//!
//! Feed sections are parsed independently and handed to a [`BatchWriter`]
//! as they complete. Each batch runs on the blocking pool; the
//! [`WriteDiscipline`] decides whether writers may overlap. Callers see the
//! data only after [`BatchWriter::finish`] has awaited every batch.

use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::debug;

use super::{MemoryStore, StoreError, WriteDisciplineKind};
use crate::domain::{Feed, Route, ServiceDay, Stop, Trip};

/// Records written together.
#[derive(Debug, Clone)]
pub enum WriteBatch {
    Feed(Feed),
    Routes(Vec<Arc<Route>>),
    Trips(Vec<Arc<Trip>>),
    Stops(Vec<Arc<Stop>>),
    ServiceDays(Vec<ServiceDay>),
}

impl WriteBatch {
    pub fn len(&self) -> usize {
        match self {
            WriteBatch::Feed(_) => 1,
            WriteBatch::Routes(v) => v.len(),
            WriteBatch::Trips(v) => v.len(),
            WriteBatch::Stops(v) => v.len(),
            WriteBatch::ServiceDays(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into batches of at most `size` records.
    fn chunked(self, size: usize) -> Vec<WriteBatch> {
        fn split<T: Clone>(items: Vec<T>, size: usize, wrap: fn(Vec<T>) -> WriteBatch) -> Vec<WriteBatch> {
            items.chunks(size).map(|chunk| wrap(chunk.to_vec())).collect()
        }
        let size = size.max(1);
        match self {
            WriteBatch::Feed(feed) => vec![WriteBatch::Feed(feed)],
            WriteBatch::Routes(v) => split(v, size, WriteBatch::Routes),
            WriteBatch::Trips(v) => split(v, size, WriteBatch::Trips),
            WriteBatch::Stops(v) => split(v, size, WriteBatch::Stops),
            WriteBatch::ServiceDays(v) => split(v, size, WriteBatch::ServiceDays),
        }
    }
}

/// Strategy for admitting concurrent writers.
pub trait WriteDiscipline: Send + Sync {
    /// Run `write`, waiting for exclusive access if this discipline needs it.
    fn run(&self, write: &mut dyn FnMut() -> Result<(), StoreError>) -> Result<(), StoreError>;
}

/// Serializes writers for storage that only accepts one at a time.
#[derive(Debug, Default)]
pub struct ExclusiveWrites {
    lock: Mutex<()>,
}

impl WriteDiscipline for ExclusiveWrites {
    fn run(&self, write: &mut dyn FnMut() -> Result<(), StoreError>) -> Result<(), StoreError> {
        let _guard = self.lock.lock()?;
        write()
    }
}

/// Lets writers through unimpeded.
#[derive(Debug, Default)]
pub struct UncontendedWrites;

impl WriteDiscipline for UncontendedWrites {
    fn run(&self, write: &mut dyn FnMut() -> Result<(), StoreError>) -> Result<(), StoreError> {
        write()
    }
}

impl WriteDisciplineKind {
    pub fn build(self) -> Arc<dyn WriteDiscipline> {
        match self {
            WriteDisciplineKind::Exclusive => Arc::new(ExclusiveWrites::default()),
            WriteDisciplineKind::Uncontended => Arc::new(UncontendedWrites),
        }
    }
}

/// Spawns batch writes and waits for all of them to land.
pub struct BatchWriter {
    store: Arc<MemoryStore>,
    discipline: Arc<dyn WriteDiscipline>,
    tasks: JoinSet<Result<usize, StoreError>>,
}

impl BatchWriter {
    /// Create a writer using the store's configured discipline.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let discipline = store.config().write_discipline.build();
        Self::with_discipline(store, discipline)
    }

    pub fn with_discipline(store: Arc<MemoryStore>, discipline: Arc<dyn WriteDiscipline>) -> Self {
        Self {
            store,
            discipline,
            tasks: JoinSet::new(),
        }
    }

    /// Queue `batch` for writing, split by the store's page size.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self, batch: WriteBatch) {
        for chunk in batch.chunked(self.store.config().page_size) {
            let store = Arc::clone(&self.store);
            let discipline = Arc::clone(&self.discipline);
            self.tasks.spawn_blocking(move || {
                let records = chunk.len();
                let mut pending = Some(chunk);
                discipline.run(&mut || match pending.take() {
                    Some(chunk) => store.apply(chunk),
                    None => Ok(()),
                })?;
                Ok(records)
            });
        }
    }

    /// Wait for every submitted batch. Returns the number of records written.
    ///
    /// All batches are awaited even if one fails; the first failure is
    /// returned.
    pub async fn finish(mut self) -> Result<usize, StoreError> {
        let mut written = 0;
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined
                .map_err(|e| StoreError::WriteFailed(e.to_string()))
                .and_then(|r| r);
            match result {
                Ok(records) => written += records,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!(records = written, "Batch writes complete");
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}
