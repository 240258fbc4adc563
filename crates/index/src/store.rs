use async_trait::async_trait;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::block_in_place;

use crate::{AnnRequest, CollectionSchema, Hit, IndexError, NewRecord, VectorIndex, WeightedRanker};

/// Async surface of a dense + sparse collection.
///
/// [`VectorIndex`] implements it in-process. Remote stores implement the same
/// trait so the retrieval layer does not care where vectors live.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn schema(&self) -> &CollectionSchema;

    /// Insert a batch. Returns the ids assigned to each record, in order.
    async fn insert(&self, records: Vec<NewRecord>) -> Result<Vec<String>, IndexError>;

    async fn search(&self, request: AnnRequest) -> Result<Vec<Hit>, IndexError>;

    /// Run every request, then fuse the result lists with `ranker`.
    async fn hybrid_search(
        &self,
        requests: Vec<AnnRequest>,
        ranker: &WeightedRanker,
        limit: usize,
    ) -> Result<Vec<Hit>, IndexError> {
        let mut lists = Vec::with_capacity(requests.len());
        for request in requests {
            lists.push(self.search(request).await?);
        }
        ranker.fuse(&lists, limit)
    }

    async fn flush(&self) -> Result<(), IndexError> {
        Ok(())
    }

    /// Release resources. The default just flushes.
    async fn close(&self) -> Result<(), IndexError> {
        self.flush().await
    }
}

/// Run blocking index work without stalling the async worker.
///
/// On a multi-thread runtime the worker hands its other tasks off first; on a
/// current-thread runtime (or outside tokio) the closure runs inline.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => block_in_place(f),
        _ => f(),
    }
}

/// In-process collection. Each call completes on the calling task, so two
/// requests joined together are answered one after the other; remote
/// implementations overlap them.
#[async_trait]
impl VectorStore for VectorIndex {
    fn schema(&self) -> &CollectionSchema {
        VectorIndex::schema(self)
    }

    async fn insert(&self, records: Vec<NewRecord>) -> Result<Vec<String>, IndexError> {
        blocking(|| VectorIndex::insert(self, records))
    }

    async fn search(&self, request: AnnRequest) -> Result<Vec<Hit>, IndexError> {
        blocking(|| VectorIndex::search(self, &request))
    }

    async fn flush(&self) -> Result<(), IndexError> {
        blocking(|| VectorIndex::flush(self))
    }
}
