use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::SearchMode;

/// Observer for retrieval calls.
///
/// Handed to [`crate::IngestPipeline`] and [`crate::HybridSearcher`] at
/// construction; there is no process-wide recorder.
pub trait RetrievalMetrics: Send + Sync {
    /// `inserted` is `None` when the call failed.
    fn record_ingest(&self, latency: Duration, texts: usize, inserted: Option<usize>);
    /// `hits` is `None` when the call failed.
    fn record_search(&self, latency: Duration, mode: SearchMode, hits: Option<usize>);
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn RetrievalMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start(recorder: Option<&Arc<dyn RetrievalMetrics>>) -> Option<Self> {
        recorder.map(|recorder| Self {
            recorder: Arc::clone(recorder),
            start: Instant::now(),
        })
    }

    pub(crate) fn record_ingest(self, texts: usize, inserted: Option<usize>) {
        self.recorder
            .record_ingest(self.start.elapsed(), texts, inserted);
    }

    pub(crate) fn record_search(self, mode: SearchMode, hits: Option<usize>) {
        self.recorder
            .record_search(self.start.elapsed(), mode, hits);
    }
}
