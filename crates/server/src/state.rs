use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use dashmap::DashMap;
use hrag::{HragConfig, HybridRag, RetrievalMetrics, SearchMode};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Rate limit tracking: API key -> (count, window_start)
    pub rate_limiter: Arc<DashMap<String, (u32, Instant)>>,

    /// Retrieval service (shared across requests)
    pub rag: Arc<HybridRag>,

    /// Renders `/metrics` when a Prometheus recorder is installed
    pub prometheus: Option<PrometheusHandle>,
}

impl ServerState {
    /// Build the retrieval service from `pipeline_config`, or the offline
    /// stub defaults when none is set.
    pub fn new(config: ServerConfig, prometheus: Option<PrometheusHandle>) -> ServerResult<Self> {
        let pipeline = match &config.pipeline_config {
            Some(path) => {
                HragConfig::from_file(path).map_err(|e| ServerError::Config(e.to_string()))?
            }
            None => {
                tracing::warn!("No pipeline_config set, serving the offline stub embedder");
                HragConfig::default()
            }
        };

        let metrics: Option<Arc<dyn RetrievalMetrics>> = if prometheus.is_some() {
            Some(Arc::new(PrometheusMetrics))
        } else {
            None
        };
        let rag = HybridRag::init_with_metrics(pipeline, metrics)?;
        Ok(Self::with_rag(config, Arc::new(rag), prometheus))
    }

    /// State around an already built service.
    pub fn with_rag(
        config: ServerConfig,
        rag: Arc<HybridRag>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(DashMap::new()),
            rag,
            prometheus,
        }
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.auth.api_keys.contains(key)
    }

    /// Fixed one-minute window per API key.
    pub fn check_rate_limit(&self, key: &str) -> RateLimit {
        let now = Instant::now();
        let limit = self.config.auth.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > RATE_LIMIT_WINDOW {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return RateLimit::Exceeded;
        }

        *count += 1;
        RateLimit::Allowed {
            remaining: limit - *count,
        }
    }
}

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of [`ServerState::check_rate_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    Allowed { remaining: u32 },
    Exceeded,
}

/// Forwards retrieval observations to the `metrics` facade.
pub struct PrometheusMetrics;

impl RetrievalMetrics for PrometheusMetrics {
    fn record_ingest(&self, latency: Duration, texts: usize, inserted: Option<usize>) {
        let outcome = if inserted.is_some() { "ok" } else { "error" };
        metrics::counter!("hrag_ingest_requests_total", "outcome" => outcome).increment(1);
        metrics::counter!("hrag_ingest_texts_total").increment(texts as u64);
        metrics::counter!("hrag_records_inserted_total").increment(inserted.unwrap_or(0) as u64);
        metrics::histogram!("hrag_ingest_duration_seconds").record(latency.as_secs_f64());
    }

    fn record_search(&self, latency: Duration, mode: SearchMode, hits: Option<usize>) {
        let mode = match mode {
            SearchMode::Hybrid => "hybrid",
            SearchMode::Dense => "dense",
            SearchMode::Sparse => "sparse",
        };
        let outcome = if hits.is_some() { "ok" } else { "error" };
        metrics::counter!("hrag_search_requests_total", "mode" => mode, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("hrag_search_duration_seconds", "mode" => mode)
            .record(latency.as_secs_f64());
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
    pub embedder: String,
    pub dimension: usize,
}
