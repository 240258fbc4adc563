//! HRAG Server - HTTP API for hybrid dense + sparse retrieval
//!
//! Exposes [`hrag::HybridRag`] over axum: embed-and-store texts, then query
//! them by dense similarity, sparse lexical overlap or a weighted fusion of
//! both.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! ## Public
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check
//! - `GET /metrics` - Prometheus metrics
//! - `POST /hybrid-embed` - Embed texts, store them unless `is_save` is false
//! - `GET /search` - Search stored texts
//!
//! ## Protected (API key required)
//!
//! - `POST /api/v1/hybrid-embed`
//! - `GET /api/v1/search`
//! - `GET /api/v1/metadata` - Embedder name and dimension

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{AuthConfig, ServerConfig, ServerConfigError};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
