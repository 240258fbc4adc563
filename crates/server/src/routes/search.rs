use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use hrag::{SearchMode, SearchRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query string of `GET /search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,

    /// Defaults to `search.default_top_k` of the pipeline config.
    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default)]
    pub mode: SearchMode,

    #[serde(default)]
    pub dense_weight: Option<f32>,

    #[serde(default)]
    pub sparse_weight: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<String>,
}

pub async fn search(
    State(state): State<Arc<ServerState>>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> ServerResult<impl IntoResponse> {
    let Query(params) = params.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let defaults = &state.rag.config().search;
    let request = SearchRequest::new(params.query)
        .with_tenant(params.tenant_id)
        .with_weights(
            params.dense_weight.unwrap_or(defaults.dense_weight),
            params.sparse_weight.unwrap_or(defaults.sparse_weight),
        )
        .with_top_k(params.limit.unwrap_or(defaults.default_top_k))
        .with_mode(params.mode);

    let results = state.rag.search_with(&request).await?;
    Ok(Json(SearchResponse { results }))
}
