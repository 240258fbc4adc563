use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Body of `POST /hybrid-embed`.
#[derive(Debug, Deserialize)]
pub struct HybridEmbedRequest {
    pub texts: Vec<String>,

    /// Store the embedded texts after embedding them.
    #[serde(default = "default_is_save")]
    pub is_save: bool,

    /// Route to the tenant collection; texts are chunked first.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

fn default_is_save() -> bool {
    true
}

/// Embed `texts` and, when `is_save`, insert them. Returns the
/// `{"embeddings": [{"dense_vecs", "sparse_vecs"}]}` document.
pub async fn hybrid_embed(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<HybridEmbedRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    if request.texts.is_empty() {
        return Err(ServerError::BadRequest("texts must not be empty".to_string()));
    }

    tracing::debug!(
        texts = request.texts.len(),
        tenant = request.tenant_id.as_deref().unwrap_or("-"),
        save = request.is_save,
        "hybrid-embed request"
    );

    let outcome = state
        .rag
        .ingest(request.tenant_id.as_deref(), request.texts, request.is_save)
        .await?;

    Ok(Json(outcome.embeddings))
}
