use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use async_trait::async_trait;
use hrag::{
    AnnRequest, CollectionSchema, Hit, HragConfig, HybridRag, IndexConfig, IndexError, NewRecord,
    StubEmbedder, VectorField, VectorIndex, VectorStore,
};
use serde_json::{json, Value};
use server::{build_router, ServerConfig, ServerState};
use std::sync::Arc;
use tower::ServiceExt;

const API_KEY: &str = "test-key";

fn app() -> (Router, Arc<HybridRag>) {
    let mut config = ServerConfig::default();
    config.auth.api_keys.insert(API_KEY.to_string());
    let rag = Arc::new(HybridRag::init(HragConfig::stub(64)).unwrap());
    let state = Arc::new(ServerState::with_rag(config, rag.clone(), None));
    (build_router(state), rag)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn embed_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn embed_then_search_returns_stored_text() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        embed_request(
            "/hybrid-embed",
            json!({ "texts": ["red apples in the orchard", "deep blue ocean waves"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let embeddings = body["embeddings"].as_array().unwrap();
    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[0]["dense_vecs"].as_array().unwrap().len(), 64);
    assert!(embeddings[0]["sparse_vecs"].is_object());

    let (status, body) = send(&app, get("/search?query=red%20apples&limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!(["red apples in the orchard"]));
}

#[tokio::test]
async fn embed_without_save_stores_nothing() {
    let (app, _) = app();

    let (status, _) = send(
        &app,
        embed_request(
            "/hybrid-embed",
            json!({ "texts": ["red apples"], "is_save": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/search?query=red%20apples")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn tenant_texts_stay_in_their_tenant() {
    let (app, _) = app();

    send(
        &app,
        embed_request(
            "/hybrid-embed",
            json!({ "texts": ["quarterly revenue report"], "tenant_id": "acme" }),
        ),
    )
    .await;

    let (_, acme) = send(&app, get("/search?query=revenue%20report&tenant_id=acme")).await;
    assert_eq!(acme["results"], json!(["quarterly revenue report"]));

    let (_, other) = send(&app, get("/search?query=revenue%20report&tenant_id=globex")).await;
    assert_eq!(other["results"], json!([]));

    let (_, global) = send(&app, get("/search?query=revenue%20report")).await;
    assert_eq!(global["results"], json!([]));
}

#[tokio::test]
async fn empty_texts_are_rejected() {
    let (app, _) = app();
    let (status, body) = send(&app, embed_request("/hybrid-embed", json!({ "texts": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let (app, _) = app();
    let (status, body) = send(&app, embed_request("/hybrid-embed", json!({ "text": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn negative_weight_is_a_client_error() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/search?query=apples&dense_weight=-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST");
}

#[tokio::test]
async fn missing_query_is_rejected() {
    let (app, _) = app();
    let (status, _) = send(&app, get("/search?limit=3")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sparse_mode_is_accepted() {
    let (app, _) = app();
    send(
        &app,
        embed_request("/hybrid-embed", json!({ "texts": ["green tea leaves"] })),
    )
    .await;

    let (status, body) = send(&app, get("/search?query=green%20tea&mode=sparse")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!(["green tea leaves"]));
}

#[tokio::test]
async fn versioned_routes_require_api_key() {
    let (app, _) = app();

    let (status, body) = send(&app, get("/api/v1/search?query=x")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_FAILED");

    let request = Request::builder()
        .uri("/api/v1/search?query=x")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-ratelimit-remaining"));

    let request = Request::builder()
        .uri("/api/v1/metadata")
        .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimension"], 64);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn closed_service_is_not_ready() {
    let (app, rag) = app();
    let (status, _) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);

    rag.close().await.unwrap();

    let (status, _) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = send(&app, get("/search?query=x")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (app, _) = app();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

/// Dense field answers, sparse field is down.
struct SparseOfflineStore(VectorIndex);

#[async_trait]
impl VectorStore for SparseOfflineStore {
    fn schema(&self) -> &CollectionSchema {
        self.0.schema()
    }

    async fn insert(&self, records: Vec<NewRecord>) -> Result<Vec<String>, IndexError> {
        self.0.insert(records)
    }

    async fn search(&self, request: AnnRequest) -> Result<Vec<Hit>, IndexError> {
        match request.field {
            VectorField::Sparse => Err(IndexError::Backend("sparse index offline".into())),
            VectorField::Dense => self.0.search(&request),
        }
    }
}

#[tokio::test]
async fn storage_failure_during_search_is_a_server_error() {
    let collection = |schema| -> Arc<dyn VectorStore> {
        let index = VectorIndex::new(IndexConfig::new().with_schema(schema)).unwrap();
        Arc::new(SparseOfflineStore(index))
    };
    let rag = HybridRag::from_parts(
        HragConfig::stub(8),
        Arc::new(StubEmbedder::new(8)),
        collection(CollectionSchema::global(8)),
        collection(CollectionSchema::tenant_scoped(8)),
        None,
    )
    .unwrap();
    let state = Arc::new(ServerState::with_rag(ServerConfig::default(), Arc::new(rag), None));
    let app = build_router(state);

    let (status, _) = send(
        &app,
        embed_request("/hybrid-embed", json!({ "texts": ["green tea leaves"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/search?query=green%20tea")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), "SEARCH_ERROR");
    assert!(body.get("results").is_none());

    let (status, body) = send(&app, get("/search?query=green%20tea&mode=dense")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!(["green tea leaves"]));
}
