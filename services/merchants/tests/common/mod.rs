use axum::http::StatusCode;
use merchants::app::{AppState, build_router};
use merchants::store::MerchantStore;
use merchants::store::memory::InMemoryStore;
use std::sync::Arc;
use tower::ServiceExt;

pub type App = axum::routing::RouterIntoService<axum::body::Body, ()>;

pub fn app_with_store(store: Arc<dyn MerchantStore + Send + Sync>) -> App {
    build_router(AppState::new(store)).into_service()
}

pub fn memory_app() -> App {
    app_with_store(Arc::new(InMemoryStore::new()))
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

pub fn merchant_body(name: &str, number: &str, email: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "business_registration_number": number,
        "email": email,
        "phone": "+60123456789",
        "status": status
    })
}

/// POST a merchant and return the created record.
pub async fn create(app: &App, body: serde_json::Value) -> serde_json::Value {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/merchants/")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("create");
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}
