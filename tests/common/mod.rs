use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use learnpath::{routes, store::MemoryStore, AppState};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub fn create_test_app() -> Router {
    routes::router(AppState::new(Arc::new(MemoryStore::new())))
}

#[derive(Clone, Copy)]
pub enum As {
    Anonymous,
    Learner(Uuid),
    Admin(Uuid),
}

pub async fn call(app: &Router, method: &str, uri: &str, who: As, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    match who {
        As::Anonymous => {}
        As::Learner(id) => req = req.header("x-user-id", id.to_string()),
        As::Admin(id) => {
            req = req
                .header("x-user-id", id.to_string())
                .header("x-user-role", "admin")
        }
    }
    let req = match body {
        Some(json) => req
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
