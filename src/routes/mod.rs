//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - journey sessions under `/api/v1/journeys/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/journeys", post(http::http_start_journey))
        .route(
            "/api/v1/journeys/:id",
            get(http::http_get_journey).delete(http::http_delete_journey),
        )
        .route("/api/v1/journeys/:id/answer", post(http::http_post_answer))
        .route("/api/v1/journeys/:id/interact", post(http::http_post_interact))
        .route("/api/v1/journeys/:id/retry", post(http::http_post_retry))
        .route("/api/v1/journeys/:id/restart", post(http::http_post_restart))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::generator::DisabledGenerator;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let state = AppState::with_generator(Arc::new(DisabledGenerator), EngineSettings::default());
        build_router(Arc::new(state))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json") };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_generator() {
        let (status, body) = call(&app(), Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["generator"], "disabled");
    }

    #[tokio::test]
    async fn journey_lifecycle_over_http() {
        let app = app();
        let (status, view) = call(&app, Method::POST, "/api/v1/journeys", Some(json!({"language": "de", "level": 1}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(view["status"], "practicing");
        assert_eq!(view["source"], "fallback");
        assert_eq!(view["round"]["kind"], "matching");
        let id = view["sessionId"].as_str().expect("id").to_string();

        let (status, out) = call(
            &app,
            Method::POST,
            &format!("/api/v1/journeys/{id}/answer"),
            Some(json!({"attempt": {"kind": "matching", "selected": ["dir?", "Hallo,"]}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["correct"], false);
        assert_eq!(out["correction"]["value"], "Hallo, wie geht es dir?");
        assert_eq!(out["journey"]["feedback"]["state"], "incorrect");

        let (status, view) = call(&app, Method::POST, &format!("/api/v1/journeys/{id}/retry"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["feedback"]["state"], "none");

        let (status, view) = call(
            &app,
            Method::POST,
            &format!("/api/v1/journeys/{id}/interact"),
            Some(json!({"action": "select_word", "word": "Hallo,"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["attempt"]["selected"], json!(["Hallo,"]));

        let (status, view) =
            call(&app, Method::POST, &format!("/api/v1/journeys/{id}/restart"), Some(json!({"level": 6}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["level"], 6);
        assert_eq!(view["roundIndex"], 0);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/journeys/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = call(&app, Method::GET, &format!("/api/v1/journeys/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn invalid_interaction_is_unprocessable() {
        let app = app();
        let (_, view) = call(&app, Method::POST, "/api/v1/journeys", Some(json!({"language": "en"}))).await;
        let id = view["sessionId"].as_str().expect("id").to_string();
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/v1/journeys/{id}/interact"),
            Some(json!({"action": "set_spelling_input", "text": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_interaction");
    }
}
