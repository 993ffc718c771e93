//! Route definitions for web server.

use axum::{
    routing::{get, post},
    Router,
};

use super::{api, ws, AppState};

/// Path agents open their WebSocket on.
pub const AGENT_WS_PATH: &str = "/ws_agent";

/// Create the API router.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/agents", get(api::list_agents).post(api::register_agent))
        .route(
            "/agents/:id",
            get(api::get_agent).delete(api::decommission_agent),
        )
        .route("/agents/:id/send", post(api::send_to_agent))
}

/// Create the full app router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", create_api_router())
        .route(AGENT_WS_PATH, get(ws::ws_agent))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Registry;
    use crate::matrix::{Matrix, MatrixConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<Matrix>) {
        let registry = Arc::new(Registry::with_agents(["a1", "a2"]).unwrap());
        let matrix = Arc::new(Matrix::new(registry, MatrixConfig::default()));
        (create_app_router(AppState::new(matrix.clone())), matrix)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_agents() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let agents = json.as_array().unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0]["agent_id"], "a1");
        assert_eq!(agents[0]["connected"], false);
    }

    #[tokio::test]
    async fn test_get_unknown_agent() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/api/agents/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_and_decommission() {
        let (app, matrix) = app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/agents", serde_json::json!({"id": "a3"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(matrix.registry().contains("a3"));

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/agents", serde_json::json!({"id": "a3"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/agents", serde_json::json!({"id": "matrix"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(
                Request::delete("/api/agents/a3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!matrix.registry().contains("a3"));

        let response = app
            .oneshot(
                Request::delete("/api/agents/a3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_queues_for_offline_agent() {
        let (app, matrix) = app();
        let envelope = serde_json::json!({
            "src": "matrix",
            "dst": "a1",
            "command": "ping",
            "kwargs": {}
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/agents/a1/send", envelope.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["outbound_pending"], 1);

        let proxy = matrix.registry().lookup("a1").unwrap();
        assert_eq!(proxy.outbound().try_pop().unwrap().command, "ping");

        let response = app
            .oneshot(json_request("POST", "/api/agents/ghost/send", envelope))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_rejects_mismatched_destination() {
        let (app, matrix) = app();

        for dst in ["a2", "matrix"] {
            let envelope = serde_json::json!({"src": "a2", "dst": dst, "command": "ping"});
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/agents/a1/send", envelope))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        assert!(matrix.registry().lookup("a1").unwrap().outbound().is_empty());
        assert!(matrix.registry().lookup("a2").unwrap().outbound().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_register_conflicts() {
        let (app, _) = app();
        let body = serde_json::json!({"id": "a3"});

        let (first, second) = tokio::join!(
            app.clone().oneshot(json_request("POST", "/api/agents", body.clone())),
            app.clone().oneshot(json_request("POST", "/api/agents", body)),
        );
        let mut statuses = vec![first.unwrap().status(), second.unwrap().status()];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
    }
}
