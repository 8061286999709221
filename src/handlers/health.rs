use crate::routes;
use axum::http::StatusCode;

/// GET /health handler - Liveness check
///
/// Answers GET and HEAD without consulting the store or the contract, so it
/// stays green while the backend is unreachable.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Service is up")
    ),
    tag = "health"
)]
pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use crate::test_support::{send, state_with_store, UnreachableStore};
    use axum::http::{Method, StatusCode};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_with_unreachable_store() {
        let app = crate::app::build_router(state_with_store(Arc::new(UnreachableStore)));

        let (status, _, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_health_head() {
        let app = crate::app::build_router(state_with_store(Arc::new(UnreachableStore)));

        let (status, _, body) = send(&app, Method::HEAD, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_health_ignores_request_body() {
        let app = crate::app::build_router(state_with_store(Arc::new(UnreachableStore)));

        let (status, _, _) = send(
            &app,
            Method::GET,
            "/health",
            Some(serde_json::json!({ "not": "in the contract" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
