use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, put},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::handlers::{delete_handler, get_handler, health_handler, put_handler};
use crate::routes;
use crate::state::AppState;
use crate::validator;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Assemble the service router.
///
/// Layers, outermost first: panic catcher, request id, trace span,
/// contract validation.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(routes::HEALTH, get(health_handler))
        .route(routes::OPENAPI, get(validator::contract_handler))
        .route(
            routes::DATA_ITEM,
            put(put_handler).get(get_handler).delete(delete_handler),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), validator::validate_contract))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
                operation_id = tracing::field::Empty,
            )
        }))
        .layer(middleware::from_fn(request_id))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Tag each request with an id, reusing the caller's `x-request-id` if sent
async fn request_id(mut request: Request, next: Next) -> Response {
    let value = match request.headers().get(REQUEST_ID_HEADER) {
        Some(existing) => existing.clone(),
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string());
            match generated {
                Ok(value) => value,
                Err(_) => return next.run(request).await,
            }
        }
    };
    request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, value);
    response
}
