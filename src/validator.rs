use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value as JsonValue;

use crate::error::{ApiError, UnstructuredFailure, Violation};
use crate::routes;
use crate::state::AppState;

/// Largest request body accepted on contract-checked routes
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `operationId` of the contract operation a request matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedOperation(pub String);

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

/// Middleware checking `/data` traffic against the contract.
///
/// Non-conforming requests never reach a handler (400). Non-conforming
/// handler responses are replaced (500). Other paths pass through.
pub async fn validate_contract(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !routes::is_contract_checked(&path) {
        return next.run(request).await;
    }

    let contract = state.contract.clone();
    let (mut parts, body) = request.into_parts();

    let operation = match contract.match_request(&parts.method, &path) {
        Ok(operation) => operation,
        Err(violations) => return reject_request(path, violations),
    };
    state.telemetry.annotate_operation(operation.id());

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let violation = Violation::new(
                "body",
                format!("request body unreadable or larger than {} bytes: {}", MAX_BODY_BYTES, e),
            );
            return reject_request(path, vec![violation]);
        }
    };

    let violations = operation.validate_request(content_type(&parts.headers), &bytes);
    if !violations.is_empty() {
        return reject_request(path, violations);
    }

    parts
        .extensions
        .insert(MatchedOperation(operation.id().to_string()));
    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    if response.extensions().get::<UnstructuredFailure>().is_some() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let violation = Violation::new("body", format!("response body unreadable: {}", e));
            return reject_response(path, operation.id(), vec![violation]);
        }
    };

    let violations = operation.validate_response(parts.status, content_type(&parts.headers), &bytes);
    if !violations.is_empty() {
        return reject_response(path, operation.id(), violations);
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn reject_request(instance: String, violations: Vec<Violation>) -> Response {
    tracing::info!(
        instance = %instance,
        violations = violations.len(),
        "Request rejected by contract"
    );
    ApiError::RequestInvalid {
        instance,
        violations,
    }
    .into_response()
}

fn reject_response(instance: String, operation_id: &str, violations: Vec<Violation>) -> Response {
    tracing::error!(
        instance = %instance,
        operation_id,
        "Handler response breaks contract: {:?}",
        violations
    );
    ApiError::ResponseInvalid {
        instance,
        violations,
    }
    .into_response()
}

/// GET /openapi.json - the contract document itself
pub async fn contract_handler(State(state): State<AppState>) -> Json<JsonValue> {
    Json(state.contract.document().clone())
}
