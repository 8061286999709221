use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

pub const PARSER_ERROR: &str = "parser-error";
pub const ALREADY_EXISTS: &str = "data/already-exists";
pub const NOT_FOUND: &str = "data/not-found";

/// Problem detail body returned for every structured error
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProblemDocument {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub detail: String,
    pub instance: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub extensions: Option<Map<String, JsonValue>>,
}

/// A single way in which a message broke the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Where the problem is, e.g. `body.content` or `path.id`
    pub location: String,
    pub message: String,
}

impl Violation {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Marks a response as an untranslated server failure. The contract
/// validator lets such responses through unchecked.
#[derive(Debug, Clone, Copy)]
pub struct UnstructuredFailure;

/// Custom error type for API endpoints
///
/// The first four variants are translated into problem documents. Store
/// failures are not: they surface as a bare 500.
#[derive(Debug)]
pub enum ApiError {
    /// Incoming request does not match the contract
    RequestInvalid {
        instance: String,
        violations: Vec<Violation>,
    },
    /// Handler produced a response the contract does not allow
    ResponseInvalid {
        instance: String,
        violations: Vec<Violation>,
    },
    /// Record id already taken
    Conflict { id: String, instance: String },
    /// No record for the id
    NotFound { id: String, instance: String },
    /// Unclassified backend failure
    StoreUnavailable(anyhow::Error),
}

impl ApiError {
    fn problem(self) -> Result<(StatusCode, ProblemDocument), anyhow::Error> {
        let (status, problem_type, title, detail, instance, violations) = match self {
            ApiError::RequestInvalid { instance, violations } => (
                StatusCode::BAD_REQUEST,
                PARSER_ERROR,
                "Bad Request",
                "Request does not conform to the API contract".to_string(),
                instance,
                Some(violations),
            ),
            ApiError::ResponseInvalid { instance, violations } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PARSER_ERROR,
                "Internal Server Error",
                "Response does not conform to the API contract".to_string(),
                instance,
                Some(violations),
            ),
            ApiError::Conflict { id, instance } => (
                StatusCode::CONFLICT,
                ALREADY_EXISTS,
                "Conflict",
                format!("Record already exists: {}", id),
                instance,
                None,
            ),
            ApiError::NotFound { id, instance } => (
                StatusCode::NOT_FOUND,
                NOT_FOUND,
                "Not Found",
                format!("Record not found: {}", id),
                instance,
                None,
            ),
            ApiError::StoreUnavailable(err) => return Err(err),
        };

        let extensions = violations.map(|violations| {
            let mut map = Map::new();
            map.insert("errors".to_string(), serde_json::json!(violations));
            map
        });

        Ok((
            status,
            ProblemDocument {
                problem_type: problem_type.to_string(),
                title: title.to_string(),
                detail,
                instance,
                status: status.as_u16(),
                extensions,
            },
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.problem() {
            Ok((status, problem)) => {
                let mut response = (status, Json(problem)).into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
                );
                response
            }
            Err(err) => {
                tracing::error!("Store error: {:#}", err);
                let mut response =
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
                response.extensions_mut().insert(UnstructuredFailure);
                response
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::StoreUnavailable(err)
    }
}
