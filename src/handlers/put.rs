use crate::error::{ApiError, ProblemDocument, Violation};
use crate::models::{CreateRecordRequest, Record};
use crate::routes;
use crate::state::AppState;
use crate::store::CreateOutcome;
use crate::validator::MatchedOperation;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::{StatusCode, Uri},
    Json,
};

/// PUT /data/{id} handler - Create a record
///
/// Records are write-once: a second PUT for the same id is answered with
/// 409 and leaves the stored content untouched.
#[utoipa::path(
    put,
    path = routes::DATA_ITEM,
    params(
        ("id" = String, Path, description = "Caller-chosen record identifier")
    ),
    request_body = CreateRecordRequest,
    responses(
        (status = 201, description = "Record created"),
        (status = 400, description = "Request does not conform to the contract", body = ProblemDocument, content_type = "application/problem+json"),
        (status = 409, description = "A record with this id already exists", body = ProblemDocument, content_type = "application/problem+json"),
        (status = 500, description = "Response does not conform to the contract", body = ProblemDocument, content_type = "application/problem+json")
    ),
    tag = "data"
)]
pub async fn put_handler(
    State(state): State<AppState>,
    Extension(operation): Extension<MatchedOperation>,
    Path(id): Path<String>,
    uri: Uri,
    body: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // JSON the contract accepted can still fail typed decoding (duplicate keys)
    let Json(request) = body.map_err(|rejection| ApiError::RequestInvalid {
        instance: uri.path().to_string(),
        violations: vec![Violation::new("body", rejection.body_text())],
    })?;

    let record = Record {
        id,
        content: request.content,
    };

    match state.store.create(&record).await? {
        CreateOutcome::Created => {
            state.telemetry.record_created(&record.id);
            tracing::info!(operation = %operation.0, "Created record with id: {}", record.id);
            Ok(StatusCode::CREATED)
        }
        CreateOutcome::Conflict => {
            tracing::info!(operation = %operation.0, "Record already exists with id: {}", record.id);
            Err(ApiError::Conflict {
                id: record.id,
                instance: uri.path().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ProblemDocument, ALREADY_EXISTS, PARSER_ERROR, PROBLEM_CONTENT_TYPE};
    use crate::models::RecordResponse;
    use crate::test_support::{memory_app, send, send_raw, state_with_store, UnreachableStore};
    use axum::http::{header, Method, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_creates_record() {
        let (app, counters) = memory_app();

        let (status, _, body) = send(&app, Method::PUT, "/data/abc123", Some(json!({ "content": "hello" }))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body.is_empty());
        assert_eq!(counters.created("a"), 1);
    }

    #[tokio::test]
    async fn test_put_twice_conflicts_and_keeps_first_content() {
        let (app, counters) = memory_app();

        let (first, _, _) = send(&app, Method::PUT, "/data/x", Some(json!({ "content": "original" }))).await;
        let (second, headers, body) = send(&app, Method::PUT, "/data/x", Some(json!({ "content": "changed" }))).await;

        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(headers[header::CONTENT_TYPE], PROBLEM_CONTENT_TYPE);

        let problem: ProblemDocument = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.problem_type, ALREADY_EXISTS);
        assert_eq!(problem.status, 409);
        assert_eq!(problem.instance, "/data/x");

        let (_, _, body) = send(&app, Method::GET, "/data/x", None).await;
        let record: RecordResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(record.content, "original");

        // Only the successful create is counted
        assert_eq!(counters.total_created(), 1);
    }

    #[tokio::test]
    async fn test_put_missing_content_is_rejected_and_not_stored() {
        let (app, _) = memory_app();

        let (status, headers, body) = send(&app, Method::PUT, "/data/abc", Some(json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::CONTENT_TYPE], PROBLEM_CONTENT_TYPE);
        let problem: ProblemDocument = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.problem_type, PARSER_ERROR);
        assert_eq!(problem.status, 400);
        assert_eq!(problem.instance, "/data/abc");
        let errors = &problem.extensions.unwrap()["errors"];
        assert_eq!(errors[0]["location"], "body.content");

        let (status, _, _) = send(&app, Method::GET, "/data/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_wrong_content_type_is_rejected() {
        let (app, _) = memory_app();

        let (status, _, body) = send_raw(&app, Method::PUT, "/data/abc", Some("text/plain"), r#"{"content":"hi"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let problem: ProblemDocument = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.problem_type, PARSER_ERROR);
    }

    #[tokio::test]
    async fn test_put_invalid_json_is_rejected() {
        let (app, _) = memory_app();

        let (status, _, _) = send_raw(&app, Method::PUT, "/data/abc", Some("application/json"), "{invalid json}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_put_duplicate_keys_are_rejected_and_not_stored() {
        let (app, counters) = memory_app();

        let (status, headers, body) = send_raw(
            &app,
            Method::PUT,
            "/data/dup",
            Some("application/json"),
            r#"{"content":1,"content":"a"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::CONTENT_TYPE], PROBLEM_CONTENT_TYPE);
        let problem: ProblemDocument = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.problem_type, PARSER_ERROR);
        assert_eq!(problem.status, 400);
        assert_eq!(problem.instance, "/data/dup");
        assert_eq!(problem.extensions.unwrap()["errors"][0]["location"], "body");

        let (status, _, _) = send(&app, Method::GET, "/data/dup", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(counters.total_created(), 0);
    }

    #[tokio::test]
    async fn test_put_non_string_content_is_rejected() {
        let (app, _) = memory_app();

        let (status, _, _) = send(&app, Method::PUT, "/data/abc", Some(json!({ "content": 42 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_put_store_failure_is_unstructured_server_error() {
        let app = crate::app::build_router(state_with_store(Arc::new(UnreachableStore)));

        let (status, headers, _) = send(&app, Method::PUT, "/data/abc", Some(json!({ "content": "hi" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(headers[header::CONTENT_TYPE], PROBLEM_CONTENT_TYPE);
    }
}
