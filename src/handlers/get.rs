use crate::error::{ApiError, ProblemDocument};
use crate::models::RecordResponse;
use crate::routes;
use crate::state::AppState;
use crate::validator::MatchedOperation;
use axum::{
    extract::{Extension, Path, State},
    http::Uri,
    Json,
};

/// GET /data/{id} handler - Retrieve a record
#[utoipa::path(
    get,
    path = routes::DATA_ITEM,
    params(
        ("id" = String, Path, description = "Caller-chosen record identifier")
    ),
    responses(
        (status = 200, description = "Record found", body = RecordResponse),
        (status = 400, description = "Request does not conform to the contract", body = ProblemDocument, content_type = "application/problem+json"),
        (status = 404, description = "No record with this id", body = ProblemDocument, content_type = "application/problem+json"),
        (status = 500, description = "Response does not conform to the contract", body = ProblemDocument, content_type = "application/problem+json")
    ),
    tag = "data"
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(operation): Extension<MatchedOperation>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<Json<RecordResponse>, ApiError> {
    match state.store.fetch(&id).await? {
        Some(record) => {
            tracing::info!(operation = %operation.0, "Retrieved record with id: {}", id);
            Ok(Json(record.into()))
        }
        None => {
            tracing::info!(operation = %operation.0, "Record not found with id: {}", id);
            Err(ApiError::NotFound {
                id,
                instance: uri.path().to_string(),
            })
        }
    }
}
