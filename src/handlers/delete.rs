use crate::error::{ApiError, ProblemDocument};
use crate::routes;
use crate::state::AppState;
use crate::validator::MatchedOperation;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};

/// DELETE /data/{id} handler - Remove a record
///
/// Always 204, whether or not the record existed.
#[utoipa::path(
    delete,
    path = routes::DATA_ITEM,
    params(
        ("id" = String, Path, description = "Caller-chosen record identifier")
    ),
    responses(
        (status = 204, description = "Record removed or never existed"),
        (status = 400, description = "Request does not conform to the contract", body = ProblemDocument, content_type = "application/problem+json"),
        (status = 500, description = "Response does not conform to the contract", body = ProblemDocument, content_type = "application/problem+json")
    ),
    tag = "data"
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(operation): Extension<MatchedOperation>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&id).await?;

    tracing::info!(operation = %operation.0, "Deleted record with id: {}", id);
    Ok(StatusCode::NO_CONTENT)
}
