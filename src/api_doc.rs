use utoipa::OpenApi;

use crate::error::ProblemDocument;
use crate::handlers;
use crate::models::{CreateRecordRequest, RecordResponse};

/// OpenAPI documentation
///
/// This is also the default contract the `/data` routes are validated against.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "records-api",
        version = "1.0.0",
        description = "Create, fetch and delete immutable text records backed by Google Cloud Spanner"
    ),
    paths(
        handlers::health::health_handler,
        handlers::put::put_handler,
        handlers::get::get_handler,
        handlers::delete::delete_handler
    ),
    components(
        schemas(
            CreateRecordRequest,
            RecordResponse,
            ProblemDocument
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "data", description = "Record operations")
    )
)]
pub struct ApiDoc;
