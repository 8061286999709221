use serde::{Deserialize, Serialize};

/// A stored record. `id` is supplied by the caller and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub content: String,
}

/// Request body for PUT /data/{id}
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateRecordRequest {
    pub content: String,
}

/// Response type for successful GET operations
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecordResponse {
    pub id: String,
    pub content: String,
}

impl From<Record> for RecordResponse {
    fn from(record: Record) -> Self {
        RecordResponse {
            id: record.id,
            content: record.content,
        }
    }
}
