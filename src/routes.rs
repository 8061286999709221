// Route path constants - single source of truth for all API paths

pub const HEALTH: &str = "/health";
pub const OPENAPI: &str = "/openapi.json";
pub const DATA: &str = "/data";
pub const DATA_ITEM: &str = "/data/{id}";

/// Whether requests to `path` are checked against the contract
pub fn is_contract_checked(path: &str) -> bool {
    path == DATA || path.starts_with("/data/")
}
