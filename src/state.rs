use crate::contract::Contract;
use crate::store::RecordStore;
use crate::telemetry::Telemetry;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub contract: Arc<Contract>,
    pub telemetry: Arc<dyn Telemetry>,
}
