//! Shared helpers for router-level tests.

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tower::ServiceExt;

use crate::contract::Contract;
use crate::models::Record;
use crate::state::AppState;
use crate::store::{CreateOutcome, MemoryRecordStore, RecordStore};
use crate::telemetry::{Telemetry, UsageCounters};

/// Store whose backend is never reachable
pub struct UnreachableStore;

#[async_trait]
impl RecordStore for UnreachableStore {
    async fn create(&self, _record: &Record) -> Result<CreateOutcome> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn fetch(&self, _id: &str) -> Result<Option<Record>> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

/// Telemetry that does nothing
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record_created(&self, _id: &str) {}

    fn annotate_operation(&self, _operation_id: &str) {}
}

/// Store that panics on every call
pub struct PanickingStore;

#[async_trait]
impl RecordStore for PanickingStore {
    async fn create(&self, _record: &Record) -> Result<CreateOutcome> {
        panic!("store exploded")
    }

    async fn fetch(&self, _id: &str) -> Result<Option<Record>> {
        panic!("store exploded")
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        panic!("store exploded")
    }
}

pub fn state_with_store(store: Arc<dyn RecordStore>) -> AppState {
    AppState {
        store,
        contract: Arc::new(Contract::builtin().unwrap()),
        telemetry: Arc::new(NoopTelemetry),
    }
}

/// State over a fresh in-memory store, plus its usage counters
pub fn memory_state() -> (AppState, Arc<UsageCounters>) {
    let counters = Arc::new(UsageCounters::new());
    let state = AppState {
        store: Arc::new(MemoryRecordStore::new()),
        contract: Arc::new(Contract::builtin().unwrap()),
        telemetry: counters.clone(),
    };
    (state, counters)
}

pub fn memory_app() -> (Router, Arc<UsageCounters>) {
    let (state, counters) = memory_state();
    (crate::app::build_router(state), counters)
}

/// Send a request with an optional JSON body
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    json: Option<JsonValue>,
) -> (StatusCode, HeaderMap, Bytes) {
    match json {
        Some(value) => {
            let body = serde_json::to_string(&value).unwrap();
            send_raw(app, method, uri, Some("application/json"), body).await
        }
        None => send_raw(app, method, uri, None, String::new()).await,
    }
}

pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: impl Into<String>,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        request = request.header(header::CONTENT_TYPE, content_type);
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(body.into())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}
