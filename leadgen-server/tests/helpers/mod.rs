//! Shared fixtures for the leadgen-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use leadgen_common::config::{parse_toml_config, TomlConfig};
use leadgen_common::db::{self, GenerationRun};
use leadgen_server::crm::{ContactPayload, CrmClient, CrmError, CrmSettings};
use leadgen_server::jobs::JobWorkers;
use leadgen_server::llm::{CompletionClient, LlmError};
use leadgen_server::{build_router, start_services, AppState, CrmTarget};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ADMIN_ID: &str = "admin-1";

/// Completion fake: numbered titles for the titles prompt, a fixed body for
/// script prompts
pub struct FakeCompletion {
    pub title_count: usize,
    /// When set, the titles prompt fails
    pub fail_titles: AtomicBool,
    /// Script prompts containing this text fail
    pub fail_script_containing: Option<String>,
    /// When set, every call waits for a permit
    pub gate: Option<Arc<Semaphore>>,
    pub calls: AtomicUsize,
}

impl FakeCompletion {
    pub fn new(title_count: usize) -> Self {
        Self {
            title_count,
            fail_titles: AtomicBool::new(false),
            fail_script_containing: None,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }
}

pub fn plumber_titles(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("Plumbing question number {}?", i))
        .collect()
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if prompt.starts_with("Act as a market research expert") {
            if self.fail_titles.load(Ordering::SeqCst) {
                return Err(LlmError::Api(502, "bad gateway".to_string()));
            }
            let list = plumber_titles(self.title_count)
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. {}", i + 1, t))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(format!("Here you go:\n{}", list));
        }

        if let Some(marker) = &self.fail_script_containing {
            if prompt.contains(marker.as_str()) {
                return Err(LlmError::EmptyContent);
            }
        }
        Ok("Hi, I'm Sam from Sam's Plumbing. Today we look at drains.".to_string())
    }
}

#[derive(Default)]
pub struct FakeCrm {
    pub contacts: Mutex<Vec<ContactPayload>>,
}

#[async_trait]
impl CrmClient for FakeCrm {
    async fn create_contact(&self, payload: &ContactPayload) -> Result<String, CrmError> {
        let mut contacts = self.contacts.lock().unwrap();
        contacts.push(payload.clone());
        Ok(format!("ghl-{}", contacts.len()))
    }

    async fn add_to_workflow(&self, _contact_id: &str, _workflow_id: &str) -> Result<(), CrmError> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub state: AppState,
    pub workers: JobWorkers,
}

/// Config with no artificial delays and generous rate limits
pub fn test_config() -> TomlConfig {
    parse_toml_config(
        r#"
[generation]
scripts_per_lead = 5
max_attempts = 2
retry_backoff_ms = 0
title_delay_ms = 0

[rate_limits.intake]
window_secs = 900
max_requests = 100

[rate_limits.results]
window_secs = 60
max_requests = 1000
"#,
    )
    .expect("valid test config")
}

pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::create_schema(&pool).await.expect("Failed to create schema");
    pool
}

pub async fn create_test_app_with(
    config: TomlConfig,
    completion: Arc<FakeCompletion>,
    crm: Option<Arc<FakeCrm>>,
) -> TestApp {
    let pool = memory_pool().await;
    db::upsert_profile(&pool, ADMIN_ID, Some("admin@example.com"), true)
        .await
        .expect("seed admin");

    let crm = crm.map(|client| CrmTarget {
        client,
        settings: CrmSettings {
            location_id: "loc-test".to_string(),
            workflow_id: None,
            source: "Test".to_string(),
        },
    });

    let (state, workers) = start_services(pool.clone(), &config, completion, crm);
    TestApp {
        router: build_router(state.clone()),
        pool,
        state,
        workers,
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config(), Arc::new(FakeCompletion::new(5)), None).await
}

pub fn plumber_form() -> Value {
    serde_json::json!({
        "firstName": "Sam",
        "companyName": "Sam's Plumbing",
        "email": "sam@x.com",
        "businessType": "Plumber",
        "businessDescription": "drain cleaning",
        "city": "Austin"
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&bytes).to_string();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        body,
        text,
    }
}

pub fn get_request(uri: &str, user_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value, client: &str, user_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", client);
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id);
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

/// Submit the intake form and return the identifier
pub async fn submit(app: &TestApp, form: &Value) -> String {
    let response = send(
        &app.router,
        json_request("POST", "/api/generate", form, "203.0.113.7", None),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "intake failed: {}", response.text);
    response.body["identifier"].as_str().unwrap().to_string()
}

pub async fn lead_id_for(pool: &SqlitePool, identifier: &str) -> Uuid {
    db::find_lead_by_identifier(pool, identifier)
        .await
        .unwrap()
        .expect("lead exists")
        .id
}

/// Poll until the lead's run reaches a terminal state
pub async fn wait_for_terminal_run(pool: &SqlitePool, lead_id: Uuid) -> GenerationRun {
    for _ in 0..500 {
        if let Some(run) = db::find_run(pool, lead_id).await.unwrap() {
            if run.state.is_terminal() {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation for {} did not finish", lead_id);
}
