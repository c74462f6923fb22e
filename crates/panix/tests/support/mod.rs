//! In-process Slack webhook stand-in shared by the integration tests.

#![allow(dead_code)]

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE},
    routing::any,
};
use chrono::Utc;
use panix::{HostIdentity, Reporter, SlackConfig};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;

/// One request received by the webhook.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: Method,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct ReceiverState {
    status: StatusCode,
    delay: Duration,
    hits: Arc<Mutex<Vec<Hit>>>,
}

pub struct Receiver {
    pub url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl Receiver {
    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().clone()
    }

    /// Waits until at least `count` hits arrived or `timeout` elapsed.
    pub async fn wait_for_hits(&self, count: usize, timeout: Duration) -> Vec<Hit> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.hits.lock().len() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.hits()
    }
}

async fn hook(
    State(state): State<ReceiverState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let hit = Hit {
        method,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.hits.lock().push(hit);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let reply = if state.status.is_success() { "ok" } else { "no_service" };
    (state.status, reply)
}

/// Starts a webhook answering every request with `status`.
pub async fn spawn_receiver(status: StatusCode) -> Receiver {
    spawn_receiver_with_delay(status, Duration::ZERO).await
}

pub async fn spawn_receiver_with_delay(status: StatusCode, delay: Duration) -> Receiver {
    init_logging();

    let hits = Arc::new(Mutex::new(Vec::new()));
    let state = ReceiverState {
        status,
        delay,
        hits: hits.clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/hook", any(hook)).with_state(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Receiver {
        url: format!("http://{addr}/hook"),
        hits,
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("panix=debug")
        .with_test_writer()
        .try_init();
}

pub fn identity() -> HostIdentity {
    HostIdentity::new("api-1", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), Utc::now())
}

pub fn slack_config(enabled: bool, webhook_url: &str) -> SlackConfig {
    SlackConfig {
        enabled,
        channel: "core-panic".to_string(),
        webhook_url: webhook_url.to_string(),
        enabled_envs: vec!["dev".into(), "staging".into(), "prod".into()],
    }
}

pub fn reporter(environment: &str, enabled: bool, webhook_url: &str) -> Reporter {
    Reporter::with_identity(
        environment,
        Some(slack_config(enabled, webhook_url)),
        identity(),
    )
}

/// The "Panic Cause" field of the trailing attachment.
pub fn panic_cause(body: &Value) -> Option<&str> {
    body["attachments"]
        .as_array()?
        .last()?["fields"]
        .as_array()?
        .iter()
        .find(|field| field["title"] == "Panic Cause")?["value"]
        .as_str()
}
