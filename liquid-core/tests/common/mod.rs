//! Shared fixtures for liquid-core integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use liquid_core::{Error, Event, FetchResponse, HttpMethod, NetworkingConfig, Payload, Result, Transport};
use serde_json::{json, Value};

/// What the scripted transport answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Status(u16),
    Unreachable,
}

/// Request captured by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub endpoint: String,
    pub method: HttpMethod,
    pub body: Value,
}

/// In-process transport whose replies can be changed while a manager runs
pub struct ScriptedTransport {
    default_reply: Mutex<Reply>,
    per_endpoint: Mutex<HashMap<String, Reply>>,
    delay: Duration,
    sent: Mutex<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub fn new(default_reply: Reply) -> Arc<Self> {
        Self::with_delay(default_reply, Duration::ZERO)
    }

    pub fn with_delay(default_reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            default_reply: Mutex::new(default_reply),
            per_endpoint: Mutex::new(HashMap::new()),
            delay,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.default_reply.lock().unwrap() = reply;
    }

    pub fn set_endpoint_reply(&self, endpoint: &str, reply: Reply) {
        self.per_endpoint
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), reply);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Every payload `name` delivered so far, in send order
    pub fn sent_names(&self) -> Vec<String> {
        self.sent()
            .iter()
            .flat_map(|r| r.body.as_array().cloned().unwrap_or_default())
            .map(|p| p["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn reply_for(&self, endpoint: &str) -> Reply {
        self.per_endpoint
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(*self.default_reply.lock().unwrap())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, body: Vec<u8>, endpoint: &str, method: HttpMethod) -> Result<u16> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.reply_for(endpoint);
        if reply != Reply::Unreachable {
            self.sent.lock().unwrap().push(SentRequest {
                endpoint: endpoint.to_string(),
                method,
                body: serde_json::from_slice(&body).unwrap_or(Value::Null),
            });
        }
        match reply {
            Reply::Status(status) => Ok(status),
            Reply::Unreachable => Err(Error::Transport("connection refused".to_string())),
        }
    }

    async fn fetch(&self, endpoint: &str) -> Result<FetchResponse> {
        match self.reply_for(endpoint) {
            Reply::Status(status) => Ok(FetchResponse {
                status,
                body: json!({"endpoint": endpoint}).to_string().into_bytes(),
            }),
            Reply::Unreachable => Err(Error::Transport("connection refused".to_string())),
        }
    }
}

/// Config with small limits suitable for tests
pub fn test_config(queue_size_limit: usize) -> NetworkingConfig {
    NetworkingConfig {
        server_url: "https://collect.test/".to_string(),
        queue_size_limit,
        flush_interval_secs: 60,
        batch_size: 50,
        timeout_secs: 5,
        persist_on_flush: true,
        queue_dir: None,
    }
}

pub fn payload(name: &str) -> Payload {
    let mut p = Payload::new();
    p.insert("name".to_string(), json!(name));
    p
}

pub fn names(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.payload()["name"].as_str().unwrap_or_default().to_string())
        .collect()
}
