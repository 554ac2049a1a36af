//! Local chat-completions endpoint that answers from a fixed script and
//! records every request body it receives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::LlmConfig;

#[derive(Clone, Default)]
struct Script {
    replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    received: Arc<Mutex<Vec<Value>>>,
}

pub(crate) struct ChatStub {
    base_url: String,
    script: Script,
}

impl ChatStub {
    pub(crate) async fn start(replies: Vec<(StatusCode, Value)>) -> Self {
        let script = Script {
            replies: Arc::new(Mutex::new(replies.into())),
            received: Arc::default(),
        };
        let app = Router::new()
            .route("/chat/completions", post(reply))
            .with_state(script.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            script,
        }
    }

    /// OpenAI-style config pointed at this endpoint.
    pub(crate) fn config(&self, models: &[&str]) -> LlmConfig {
        LlmConfig {
            adapter: "openai".to_string(),
            base_url: self.base_url.clone(),
            api_key: Some("test-key".to_string()),
            models: models.iter().map(|m| m.to_string()).collect(),
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.script.received.lock().unwrap().clone()
    }

    /// Requested model of each call, in arrival order.
    pub(crate) fn models(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r["model"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Last user message of the `n`th call.
    pub(crate) fn user_prompt(&self, n: usize) -> String {
        let requests = self.requests();
        requests[n]["messages"]
            .as_array()
            .and_then(|m| m.last())
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default()
            .to_string()
    }
}

async fn reply(State(script): State<Script>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    script.received.lock().unwrap().push(body);
    let next = script.replies.lock().unwrap().pop_front();
    match next {
        Some((status, value)) => (status, Json(value)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "script exhausted" })),
        ),
    }
}

/// A 200 chat completion with `content` and the given token counts.
pub(crate) fn completion(content: &str, prompt_tokens: u64, completion_tokens: u64) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": prompt_tokens, "completion_tokens": completion_tokens }
        }),
    )
}

pub(crate) fn server_error() -> (StatusCode, Value) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "message": "overloaded" } }),
    )
}
