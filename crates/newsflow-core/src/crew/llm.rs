//! LLM caller: chat completion over HTTP with a model fallback chain.
//!
//! Two wire formats are supported:
//! - `openai`: `POST {base_url}/chat/completions` with a bearer token
//! - `anthropic`: `POST {base_url}/v1/messages` with `x-api-key`
//!
//! Models are tried in the configured order. A failed request or a
//! successful but empty completion moves on to the next model.

use serde_json::Value;

use super::CrewError;
use crate::config::LlmConfig;
use crate::models::TokenUsage;

/// A successful completion.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

pub struct LlmCaller {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmCaller {
    pub fn new(config: LlmConfig) -> Result<Self, CrewError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CrewError::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Run the configured fallback chain.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse, CrewError> {
        self.complete_with(&self.config.models, system_prompt, user_prompt)
            .await
    }

    /// Run a fallback chain over `models`. Tokens spent on discarded
    /// attempts are included in the returned usage.
    pub async fn complete_with(
        &self,
        models: &[String],
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse, CrewError> {
        let api_key = self
            .config
            .resolved_api_key()
            .ok_or_else(|| CrewError::MissingApiKey(self.config.adapter.clone()))?;

        if models.is_empty() {
            return Err(CrewError::AllModelsFailed(vec![
                "no models configured".to_string(),
            ]));
        }

        let mut spent = TokenUsage::default();
        let mut failures = Vec::new();

        for model in models {
            match self.call_model(model, &api_key, system_prompt, user_prompt).await {
                Ok(resp) if resp.content.trim().is_empty() => {
                    tracing::warn!("[LlmCaller] Empty response from {}, trying next model", model);
                    spent = spent + resp.usage;
                    failures.push(CrewError::EmptyResponse(model.clone()).to_string());
                }
                Ok(mut resp) => {
                    resp.usage = spent + resp.usage;
                    return Ok(resp);
                }
                Err(e) => {
                    tracing::warn!("[LlmCaller] {} failed: {}", model, e);
                    failures.push(format!("{}: {}", model, e));
                }
            }
        }

        Err(CrewError::AllModelsFailed(failures))
    }

    async fn call_model(
        &self,
        model: &str,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse, CrewError> {
        match self.config.adapter.as_str() {
            "anthropic" | "claude" => {
                self.call_anthropic(model, api_key, system_prompt, user_prompt)
                    .await
            }
            "openai" | "opencode" => {
                self.call_openai(model, api_key, system_prompt, user_prompt)
                    .await
            }
            other => Err(CrewError::UnknownAdapter(other.to_string())),
        }
    }

    async fn call_anthropic(
        &self,
        model: &str,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse, CrewError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "user", "content": user_prompt }
            ]
        });
        if !system_prompt.is_empty() {
            body["system"] = Value::String(system_prompt.to_string());
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!("[LlmCaller] Calling Anthropic API: {} (model: {})", url, model);

        let request = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body);
        let json = send(request).await?;
        Ok(parse_anthropic_body(&json, model))
    }

    async fn call_openai(
        &self,
        model: &str,
        api_key: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<LlmResponse, CrewError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut messages = vec![];
        if !system_prompt.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": user_prompt }));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
        });
        if let Some(temp) = self.config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!("[LlmCaller] Calling chat completions: {} (model: {})", url, model);

        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("content-type", "application/json")
            .json(&body);
        let json = send(request).await?;
        Ok(parse_openai_body(&json, model))
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<Value, CrewError> {
    let response = request
        .send()
        .await
        .map_err(|e| CrewError::Http(format!("HTTP request failed: {}", e)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| CrewError::Http(format!("Failed to read response body: {}", e)))?;

    if !status.is_success() {
        return Err(CrewError::Api {
            status: status.as_u16(),
            body: text,
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| CrewError::Http(format!("Failed to parse response JSON: {}", e)))
}

/// Text blocks of a Messages API response, joined by newlines.
pub fn parse_anthropic_body(json: &Value, requested_model: &str) -> LlmResponse {
    let content = json
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|arr| {
            arr.iter()
                .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                .map(|s| s.to_string())
                .reduce(|a, b| format!("{}\n{}", a, b))
        })
        .unwrap_or_default();

    LlmResponse {
        content,
        model: response_model(json, requested_model),
        usage: usage_from(json.get("usage")),
    }
}

/// First choice of a chat completions response.
pub fn parse_openai_body(json: &Value, requested_model: &str) -> LlmResponse {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    LlmResponse {
        content,
        model: response_model(json, requested_model),
        usage: usage_from(json.get("usage")),
    }
}

fn response_model(json: &Value, requested_model: &str) -> String {
    json.get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(requested_model)
        .to_string()
}

fn usage_from(usage: Option<&Value>) -> TokenUsage {
    let Some(u) = usage else {
        return TokenUsage::default();
    };
    let count = |a: &str, b: &str| {
        u.get(a)
            .or_else(|| u.get(b))
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    };
    TokenUsage::new(
        count("prompt_tokens", "input_tokens"),
        count("completion_tokens", "output_tokens"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::stub::{completion, server_error, ChatStub};
    use serde_json::json;

    #[test]
    fn parses_chat_completion() {
        let body = json!({
            "model": "gpt-4o-mini-2024",
            "choices": [{ "message": { "role": "assistant", "content": "{\"a\":1}" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });
        let resp = parse_openai_body(&body, "gpt-4o-mini");
        assert_eq!(resp.content, "{\"a\":1}");
        assert_eq!(resp.model, "gpt-4o-mini-2024");
        assert_eq!(resp.usage, TokenUsage::new(12, 3));
    }

    #[test]
    fn parses_messages_response() {
        let body = json!({
            "content": [
                { "type": "text", "text": "first" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "second" }
            ],
            "usage": { "input_tokens": 7, "output_tokens": 2 }
        });
        let resp = parse_anthropic_body(&body, "claude");
        assert_eq!(resp.content, "first\nsecond");
        assert_eq!(resp.model, "claude");
        assert_eq!(resp.usage, TokenUsage::new(7, 2));
    }

    #[test]
    fn missing_fields_yield_empty_response() {
        let resp = parse_openai_body(&json!({}), "m");
        assert!(resp.content.is_empty());
        assert_eq!(resp.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let caller = LlmCaller::new(LlmConfig {
            adapter: "custom-no-env".to_string(),
            api_key: Some(String::new()),
            ..LlmConfig::default()
        })
        .unwrap();
        let err = caller.complete("", "hi").await.unwrap_err();
        assert!(matches!(err, CrewError::MissingApiKey(_)));
    }

    #[tokio::test]
    async fn unknown_adapter_fails_every_model() {
        let caller = LlmCaller::new(LlmConfig {
            adapter: "carrier-pigeon".to_string(),
            api_key: Some("k".to_string()),
            models: vec!["a".to_string(), "b".to_string()],
            ..LlmConfig::default()
        })
        .unwrap();
        match caller.complete("", "hi").await.unwrap_err() {
            CrewError::AllModelsFailed(reasons) => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn builds_client_with_configured_timeout() {
        let caller = LlmCaller::new(LlmConfig {
            timeout_secs: 7,
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(caller.config().timeout_secs, 7);
    }

    #[tokio::test]
    async fn falls_back_past_empty_and_failed_models() {
        let stub = ChatStub::start(vec![
            completion("   ", 5, 1),
            server_error(),
            completion("{\"ok\":true}", 10, 4),
        ])
        .await;
        let caller = LlmCaller::new(stub.config(&["m1", "m2", "m3"])).unwrap();

        let resp = caller.complete("system", "hello").await.unwrap();

        assert_eq!(resp.content, "{\"ok\":true}");
        assert_eq!(resp.model, "m3");
        assert_eq!(stub.models(), vec!["m1", "m2", "m3"]);
        // The discarded empty answer still counts; the failed request reports nothing.
        assert_eq!(resp.usage, TokenUsage::new(15, 5));
        assert_eq!(stub.user_prompt(0), "hello");
    }

    #[tokio::test]
    async fn first_good_model_ends_the_chain() {
        let stub = ChatStub::start(vec![completion("answer", 3, 2)]).await;
        let caller = LlmCaller::new(stub.config(&["primary", "fallback"])).unwrap();

        let resp = caller.complete("", "hi").await.unwrap();

        assert_eq!(resp.content, "answer");
        assert_eq!(stub.models(), vec!["primary"]);
        assert_eq!(resp.usage, TokenUsage::new(3, 2));
    }

    #[tokio::test]
    async fn exhausted_chain_lists_every_model() {
        let stub = ChatStub::start(vec![server_error(), completion("", 4, 0)]).await;
        let caller = LlmCaller::new(stub.config(&["a", "b"])).unwrap();

        match caller.complete("", "hi").await.unwrap_err() {
            CrewError::AllModelsFailed(reasons) => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons[0].starts_with("a: API returned 503"));
                assert!(reasons[1].contains("'b' returned an empty response"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(stub.models(), vec!["a", "b"]);
    }
}
