//! OpenAI-compatible chat completions client
//!
//! Talks to any backend exposing `POST {base-url}/v1/chat/completions`
//! (the ASI1 API by default). Non-streaming only.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// OpenAI-compatible API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new client from configuration
    ///
    /// Fails if the API key variable named in the config is unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": "user",
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "stream": false,
        })
    }

    fn parse_response(&self, api_response: OpenAIResponse) -> Result<CompletionResponse, LlmError> {
        debug!(choice_count = api_response.choices.len(), "parse_response: called");
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content,
            stop_reason: StopReason::from_openai(choice.finish_reason.as_deref()),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    /// One HTTP round trip; every failure comes straight back as an error
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "OpenAIClient::complete: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            debug!("OpenAIClient::complete: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "OpenAIClient::complete: API error");
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message });
        }

        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        self.parse_response(api_response)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptLoader;
    use crate::synth::{DEFAULT_EXCERPT_LIMIT, Synthesizer};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(max_tokens: u32) -> OpenAIClient {
        client_for("https://api.asi1.ai", max_tokens)
    }

    fn client_for(base_url: &str, max_tokens: u32) -> OpenAIClient {
        OpenAIClient {
            model: "asi1-mini".to_string(),
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            http: Client::new(),
            max_tokens,
            timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let body = client(4096).build_request_body(&CompletionRequest::prompt("Hello", 0.6, 1000));

        assert_eq!(body["model"], "asi1-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["stream"], false);
        assert!((body["temperature"].as_f64().unwrap() - 0.6).abs() < 1e-6);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_max_tokens_capped() {
        let body = client(1000).build_request_body(&CompletionRequest::prompt("Test", 0.7, 5000));
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        }"#;
        let api: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let resp = client(4096).parse_response(api).unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hi"));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert_eq!(resp.usage.total(), 7);
    }

    #[test]
    fn test_parse_response_without_usage() {
        let raw = r#"{"choices": [{"message": {"content": "Hi"}, "finish_reason": null}]}"#;
        let api: OpenAIResponse = serde_json::from_str(raw).unwrap();
        let resp = client(4096).parse_response(api).unwrap();
        assert_eq!(resp.usage, TokenUsage::default());
    }

    #[test]
    fn test_parse_response_no_choices() {
        let api: OpenAIResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            client(4096).parse_response(api),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    /// Read one HTTP request: headers, then `content-length` bytes of body
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut received = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(n) = socket.read(&mut chunk).await else {
                return;
            };
            if n == 0 {
                return;
            }
            received.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&received);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if received.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    /// Local HTTP server giving every request the same canned response;
    /// returns its base URL and a count of requests served
    async fn canned_server(status_line: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (base_url, hits)
    }

    #[tokio::test]
    async fn test_server_error_is_one_request() {
        let (base_url, hits) = canned_server("503 Service Unavailable", "overloaded").await;
        let client = client_for(&base_url, 4096);

        let started = std::time::Instant::now();
        let result = client.complete(CompletionRequest::prompt("Hello", 0.6, 100)).await;
        assert!(matches!(result, Err(LlmError::ApiError { status: 503, .. })));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_server_error_becomes_placeholder_reply() {
        let (base_url, hits) = canned_server("503 Service Unavailable", "overloaded").await;
        let llm: Arc<dyn LlmClient> = Arc::new(client_for(&base_url, 4096));
        let synthesizer = Synthesizer::new(llm, Arc::new(PromptLoader::embedded_only()), DEFAULT_EXCERPT_LIMIT, 1024);

        let reply = synthesizer.generate("Hello".to_string(), 0.6).await;
        assert_eq!(reply, "Generation failed: API error 503: overloaded");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_complete_success_over_http() {
        let body = r#"{"choices": [{"message": {"content": "Hi there"}, "finish_reason": "length"}]}"#;
        let (base_url, hits) = canned_server("200 OK", body).await;

        let resp = client_for(&base_url, 4096)
            .complete(CompletionRequest::prompt("Hello", 0.6, 100))
            .await
            .unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hi there"));
        assert_eq!(resp.stop_reason, StopReason::MaxTokens);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let (base_url, hits) = canned_server("429 Too Many Requests", "slow down").await;
        let result = client_for(&base_url, 4096)
            .complete(CompletionRequest::prompt("Hello", 0.6, 100))
            .await;
        assert!(matches!(result, Err(LlmError::RateLimited { .. })));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
