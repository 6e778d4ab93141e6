use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::{AgentError, ChatBackend, ChatRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI-compatible chat-completions client
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, AgentError> {
        Self::with_timeout(api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("API key is empty".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(request: &ChatRequest) -> Value {
        let messages = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.to_string(),
                    "content": m.content,
                })
            })
            .collect::<Vec<_>>();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }

    /// Pull the first choice's message text out of a completion payload
    fn response_text(payload: &Value) -> Result<String, AgentError> {
        let choice = payload
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| AgentError::Malformed("No choices in response".to_string()))?;

        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AgentError::EmptyResponse);
        }

        Ok(text.to_string())
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            json = request.json_response,
            "Sending chat completion request"
        );

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout)
                } else {
                    AgentError::Http(e)
                }
            })?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(AgentError::Api { status, body });
        }

        let payload: Value = res.json().await?;
        Self::response_text(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;

    #[test]
    fn test_rejects_empty_api_key() {
        let result = ChatClient::new("  ");
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ChatClient::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_request_body_includes_json_format_only_when_asked() {
        let request = ChatRequest::new(
            "gpt-4o-mini",
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
        );
        let body = ChatClient::request_body(&request);
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");

        let body = ChatClient::request_body(&request.json());
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_response_text_extraction() {
        let payload = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(ChatClient::response_text(&payload).unwrap(), "hello");

        let empty = json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(
            ChatClient::response_text(&empty),
            Err(AgentError::EmptyResponse)
        ));

        let missing = json!({"id": "x"});
        assert!(matches!(
            ChatClient::response_text(&missing),
            Err(AgentError::Malformed(_))
        ));
    }
}
