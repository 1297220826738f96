//! Responder client — stateless wrapper around the Anthropic Messages API.
//!
//! One request, one assistant turn back. Retries, if any, belong to the
//! relay loop, not here.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationTurn;
use crate::error::ResponderError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The next-assistant-turn contract consumed by the relay loop.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Given the system prompt and a windowed transcript ending in a user
    /// turn, return the next assistant turn's text.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ResponderError>;
}

/// `Responder` backed by the Anthropic Messages API over HTTP.
pub struct AnthropicResponder {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl AnthropicResponder {
    pub fn new(api_key: SecretString, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model,
            max_tokens,
        }
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Responder for AnthropicResponder {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
    ) -> Result<String, ResponderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: history,
        };

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ResponderError::Api { status, body });
        }

        let data: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ResponderError::InvalidResponse(e.to_string()))?;

        extract_text(&data)
    }
}

/// First text content block of a response.
fn extract_text(resp: &MessagesResponse) -> Result<String, ResponderError> {
    resp.content
        .iter()
        .find(|block| block.kind == "text")
        .map(|block| block.text.clone())
        .ok_or_else(|| ResponderError::InvalidResponse("no text content block".into()))
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ConversationTurn],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationTurn;

    #[test]
    fn request_serializes_role_tagged_turns() {
        let history = vec![
            ConversationTurn::user("hi"),
            ConversationTurn::assistant("hello"),
            ConversationTurn::user("how are you?"),
        ];
        let req = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 500,
            system: "be brief",
            messages: &history,
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-20250514");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["system"], "be brief");
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][2]["content"], "how are you?");
    }

    #[test]
    fn response_text_is_extracted() {
        let raw = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Hello! What's on your mind?"}],
            "stop_reason": "end_turn"
        }"#;
        let resp: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            extract_text(&resp).unwrap(),
            "Hello! What's on your mind?"
        );
    }

    #[test]
    fn response_skips_non_text_blocks() {
        let raw = r#"{"content": [
            {"type": "thinking", "thinking": "..."},
            {"type": "text", "text": "answer"}
        ]}"#;
        let resp: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(&resp).unwrap(), "answer");
    }

    #[test]
    fn empty_content_is_invalid_response() {
        let resp: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(matches!(
            extract_text(&resp),
            Err(ResponderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_error() {
        let responder = AnthropicResponder::new(
            SecretString::from("test-key"),
            "claude-sonnet-4-20250514".into(),
            500,
        )
        .with_base_url("http://127.0.0.1:1/");

        let result = responder
            .complete("be brief", &[ConversationTurn::user("hi")])
            .await;
        assert!(matches!(result, Err(ResponderError::Request(_))));
    }
}
