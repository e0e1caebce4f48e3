//! Remediation assistant: chat-completion proxying.
//!
//! Forwards the conversation to an OpenAI-compatible `/chat/completions`
//! endpoint, prepending a remediation-assistant system prompt and any
//! scraped source texts as grounding. One bounded-timeout attempt per
//! request; upstream failures are surfaced to the caller with their
//! status, never silently dropped.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AssistantConfig;

/// Environment variable holding the upstream API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Upstream error bodies are clipped to this length before surfacing.
const MAX_UPSTREAM_ERROR_BYTES: usize = 300;

/// A role-tagged conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Scraped reference material grounding the assistant's answer.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceText {
    pub url: String,
    #[serde(default)]
    pub text: String,
}

/// Why a completion attempt failed. The boundary adapter maps
/// `Upstream` onto the upstream status code and everything else onto a
/// local error response.
#[derive(Debug)]
pub enum AssistantError {
    MissingCredential,
    Transport(String),
    Upstream { status: u16, message: String },
    Malformed(String),
}

impl std::fmt::Display for AssistantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantError::MissingCredential => {
                write!(f, "{} environment variable not set", API_KEY_ENV)
            }
            AssistantError::Transport(e) => write!(f, "upstream request failed: {}", e),
            AssistantError::Upstream { status, message } => {
                write!(f, "upstream error {}: {}", status, message)
            }
            AssistantError::Malformed(e) => write!(f, "malformed upstream response: {}", e),
        }
    }
}

impl std::error::Error for AssistantError {}

const SYSTEM_PROMPT: &str = "You are a security remediation assistant. Answer questions about \
the selected security issue concisely and concretely, with actionable steps an administrator \
can take. When reference material is provided, ground your answer in it and say so when it \
does not cover the question.";

/// Ask the upstream model for a reply to the conversation.
pub async fn complete(
    config: &AssistantConfig,
    messages: &[ChatMessage],
    sources: &[SourceText],
) -> Result<String, AssistantError> {
    let api_key = std::env::var(API_KEY_ENV).map_err(|_| AssistantError::MissingCredential)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AssistantError::Transport(e.to_string()))?;

    let body = serde_json::json!({
        "model": config.model,
        "messages": build_messages(config, messages, sources),
    });

    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| AssistantError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let mut message = response.text().await.unwrap_or_default();
        message.truncate(floor_char_boundary(&message, MAX_UPSTREAM_ERROR_BYTES));
        return Err(AssistantError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    let json: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AssistantError::Malformed(e.to_string()))?;
    parse_reply(&json)
}

/// Assemble the upstream message list: system prompt (with grounding
/// sources appended) followed by the caller's conversation verbatim.
fn build_messages(
    config: &AssistantConfig,
    messages: &[ChatMessage],
    sources: &[SourceText],
) -> Vec<serde_json::Value> {
    let mut system = String::from(SYSTEM_PROMPT);
    for source in sources {
        let mut text = source.text.clone();
        text.truncate(floor_char_boundary(&text, config.max_source_bytes));
        if text.trim().is_empty() {
            continue;
        }
        system.push_str("\n\nReference material from ");
        system.push_str(&source.url);
        system.push_str(":\n");
        system.push_str(&text);
    }

    let mut out = vec![serde_json::json!({"role": "system", "content": system})];
    for m in messages {
        out.push(serde_json::json!({"role": m.role, "content": m.content}));
    }
    out
}

/// Extract the assistant reply from a chat-completions response.
fn parse_reply(json: &serde_json::Value) -> Result<String, AssistantError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AssistantError::Malformed("missing choices[0].message.content".to_string())
        })
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: &str, content: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_build_messages_prepends_system_prompt() {
        let config = AssistantConfig::default();
        let out = build_messages(&config, &[message("user", "How do I fix this?")], &[]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["role"], "system");
        assert_eq!(out[1]["role"], "user");
        assert_eq!(out[1]["content"], "How do I fix this?");
    }

    #[test]
    fn test_build_messages_appends_sources_to_system_prompt() {
        let config = AssistantConfig::default();
        let sources = vec![SourceText {
            url: "https://docs.example.com/fix".to_string(),
            text: "Rotate the key in the console.".to_string(),
        }];
        let out = build_messages(&config, &[message("user", "hi")], &sources);
        let system = out[0]["content"].as_str().unwrap();
        assert!(system.contains("https://docs.example.com/fix"));
        assert!(system.contains("Rotate the key"));
    }

    #[test]
    fn test_build_messages_caps_source_text() {
        let config = AssistantConfig {
            max_source_bytes: 10,
            ..AssistantConfig::default()
        };
        let sources = vec![SourceText {
            url: "https://a.example".to_string(),
            text: "x".repeat(500),
        }];
        let out = build_messages(&config, &[], &sources);
        let system = out[0]["content"].as_str().unwrap();
        assert!(system.len() < SYSTEM_PROMPT.len() + 100);
    }

    #[test]
    fn test_build_messages_skips_empty_sources() {
        let config = AssistantConfig::default();
        let sources = vec![SourceText {
            url: "https://a.example".to_string(),
            text: "   ".to_string(),
        }];
        let out = build_messages(&config, &[], &sources);
        assert_eq!(out[0]["content"], SYSTEM_PROMPT);
    }

    #[test]
    fn test_parse_reply_extracts_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Do the thing."}}]
        });
        assert_eq!(parse_reply(&json).unwrap(), "Do the thing.");
    }

    #[test]
    fn test_parse_reply_rejects_malformed() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_reply(&json),
            Err(AssistantError::Malformed(_))
        ));
    }
}
