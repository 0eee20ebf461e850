use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;

use crate::config::SummarizerConfig;
use crate::error::SummarizerError;
use crate::patterns::NarrativeSummarizer;

/// OpenAI-compatible chat-completions client that writes pattern summaries.
#[derive(Clone)]
pub struct ChatSummarizer {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl ChatSummarizer {
    /// Returns `None` when `LLM_API_KEY` is unset.
    pub fn from_env(config: &SummarizerConfig) -> Option<Self> {
        let api_key = env::var("LLM_API_KEY").ok().filter(|key| !key.trim().is_empty())?;
        let api_base = env::var("LLM_API_BASE").unwrap_or_else(|_| config.api_base.clone());
        let model = env::var("LLM_MODEL").unwrap_or_else(|_| config.model.clone());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .ok()?;
        Some(Self {
            client,
            api_key,
            api_base,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl NarrativeSummarizer for ChatSummarizer {
    async fn summarize(&self, prompt_context: Value) -> Result<Value, SummarizerError> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: 0.3,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt_context.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| SummarizerError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let detail = error_body.trim();
            if detail.is_empty() {
                return Err(SummarizerError::Request(format!("api error: {}", status)));
            }
            return Err(SummarizerError::Request(format!("api error: {} {}", status, detail)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| SummarizerError::Malformed(format!("response parse failed: {}", err)))?;

        let content = body
            .choices
            .first()
            .ok_or_else(|| SummarizerError::Malformed("response missing choices".to_string()))?
            .message
            .content
            .trim()
            .to_string();

        let json = extract_json(&content)
            .ok_or_else(|| SummarizerError::Malformed("response missing JSON".to_string()))?;
        serde_json::from_str(&json)
            .map_err(|err| SummarizerError::Malformed(format!("JSON parse failed: {}", err)))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

fn system_prompt() -> String {
    let prompt = r#"You are a social media coach summarizing a group of a creator's posts.
The user message is JSON describing one performance tag and sample posts.
Return a single JSON object with these fields:
- summary (2-3 sentences, Japanese)
- keyThemes (array of 3-5 short strings)
- cautions (array of 2-3 short strings)
- suggestedAngles (array of 2-4 short, actionable strings)
Rules:
- Output JSON only, no markdown or commentary.
- Base every point on the samples provided.
"#;
    prompt.to_string()
}

fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    Some(text[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_fenced_reply() {
        let reply = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_json(reply).as_deref(), Some("{\"summary\": \"ok\"}"));
        assert!(extract_json("no braces here").is_none());
        assert!(extract_json("} backwards {").is_none());
    }
}
