use crate::config::{env, env_bool};
use crate::prompts;
use crate::response;
use aporia_core::{
    AnalysisBackend, ChatBackend, ChatMessage as CoreMessage, ChatReply, Error, Highlight, Result,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_ms: u64,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            timeout_ms: 120_000,
        }
    }

    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        // Opt-in: don't start calling localhost unless asked to.
        if !env_bool("APORIA_OLLAMA_ENABLE") {
            return Err(Error::NotConfigured(
                "APORIA_OLLAMA_ENABLE is not set (or false)".to_string(),
            ));
        }
        let base_url =
            env("APORIA_OLLAMA_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:11434".to_string());
        let model = model_override
            .or_else(|| env("APORIA_OLLAMA_MODEL"))
            .unwrap_or_else(|| "qwen2.5:3b-instruct".to_string());
        Ok(Self::new(client, base_url, model))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn endpoint_chat(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: Vec<ChatMessage>, fail: fn(String) -> Error) -> Result<String> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages,
            format: Some("json".to_string()),
            stream: Some(false),
        };

        let resp = self
            .client
            .post(self.endpoint_chat())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("ollama chat HTTP {status}")));
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| fail(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

#[async_trait::async_trait]
impl AnalysisBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn analyze(&self, chunk_text: &str) -> Result<Vec<Highlight>> {
        let content = self
            .complete(
                vec![
                    ChatMessage::new("system", prompts::ANALYSIS_SYSTEM_PROMPT),
                    ChatMessage::new("user", chunk_text),
                ],
                Error::Analysis,
            )
            .await?;
        response::parse_analysis_response(&content)
    }
}

#[async_trait::async_trait]
impl ChatBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, history: &[CoreMessage], highlight_text: &str) -> Result<ChatReply> {
        let mut messages = vec![ChatMessage::new(
            "system",
            &prompts::chat_system_prompt(highlight_text),
        )];
        messages.extend(history.iter().map(|m| ChatMessage::new(m.role.as_str(), &m.content)));
        let content = self.complete(messages, Error::Chat).await?;
        let mut reply = response::parse_chat_reply(&content)?;
        reply.aporia_score = reply.aporia_score.clamp(0.0, 1.0);
        Ok(reply)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}
