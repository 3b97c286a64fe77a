use crate::config::env;
use crate::prompts;
use crate::response;
use aporia_core::{
    AnalysisBackend, ChatBackend, ChatMessage, ChatReply, Error, Highlight, Result,
};
use serde::{Deserialize, Serialize};

fn openai_compat_base_url_from_env() -> Option<String> {
    env("APORIA_OPENAI_COMPAT_BASE_URL")
}

fn openai_compat_api_key_from_env() -> Option<String> {
    env("APORIA_OPENAI_COMPAT_API_KEY")
}

fn openai_compat_model_from_env() -> Option<String> {
    env("APORIA_OPENAI_COMPAT_MODEL")
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            timeout_ms: 60_000,
        }
    }

    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let base_url = openai_compat_base_url_from_env().ok_or_else(|| {
            Error::NotConfigured("missing APORIA_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        let api_key = openai_compat_api_key_from_env();

        let model = model_override
            .or_else(openai_compat_model_from_env)
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing model for openai_compat (set model in config or APORIA_OPENAI_COMPAT_MODEL)"
                        .to_string(),
                )
            })?;

        Ok(Self::new(client, base_url, api_key, model))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    /// One non-streaming completion; returns the first choice's content.
    async fn complete(&self, messages: Vec<Message>, fail: fn(String) -> Error) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.2),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&req)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("openai_compat chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| fail(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AnalysisBackend for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn analyze(&self, chunk_text: &str) -> Result<Vec<Highlight>> {
        let content = self
            .complete(
                vec![
                    Message::new("system", prompts::ANALYSIS_SYSTEM_PROMPT),
                    Message::new("user", chunk_text),
                ],
                Error::Analysis,
            )
            .await?;
        response::parse_analysis_response(&content)
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn chat(&self, history: &[ChatMessage], highlight_text: &str) -> Result<ChatReply> {
        let mut messages = vec![Message::new(
            "system",
            &prompts::chat_system_prompt(highlight_text),
        )];
        messages.extend(history.iter().map(|m| Message::new(m.role.as_str(), &m.content)));
        let content = self.complete(messages, Error::Chat).await?;
        let mut reply = response::parse_chat_reply(&content)?;
        reply.aporia_score = reply.aporia_score.clamp(0.0, 1.0);
        Ok(reply)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}
