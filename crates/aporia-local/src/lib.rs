pub mod anchor;
pub mod chunk;
pub mod config;
pub mod document;
pub mod expand;
pub mod highlight;
pub mod index;
pub mod mapper;
pub mod ollama;
pub mod openai_compat;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod salience;
pub mod segment;
pub mod session;
pub mod store;
pub mod textprep;
pub mod vocab;

pub use anchor::{anchor, describe_range, AnchorOptions};
pub use chunk::{create_semantic_chunks, prioritize_chunks, ChunkConfig};
pub use config::{AporiaConfig, BackendKind};
pub use document::VirtualDocument;
pub use expand::{deduplicate_by_text, expand_to_sentence};
pub use highlight::{apply_chunk_highlights, ApplyOutcome, ApplyStatus};
pub use index::{build_node_ranges, get_text_nodes, linearize, Linearized};
pub use mapper::{offset_to_range, ChunkSlice};
pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;
pub use pipeline::{analyze_document, restore_annotations, AnalysisReport, RestoreReport};
pub use response::parse_analysis_response;
pub use salience::calculate_salience;
pub use segment::{detect_paragraphs, detect_sentences};
pub use session::{ChatSession, GenerationGuard, Session};
pub use store::{content_hash, FsStore, MemoryStore};
pub use vocab::Vocabulary;

use aporia_core::{AnalysisBackend, ChatBackend, ChatMessage, ChatReply, Highlight, Result};

/// The configured collaborator; serves both analysis and chat.
#[derive(Debug, Clone)]
pub enum ConfiguredBackend {
    OpenAiCompat(OpenAiCompatClient),
    Ollama(OllamaClient),
}

impl ConfiguredBackend {
    /// Build the backend named by `cfg` from the environment.
    pub fn from_config(cfg: &AporiaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("aporia/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| aporia_core::Error::NotConfigured(e.to_string()))?;
        Ok(match cfg.backend {
            BackendKind::OpenAiCompat => ConfiguredBackend::OpenAiCompat(
                OpenAiCompatClient::from_env(client, cfg.model.clone())?
                    .with_timeout_ms(cfg.timeout_ms),
            ),
            BackendKind::Ollama => ConfiguredBackend::Ollama(
                OllamaClient::from_env(client, cfg.model.clone())?.with_timeout_ms(cfg.timeout_ms),
            ),
        })
    }

    pub fn base_url(&self) -> &str {
        match self {
            ConfiguredBackend::OpenAiCompat(c) => c.base_url(),
            ConfiguredBackend::Ollama(c) => c.base_url(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ConfiguredBackend::OpenAiCompat(c) => c.model(),
            ConfiguredBackend::Ollama(c) => c.model(),
        }
    }
}

#[async_trait::async_trait]
impl AnalysisBackend for ConfiguredBackend {
    fn name(&self) -> &'static str {
        match self {
            ConfiguredBackend::OpenAiCompat(c) => AnalysisBackend::name(c),
            ConfiguredBackend::Ollama(c) => AnalysisBackend::name(c),
        }
    }

    async fn analyze(&self, chunk_text: &str) -> Result<Vec<Highlight>> {
        match self {
            ConfiguredBackend::OpenAiCompat(c) => c.analyze(chunk_text).await,
            ConfiguredBackend::Ollama(c) => c.analyze(chunk_text).await,
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for ConfiguredBackend {
    fn name(&self) -> &'static str {
        AnalysisBackend::name(self)
    }

    async fn chat(&self, history: &[ChatMessage], highlight_text: &str) -> Result<ChatReply> {
        match self {
            ConfiguredBackend::OpenAiCompat(c) => c.chat(history, highlight_text).await,
            ConfiguredBackend::Ollama(c) => c.chat(history, highlight_text).await,
        }
    }
}
