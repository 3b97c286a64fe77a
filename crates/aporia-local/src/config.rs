use crate::anchor::AnchorOptions;
use crate::chunk::ChunkConfig;
use crate::vocab::Vocabulary;
use aporia_core::{AnnotationStore, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn env_bool(key: &str) -> bool {
    matches!(
        env(key).unwrap_or_default().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackendKind {
    #[default]
    #[serde(rename = "openai_compat")]
    OpenAiCompat,
    #[serde(rename = "ollama")]
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAiCompat => "openai_compat",
            BackendKind::Ollama => "ollama",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai_compat" | "openai-compat" | "openai" => Ok(BackendKind::OpenAiCompat),
            "ollama" => Ok(BackendKind::Ollama),
            other => Err(Error::InvalidInput(format!(
                "unknown backend {other:?} (allowed: openai_compat, ollama)"
            ))),
        }
    }
}

/// User configuration, persisted as the store's config blob.
///
/// Unknown fields are ignored and missing ones take defaults, so older blobs keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AporiaConfig {
    pub backend: BackendKind,
    /// Model override; each backend falls back to its own env/default.
    pub model: Option<String>,
    pub chunk: ChunkConfig,
    pub anchor: AnchorOptions,
    pub cache_ttl_s: u64,
    /// Analyze chunks by descending salience instead of document order.
    pub prioritize_by_salience: bool,
    /// JSON vocabulary file; the built-in English vocabulary when absent.
    pub vocabulary_path: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for AporiaConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenAiCompat,
            model: None,
            chunk: ChunkConfig::default(),
            anchor: AnchorOptions::default(),
            cache_ttl_s: 86_400,
            prioritize_by_salience: false,
            vocabulary_path: None,
            timeout_ms: 60_000,
        }
    }
}

impl AporiaConfig {
    pub fn from_value(v: Option<serde_json::Value>) -> Result<Self> {
        match v {
            None => Ok(Self::default()),
            Some(v) => serde_json::from_value(v)
                .map_err(|e| Error::InvalidInput(format!("bad config blob: {e}"))),
        }
    }

    /// `APORIA_BACKEND`, `APORIA_MODEL` and `APORIA_PRIORITIZE` override stored values.
    /// Enabling Ollama without an OpenAI-compatible base URL also selects Ollama.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(b) = env("APORIA_BACKEND") {
            self.backend = BackendKind::parse(&b)?;
        } else if env_bool("APORIA_OLLAMA_ENABLE") && env("APORIA_OPENAI_COMPAT_BASE_URL").is_none() {
            self.backend = BackendKind::Ollama;
        }
        if let Some(m) = env("APORIA_MODEL") {
            self.model = Some(m);
        }
        if env("APORIA_PRIORITIZE").is_some() {
            self.prioritize_by_salience = env_bool("APORIA_PRIORITIZE");
        }
        Ok(self)
    }

    pub async fn load(store: &dyn AnnotationStore) -> Result<Self> {
        Self::from_value(store.load_config().await?)?.apply_env()
    }

    pub async fn save(&self, store: &dyn AnnotationStore) -> Result<()> {
        let v = serde_json::to_value(self).map_err(|e| Error::InvalidInput(e.to_string()))?;
        store.save_config(&v).await
    }

    pub fn vocabulary(&self) -> Result<Vocabulary> {
        match &self.vocabulary_path {
            Some(p) => Vocabulary::from_json_file(p),
            None => Ok(Vocabulary::english()),
        }
    }
}

/// `APORIA_STORE_DIR`, if set.
pub fn store_dir_from_env() -> Option<PathBuf> {
    env("APORIA_STORE_DIR").map(PathBuf::from)
}
