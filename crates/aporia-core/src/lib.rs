use serde::{Deserialize, Serialize};

pub mod document;

pub use document::{Boundary, Marker, NodeId, TextDocument, TextRange, VisibilityMode};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The analysis collaborator returned something that violates its contract
    /// (bad JSON, missing `highlights`, invalid offsets). Never silently repaired.
    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
    #[error("chat failed: {0}")]
    Chat(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    /// A response arrived for an analysis generation that has since been reset.
    #[error("stale analysis generation {0}")]
    Stale(u64),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One leaf text node's contribution to the linearized text of a root.
///
/// `start`/`end` are character offsets into the node's own text; `global_offset` is the
/// character position of `start` in the linearized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNodeSpan {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
    pub global_offset: usize,
}

impl TextNodeSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A detected sentence. Offsets are character offsets into the scanned text;
/// `end` is just past the terminal punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceBoundary {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub start: usize,
    pub end: usize,
    pub sentences: Vec<SentenceBoundary>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalienceFactors {
    pub argument_keywords: f64,
    pub questions: f64,
    pub transitions: f64,
    pub complexity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Salience {
    /// Weighted sum of the factors, clamped to `[0, 1]`.
    pub score: f64,
    pub factors: SalienceFactors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub word_count: usize,
    pub sentences: Vec<SentenceBoundary>,
    pub salience: f64,
    pub factors: SalienceFactors,
}

/// Portable description of a text span, independent of any live document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnchor {
    pub exact: String,
    pub prefix: String,
    pub suffix: String,
    /// Character offset into the linearized text at capture time.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMethod {
    Exact,
    Fragment,
    Fuzzy,
    Position,
}

impl AnchorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorMethod::Exact => "exact",
            AnchorMethod::Fragment => "fragment",
            AnchorMethod::Fuzzy => "fuzzy",
            AnchorMethod::Position => "position",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorResult {
    pub range: TextRange,
    pub exact: String,
    pub score: f64,
    pub method: AnchorMethod,
}

/// A raw highlight claim from the analysis collaborator.
///
/// Offsets are chunk-local unless the container says otherwise (the analysis cache
/// stores global offsets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedHighlight {
    pub id: String,
    /// Chunk-local, sentence-expanded offsets.
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub reason: String,
    pub explanation: String,
    /// The highlight's own question first, then questions merged from duplicates.
    pub questions: Vec<String>,
    pub chunk_index: usize,
    pub range: Option<TextRange>,
    pub anchor: Option<TextAnchor>,
    /// Marker elements wrapping this highlight in the live document.
    #[serde(skip)]
    pub markers: Vec<NodeId>,
}

impl ProcessedHighlight {
    pub fn is_placed(&self) -> bool {
        !self.markers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    /// Raw score as returned by the collaborator; consumers clamp it.
    pub aporia_score: f64,
}

/// A saved annotation. Only a short snippet is persisted, never the full document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAnnotation {
    pub highlight_id: String,
    pub url: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub note: Option<String>,
    pub created_at_epoch_s: u64,
    pub anchor: TextAnchor,
}

/// Analysis results cached by content hash. Highlight offsets are global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub url: String,
    pub content_hash: String,
    pub created_at_epoch_s: u64,
    pub highlights: Vec<Highlight>,
}

impl CachedAnalysis {
    pub fn is_fresh(&self, content_hash: &str, now_epoch_s: u64, ttl_s: u64) -> bool {
        self.content_hash == content_hash
            && now_epoch_s.saturating_sub(self.created_at_epoch_s) <= ttl_s
    }
}

/// Normalize an annotation key URL (drops the fragment; annotations are per-document).
pub fn normalize_url(raw: &str) -> Result<String> {
    let mut u = url::Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    u.set_fragment(None);
    Ok(u.to_string())
}

#[async_trait::async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn name(&self) -> &'static str;
    /// Returns chunk-local highlights. Contract violations surface as `Error::InvalidResponse`.
    async fn analyze(&self, chunk_text: &str) -> Result<Vec<Highlight>>;
}

#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn chat(&self, history: &[ChatMessage], highlight_text: &str) -> Result<ChatReply>;
}

#[async_trait::async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn load_config(&self) -> Result<Option<serde_json::Value>>;
    async fn save_config(&self, config: &serde_json::Value) -> Result<()>;
    async fn annotations(&self, url: &str) -> Result<Vec<SavedAnnotation>>;
    /// Inserts or replaces (by `highlight_id`) an annotation for its url.
    async fn save_annotation(&self, annotation: &SavedAnnotation) -> Result<()>;
    /// Returns whether an annotation was removed.
    async fn delete_annotation(&self, url: &str, highlight_id: &str) -> Result<bool>;
    /// Returns the cached analysis only if it matches `content_hash` and is within `ttl_s`.
    async fn cached_analysis(
        &self,
        url: &str,
        content_hash: &str,
        ttl_s: u64,
    ) -> Result<Option<CachedAnalysis>>;
    async fn cache_analysis(&self, entry: &CachedAnalysis) -> Result<()>;
}
