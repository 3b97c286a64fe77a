//! Per-document session state: the highlight list, navigation, generation marker, and
//! the Socratic chat attached to each highlight.

use crate::expand;
use crate::highlight;
use aporia_core::{
    ChatBackend, ChatMessage, ChatRole, Error, ProcessedHighlight, Result, TextDocument,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared analysis generation counter.
///
/// Work started under generation `g` may only be applied while `g` is still current; a
/// reset (new analysis) bumps the counter and every older response becomes stale.
#[derive(Debug, Clone, Default)]
pub struct GenerationGuard(Arc<AtomicU64>);

impl GenerationGuard {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// Dialogue about one highlight. The aporia score never decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    pub highlight_id: String,
    pub highlight_text: String,
    pub history: Vec<ChatMessage>,
    /// Tracked score after each assistant turn.
    pub scores: Vec<f64>,
}

impl ChatSession {
    pub fn new(highlight_id: impl Into<String>, highlight_text: impl Into<String>) -> Self {
        Self {
            highlight_id: highlight_id.into(),
            highlight_text: highlight_text.into(),
            history: Vec::new(),
            scores: Vec::new(),
        }
    }

    pub fn aporia_score(&self) -> f64 {
        self.scores.last().copied().unwrap_or(0.0)
    }

    /// Clamp `raw` to `[0, 1]` and fold it into the running maximum. Returns the tracked score.
    pub fn record_score(&mut self, raw: f64) -> f64 {
        let prev = self.aporia_score();
        let clamped = if raw.is_nan() { prev } else { raw.clamp(0.0, 1.0) };
        let next = prev.max(clamped);
        self.scores.push(next);
        next
    }

    /// Send one user turn and record the reply. History is only extended on success.
    pub async fn ask(&mut self, backend: &dyn ChatBackend, message: &str) -> Result<(String, f64)> {
        let mut history = self.history.clone();
        history.push(ChatMessage {
            role: ChatRole::User,
            content: message.to_string(),
        });
        let reply = backend.chat(&history, &self.highlight_text).await?;
        history.push(ChatMessage {
            role: ChatRole::Assistant,
            content: reply.response.clone(),
        });
        self.history = history;
        let score = self.record_score(reply.aporia_score);
        tracing::debug!(highlight = %self.highlight_id, score, "chat turn recorded");
        Ok((reply.response, score))
    }
}

#[derive(Debug, Default)]
pub struct Session {
    highlights: Vec<ProcessedHighlight>,
    active: Option<usize>,
    generation: GenerationGuard,
    chats: HashMap<String, ChatSession>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self) -> GenerationGuard {
        self.generation.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    /// Start a new analysis: bump the generation and drop all per-analysis state.
    ///
    /// Markers of dropped highlights stay in the document; callers that reuse the document
    /// should [`Session::clear_markers`] first.
    pub fn begin_analysis(&mut self) -> u64 {
        self.highlights.clear();
        self.active = None;
        self.chats.clear();
        self.generation.bump()
    }

    /// Add highlights produced under `generation`. Stale generations are rejected.
    ///
    /// The list is kept in reading order and deduplicated by text.
    pub fn accept(&mut self, generation: u64, highlights: Vec<ProcessedHighlight>) -> Result<()> {
        if !self.generation.is_current(generation) {
            tracing::warn!(generation, current = self.generation(), "discarding stale analysis response");
            return Err(Error::Stale(generation));
        }
        let mut all = std::mem::take(&mut self.highlights);
        all.extend(highlights);
        all.sort_by_key(|h| (h.chunk_index, h.start));
        self.highlights = expand::deduplicate_by_text(all);
        if self.active.is_some_and(|i| i >= self.highlights.len()) {
            self.active = None;
        }
        Ok(())
    }

    pub fn highlights(&self) -> &[ProcessedHighlight] {
        &self.highlights
    }

    pub fn highlight(&self, id: &str) -> Option<&ProcessedHighlight> {
        self.highlights.iter().find(|h| h.id == id)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&ProcessedHighlight> {
        self.highlights.get(self.active?)
    }

    pub fn select(&mut self, id: &str) -> Option<&ProcessedHighlight> {
        self.active = self.highlights.iter().position(|h| h.id == id);
        self.active()
    }

    /// Move to the next highlight, wrapping around.
    pub fn next(&mut self) -> Option<&ProcessedHighlight> {
        let n = self.highlights.len();
        if n == 0 {
            return None;
        }
        self.active = Some(self.active.map_or(0, |i| (i + 1) % n));
        self.active()
    }

    /// Move to the previous highlight, wrapping around.
    pub fn prev(&mut self) -> Option<&ProcessedHighlight> {
        let n = self.highlights.len();
        if n == 0 {
            return None;
        }
        self.active = Some(self.active.map_or(n - 1, |i| (i + n - 1) % n));
        self.active()
    }

    /// Remove a highlight, its markers, and its chat.
    pub fn delete_highlight<D: TextDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        id: &str,
    ) -> Option<ProcessedHighlight> {
        let idx = self.highlights.iter().position(|h| h.id == id)?;
        let mut removed = self.highlights.remove(idx);
        highlight::unwrap_highlight(doc, &mut removed);
        self.chats.remove(id);
        self.active = match self.active {
            Some(a) if a == idx => None,
            Some(a) if a > idx => Some(a - 1),
            other => other,
        };
        Some(removed)
    }

    /// Unwrap every highlight's markers (the list itself is kept).
    pub fn clear_markers<D: TextDocument + ?Sized>(&mut self, doc: &mut D) {
        for h in &mut self.highlights {
            highlight::unwrap_highlight(doc, h);
        }
    }

    pub fn chat(&self, highlight_id: &str) -> Option<&ChatSession> {
        self.chats.get(highlight_id)
    }

    /// The chat for a highlight, created on first use. `None` if the highlight is unknown.
    pub fn chat_mut(&mut self, highlight_id: &str) -> Option<&mut ChatSession> {
        let text = self.highlight(highlight_id)?.text.clone();
        Some(
            self.chats
                .entry(highlight_id.to_string())
                .or_insert_with(|| ChatSession::new(highlight_id, text)),
        )
    }

    pub async fn ask(
        &mut self,
        backend: &dyn ChatBackend,
        highlight_id: &str,
        message: &str,
    ) -> Result<(String, f64)> {
        let chat = self
            .chat_mut(highlight_id)
            .ok_or_else(|| Error::InvalidInput(format!("unknown highlight {highlight_id}")))?;
        chat.ask(backend, message).await
    }
}
