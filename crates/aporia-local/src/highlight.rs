//! Applying one chunk's validated highlights to a live document.
//!
//! All ranges are computed (and anchors captured) against the unmodified document first.
//! Wrapping then proceeds highest start offset first, so splitting a node for one highlight
//! never moves the text under a lower-offset highlight still waiting to be wrapped.

use crate::anchor;
use crate::expand;
use crate::mapper::{self, ChunkSlice};
use crate::vocab::Vocabulary;
use aporia_core::{Highlight, Marker, NodeId, ProcessedHighlight, TextDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// The collaborator returned nothing for this chunk.
    Empty,
    AllPlaced,
    Partial,
    /// Nothing could be placed in the document; the highlights are listed only.
    AllUnplaced,
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Deduplicated highlights in reading order, placed or not.
    pub highlights: Vec<ProcessedHighlight>,
    pub placed: usize,
    pub unplaced: usize,
}

impl ApplyOutcome {
    pub fn status(&self) -> ApplyStatus {
        match (self.placed, self.unplaced) {
            (0, 0) => ApplyStatus::Empty,
            (0, _) => ApplyStatus::AllUnplaced,
            (_, 0) => ApplyStatus::AllPlaced,
            _ => ApplyStatus::Partial,
        }
    }
}

/// Expand, dedup and map raw highlights without touching the document.
pub fn prepare_highlights<D: TextDocument + ?Sized>(
    doc: &D,
    chunk: &ChunkSlice,
    raw: &[Highlight],
    root: NodeId,
    vocab: &Vocabulary,
    context_len: usize,
) -> Vec<ProcessedHighlight> {
    let chars: Vec<char> = chunk.text.chars().collect();
    let expanded: Vec<ProcessedHighlight> = raw
        .iter()
        .filter(|h| h.start < h.end)
        .map(|h| {
            let (start, end) = expand::expand_to_sentence(&chunk.text, h.start, h.end, vocab);
            let end = end.min(chars.len());
            let text: String = chars.get(start..end).map(|c| c.iter().collect()).unwrap_or_default();
            ProcessedHighlight {
                id: uuid::Uuid::new_v4().to_string(),
                start,
                end,
                text,
                reason: h.reason.clone(),
                explanation: h.explanation.clone(),
                questions: if h.question.is_empty() {
                    Vec::new()
                } else {
                    vec![h.question.clone()]
                },
                chunk_index: chunk.index,
                range: None,
                anchor: None,
                markers: Vec::new(),
            }
        })
        .collect();

    let mut out = expand::deduplicate_by_text(expanded);
    for h in &mut out {
        h.range = mapper::offset_to_range(doc, chunk, h.start, h.end);
        match &h.range {
            Some(r) => h.anchor = anchor::describe_range(doc, r, root, context_len),
            None => tracing::debug!(chunk = chunk.index, start = h.start, end = h.end, "highlight did not map"),
        }
    }
    out
}

/// Wrap every mapped highlight, highest start first. Returns how many got markers.
pub fn wrap_highlights<D: TextDocument + ?Sized>(doc: &mut D, highlights: &mut [ProcessedHighlight]) -> usize {
    let mut order: Vec<usize> = (0..highlights.len())
        .filter(|i| highlights[*i].range.is_some())
        .collect();
    order.sort_by(|a, b| highlights[*b].start.cmp(&highlights[*a].start));

    let mut placed = 0usize;
    for i in order {
        let h = &mut highlights[i];
        let Some(range) = h.range else { continue };
        let markers = doc.wrap_range(&range, &Marker::highlight(h.id.clone()));
        if markers.is_empty() {
            tracing::debug!(id = %h.id, "highlight range no longer fits the document");
            continue;
        }
        h.markers = markers;
        placed += 1;
    }
    placed
}

/// Process one chunk's highlights end to end: expand, dedup, map, anchor, wrap.
pub fn apply_chunk_highlights<D: TextDocument + ?Sized>(
    doc: &mut D,
    chunk: &ChunkSlice,
    raw: &[Highlight],
    root: NodeId,
    vocab: &Vocabulary,
    context_len: usize,
) -> ApplyOutcome {
    let mut highlights = prepare_highlights(doc, chunk, raw, root, vocab, context_len);
    let placed = wrap_highlights(doc, &mut highlights);
    let unplaced = highlights.len() - placed;
    let outcome = ApplyOutcome {
        highlights,
        placed,
        unplaced,
    };
    if outcome.status() == ApplyStatus::AllUnplaced {
        tracing::info!(chunk = chunk.index, count = unplaced, "no highlightable anchor found, shown in list only");
    }
    outcome
}

/// Remove every marker of a highlight from the document.
pub fn unwrap_highlight<D: TextDocument + ?Sized>(doc: &mut D, highlight: &mut ProcessedHighlight) -> usize {
    highlight
        .markers
        .drain(..)
        .filter(|m| doc.remove_marker(*m))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{self, ChunkConfig};
    use crate::document::VirtualDocument;
    use crate::index;
    use aporia_core::VisibilityMode;

    const HTML: &str =
        "<body><p>Alpha claim is stated. Beta <b>claim</b> follows here. </p><p>Gamma ends it.</p></body>";

    fn setup() -> (VirtualDocument, ChunkSlice) {
        let doc = VirtualDocument::from_html(HTML);
        let lin = index::linearize(&doc, doc.body(), VisibilityMode::Anchoring);
        let chunks = chunk::create_semantic_chunks(&lin.text, ChunkConfig::default(), &Vocabulary::english());
        let slice = ChunkSlice::new(0, &chunks[0], &lin.spans);
        (doc, slice)
    }

    fn raw(start: usize, end: usize, q: &str) -> Highlight {
        Highlight {
            start,
            end,
            reason: "r".to_string(),
            question: q.to_string(),
            explanation: String::new(),
        }
    }

    #[test]
    fn applies_in_reverse_and_keeps_document_text() {
        let (mut doc, slice) = setup();
        assert_eq!(slice.text, "Alpha claim is stated. Beta claim follows here. Gamma ends it.");
        let body = doc.body();
        let before = doc.text_content(body);

        let out = apply_chunk_highlights(
            &mut doc,
            &slice,
            &[raw(2, 5, "q1"), raw(30, 35, "q2"), raw(50, 52, "q3")],
            body,
            &Vocabulary::english(),
            32,
        );
        assert_eq!(out.status(), ApplyStatus::AllPlaced);
        let texts: Vec<&str> = out.highlights.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["Alpha claim is stated.", "Beta claim follows here.", "Gamma ends it."]);

        for h in &out.highlights {
            let wrapped: String = h.markers.iter().map(|m| doc.text_content(*m)).collect();
            assert_eq!(wrapped, h.text);
            assert_eq!(h.anchor.as_ref().map(|a| a.exact.as_str()), Some(h.text.as_str()));
        }
        assert_eq!(doc.text_content(body), before);
    }

    #[test]
    fn duplicates_merge_before_wrapping() {
        let (mut doc, slice) = setup();
        let body = doc.body();
        let out = apply_chunk_highlights(
            &mut doc,
            &slice,
            &[raw(0, 3, "first?"), raw(8, 12, "second?")],
            body,
            &Vocabulary::english(),
            32,
        );
        assert_eq!(out.highlights.len(), 1);
        assert_eq!(out.highlights[0].questions, vec!["first?", "second?"]);
        assert_eq!(out.placed, 1);
    }

    #[test]
    fn stale_document_reports_all_unplaced() {
        let (mut doc, slice) = setup();
        let body = doc.body();
        doc.set_text(slice.spans[0].node, "Completely different text now.");
        let out = apply_chunk_highlights(&mut doc, &slice, &[raw(0, 5, "q")], body, &Vocabulary::english(), 32);
        assert_eq!(out.status(), ApplyStatus::AllUnplaced);
        assert_eq!(out.highlights.len(), 1);
        assert!(out.highlights[0].range.is_none());
        assert!(!out.highlights[0].is_placed());
    }

    #[test]
    fn empty_input_is_empty_status() {
        let (mut doc, slice) = setup();
        let body = doc.body();
        let out = apply_chunk_highlights(&mut doc, &slice, &[], body, &Vocabulary::english(), 32);
        assert_eq!(out.status(), ApplyStatus::Empty);
    }

    #[test]
    fn unwrap_restores_plain_text_nodes() {
        let (mut doc, slice) = setup();
        let body = doc.body();
        let mut out = apply_chunk_highlights(&mut doc, &slice, &[raw(30, 35, "q")], body, &Vocabulary::english(), 32);
        let h = &mut out.highlights[0];
        assert!(unwrap_highlight(&mut doc, h) >= 1);
        assert!(doc.markers_for(&h.id).is_empty());
        assert_eq!(doc.text_content(body), "Alpha claim is stated. Beta claim follows here. Gamma ends it.");
    }
}
