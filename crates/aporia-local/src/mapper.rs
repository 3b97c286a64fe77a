//! Offset ↔ range mapping.
//!
//! Offsets from the analysis collaborator are chunk-local character offsets. Mapping them
//! onto live nodes is only safe if the nodes still hold the text the chunk was built from,
//! so every mapping re-derives that text first and fails closed (`None`) on any mismatch.

use crate::index;
use aporia_core::{Boundary, SemanticChunk, TextDocument, TextNodeSpan, TextRange};

/// A chunk bound to the text nodes it was extracted from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSlice {
    pub index: usize,
    /// Global offsets of the chunk in the root's linearized text.
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Node spans clipped to the chunk; their concatenated text equals `text`.
    pub spans: Vec<TextNodeSpan>,
}

impl ChunkSlice {
    pub fn new(index: usize, chunk: &SemanticChunk, doc_spans: &[TextNodeSpan]) -> Self {
        Self {
            index,
            start: chunk.start,
            end: chunk.end,
            text: chunk.text.clone(),
            spans: index::slice_spans(doc_spans, chunk.start, chunk.end),
        }
    }
}

/// Walk `spans` (whose cumulative lengths define a local coordinate space starting at 0)
/// and return the live boundaries for `[start, end)`.
///
/// Spans whose node emptied or shrank below the recorded bounds are skipped.
pub fn locate<D: TextDocument + ?Sized>(
    doc: &D,
    spans: &[TextNodeSpan],
    start: usize,
    end: usize,
) -> Option<TextRange> {
    if start >= end || spans.is_empty() {
        return None;
    }
    let mut local = 0usize;
    let mut start_b: Option<Boundary> = None;
    let mut last_live: Option<&TextNodeSpan> = None;

    for span in spans {
        let live_len = doc.node_text(span.node).map(|t| t.chars().count()).unwrap_or(0);
        if live_len == 0 || span.end > live_len {
            tracing::debug!(node = span.node.0, "skipping span whose node changed since indexing");
            continue;
        }
        let len = span.len();
        last_live = Some(span);

        if start_b.is_none() && start >= local && start < local + len {
            start_b = Some(Boundary {
                node: span.node,
                offset: span.start + (start - local),
            });
        }
        if start_b.is_some() && end > local && end <= local + len {
            return Some(TextRange {
                start: start_b?,
                end: Boundary {
                    node: span.node,
                    offset: span.start + (end - local),
                },
            });
        }
        local += len;
    }

    // `end` fell past the last span: clamp to its end.
    let start = start_b?;
    let last = last_live?;
    Some(TextRange {
        start,
        end: Boundary {
            node: last.node,
            offset: last.end,
        },
    })
}

/// Map chunk-local `[start, end)` to a live range, or `None` if the chunk's nodes no longer
/// hold the chunk's text.
pub fn offset_to_range<D: TextDocument + ?Sized>(
    doc: &D,
    chunk: &ChunkSlice,
    start: usize,
    end: usize,
) -> Option<TextRange> {
    if start >= end || chunk.spans.is_empty() {
        return None;
    }
    let Some(current) = index::spans_text(doc, &chunk.spans) else {
        tracing::debug!(chunk = chunk.index, "chunk nodes shrank since extraction");
        return None;
    };
    if current != chunk.text {
        tracing::debug!(chunk = chunk.index, "chunk text changed since extraction");
        return None;
    }
    let total = current.chars().count();
    let end = end.min(total);
    if start >= end {
        return None;
    }
    locate(doc, &chunk.spans, start, end)
}

/// Global `[start, end)` of a live range within whole-root spans.
pub fn range_to_offsets(spans: &[TextNodeSpan], range: &TextRange) -> Option<(usize, usize)> {
    let find = |b: &Boundary| {
        spans
            .iter()
            .find(|s| s.node == b.node && b.offset >= s.start && b.offset <= s.end)
            .map(|s| s.global_offset + (b.offset - s.start))
    };
    let start = find(&range.start)?;
    let end = find(&range.end)?;
    (start <= end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{self, ChunkConfig};
    use crate::document::VirtualDocument;
    use crate::vocab::Vocabulary;
    use aporia_core::VisibilityMode;

    fn setup(html: &str) -> (VirtualDocument, ChunkSlice) {
        let doc = VirtualDocument::from_html(html);
        let lin = index::linearize(&doc, doc.body(), VisibilityMode::Anchoring);
        let chunks = chunk::create_semantic_chunks(&lin.text, ChunkConfig::default(), &Vocabulary::english());
        let slice = ChunkSlice::new(0, &chunks[0], &lin.spans);
        (doc, slice)
    }

    fn range_text(doc: &VirtualDocument, r: &TextRange) -> String {
        let lin = index::linearize(doc, doc.body(), VisibilityMode::Anchoring);
        let (s, e) = range_to_offsets(&lin.spans, r).unwrap();
        lin.text.chars().skip(s).take(e - s).collect()
    }

    #[test]
    fn maps_offsets_across_nodes() {
        let (doc, slice) = setup("<body><p>Alpha <b>beta</b> gamma.</p></body>");
        assert_eq!(slice.text, "Alpha beta gamma.");
        let r = offset_to_range(&doc, &slice, 3, 13).unwrap();
        assert_eq!(range_text(&doc, &r), "ha beta ga");
        assert_ne!(r.start.node, r.end.node);
    }

    #[test]
    fn clamps_end_past_chunk_length() {
        let (doc, slice) = setup("<body><p>Short text.</p></body>");
        let r = offset_to_range(&doc, &slice, 6, 500).unwrap();
        assert_eq!(range_text(&doc, &r), "text.");
    }

    #[test]
    fn rejects_degenerate_offsets() {
        let (doc, slice) = setup("<body><p>Short text.</p></body>");
        assert!(offset_to_range(&doc, &slice, 4, 4).is_none());
        assert!(offset_to_range(&doc, &slice, 5, 2).is_none());
        assert!(offset_to_range(&doc, &slice, 50, 60).is_none());
        let empty = ChunkSlice { spans: Vec::new(), ..slice };
        assert!(offset_to_range(&doc, &empty, 0, 3).is_none());
    }

    #[test]
    fn fails_closed_when_document_text_changed() {
        let (mut doc, slice) = setup("<body><p>Original words here.</p></body>");
        let node = slice.spans[0].node;
        doc.set_text(node, "Rewritten words here.");
        assert!(offset_to_range(&doc, &slice, 0, 5).is_none());
        doc.set_text(node, "Orig");
        assert!(offset_to_range(&doc, &slice, 0, 3).is_none());
    }

    #[test]
    fn range_to_offsets_inverts_locate() {
        let (doc, slice) = setup("<body><p>one</p><p>two three</p></body>");
        let r = offset_to_range(&doc, &slice, 2, 7).unwrap();
        let lin = index::linearize(&doc, doc.body(), VisibilityMode::Anchoring);
        assert_eq!(range_to_offsets(&lin.spans, &r), Some((2, 7)));
    }
}
