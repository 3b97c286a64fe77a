//! Text-node indexing: the offset model every other module builds on.
//!
//! A root's linearized text is the concatenation of its content-bearing, visible leaf text
//! nodes in document order. Each node's `global_offset` is the sum of the lengths of the
//! nodes before it.

use crate::textprep;
use aporia_core::{NodeId, TextDocument, TextNodeSpan, VisibilityMode};

/// Elements whose text never counts as document content.
pub const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "svg", "canvas", "nav", "footer",
    "aside", "header", "head", "title", "template",
];

fn is_excluded<D: TextDocument + ?Sized>(
    doc: &D,
    text_node: NodeId,
    root: NodeId,
    mode: VisibilityMode,
) -> bool {
    let mut cur = doc.parent(text_node);
    while let Some(el) = cur {
        if let Some(tag) = doc.tag_name(el) {
            if NON_CONTENT_TAGS.contains(&tag) {
                return true;
            }
        }
        if doc.is_hidden(el, mode) {
            return true;
        }
        if el == root {
            break;
        }
        cur = doc.parent(el);
    }
    false
}

/// Leaf text nodes under `root` that carry visible content, in document order.
pub fn get_text_nodes<D: TextDocument + ?Sized>(
    doc: &D,
    root: NodeId,
    mode: VisibilityMode,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = vec![root];
    while let Some(n) = stack.pop() {
        if let Some(text) = doc.node_text(n) {
            if text.trim().is_empty() {
                continue;
            }
            if !is_excluded(doc, n, root, mode) {
                out.push(n);
            }
            continue;
        }
        stack.extend(doc.children(n).iter().rev().copied());
    }
    out
}

/// Assign cumulative global offsets to whole text nodes.
pub fn build_node_ranges<D: TextDocument + ?Sized>(doc: &D, nodes: &[NodeId]) -> Vec<TextNodeSpan> {
    let mut global = 0usize;
    let mut spans = Vec::with_capacity(nodes.len());
    for n in nodes {
        let len = doc.node_text(*n).map(textprep::char_len).unwrap_or(0);
        spans.push(TextNodeSpan {
            node: *n,
            start: 0,
            end: len,
            global_offset: global,
        });
        global += len;
    }
    spans
}

/// The text a list of spans currently covers in the live document.
///
/// Returns `None` if any span no longer fits its node (the node shrank since indexing).
pub fn spans_text<D: TextDocument + ?Sized>(doc: &D, spans: &[TextNodeSpan]) -> Option<String> {
    let mut out = String::new();
    for s in spans {
        let t = doc.node_text(s.node)?;
        let chars: Vec<char> = t.chars().collect();
        if s.end > chars.len() || s.start > s.end {
            return None;
        }
        out.extend(&chars[s.start..s.end]);
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Linearized {
    pub text: String,
    pub spans: Vec<TextNodeSpan>,
}

impl Linearized {
    pub fn char_len(&self) -> usize {
        self.spans.last().map(|s| s.global_offset + s.len()).unwrap_or(0)
    }
}

/// Index `root` and produce its linearized text together with the spans.
pub fn linearize<D: TextDocument + ?Sized>(doc: &D, root: NodeId, mode: VisibilityMode) -> Linearized {
    let nodes = get_text_nodes(doc, root, mode);
    let spans = build_node_ranges(doc, &nodes);
    let text = spans_text(doc, &spans).unwrap_or_default();
    Linearized { text, spans }
}

/// Clip whole-document spans to the global window `[start, end)`.
pub fn slice_spans(spans: &[TextNodeSpan], start: usize, end: usize) -> Vec<TextNodeSpan> {
    let mut out = Vec::new();
    for s in spans {
        let g0 = s.global_offset;
        let g1 = g0 + s.len();
        if g1 <= start || g0 >= end {
            continue;
        }
        let from = start.max(g0);
        let to = end.min(g1);
        out.push(TextNodeSpan {
            node: s.node,
            start: s.start + (from - g0),
            end: s.start + (to - g0),
            global_offset: from,
        });
    }
    out
}
