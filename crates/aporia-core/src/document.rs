//! Minimal document text model.
//!
//! Anchoring and offset mapping only need a handful of capabilities from a host document:
//! walk the tree, read leaf text, decide visibility, wrap a range in a marker element, and
//! remove a marker again. Concrete bindings (an in-memory document, a browser DOM bridge)
//! implement [`TextDocument`]; the algorithms never touch anything else.

use serde::{Deserialize, Serialize};

use crate::TextAnchor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A position inside a text node, as a character offset into that node's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

/// Which visibility checks apply when collecting text nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    /// display/visibility plus zero-size and sub-8px font checks (viewport text extraction).
    Viewport,
    /// display/visibility only; content scrolled off-screen must still anchor.
    Anchoring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub tag: String,
    pub class: String,
    pub highlight_id: String,
}

impl Marker {
    pub fn highlight(highlight_id: impl Into<String>) -> Self {
        Self {
            tag: "mark".to_string(),
            class: "aporia-highlight".to_string(),
            highlight_id: highlight_id.into(),
        }
    }
}

pub trait TextDocument {
    fn root(&self) -> NodeId;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> &[NodeId];
    /// Text of a text node; `None` for elements.
    fn node_text(&self, node: NodeId) -> Option<&str>;
    /// Lowercase tag name of an element; `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<&str>;
    /// Whether this element itself is computed-invisible under `mode` (ancestors not consulted).
    fn is_hidden(&self, element: NodeId, mode: VisibilityMode) -> bool;
    /// Wrap the text covered by `range` in marker elements.
    ///
    /// Returns the created marker elements; an empty vec means nothing was wrapped
    /// (the range no longer fits the live nodes).
    fn wrap_range(&mut self, range: &TextRange, marker: &Marker) -> Vec<NodeId>;
    /// Replace a marker element by its children. Returns false if `marker` is not a live marker.
    fn remove_marker(&mut self, marker: NodeId) -> bool;

    /// Platform-native "find text with context". Absent by default.
    fn find_fragment(&self, _root: NodeId, _anchor: &TextAnchor) -> Option<TextRange> {
        None
    }

    fn is_text(&self, node: NodeId) -> bool {
        self.node_text(node).is_some()
    }
}
