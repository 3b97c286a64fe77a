//! Arena-backed in-memory document implementing [`TextDocument`].
//!
//! Built either programmatically or from HTML (via `scraper`). Wrapping splits text nodes
//! the way a browser `splitText` does: the original node keeps the text before the split
//! point, so offsets below the split stay valid and a batch of ranges computed up front can
//! be wrapped highest-offset-first.

use aporia_core::{Boundary, Marker, NodeId, TextDocument, TextRange, VisibilityMode};
use std::collections::BTreeMap;

/// The subset of computed style that visibility filtering cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub width_px: Option<f32>,
    pub height_px: Option<f32>,
    pub font_size_px: Option<f32>,
}

impl Style {
    /// Parse an inline `style` attribute. Unknown properties and units are ignored.
    pub fn parse_inline(style: &str) -> Self {
        let mut out = Style::default();
        for decl in style.split(';') {
            let Some((k, v)) = decl.split_once(':') else {
                continue;
            };
            let k = k.trim().to_ascii_lowercase();
            let v = v.trim().trim_end_matches("!important").trim().to_ascii_lowercase();
            match k.as_str() {
                "display" => out.display_none = v == "none",
                "visibility" => out.visibility_hidden = v == "hidden" || v == "collapse",
                "width" => out.width_px = parse_px(&v),
                "height" => out.height_px = parse_px(&v),
                "font-size" => out.font_size_px = parse_px(&v),
                _ => {}
            }
        }
        out
    }
}

fn parse_px(v: &str) -> Option<f32> {
    if v == "0" {
        return Some(0.0);
    }
    v.strip_suffix("px")?.trim().parse::<f32>().ok()
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        style: Style,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct VirtualDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl VirtualDocument {
    /// An empty document whose root is an element named `root_tag`.
    pub fn new(root_tag: &str) -> Self {
        let root = NodeData {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element {
                tag: root_tag.to_ascii_lowercase(),
                attrs: BTreeMap::new(),
                style: Style::default(),
            },
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Parse HTML into a document rooted at `#document`. Comments and doctypes are dropped.
    pub fn from_html(html: &str) -> Self {
        let parsed = html_scraper::Html::parse_document(html);
        let mut doc = Self::new("#document");
        let root = doc.root;
        doc.import_element(root, parsed.root_element());
        doc
    }

    fn import_element(&mut self, parent: NodeId, el: html_scraper::ElementRef<'_>) {
        let mut attrs = BTreeMap::new();
        for (k, v) in el.value().attrs() {
            attrs.insert(k.to_ascii_lowercase(), v.to_string());
        }
        let id = self.append_element_with_attrs(parent, el.value().name(), attrs);
        for child in el.children() {
            match child.value() {
                html_scraper::Node::Element(_) => {
                    if let Some(c) = html_scraper::ElementRef::wrap(child) {
                        self.import_element(id, c);
                    }
                }
                html_scraper::Node::Text(t) => {
                    let s: &str = t;
                    self.append_text(id, s);
                }
                _ => {}
            }
        }
    }

    fn push_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent,
            children: Vec::new(),
            kind,
        });
        id
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append_element_with_attrs(parent, tag, BTreeMap::new())
    }

    pub fn append_element_with_attrs(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        let mut style = attrs
            .get("style")
            .map(|s| Style::parse_inline(s))
            .unwrap_or_default();
        if attrs.contains_key("hidden") {
            style.display_none = true;
        }
        let id = self.push_node(
            Some(parent),
            NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attrs,
                style,
            },
        );
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push_node(Some(parent), NodeKind::Text(text.to_string()));
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Replace a text node's content (simulates an edit made after indexing).
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeKind::Text(t)) = self.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            *t = text.to_string();
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(|s| s.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// First element (document order) with this tag.
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.tag_name(*n) == Some(tag.as_str()))
    }

    /// `<body>` if present, else the root.
    pub fn body(&self) -> NodeId {
        self.find_element("body").unwrap_or(self.root)
    }

    /// All descendants of `node` in document order (excluding `node`).
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Concatenated text of every text node under `node`, hidden or not.
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(t) = self.node_text(node) {
            return t.to_string();
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|n| self.node_text(n))
            .collect()
    }

    /// Live marker elements for a highlight id.
    pub fn markers_for(&self, highlight_id: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|n| self.attr(*n, "data-highlight-id") == Some(highlight_id))
            .collect()
    }

    fn index_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.nodes.get(node.0)?.parent?;
        let pos = self.nodes[parent.0].children.iter().position(|c| *c == node)?;
        Some((parent, pos))
    }

    fn text_len(&self, node: NodeId) -> Option<usize> {
        self.node_text(node).map(|t| t.chars().count())
    }

    /// Split a text node at char offset `at`; the node keeps `[0, at)` and the returned new
    /// sibling holds `[at, len)`.
    fn split_text(&mut self, node: NodeId, at: usize) -> Option<NodeId> {
        let (parent, pos) = self.index_in_parent(node)?;
        let NodeKind::Text(t) = &mut self.nodes[node.0].kind else {
            return None;
        };
        let byte = t.char_indices().nth(at).map(|(b, _)| b).unwrap_or(t.len());
        let tail = t.split_off(byte);
        let id = self.push_node(Some(parent), NodeKind::Text(tail));
        self.nodes[parent.0].children.insert(pos + 1, id);
        Some(id)
    }

    /// Wrap the whole of `text_node` in a new marker element placed where the node was.
    fn wrap_node(&mut self, text_node: NodeId, marker: &Marker) -> Option<NodeId> {
        let (parent, pos) = self.index_in_parent(text_node)?;
        let mut attrs = BTreeMap::new();
        attrs.insert("class".to_string(), marker.class.clone());
        attrs.insert("data-highlight-id".to_string(), marker.highlight_id.clone());
        let el = self.push_node(
            Some(parent),
            NodeKind::Element {
                tag: marker.tag.clone(),
                attrs,
                style: Style::default(),
            },
        );
        self.nodes[parent.0].children[pos] = el;
        self.nodes[el.0].children.push(text_node);
        self.nodes[text_node.0].parent = Some(el);
        Some(el)
    }

    /// Merge adjacent text-node children of `parent` (DOM `normalize`, one level).
    fn merge_adjacent_text(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.nodes[parent.0].children);
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
        for c in children {
            let prev_is_text = merged.last().is_some_and(|p| self.is_text(*p));
            if prev_is_text && self.is_text(c) {
                let prev = merged[merged.len() - 1];
                let add = self.node_text(c).unwrap_or("").to_string();
                if let NodeKind::Text(t) = &mut self.nodes[prev.0].kind {
                    t.push_str(&add);
                }
                self.nodes[c.0].parent = None;
                continue;
            }
            merged.push(c);
        }
        self.nodes[parent.0].children = merged;
    }
}

impl TextDocument for VirtualDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn node_text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(t) => Some(t.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn is_hidden(&self, element: NodeId, mode: VisibilityMode) -> bool {
        let Some(NodeKind::Element { style, .. }) = self.nodes.get(element.0).map(|n| &n.kind)
        else {
            return false;
        };
        if style.display_none || style.visibility_hidden {
            return true;
        }
        match mode {
            VisibilityMode::Anchoring => false,
            VisibilityMode::Viewport => {
                let tiny = |v: Option<f32>| v.is_some_and(|px| px < 1.0);
                tiny(style.width_px)
                    || tiny(style.height_px)
                    || style.font_size_px.is_some_and(|px| px < 8.0)
            }
        }
    }

    fn wrap_range(&mut self, range: &TextRange, marker: &Marker) -> Vec<NodeId> {
        // Text nodes (document order) from the start boundary's node to the end's.
        let texts: Vec<NodeId> = self
            .descendants(self.root)
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect();
        let (Some(first), Some(last)) = (
            texts.iter().position(|n| *n == range.start.node),
            texts.iter().position(|n| *n == range.end.node),
        ) else {
            return Vec::new();
        };
        if last < first || (first == last && range.end.offset <= range.start.offset) {
            return Vec::new();
        }

        let mut segments: Vec<(NodeId, usize, usize)> = Vec::new();
        for (k, node) in texts[first..=last].iter().enumerate() {
            let Some(len) = self.text_len(*node) else {
                return Vec::new();
            };
            let a = if k == 0 { range.start.offset } else { 0 };
            let b = if first + k == last { range.end.offset } else { len };
            if a > len || b > len {
                return Vec::new();
            }
            if a < b {
                segments.push((*node, a, b));
            }
        }

        let mut markers = Vec::new();
        // Reverse so splitting a node never shifts a segment still to be wrapped.
        for (node, a, b) in segments.into_iter().rev() {
            let len = self.text_len(node).unwrap_or(0);
            let middle = if a > 0 {
                match self.split_text(node, a) {
                    Some(m) => m,
                    None => continue,
                }
            } else {
                node
            };
            if b < len {
                let _ = self.split_text(middle, b - a);
            }
            if let Some(m) = self.wrap_node(middle, marker) {
                markers.push(m);
            }
        }
        markers.reverse();
        markers
    }

    fn remove_marker(&mut self, marker: NodeId) -> bool {
        if self.attr(marker, "data-highlight-id").is_none() {
            return false;
        }
        let Some((parent, pos)) = self.index_in_parent(marker) else {
            return false;
        };
        let children = std::mem::take(&mut self.nodes[marker.0].children);
        for c in &children {
            self.nodes[c.0].parent = Some(parent);
        }
        self.nodes[parent.0].children.splice(pos..=pos, children);
        self.nodes[marker.0].parent = None;
        self.merge_adjacent_text(parent);
        true
    }
}

/// Convenience: a boundary at `offset` chars into `node`.
pub fn boundary(node: NodeId, offset: usize) -> Boundary {
    Boundary { node, offset }
}
