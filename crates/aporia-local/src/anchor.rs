//! Portable anchors: capture a range as text plus context, and re-resolve it later.
//!
//! Resolution is a cascade, first success wins:
//! exact quote (1.0), host fragment search (0.95), fuzzy window (similarity), raw position (0.5).
//! Every stage works on the root's linearized text under [`VisibilityMode::Anchoring`], so content
//! that is merely scrolled away or tiny still resolves.

use crate::index::{self, Linearized};
use crate::mapper;
use crate::textprep;
use aporia_core::{
    AnchorMethod, AnchorResult, NodeId, TextAnchor, TextDocument, TextRange, VisibilityMode,
};
use serde::{Deserialize, Serialize};

pub const EXACT_SCORE: f64 = 1.0;
pub const FRAGMENT_SCORE: f64 = 0.95;
pub const POSITION_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorOptions {
    /// Characters of prefix/suffix captured on each side.
    pub context_len: usize,
    /// Minimum exact-text similarity for a fuzzy window (inclusive).
    pub fuzzy_threshold: f64,
    /// Minimum mean prefix/suffix similarity for a fuzzy window (exclusive).
    pub context_threshold: f64,
    /// If set, fuzzy search only considers windows starting within this many characters of
    /// the descriptor's recorded start. `None` scans the whole text.
    pub fuzzy_scan_radius: Option<usize>,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            context_len: 32,
            fuzzy_threshold: 0.8,
            context_threshold: 0.7,
            fuzzy_scan_radius: None,
        }
    }
}

/// Edit distance (insert/delete/substitute, unit cost) with a single rolling row.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diag + cost);
            diag = above;
        }
    }
    row[b.len()]
}

/// `(longer - distance) / longer`; 1.0 when both are empty.
pub fn similarity(a: &[char], b: &[char]) -> f64 {
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    let d = levenshtein(a, b);
    (longer - d) as f64 / longer as f64
}

/// The text a range covers, read through `root`'s linearized text.
pub fn range_text<D: TextDocument + ?Sized>(doc: &D, root: NodeId, range: &TextRange) -> Option<String> {
    let lin = index::linearize(doc, root, VisibilityMode::Anchoring);
    let (start, end) = mapper::range_to_offsets(&lin.spans, range)?;
    let chars: Vec<char> = lin.text.chars().collect();
    Some(textprep::slice_chars(&chars, start, end))
}

/// Capture `range` as a [`TextAnchor`]. Pure: the document is not touched.
///
/// `None` if the range does not lie on indexed text of `root`, or is empty.
pub fn describe_range<D: TextDocument + ?Sized>(
    doc: &D,
    range: &TextRange,
    root: NodeId,
    context_len: usize,
) -> Option<TextAnchor> {
    let lin = index::linearize(doc, root, VisibilityMode::Anchoring);
    let (start, end) = mapper::range_to_offsets(&lin.spans, range)?;
    if start == end {
        return None;
    }
    let chars: Vec<char> = lin.text.chars().collect();
    Some(TextAnchor {
        exact: textprep::slice_chars(&chars, start, end),
        prefix: textprep::slice_chars(&chars, start.saturating_sub(context_len), start),
        suffix: textprep::slice_chars(&chars, end, end + context_len),
        start,
        end,
    })
}

struct Resolver<'a, D: ?Sized> {
    doc: &'a D,
    lin: Linearized,
    chars: Vec<char>,
    prefix: Vec<char>,
    suffix: Vec<char>,
    exact: Vec<char>,
}

impl<'a, D: TextDocument + ?Sized> Resolver<'a, D> {
    fn new(doc: &'a D, root: NodeId, descriptor: &TextAnchor) -> Self {
        let lin = index::linearize(doc, root, VisibilityMode::Anchoring);
        let chars = lin.text.chars().collect();
        Self {
            doc,
            lin,
            chars,
            prefix: descriptor.prefix.chars().collect(),
            suffix: descriptor.suffix.chars().collect(),
            exact: descriptor.exact.chars().collect(),
        }
    }

    fn result(&self, start: usize, end: usize, score: f64, method: AnchorMethod) -> Option<AnchorResult> {
        let range = mapper::locate(self.doc, &self.lin.spans, start, end)?;
        Some(AnchorResult {
            range,
            exact: textprep::slice_chars(&self.chars, start, end),
            score,
            method,
        })
    }

    fn context_matches(&self, start: usize, end: usize) -> bool {
        self.chars[..start].ends_with(&self.prefix) && self.chars[end..].starts_with(&self.suffix)
    }

    fn exact(&self) -> Option<AnchorResult> {
        let hits = textprep::find_all(&self.chars, &self.exact);
        let n = self.exact.len();
        let start = match hits.as_slice() {
            [] => return None,
            [only] => *only,
            many => many
                .iter()
                .copied()
                .find(|s| self.context_matches(*s, s + n))
                .unwrap_or(many[0]),
        };
        self.result(start, start + n, EXACT_SCORE, AnchorMethod::Exact)
    }

    fn fragment(&self, root: NodeId, descriptor: &TextAnchor) -> Option<AnchorResult> {
        let range = self.doc.find_fragment(root, descriptor)?;
        let exact = mapper::range_to_offsets(&self.lin.spans, &range)
            .map(|(s, e)| textprep::slice_chars(&self.chars, s, e))
            .unwrap_or_else(|| descriptor.exact.clone());
        Some(AnchorResult {
            range,
            exact,
            score: FRAGMENT_SCORE,
            method: AnchorMethod::Fragment,
        })
    }

    fn fuzzy(&self, descriptor: &TextAnchor, opts: &AnchorOptions) -> Option<AnchorResult> {
        let n = self.exact.len();
        let len = self.chars.len();
        if n == 0 || n > len {
            return None;
        }
        let last = len - n;
        let (lo, hi) = match opts.fuzzy_scan_radius {
            Some(r) => (descriptor.start.saturating_sub(r).min(last), (descriptor.start + r).min(last)),
            None => (0, last),
        };

        let mut best: Option<(usize, f64)> = None;
        for i in lo..=hi {
            let sim = similarity(&self.exact, &self.chars[i..i + n]);
            if sim < opts.fuzzy_threshold || best.is_some_and(|(_, b)| sim <= b) {
                continue;
            }
            let before = &self.chars[i.saturating_sub(self.prefix.len())..i];
            let after = &self.chars[i + n..(i + n + self.suffix.len()).min(len)];
            let ctx = (similarity(&self.prefix, before) + similarity(&self.suffix, after)) / 2.0;
            if ctx > opts.context_threshold {
                best = Some((i, sim));
            }
        }
        let (start, score) = best?;
        self.result(start, start + n, score, AnchorMethod::Fuzzy)
    }

    fn position(&self, descriptor: &TextAnchor) -> Option<AnchorResult> {
        let (s, e) = (descriptor.start, descriptor.end);
        if s >= e || e > self.chars.len() {
            return None;
        }
        self.result(s, e, POSITION_SCORE, AnchorMethod::Position)
    }
}

/// Re-resolve `descriptor` under `root`. `None` means the passage can no longer be placed.
pub fn anchor<D: TextDocument + ?Sized>(
    doc: &D,
    descriptor: &TextAnchor,
    root: NodeId,
    opts: &AnchorOptions,
) -> Option<AnchorResult> {
    if descriptor.exact.is_empty() {
        return None;
    }
    let r = Resolver::new(doc, root, descriptor);
    if r.chars.is_empty() {
        return None;
    }
    let found = r
        .exact()
        .or_else(|| r.fragment(root, descriptor))
        .or_else(|| r.fuzzy(descriptor, opts))
        .or_else(|| r.position(descriptor));
    match &found {
        Some(res) => tracing::debug!(method = res.method.as_str(), score = res.score, "anchored"),
        None => tracing::warn!(
            start = descriptor.start,
            end = descriptor.end,
            "anchor could not be resolved"
        ),
    }
    found
}
