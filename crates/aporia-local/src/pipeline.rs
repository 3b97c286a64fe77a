//! End-to-end analysis and restore over a live document.

use crate::anchor::{self, AnchorOptions};
use crate::chunk;
use crate::config::AporiaConfig;
use crate::highlight::{self, ApplyStatus};
use crate::index;
use crate::mapper::ChunkSlice;
use crate::session::Session;
use crate::store::{self, now_epoch_s};
use crate::vocab::Vocabulary;
use aporia_core::{
    AnalysisBackend, AnchorMethod, AnnotationStore, CachedAnalysis, Error, Highlight, Marker,
    NodeId, ProcessedHighlight, Result, SavedAnnotation, SemanticChunk, TextDocument,
    VisibilityMode,
};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub url: String,
    pub content_hash: String,
    pub from_cache: bool,
    pub chunks: usize,
    /// Chunk indices in the order they were analyzed.
    pub order: Vec<usize>,
    pub placed: usize,
    pub unplaced: usize,
    /// Chunks where every highlight was listed but none could be placed.
    pub list_only_chunks: Vec<usize>,
    pub failures: Vec<ChunkFailure>,
}

/// Which chunk a global offset falls in.
fn chunk_for_offset(chunks: &[SemanticChunk], global: usize) -> Option<usize> {
    chunks.iter().position(|c| c.start <= global && global < c.end)
}

/// Split globally-addressed cached highlights back into chunk-local lists.
fn localize(chunks: &[SemanticChunk], cached: &[Highlight]) -> Vec<Vec<Highlight>> {
    let mut per_chunk: Vec<Vec<Highlight>> = vec![Vec::new(); chunks.len()];
    for h in cached {
        let Some(i) = chunk_for_offset(chunks, h.start) else {
            tracing::debug!(start = h.start, "cached highlight outside every chunk");
            continue;
        };
        let c = &chunks[i];
        per_chunk[i].push(Highlight {
            start: h.start - c.start,
            end: h.end.saturating_sub(c.start),
            ..h.clone()
        });
    }
    per_chunk
}

fn to_saved(url: &str, h: &ProcessedHighlight, now: u64) -> Option<SavedAnnotation> {
    let anchor = h.anchor.clone()?;
    Some(SavedAnnotation {
        highlight_id: h.id.clone(),
        url: url.to_string(),
        start: anchor.start,
        end: anchor.end,
        text: store::snippet(&h.text),
        note: None,
        created_at_epoch_s: now,
        anchor,
    })
}

/// Analyze `root` chunk by chunk, apply highlights, persist anchors and cache raw results.
///
/// Clears the session (and its markers) first. Per-chunk collaborator failures are recorded
/// in the report and do not stop other chunks. A reset of the session generation while a
/// chunk is in flight aborts with [`Error::Stale`] before that chunk is applied.
#[allow(clippy::too_many_arguments)]
pub async fn analyze_document<D: TextDocument + ?Sized>(
    doc: &mut D,
    root: NodeId,
    backend: &dyn AnalysisBackend,
    store: &dyn AnnotationStore,
    cfg: &AporiaConfig,
    vocab: &Vocabulary,
    session: &mut Session,
    url: &str,
) -> Result<AnalysisReport> {
    let url = aporia_core::normalize_url(url)?;
    session.clear_markers(doc);
    let generation = session.begin_analysis();
    let guard = session.guard();

    let lin = index::linearize(doc, root, VisibilityMode::Anchoring);
    let chunks = chunk::create_semantic_chunks(&lin.text, cfg.chunk, vocab);
    let order: Vec<usize> = if cfg.prioritize_by_salience {
        chunk::prioritize_chunks(&chunks)
    } else {
        (0..chunks.len()).collect()
    };
    let content_hash = store::content_hash(&lin.text);
    let mut report = AnalysisReport {
        url: url.clone(),
        content_hash: content_hash.clone(),
        chunks: chunks.len(),
        order: order.clone(),
        ..AnalysisReport::default()
    };
    if chunks.is_empty() {
        tracing::info!(url = %url, "no analyzable text");
        return Ok(report);
    }

    let cached = store
        .cached_analysis(&url, &content_hash, cfg.cache_ttl_s)
        .await?;
    let mut cached_local = cached.as_ref().map(|c| localize(&chunks, &c.highlights));
    report.from_cache = cached_local.is_some();

    let mut global_raw: Vec<Highlight> = Vec::new();
    for &idx in &order {
        let c = &chunks[idx];
        let raw = match cached_local.as_mut() {
            Some(per_chunk) => std::mem::take(&mut per_chunk[idx]),
            None => match backend.analyze(&c.text).await {
                Ok(hs) => hs,
                Err(e) => {
                    tracing::warn!(chunk = idx, backend = backend.name(), error = %e, "chunk analysis failed");
                    report.failures.push(ChunkFailure {
                        chunk_index: idx,
                        error: e.to_string(),
                    });
                    continue;
                }
            },
        };
        if !guard.is_current(generation) {
            tracing::warn!(generation, "analysis superseded; dropping in-flight chunk");
            return Err(Error::Stale(generation));
        }
        global_raw.extend(raw.iter().map(|h| Highlight {
            start: h.start + c.start,
            end: h.end + c.start,
            ..h.clone()
        }));

        // Earlier wraps split nodes, so the chunk's spans are rebuilt from the live document.
        let live = index::linearize(doc, root, VisibilityMode::Anchoring);
        let slice = ChunkSlice::new(idx, c, &live.spans);
        let outcome = highlight::apply_chunk_highlights(
            doc,
            &slice,
            &raw,
            root,
            vocab,
            cfg.anchor.context_len,
        );
        report.placed += outcome.placed;
        report.unplaced += outcome.unplaced;
        if outcome.status() == ApplyStatus::AllUnplaced {
            report.list_only_chunks.push(idx);
        }
        session.accept(generation, outcome.highlights)?;
    }

    // A new analysis supersedes whatever an earlier run saved for this URL.
    let superseded = store.annotations(&url).await?;
    for prior in &superseded {
        store.delete_annotation(&url, &prior.highlight_id).await?;
    }
    if !superseded.is_empty() {
        tracing::debug!(url = %url, count = superseded.len(), "dropped annotations from an earlier analysis");
    }

    let now = now_epoch_s();
    for h in session.highlights().iter().filter(|h| h.is_placed()) {
        if let Some(saved) = to_saved(&url, h, now) {
            store.save_annotation(&saved).await?;
        }
    }

    if !report.from_cache && report.failures.is_empty() {
        store
            .cache_analysis(&CachedAnalysis {
                url: url.clone(),
                content_hash,
                created_at_epoch_s: now,
                highlights: global_raw,
            })
            .await?;
    }

    tracing::info!(
        url = %url,
        chunks = report.chunks,
        placed = report.placed,
        unplaced = report.unplaced,
        failures = report.failures.len(),
        from_cache = report.from_cache,
        "analysis complete"
    );
    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoredAnnotation {
    pub highlight_id: String,
    pub method: AnchorMethod,
    pub score: f64,
    pub text: String,
    #[serde(skip)]
    pub markers: Vec<NodeId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub restored: Vec<RestoredAnnotation>,
    /// Annotations that could not be placed any more.
    pub missing: Vec<String>,
}

/// Re-anchor and re-wrap every saved annotation for `url`. Failures are skipped.
pub async fn restore_annotations<D: TextDocument + ?Sized>(
    doc: &mut D,
    root: NodeId,
    store: &dyn AnnotationStore,
    url: &str,
    opts: &AnchorOptions,
) -> Result<RestoreReport> {
    let url = aporia_core::normalize_url(url)?;
    let saved = store.annotations(&url).await?;
    let mut report = RestoreReport::default();
    for a in saved {
        let Some(res) = anchor::anchor(doc, &a.anchor, root, opts) else {
            report.missing.push(a.highlight_id);
            continue;
        };
        let markers = doc.wrap_range(&res.range, &Marker::highlight(a.highlight_id.clone()));
        if markers.is_empty() {
            report.missing.push(a.highlight_id);
            continue;
        }
        report.restored.push(RestoredAnnotation {
            highlight_id: a.highlight_id,
            method: res.method,
            score: res.score,
            text: res.exact,
            markers,
        });
    }
    tracing::info!(
        url = %url,
        restored = report.restored.len(),
        missing = report.missing.len(),
        "annotations restored"
    );
    Ok(report)
}
