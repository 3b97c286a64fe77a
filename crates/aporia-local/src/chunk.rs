//! Sentence- and paragraph-respecting chunking.
//!
//! Chunks are built greedily from paragraphs' sentences, sized toward a target word count.
//! A chunk never ends mid-sentence, prefers to end on a paragraph boundary, and only the
//! final remainder may fall under `min_words`.

use crate::salience;
use crate::segment;
use crate::textprep;
use crate::vocab::Vocabulary;
use aporia_core::{SemanticChunk, SentenceBoundary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub target_words: usize,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_words: 500,
            min_words: 200,
            max_words: 800,
        }
    }
}

struct Accumulator<'a> {
    chars: &'a [char],
    vocab: &'a Vocabulary,
    sentences: Vec<SentenceBoundary>,
    words: usize,
    out: Vec<SemanticChunk>,
}

impl Accumulator<'_> {
    fn push(&mut self, s: SentenceBoundary) {
        self.words += textprep::word_count(&s.text);
        self.sentences.push(s);
    }

    fn finalize(&mut self) {
        let sentences = std::mem::take(&mut self.sentences);
        self.words = 0;
        let (Some(first), Some(last)) = (sentences.first(), sentences.last()) else {
            return;
        };
        let start = first.start;
        let end = last.end;
        let text = textprep::slice_chars(self.chars, start, end);
        let sal = salience::calculate_salience(&text, self.vocab);
        self.out.push(SemanticChunk {
            word_count: textprep::word_count(&text),
            text,
            start,
            end,
            sentences,
            salience: sal.score,
            factors: sal.factors,
        });
    }
}

pub fn create_semantic_chunks(
    text: &str,
    cfg: ChunkConfig,
    vocab: &Vocabulary,
) -> Vec<SemanticChunk> {
    let chars: Vec<char> = text.chars().collect();
    let paragraphs = segment::detect_paragraphs_in(&chars, vocab);

    let mut acc = Accumulator {
        chars: &chars,
        vocab,
        sentences: Vec::new(),
        words: 0,
        out: Vec::new(),
    };

    for para in paragraphs {
        let n = para.sentences.len();
        for (k, s) in para.sentences.into_iter().enumerate() {
            let wc = textprep::word_count(&s.text);
            if !acc.sentences.is_empty() && acc.words + wc > cfg.max_words {
                acc.finalize();
            }
            acc.push(s);
            let paragraph_end = k + 1 == n;
            if paragraph_end && acc.words >= cfg.target_words && acc.words >= cfg.min_words {
                acc.finalize();
            }
        }
        if !acc.sentences.is_empty() && acc.words >= cfg.min_words {
            acc.finalize();
        }
    }
    acc.finalize();
    acc.out
}

/// Chunk indices by descending salience; ties keep document order.
pub fn prioritize_chunks(chunks: &[SemanticChunk]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..chunks.len()).collect();
    idx.sort_by(|a, b| {
        chunks[*b]
            .salience
            .partial_cmp(&chunks[*a].salience)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    idx
}
