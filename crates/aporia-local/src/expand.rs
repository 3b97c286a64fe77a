//! Widening raw highlight offsets to whole sentences, and merging duplicates.

use crate::segment;
use crate::vocab::Vocabulary;
use aporia_core::ProcessedHighlight;
use std::collections::HashMap;

/// Expand chunk-local `[start, end)` to the sentences containing each bound.
///
/// The start comes from the sentence containing `start`, the end from the sentence
/// containing `end`, so a span crossing sentences covers the whole run. If no sentence is
/// detected (or a bound sits between sentences) that bound is left as is.
pub fn expand_to_sentence(
    chunk_text: &str,
    start: usize,
    end: usize,
    vocab: &Vocabulary,
) -> (usize, usize) {
    let chars: Vec<char> = chunk_text.chars().collect();
    let sentences = segment::detect_sentences_in(&chars, vocab);
    if sentences.is_empty() {
        return (start, end);
    }

    let new_start = sentences
        .iter()
        .find(|s| s.start <= start && start < s.end)
        .map(|s| s.start)
        .unwrap_or(start);
    let mut new_end = sentences
        .iter()
        .find(|s| s.start < end && end <= s.end)
        .map(|s| s.end)
        .unwrap_or(end)
        .min(chars.len());
    while new_end > new_start && chars[new_end - 1].is_whitespace() {
        new_end -= 1;
    }

    if new_start >= new_end {
        return (start, end);
    }
    (new_start, new_end)
}

/// Merge highlights whose text is identical, keeping the first in reading order and
/// appending the others' questions (and live markers) to it.
pub fn deduplicate_by_text(highlights: Vec<ProcessedHighlight>) -> Vec<ProcessedHighlight> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<ProcessedHighlight> = Vec::with_capacity(highlights.len());
    for h in highlights {
        match seen.get(&h.text) {
            Some(&i) => {
                let keep = &mut out[i];
                keep.questions.extend(h.questions);
                keep.markers.extend(h.markers);
            }
            None => {
                seen.insert(h.text.clone(), out.len());
                out.push(h);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hl(text: &str, q: &str) -> ProcessedHighlight {
        ProcessedHighlight {
            id: format!("id-{text}-{q}"),
            start: 0,
            end: text.len(),
            text: text.to_string(),
            reason: String::new(),
            explanation: String::new(),
            questions: vec![q.to_string()],
            chunk_index: 0,
            range: None,
            anchor: None,
            markers: Vec::new(),
        }
    }

    #[test]
    fn expands_partial_span_to_enclosing_sentence() {
        let v = Vocabulary::english();
        let text = "First claim here. Second claim is bold. Third.";
        assert_eq!(expand_to_sentence(text, 20, 25, &v), (18, 39));
        assert_eq!(&text[18..39], "Second claim is bold.");
    }

    #[test]
    fn span_across_sentences_covers_the_run() {
        let v = Vocabulary::english();
        let text = "First claim here. Second claim is bold. Third.";
        assert_eq!(expand_to_sentence(text, 6, 25, &v), (0, 39));
    }

    #[test]
    fn end_on_sentence_boundary_stays_in_that_sentence() {
        let v = Vocabulary::english();
        let text = "One two. Three four.";
        assert_eq!(expand_to_sentence(text, 0, 8, &v), (0, 8));
    }

    #[test]
    fn no_sentences_is_a_no_op() {
        let v = Vocabulary::english();
        assert_eq!(expand_to_sentence("", 3, 7, &v), (3, 7));
        assert_eq!(expand_to_sentence("   ", 0, 2, &v), (0, 2));
    }

    #[test]
    fn dedup_merges_questions_and_keeps_order() {
        let out = deduplicate_by_text(vec![hl("A", "1"), hl("B", "2"), hl("A", "3")]);
        let got: Vec<(&str, Vec<&str>)> = out
            .iter()
            .map(|h| (h.text.as_str(), h.questions.iter().map(|q| q.as_str()).collect()))
            .collect();
        assert_eq!(got, vec![("A", vec!["1", "3"]), ("B", vec!["2"])]);
        assert_eq!(out[0].id, "id-A-1");
    }

    #[test]
    fn dedup_of_empty_is_empty() {
        assert!(deduplicate_by_text(Vec::new()).is_empty());
    }
}
