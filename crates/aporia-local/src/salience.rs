//! Lightweight salience ("argument richness") scoring.
//!
//! Self-contained and deterministic: keyword density, question marks, distinct structural
//! transitions, and a syntactic complexity proxy. It is a ranking signal for ordering
//! chunks, not a classifier.

use crate::segment;
use crate::textprep;
use crate::vocab::Vocabulary;
use aporia_core::{Salience, SalienceFactors};

const W_KEYWORDS: f64 = 0.5;
const W_QUESTIONS: f64 = 0.2;
const W_TRANSITIONS: f64 = 0.15;
const W_COMPLEXITY: f64 = 0.15;

/// Keyword hits per 100 words at which the keyword factor saturates.
const KEYWORD_DENSITY_CAP: f64 = 3.0;
const QUESTION_CAP: f64 = 3.0;
const TRANSITION_CAP: f64 = 3.0;
/// Average words per sentence at which the length part of complexity saturates.
const LONG_SENTENCE_WORDS: f64 = 25.0;

fn capped(value: f64, cap: f64) -> f64 {
    (value / cap).clamp(0.0, 1.0)
}

pub fn calculate_salience(text: &str, vocab: &Vocabulary) -> Salience {
    let words = textprep::word_count(text);
    if words == 0 {
        return Salience::default();
    }
    let lower: Vec<char> = text.to_lowercase().chars().collect();

    let mut keyword_hits = 0usize;
    for keywords in vocab.argument_keywords.values() {
        for kw in keywords {
            let kw: Vec<char> = kw.to_lowercase().chars().collect();
            keyword_hits += textprep::count_phrase(&lower, &kw);
        }
    }
    let density = keyword_hits as f64 * 100.0 / words as f64;
    let argument_keywords = capped(density, KEYWORD_DENSITY_CAP);

    let question_marks = text.chars().filter(|c| *c == '?').count();
    let questions = capped(question_marks as f64, QUESTION_CAP);

    let distinct_transitions = vocab
        .structural_transitions
        .iter()
        .filter(|t| {
            let t: Vec<char> = t.to_lowercase().chars().collect();
            textprep::count_phrase(&lower, &t) > 0
        })
        .count();
    let transitions = capped(distinct_transitions as f64, TRANSITION_CAP);

    let sentence_count = segment::detect_sentences(text, vocab).len().max(1);
    let avg_len = words as f64 / sentence_count as f64;
    let semicolons = text.chars().filter(|c| *c == ';').count();
    let em_dashes = text.chars().filter(|c| *c == '\u{2014}').count();
    let complexity = 0.5 * capped(avg_len, LONG_SENTENCE_WORDS)
        + 0.25 * capped(semicolons as f64, 3.0)
        + 0.25 * capped(em_dashes as f64, 3.0);

    let score = (W_KEYWORDS * argument_keywords
        + W_QUESTIONS * questions
        + W_TRANSITIONS * transitions
        + W_COMPLEXITY * complexity)
        .clamp(0.0, 1.0);

    Salience {
        score,
        factors: SalienceFactors {
            argument_keywords,
            questions,
            transitions,
            complexity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[test]
    fn empty_text_scores_zero() {
        let v = Vocabulary::english();
        assert_eq!(calculate_salience("", &v), Salience::default());
        assert_eq!(calculate_salience("  \n ", &v).score, 0.0);
    }

    #[test]
    fn argumentative_text_outranks_plain_narration() {
        let v = Vocabulary::english();
        let plain = "The cat sat on the mat. The sun was warm. Birds sang outside.";
        let argued = "However, the study shows that this is wrong because the data \
                      were incomplete; therefore we must ask: why did nobody check? \
                      Moreover, critics argue the sample was biased.";
        let a = calculate_salience(argued, &v);
        let p = calculate_salience(plain, &v);
        assert!(a.score > p.score, "argued={a:?} plain={p:?}");
        assert!(a.factors.argument_keywords > 0.9);
        assert!(a.factors.questions > 0.0);
        assert!(a.factors.transitions > 0.0);
        assert_eq!(p.factors.questions, 0.0);
    }

    #[test]
    fn synthetic_vocabulary_drives_keyword_factor() {
        let mut kws = BTreeMap::new();
        kws.insert("test".to_string(), vec!["zorp".to_string()]);
        let v = Vocabulary {
            abbreviations: Vec::new(),
            paragraph_transitions: Vec::new(),
            structural_transitions: Vec::new(),
            argument_keywords: kws,
        };
        let s = calculate_salience("zorp zorp zorp is here.", &v);
        assert_eq!(s.factors.argument_keywords, 1.0);
        assert_eq!(s.factors.transitions, 0.0);
        let s = calculate_salience("nothing is here.", &v);
        assert_eq!(s.factors.argument_keywords, 0.0);
    }

    #[test]
    fn question_factor_caps_at_three() {
        let v = Vocabulary::english();
        let s = calculate_salience("A? B? C? D? E?", &v);
        assert_eq!(s.factors.questions, 1.0);
    }

    proptest! {
        #[test]
        fn score_is_always_in_unit_interval(text in ".{0,400}") {
            let s = calculate_salience(&text, &Vocabulary::english());
            prop_assert!((0.0..=1.0).contains(&s.score));
            for f in [s.factors.argument_keywords, s.factors.questions, s.factors.transitions, s.factors.complexity] {
                prop_assert!((0.0..=1.0).contains(&f));
            }
        }
    }
}
