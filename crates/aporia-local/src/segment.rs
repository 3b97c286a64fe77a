//! Sentence and paragraph segmentation.
//!
//! Characters are scanned against an injectable abbreviation list:
//!
//! - `.`, `!`, `?` are provisional terminators
//! - ellipses, single-capital initials ("U.S."), listed abbreviations, and decimals
//!   ("3.14") never terminate
//! - a terminator only counts when followed by whitespace or end of text
//!
//! Paragraphs are runs of sentences; a break needs a blank line, or a newline followed by a
//! transition opener ("Furthermore", "Finally", ...). Transition words alone never break.

use crate::textprep;
use crate::vocab::Vocabulary;
use aporia_core::{Paragraph, SentenceBoundary};

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// The token ending just before `chars[i]`, without leading punctuation like `(` or `"`.
fn token_before(chars: &[char], i: usize) -> String {
    let mut s = i;
    while s > 0 && !chars[s - 1].is_whitespace() {
        s -= 1;
    }
    let tok: String = chars[s..i].iter().collect();
    tok.trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

fn period_is_non_terminal(chars: &[char], i: usize, vocab: &Vocabulary) -> bool {
    // Multi-part abbreviation: single capital preceded by a period or space ("U.S.", "J. Doe").
    if i >= 2 && chars[i - 1].is_uppercase() && matches!(chars[i - 2], '.' | ' ') {
        return true;
    }
    if i > 0 && vocab.is_abbreviation(&token_before(chars, i)) {
        return true;
    }
    // Decimal number.
    i > 0
        && i + 1 < chars.len()
        && chars[i - 1].is_ascii_digit()
        && chars[i + 1].is_ascii_digit()
}

fn push_trimmed(out: &mut Vec<SentenceBoundary>, chars: &[char], start: usize, end: usize) {
    let mut s = start;
    let mut e = end;
    while s < e && chars[s].is_whitespace() {
        s += 1;
    }
    while e > s && chars[e - 1].is_whitespace() {
        e -= 1;
    }
    if s < e {
        out.push(SentenceBoundary {
            start: s,
            end: e,
            text: chars[s..e].iter().collect(),
        });
    }
}

pub fn detect_sentences(text: &str, vocab: &Vocabulary) -> Vec<SentenceBoundary> {
    let chars: Vec<char> = text.chars().collect();
    detect_sentences_in(&chars, vocab)
}

pub(crate) fn detect_sentences_in(chars: &[char], vocab: &Vocabulary) -> Vec<SentenceBoundary> {
    let n = chars.len();
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < n {
        let c = chars[i];
        if !is_terminator(c) {
            i += 1;
            continue;
        }
        if c == '.' {
            if i + 2 < n && chars[i + 1] == '.' && chars[i + 2] == '.' {
                i += 3;
                continue;
            }
            if period_is_non_terminal(chars, i, vocab) {
                i += 1;
                continue;
            }
        }
        if i + 1 < n && !chars[i + 1].is_whitespace() {
            i += 1;
            continue;
        }

        // Keep trailing spaces/tabs with this sentence, but not newlines: they carry the
        // paragraph signal.
        let mut end = i + 1;
        while end < n && matches!(chars[end], ' ' | '\t') {
            end += 1;
        }
        push_trimmed(&mut out, chars, start, end);

        start = end;
        while start < n && matches!(chars[start], '\n' | '\r') {
            start += 1;
        }
        i = start;
    }

    if start < n {
        push_trimmed(&mut out, chars, start, n);
    }
    out
}

fn opens_with_transition(sentence: &str, vocab: &Vocabulary) -> bool {
    vocab
        .paragraph_transitions
        .iter()
        .any(|w| textprep::starts_with_word(sentence, w))
}

pub fn detect_paragraphs(text: &str, vocab: &Vocabulary) -> Vec<Paragraph> {
    let chars: Vec<char> = text.chars().collect();
    detect_paragraphs_in(&chars, vocab)
}

pub(crate) fn detect_paragraphs_in(chars: &[char], vocab: &Vocabulary) -> Vec<Paragraph> {
    let sentences = detect_sentences_in(chars, vocab);
    let mut paragraphs = Vec::new();
    let mut current: Vec<SentenceBoundary> = Vec::new();

    for s in sentences {
        if let Some(prev) = current.last() {
            let newlines = chars[prev.end..s.start]
                .iter()
                .filter(|c| **c == '\n')
                .count();
            let brk = newlines >= 2 || (newlines >= 1 && opens_with_transition(&s.text, vocab));
            if brk {
                paragraphs.push(close_paragraph(std::mem::take(&mut current)));
            }
        }
        current.push(s);
    }
    if !current.is_empty() {
        paragraphs.push(close_paragraph(current));
    }
    paragraphs
}

fn close_paragraph(sentences: Vec<SentenceBoundary>) -> Paragraph {
    let start = sentences.first().map(|s| s.start).unwrap_or(0);
    let end = sentences.last().map(|s| s.end).unwrap_or(start);
    Paragraph {
        start,
        end,
        sentences,
    }
}
