//! Minimal, deterministic text helpers shared by segmentation, scoring and anchoring.
//!
//! All offsets in this crate are character offsets (Unicode scalar values), never bytes.

/// Whitespace-delimited word count.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// `chars[start..end]` as a String, clamped to the slice bounds.
pub fn slice_chars(chars: &[char], start: usize, end: usize) -> String {
    let end = end.min(chars.len());
    if end <= start {
        return String::new();
    }
    chars[start..end].iter().collect()
}

pub fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    if max_chars == 0 {
        return ("".to_string(), !s.is_empty());
    }
    let mut out = String::new();
    for (n, ch) in s.chars().enumerate() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
    }
    (out, false)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

/// Count occurrences of `phrase` in `haystack` on word boundaries.
///
/// Both inputs are expected to be lowercase already.
pub fn count_phrase(haystack: &[char], phrase: &[char]) -> usize {
    if phrase.is_empty() || phrase.len() > haystack.len() {
        return 0;
    }
    let mut hits = 0usize;
    let mut i = 0usize;
    while i + phrase.len() <= haystack.len() {
        if haystack[i..i + phrase.len()] == *phrase {
            let before_ok = i == 0 || !is_word_char(haystack[i - 1]);
            let after = i + phrase.len();
            let after_ok = after == haystack.len() || !is_word_char(haystack[after]);
            if before_ok && after_ok {
                hits += 1;
                i = after;
                continue;
            }
        }
        i += 1;
    }
    hits
}

/// Whether `s` begins with `word` (case-insensitive) followed by a non-word character or the end.
pub fn starts_with_word(s: &str, word: &str) -> bool {
    let s_lc: Vec<char> = s.trim_start().to_lowercase().chars().collect();
    let w_lc: Vec<char> = word.to_lowercase().chars().collect();
    if w_lc.is_empty() || s_lc.len() < w_lc.len() {
        return false;
    }
    if s_lc[..w_lc.len()] != *w_lc {
        return false;
    }
    !s_lc.get(w_lc.len()).is_some_and(|c| is_word_char(*c))
}

/// All (possibly overlapping) character positions where `needle` occurs in `hay`.
pub fn find_all(hay: &[char], needle: &[char]) -> Vec<usize> {
    let mut out = Vec::new();
    if needle.is_empty() || needle.len() > hay.len() {
        return out;
    }
    for i in 0..=hay.len() - needle.len() {
        if hay[i..i + needle.len()] == *needle {
            out.push(i);
        }
    }
    out
}
