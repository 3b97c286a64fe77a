//! Injected word lists for segmentation and salience scoring.
//!
//! The algorithms never embed vocabulary; they read it from a [`Vocabulary`], so another
//! language (or a synthetic test vocabulary) can be swapped in from JSON.

use aporia_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Tokens (without their final period) after which a period never ends a sentence.
    /// Matched case-sensitively.
    pub abbreviations: Vec<String>,
    /// Sentence openers that start a new paragraph when preceded by a newline.
    pub paragraph_transitions: Vec<String>,
    /// Structural transition words counted (distinct) by the salience scorer.
    pub structural_transitions: Vec<String>,
    /// Argument keyword categories (causal, contrast, evidence, ...) for salience.
    pub argument_keywords: BTreeMap<String, Vec<String>>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Vocabulary {
    pub fn english() -> Self {
        let abbreviations = owned(&[
            "Dr", "Mr", "Mrs", "Ms", "Prof", "Sr", "Jr", "vs", "etc", "e.g", "i.e", "Ph.D", "M.D",
            "B.A", "M.A", "U.S", "U.K", "U.N", "E.U", "Inc", "Ltd", "Co", "Corp", "Jan", "Feb",
            "Mar", "Apr", "Jun", "Jul", "Aug", "Sep", "Sept", "Oct", "Nov", "Dec", "No", "vol",
            "pp", "Fig", "St", "Ave", "Blvd",
        ]);
        let paragraph_transitions = owned(&[
            "furthermore",
            "moreover",
            "additionally",
            "in addition",
            "first",
            "second",
            "third",
            "finally",
            "lastly",
            "in conclusion",
            "to summarize",
            "in summary",
            "meanwhile",
            "subsequently",
            "previously",
            "another",
            "next",
            "then",
        ]);
        let structural_transitions = owned(&[
            "however",
            "therefore",
            "furthermore",
            "moreover",
            "consequently",
            "nevertheless",
            "in contrast",
            "on the other hand",
            "in conclusion",
            "for example",
            "for instance",
            "in addition",
            "as a result",
            "similarly",
            "finally",
        ]);

        let mut argument_keywords = BTreeMap::new();
        argument_keywords.insert(
            "causal".to_string(),
            owned(&[
                "because",
                "since",
                "therefore",
                "thus",
                "hence",
                "consequently",
                "as a result",
                "due to",
                "leads to",
                "causes",
                "so that",
            ]),
        );
        argument_keywords.insert(
            "contrast".to_string(),
            owned(&[
                "however",
                "but",
                "although",
                "though",
                "whereas",
                "nevertheless",
                "nonetheless",
                "on the other hand",
                "in contrast",
                "yet",
                "despite",
            ]),
        );
        argument_keywords.insert(
            "evidence".to_string(),
            owned(&[
                "study",
                "studies",
                "research",
                "data",
                "evidence",
                "shows",
                "found",
                "according to",
                "survey",
                "experiment",
                "percent",
                "statistics",
            ]),
        );
        argument_keywords.insert(
            "logical".to_string(),
            owned(&[
                "if",
                "then",
                "implies",
                "must",
                "necessarily",
                "it follows",
                "unless",
                "only if",
                "assume",
                "suppose",
            ]),
        );
        argument_keywords.insert(
            "claims".to_string(),
            owned(&[
                "argue",
                "argues",
                "claim",
                "claims",
                "believe",
                "suggests",
                "contend",
                "should",
                "clearly",
                "obviously",
                "undoubtedly",
                "always",
                "never",
            ]),
        );
        argument_keywords.insert(
            "questions".to_string(),
            owned(&["why", "how", "whether", "what if", "is it"]),
        );

        Self {
            abbreviations,
            paragraph_transitions,
            structural_transitions,
            argument_keywords,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", path.display())))
    }

    pub fn is_abbreviation(&self, token: &str) -> bool {
        self.abbreviations.iter().any(|a| a == token)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_vocabulary_roundtrips_through_json_file() {
        let v = Vocabulary::english();
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("vocab.json");
        std::fs::write(&p, serde_json::to_vec(&v).unwrap()).unwrap();
        let loaded = Vocabulary::from_json_file(&p).unwrap();
        assert_eq!(loaded, v);
        assert!(loaded.is_abbreviation("Dr"));
        assert!(loaded.is_abbreviation("U.S"));
        assert!(!loaded.is_abbreviation("dr"));
    }

    #[test]
    fn missing_vocabulary_file_is_invalid_input() {
        let err = Vocabulary::from_json_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
