//! Behavioral marker detection
//!
//! Each marker is an independent lexical signal. A marker fires when any of its
//! trigger phrases occurs as a whole-word match in the lower-cased text; several
//! markers may fire on the same prompt.

use crate::types::Markers;
use regex::Regex;
use std::sync::LazyLock;

static HEDGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:maybe|i think|perhaps|might|could|not sure|i guess)\b").unwrap()
});

static CERTAINTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:clearly|obviously|definitely|certainly)\b").unwrap());

static AUTHORITY_TRANSFER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:you decide|up to you|just pick|whatever you think)\b").unwrap()
});

static META_COGNITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:am i missing|what am i missing|what assumptions|what would a critic",
        r"|what could go wrong|where am i wrong|what are the weaknesses|how can i improve",
        r"|overlooking|trade[- ]?off)\b"
    ))
    .unwrap()
});

static REFINEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:shorter|longer|more concise|more formal|more professional",
        r"|more (?:clear|persuasive|specific)|less (?:formal|wordy|aggressive|strong)",
        r"|tone|style|make it sound|simplify|add details|remove)\b"
    ))
    .unwrap()
});

/// Stateless marker detector
pub struct MarkerDetector;

impl MarkerDetector {
    /// Detect all markers in a prompt
    pub fn detect(text: &str) -> Markers {
        let text = text.to_lowercase();

        Markers {
            hedging: HEDGING.is_match(&text),
            certainty: CERTAINTY.is_match(&text),
            authority_transfer: AUTHORITY_TRANSFER.is_match(&text),
            meta_cognitive: META_COGNITIVE.is_match(&text),
            refinement: REFINEMENT.is_match(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_markers_are_independent() {
        let markers = MarkerDetector::detect("maybe you decide, clearly this works");

        assert!(markers.hedging);
        assert!(markers.authority_transfer);
        assert!(markers.certainty);
        assert!(!markers.meta_cognitive);
        assert!(!markers.refinement);
    }

    #[test]
    fn test_empty_text_has_no_markers() {
        assert_eq!(MarkerDetector::detect(""), Markers::default());
    }

    #[test]
    fn test_case_insensitive() {
        let markers = MarkerDetector::detect("PERHAPS Make It Shorter");
        assert!(markers.hedging);
        assert!(markers.refinement);
    }

    #[test]
    fn test_whole_word_matching() {
        // "mighty" and "styled" must not trigger hedging or refinement
        let markers = MarkerDetector::detect("a mighty styled heading");
        assert!(!markers.hedging);
        assert!(!markers.refinement);
    }

    #[test]
    fn test_meta_cognitive_triggers() {
        assert!(MarkerDetector::detect("What am I missing here?").meta_cognitive);
        assert!(MarkerDetector::detect("is there a trade-off I'm overlooking").meta_cognitive);
        assert!(MarkerDetector::detect("consider the tradeoff").meta_cognitive);
        assert!(!MarkerDetector::detect("write a poem").meta_cognitive);
    }

    #[test]
    fn test_refinement_phrases() {
        assert!(MarkerDetector::detect("make it more formal").refinement);
        assert!(MarkerDetector::detect("less wordy please").refinement);
        assert!(!MarkerDetector::detect("more ideas please").refinement);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let text = "I guess it could be clearer; up to you";
        assert_eq!(MarkerDetector::detect(text), MarkerDetector::detect(text));
    }
}
