//! Prompt feature extraction
//!
//! Cheap density-style counts over prompt text. Overlapping signals are not
//! deduplicated: a word such as "formal" counts once for its suffix and once
//! for the common-word list, and structural punctuation adds to cue hits.

use crate::types::PromptFeatures;
use regex::Regex;
use std::sync::LazyLock;

/// Modal/obligation, inclusion/exclusion and format cues
static CONSTRAINT_CUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:must|should|don't|do not|include|exclude|at least|at most|no more than",
        r"|exactly|use|avoid|format|bullet|table|keep|limit|within|words?)\b"
    ))
    .unwrap()
});

/// Adjective/adverb suffix proxy
static DESCRIPTIVE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\w+(?:ly|ive|ous|able|ible|al|ful|less|ic)\b").unwrap()
});

static DESCRIPTIVE_COMMON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:clear|concise|formal|professional|persuasive|specific",
        r"|detailed|strong|soft|polite)\b"
    ))
    .unwrap()
});

/// Structural characters counted as constraint signals
const STRUCTURE_CHARS: [char; 3] = ['\n', ';', ':'];

/// Stateless feature extractor
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract all features from a prompt
    pub fn extract(text: &str) -> PromptFeatures {
        PromptFeatures {
            prompt_length: count_tokens(text),
            num_constraints: count_constraints(text),
            descriptive_words: count_descriptive_words(text),
        }
    }
}

/// Whitespace-delimited token count of the raw text
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Constraint cue hits plus newline/semicolon/colon count
fn count_constraints(text: &str) -> u32 {
    let hits = CONSTRAINT_CUES.find_iter(text).count();
    let structure = text.chars().filter(|c| STRUCTURE_CHARS.contains(c)).count();
    (hits + structure) as u32
}

/// Suffix-proxy hits plus common descriptive word hits
fn count_descriptive_words(text: &str) -> u32 {
    let lower = text.to_lowercase();
    let suffixed = DESCRIPTIVE_SUFFIX.find_iter(&lower).count();
    let common = DESCRIPTIVE_COMMON.find_iter(&lower).count();
    (suffixed + common) as u32
}
