//! Specificity scoring
//!
//! A lightweight learned scorer: TF-IDF n-gram features regressed onto a weak,
//! rule-derived specificity target. The rest of the pipeline works without it.

pub mod model;
pub mod ridge;
pub mod vectorizer;

pub use model::{
    corpus_fingerprint, standardize, weak_target, SpecificityColumn, SpecificityModel,
    SpecificityPrediction,
};
pub use vectorizer::TfidfVectorizer;
