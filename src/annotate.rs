//! Per-prompt annotation
//!
//! Combines intent classification, marker detection and feature extraction
//! into a single [`Annotation`] value.

use crate::features::FeatureExtractor;
use crate::intent::IntentClassifier;
use crate::markers::MarkerDetector;
use crate::types::Annotation;

/// Annotate a prompt's text. Pure and deterministic.
pub fn annotate(text: &str) -> Annotation {
    Annotation {
        intent: IntentClassifier::classify(text),
        markers: MarkerDetector::detect(text),
        features: FeatureExtractor::extract(text),
    }
}

/// Annotate text that may be missing; missing text yields the zero annotation
pub fn annotate_opt(text: Option<&str>) -> Annotation {
    text.map(annotate).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Intent, PromptFeatures};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_annotate_combines_components() {
        let annotation = annotate("maybe make it shorter, and more formal");

        assert_eq!(annotation.intent, Intent::DelegationModify);
        assert!(annotation.markers.hedging);
        assert!(annotation.markers.refinement);
        assert!(!annotation.markers.certainty);
        assert_eq!(annotation.features.prompt_length, 7);
    }

    #[test]
    fn test_missing_text_defaults() {
        let annotation = annotate_opt(None);
        assert_eq!(annotation.intent, Intent::Other);
        assert_eq!(annotation.features, PromptFeatures::default());
        assert_eq!(annotation, annotate(""));
    }

    #[test]
    fn test_annotation_is_idempotent() {
        let text = "clearly wrong, what's the weakness here?";
        assert_eq!(annotate(text), annotate(text));
    }
}
