//! Intent classification
//!
//! Prompts are classified by walking an ordered rule table and returning the
//! first label whose trigger set matches. Trigger phrases overlap between
//! labels ("fix" reads as both critique and a modification request), so the
//! table order is the precedence and must not change.

use crate::types::Intent;
use regex::Regex;
use std::sync::LazyLock;

/// A label and its trigger pattern
struct IntentRule {
    intent: Intent,
    pattern: &'static str,
}

/// Rules in priority order. `Intent::Other` is the fallthrough and has no rule.
const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::MetaCognitive,
        pattern: concat!(
            r"\b(?:am i missing|what am i missing|what assumptions|what would a critic",
            r"|what could go wrong|where am i wrong|what are the weaknesses|how can i improve)\b"
        ),
    },
    IntentRule {
        intent: Intent::Critique,
        pattern: concat!(
            r"\b(?:critic(?:ize|ism)?|weakness(?:es)?|counterargument",
            r"|what(?:'s| is) wrong|find flaws?|push back)\b"
        ),
    },
    IntentRule {
        intent: Intent::Validation,
        pattern: concat!(
            r"\b(?:is this (?:correct|right|accurate)|does this make sense",
            r"|am i right|check my|verify|can you confirm)\b"
        ),
    },
    IntentRule {
        intent: Intent::ExplainOrClarify,
        pattern: r"\b(?:explain|clarify|what do you mean|why|how does|help me understand)\b",
    },
    IntentRule {
        intent: Intent::IdeaGeneration,
        pattern: concat!(
            r"\b(?:brainstorm|more (?:ideas|angles|perspectives)",
            r"|alternatives?|different ways|give me options)\b"
        ),
    },
    IntentRule {
        intent: Intent::DelegationGenerate,
        pattern: r"\b(?:write|draft|generate|compose|give me a|create|produce)\b",
    },
    IntentRule {
        intent: Intent::DelegationModify,
        pattern: r"\b(?:rewrite|revise|edit|polish|make (?:this|it)|improve|fix|refine)\b",
    },
];

static COMPILED_RULES: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    INTENT_RULES
        .iter()
        .map(|rule| (rule.intent, Regex::new(rule.pattern).unwrap()))
        .collect()
});

/// Rule-table intent classifier
pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify a prompt into exactly one intent label
    pub fn classify(text: &str) -> Intent {
        let text = text.trim().to_lowercase();

        COMPILED_RULES
            .iter()
            .find(|(_, pattern)| pattern.is_match(&text))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table_follows_priority_order() {
        let ordered: Vec<Intent> = INTENT_RULES.iter().map(|r| r.intent).collect();
        assert_eq!(ordered, Intent::ALL[..Intent::ALL.len() - 1].to_vec());
    }

    #[test]
    fn test_meta_cognitive_beats_delegation() {
        assert_eq!(
            IntentClassifier::classify("what am i missing, please write a summary"),
            Intent::MetaCognitive
        );
    }

    #[test]
    fn test_critique_beats_delegation_modify() {
        // "fix" is a modify trigger, but the critique rule comes first
        assert_eq!(
            IntentClassifier::classify("what's wrong with this? fix it"),
            Intent::Critique
        );
    }

    #[test]
    fn test_each_label_reachable() {
        let cases = [
            ("Where am I wrong in this argument", Intent::MetaCognitive),
            ("give me a counterargument", Intent::Critique),
            ("is this correct", Intent::Validation),
            ("explain the second paragraph", Intent::ExplainOrClarify),
            ("brainstorm some titles", Intent::IdeaGeneration),
            ("draft an email to my landlord", Intent::DelegationGenerate),
            ("polish the intro", Intent::DelegationModify),
            ("thanks!", Intent::Other),
        ];

        for (text, expected) in cases {
            assert_eq!(IntentClassifier::classify(text), expected, "text: {text}");
        }
    }

    #[test]
    fn test_empty_text_is_other() {
        assert_eq!(IntentClassifier::classify(""), Intent::Other);
        assert_eq!(IntentClassifier::classify("   \n"), Intent::Other);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let texts = [
            "write a draft",
            "maybe make it shorter, and more formal",
            "clearly wrong, what's the weakness here?",
            "",
        ];
        for text in texts {
            let first = IntentClassifier::classify(text);
            assert_eq!(IntentClassifier::classify(text), first);
            assert!(Intent::ALL.contains(&first));
        }
    }

    #[test]
    fn test_substring_inside_word_does_not_match() {
        // "rewrite" must not be read as "write"
        assert_eq!(IntentClassifier::classify("rewrite the ending"), Intent::DelegationModify);
        // "critique" is not "critic"
        assert_eq!(IntentClassifier::classify("critique"), Intent::Other);
    }
}
