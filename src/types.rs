//! Prompt trajectory data types
//!
//! This module defines the values that flow through the annotation pipeline:
//! ingested prompts, their derived annotations, per-prompt trajectory records
//! and per-session summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Categorical intent of a prompt.
///
/// Variants are declared in classification priority order; the derived `Ord`
/// follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    MetaCognitive,
    Critique,
    Validation,
    ExplainOrClarify,
    IdeaGeneration,
    DelegationGenerate,
    DelegationModify,
    Other,
}

impl Intent {
    /// All labels in priority order
    pub const ALL: [Intent; 8] = [
        Intent::MetaCognitive,
        Intent::Critique,
        Intent::Validation,
        Intent::ExplainOrClarify,
        Intent::IdeaGeneration,
        Intent::DelegationGenerate,
        Intent::DelegationModify,
        Intent::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::MetaCognitive => "meta_cognitive",
            Intent::Critique => "critique",
            Intent::Validation => "validation",
            Intent::ExplainOrClarify => "explain_or_clarify",
            Intent::IdeaGeneration => "idea_generation",
            Intent::DelegationGenerate => "delegation_generate",
            Intent::DelegationModify => "delegation_modify",
            Intent::Other => "other",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque prompt timestamp, passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// RFC 3339 instant
    Instant(DateTime<Utc>),
    /// Integer epoch value (unit defined by the producer)
    Epoch(i64),
    /// Anything else the producer emitted
    Raw(serde_json::Value),
}

/// A user-authored prompt within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Conversation (session) the prompt belongs to
    pub conversation_id: String,
    /// Ordering key within the conversation; gaps allowed
    #[serde(default)]
    pub sequence_key: Option<u64>,
    /// Prompt text; `None` when the producer supplied a non-text value
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
}

impl Prompt {
    pub fn new(
        conversation_id: impl Into<String>,
        sequence_key: Option<u64>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sequence_key,
            text: Some(text.into()),
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_times(mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    /// Text with missing content treated as empty
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Whether the prompt carries no usable text
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Sort key; a missing key orders as 0
    pub fn order_key(&self) -> u64 {
        self.sequence_key.unwrap_or(0)
    }
}

/// Independent boolean behavioral markers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    pub hedging: bool,
    pub certainty: bool,
    pub authority_transfer: bool,
    pub meta_cognitive: bool,
    pub refinement: bool,
}

/// Density-style numeric features of a prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFeatures {
    /// Whitespace-delimited token count of the raw text
    pub prompt_length: u32,
    /// Constraint cue hits plus structural punctuation
    pub num_constraints: u32,
    /// Suffix-proxy hits plus common descriptive word hits
    pub descriptive_words: u32,
}

/// Everything derived from a prompt's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub intent: Intent,
    #[serde(flatten)]
    pub markers: Markers,
    #[serde(flatten)]
    pub features: PromptFeatures,
}

impl Default for Annotation {
    fn default() -> Self {
        Self {
            intent: Intent::Other,
            markers: Markers::default(),
            features: PromptFeatures::default(),
        }
    }
}

/// One annotated prompt positioned within its conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    /// Source prompt
    pub prompt: Prompt,
    /// Derived annotation
    pub annotation: Annotation,
    /// 0-based position within the conversation
    pub timestep: u32,
    /// `timestep / max(1, last_timestep)`
    pub t_norm: f64,
    /// Merged specificity score, when a model was applied
    #[serde(default)]
    pub specificity_pred: Option<f64>,
}

impl TrajectoryRecord {
    pub fn conversation_id(&self) -> &str {
        &self.prompt.conversation_id
    }

    pub fn text(&self) -> &str {
        self.prompt.text()
    }

    /// Return a copy carrying the given specificity score
    pub fn with_specificity(mut self, score: Option<f64>) -> Self {
        self.specificity_pred = score;
        self
    }
}

/// Per-session reduction of a trajectory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub conversation_id: String,
    pub num_prompts: u32,
    pub refinement_rate: f64,
    pub meta_cognitive_rate: f64,
    pub hedging_rate: f64,
    pub certainty_rate: f64,
    pub authority_rate: f64,
    /// Share of prompts classified with the `meta_cognitive` intent
    pub meta_cognitive_intent_rate: f64,
    pub avg_prompt_length: f64,
    pub avg_constraints: f64,
    pub avg_descriptive_words: f64,
    /// Mean specificity over scored prompts; absent when nothing was scored
    pub avg_specificity: Option<f64>,
    /// Intent at the first timestep
    pub first_intent: Intent,
    /// Intent at the last timestep
    pub last_intent: Intent,
    /// Prompt count per intent label present in the session
    pub intent_counts: BTreeMap<Intent, u32>,
}

/// A conversation excluded from the outputs because it failed processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedConversation {
    pub conversation_id: String,
    pub reason: String,
}
