//! Session aggregation
//!
//! Reduces a conversation's trajectory records to one [`SessionSummary`].
//! Every statistic is a count or a mean, so the result does not depend on
//! the order in which records are supplied.

use crate::types::{Intent, SessionSummary, TrajectoryRecord};
use std::collections::BTreeMap;

/// Session aggregator
pub struct SessionAggregator;

impl SessionAggregator {
    /// Summarize one conversation. Returns `None` for an empty slice.
    pub fn summarize(records: &[TrajectoryRecord]) -> Option<SessionSummary> {
        let first = records.iter().min_by_key(|r| r.timestep)?;
        let last = records.iter().max_by_key(|r| r.timestep)?;

        let rate = |signal: fn(&TrajectoryRecord) -> bool| {
            mean(records.iter().map(|r| if signal(r) { 1.0 } else { 0.0 })).unwrap_or(0.0)
        };
        let average = |value: fn(&TrajectoryRecord) -> u32| {
            mean(records.iter().map(|r| value(r) as f64)).unwrap_or(0.0)
        };

        let mut intent_counts: BTreeMap<Intent, u32> = BTreeMap::new();
        for record in records {
            *intent_counts.entry(record.annotation.intent).or_insert(0) += 1;
        }

        Some(SessionSummary {
            conversation_id: first.conversation_id().to_string(),
            num_prompts: records.len() as u32,
            refinement_rate: rate(|r| r.annotation.markers.refinement),
            meta_cognitive_rate: rate(|r| r.annotation.markers.meta_cognitive),
            hedging_rate: rate(|r| r.annotation.markers.hedging),
            certainty_rate: rate(|r| r.annotation.markers.certainty),
            authority_rate: rate(|r| r.annotation.markers.authority_transfer),
            meta_cognitive_intent_rate: rate(|r| r.annotation.intent == Intent::MetaCognitive),
            avg_prompt_length: average(|r| r.annotation.features.prompt_length),
            avg_constraints: average(|r| r.annotation.features.num_constraints),
            avg_descriptive_words: average(|r| r.annotation.features.descriptive_words),
            // Unscored prompts are skipped, never counted as zero
            avg_specificity: mean(records.iter().filter_map(|r| r.specificity_pred)),
            first_intent: first.annotation.intent,
            last_intent: last.annotation.intent,
            intent_counts,
        })
    }

    /// Summarize a mixed slice of records, one summary per conversation id
    pub fn summarize_all(records: &[TrajectoryRecord]) -> Vec<SessionSummary> {
        let mut by_conversation: BTreeMap<&str, Vec<TrajectoryRecord>> = BTreeMap::new();
        for record in records {
            by_conversation
                .entry(record.conversation_id())
                .or_default()
                .push(record.clone());
        }

        by_conversation
            .values()
            .filter_map(|group| Self::summarize(group))
            .collect()
    }
}

/// Arithmetic mean, `None` when there are no values
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}
