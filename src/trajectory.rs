//! Trajectory construction
//!
//! Orders a conversation's prompts, assigns discrete and normalized time
//! indices and attaches annotations. A [`Trajectory`] only stores the sorted
//! prompts; its records are computed on demand, so iterating twice yields the
//! same sequence.

use crate::annotate::annotate;
use crate::config::AnalysisConfig;
use crate::error::TrajectoryError;
use crate::types::{Prompt, SkippedConversation, TrajectoryRecord};
use std::collections::BTreeMap;
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// Normalized position of `timestep` in a conversation whose last timestep is `last_timestep`
pub fn normalized_time(timestep: u32, last_timestep: u32) -> f64 {
    timestep as f64 / last_timestep.max(1) as f64
}

/// The ordered prompts of one non-empty conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    conversation_id: String,
    prompts: Vec<Prompt>,
}

impl Trajectory {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Prompts in timestep order
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Always false for a built trajectory
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Lazily annotated records in timestep order
    pub fn records(&self) -> TrajectoryRecords<'_> {
        TrajectoryRecords {
            prompts: &self.prompts,
            next: 0,
        }
    }
}

/// Iterator over the records of a [`Trajectory`]
#[derive(Debug, Clone)]
pub struct TrajectoryRecords<'a> {
    prompts: &'a [Prompt],
    next: usize,
}

impl Iterator for TrajectoryRecords<'_> {
    type Item = TrajectoryRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let prompt = self.prompts.get(self.next)?;
        let timestep = self.next as u32;
        let last_timestep = self.prompts.len().saturating_sub(1) as u32;
        self.next += 1;

        Some(TrajectoryRecord {
            annotation: annotate(prompt.text()),
            prompt: prompt.clone(),
            timestep,
            t_norm: normalized_time(timestep, last_timestep),
            specificity_pred: None,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.prompts.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TrajectoryRecords<'_> {}

impl FusedIterator for TrajectoryRecords<'_> {}

/// Trajectories for a whole corpus plus the conversations that were skipped
#[derive(Debug, Clone, Default)]
pub struct CorpusTrajectories {
    /// Non-empty trajectories ordered by conversation id
    pub trajectories: Vec<Trajectory>,
    /// Conversations that failed and were excluded
    pub skipped: Vec<SkippedConversation>,
}

impl CorpusTrajectories {
    /// All records of all trajectories in output order
    pub fn records(&self) -> impl Iterator<Item = TrajectoryRecord> + '_ {
        self.trajectories.iter().flat_map(Trajectory::records)
    }
}

/// Builds trajectories from ingested prompts
#[derive(Debug, Clone, Default)]
pub struct TrajectoryBuilder {
    keep_blank_prompts: bool,
}

impl TrajectoryBuilder {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            keep_blank_prompts: config.keep_blank_prompts,
        }
    }

    /// Build the trajectory of one conversation.
    ///
    /// Returns `Ok(None)` when the conversation has no usable prompts, and an
    /// error when the conversation id is blank or a prompt belongs elsewhere.
    pub fn build(
        &self,
        conversation_id: &str,
        prompts: Vec<Prompt>,
    ) -> Result<Option<Trajectory>, TrajectoryError> {
        if conversation_id.trim().is_empty() {
            return Err(TrajectoryError::InvalidConversation(
                "conversation id is blank".to_string(),
            ));
        }

        if let Some(stray) = prompts
            .iter()
            .find(|p| p.conversation_id != conversation_id)
        {
            return Err(TrajectoryError::InvalidConversation(format!(
                "prompt from conversation '{}' found in '{}'",
                stray.conversation_id, conversation_id
            )));
        }

        let mut prompts: Vec<Prompt> = if self.keep_blank_prompts {
            prompts
        } else {
            prompts.into_iter().filter(|p| !p.is_blank()).collect()
        };

        if prompts.is_empty() {
            return Ok(None);
        }

        // Stable: equal keys keep ingestion order
        prompts.sort_by_key(Prompt::order_key);

        Ok(Some(Trajectory {
            conversation_id: conversation_id.to_string(),
            prompts,
        }))
    }

    /// Build every conversation in the corpus independently.
    ///
    /// Failing conversations are logged and reported in `skipped`; empty ones
    /// are dropped silently.
    pub fn build_corpus(&self, prompts: Vec<Prompt>) -> CorpusTrajectories {
        let mut corpus = CorpusTrajectories::default();

        for (conversation_id, prompts) in group_by_conversation(prompts) {
            match self.build(&conversation_id, prompts) {
                Ok(Some(trajectory)) => corpus.trajectories.push(trajectory),
                Ok(None) => {
                    debug!(conversation_id = %conversation_id, "dropping empty conversation");
                }
                Err(e) => {
                    warn!(conversation_id = %conversation_id, error = %e, "skipping conversation");
                    corpus.skipped.push(SkippedConversation {
                        conversation_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        corpus
    }
}

/// Group prompts by conversation id, keeping ingestion order within each group
pub fn group_by_conversation(prompts: Vec<Prompt>) -> BTreeMap<String, Vec<Prompt>> {
    let mut groups: BTreeMap<String, Vec<Prompt>> = BTreeMap::new();
    for prompt in prompts {
        groups
            .entry(prompt.conversation_id.clone())
            .or_default()
            .push(prompt);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intent;
    use pretty_assertions::assert_eq;

    fn builder() -> TrajectoryBuilder {
        TrajectoryBuilder::default()
    }

    fn t_norms(trajectory: &Trajectory) -> Vec<f64> {
        trajectory.records().map(|r| r.t_norm).collect()
    }

    #[test]
    fn test_normalized_time_bounds() {
        assert_eq!(normalized_time(0, 0), 0.0);
        assert_eq!(normalized_time(0, 2), 0.0);
        assert_eq!(normalized_time(1, 2), 0.5);
        assert_eq!(normalized_time(2, 2), 1.0);
    }

    #[test]
    fn test_single_prompt_has_zero_t_norm() {
        let trajectory = builder()
            .build("s1", vec![Prompt::new("s1", Some(7), "write a draft")])
            .unwrap()
            .unwrap();

        assert_eq!(t_norms(&trajectory), vec![0.0]);
    }

    #[test]
    fn test_three_prompts_t_norm() {
        let prompts = vec![
            Prompt::new("s1", Some(0), "a"),
            Prompt::new("s1", Some(1), "b"),
            Prompt::new("s1", Some(2), "c"),
        ];
        let trajectory = builder().build("s1", prompts).unwrap().unwrap();

        assert_eq!(t_norms(&trajectory), vec![0.0, 0.5, 1.0]);
        let timesteps: Vec<u32> = trajectory.records().map(|r| r.timestep).collect();
        assert_eq!(timesteps, vec![0, 1, 2]);
    }

    #[test]
    fn test_sorts_by_sequence_key_with_gaps() {
        let prompts = vec![
            Prompt::new("s1", Some(40), "third"),
            Prompt::new("s1", Some(3), "first"),
            Prompt::new("s1", Some(17), "second"),
        ];
        let trajectory = builder().build("s1", prompts).unwrap().unwrap();

        let texts: Vec<String> = trajectory.records().map(|r| r.text().to_string()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_ties_keep_ingestion_order() {
        let prompts = vec![
            Prompt::new("s1", Some(1), "b"),
            Prompt::new("s1", None, "a1"),
            Prompt::new("s1", Some(0), "a2"),
        ];
        let trajectory = builder().build("s1", prompts).unwrap().unwrap();

        let texts: Vec<&str> = trajectory.prompts().iter().map(Prompt::text).collect();
        assert_eq!(texts, vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_records_are_restartable() {
        let prompts = vec![
            Prompt::new("s1", Some(0), "write a draft"),
            Prompt::new("s1", Some(1), "make it shorter"),
        ];
        let trajectory = builder().build("s1", prompts).unwrap().unwrap();

        let first: Vec<TrajectoryRecord> = trajectory.records().collect();
        let second: Vec<TrajectoryRecord> = trajectory.records().collect();
        assert_eq!(first, second);
        assert_eq!(trajectory.records().len(), 2);
    }

    #[test]
    fn test_blank_prompts_dropped_by_default() {
        let mut missing = Prompt::new("s1", Some(1), "");
        missing.text = None;
        let prompts = vec![
            Prompt::new("s1", Some(0), "write a draft"),
            missing,
            Prompt::new("s1", Some(2), "   "),
            Prompt::new("s1", Some(3), "fix it"),
        ];
        let trajectory = builder().build("s1", prompts).unwrap().unwrap();

        assert_eq!(trajectory.len(), 2);
        assert_eq!(t_norms(&trajectory), vec![0.0, 1.0]);
    }

    #[test]
    fn test_blank_prompts_kept_when_configured() {
        let config = AnalysisConfig {
            keep_blank_prompts: true,
            ..AnalysisConfig::default()
        };
        let prompts = vec![
            Prompt::new("s1", Some(0), "write a draft"),
            Prompt::new("s1", Some(1), ""),
        ];
        let trajectory = TrajectoryBuilder::new(&config)
            .build("s1", prompts)
            .unwrap()
            .unwrap();

        let last = trajectory.records().last().unwrap();
        assert_eq!(last.annotation.intent, Intent::Other);
        assert_eq!(last.annotation.features.prompt_length, 0);
    }

    #[test]
    fn test_all_blank_conversation_is_dropped() {
        let prompts = vec![Prompt::new("s1", Some(0), ""), Prompt::new("s1", Some(1), " ")];
        assert!(builder().build("s1", prompts).unwrap().is_none());
    }

    #[test]
    fn test_foreign_prompt_is_an_error() {
        let prompts = vec![Prompt::new("s2", Some(0), "hello")];
        let err = builder().build("s1", prompts).unwrap_err();
        assert!(matches!(err, TrajectoryError::InvalidConversation(_)));
    }

    #[test]
    fn test_corpus_processes_conversations_independently() {
        let prompts = vec![
            Prompt::new("b", Some(1), "fix it"),
            Prompt::new("a", Some(0), "write a draft"),
            Prompt::new("", Some(0), "orphan prompt"),
            Prompt::new("b", Some(0), "write a poem"),
            Prompt::new("c", Some(0), ""),
        ];
        let corpus = builder().build_corpus(prompts);

        let ids: Vec<&str> = corpus
            .trajectories
            .iter()
            .map(Trajectory::conversation_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(corpus.skipped.len(), 1);
        assert_eq!(corpus.skipped[0].conversation_id, "");
        assert_eq!(corpus.records().count(), 3);
    }
}
