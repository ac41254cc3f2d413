//! Pipeline orchestration
//!
//! This module provides the public API for prompt trajectory analysis. It
//! runs the stages in order: row ingestion → trajectory building (with
//! per-prompt annotation) → optional specificity scoring → session
//! aggregation → report encoding.

use crate::adapter::PromptAdapter;
use crate::config::AnalysisConfig;
use crate::encoder::{AnalysisReport, ReportEncoder, TableFormat};
use crate::error::TrajectoryError;
use crate::specificity::SpecificityModel;
use crate::summary::SessionAggregator;
use crate::trajectory::TrajectoryBuilder;
use crate::types::{Prompt, SessionSummary, SkippedConversation, TrajectoryRecord};

/// Result of analyzing a corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusAnalysis {
    /// Trajectory records, grouped by conversation id then timestep
    pub records: Vec<TrajectoryRecord>,
    /// One summary per non-empty, non-failing conversation
    pub sessions: Vec<SessionSummary>,
    /// Conversations that failed and were excluded from both tables
    pub skipped: Vec<SkippedConversation>,
}

impl CorpusAnalysis {
    /// Prompt texts in record order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(TrajectoryRecord::text)
    }
}

/// Analyze a corpus of prompts.
///
/// Each conversation is processed independently; a failing conversation is
/// reported in `skipped` and never aborts the run. When a model is given,
/// every record is scored and the scores flow into `avg_specificity`.
pub fn analyze_prompts(
    prompts: Vec<Prompt>,
    config: &AnalysisConfig,
    model: Option<&SpecificityModel>,
) -> CorpusAnalysis {
    let corpus = TrajectoryBuilder::new(config).build_corpus(prompts);

    let mut analysis = CorpusAnalysis {
        skipped: corpus.skipped,
        ..CorpusAnalysis::default()
    };

    for trajectory in &corpus.trajectories {
        let mut records: Vec<TrajectoryRecord> = trajectory.records().collect();
        if let Some(model) = model {
            records = model.score_records(&records).merge(records);
        }
        if let Some(summary) = SessionAggregator::summarize(&records) {
            analysis.sessions.push(summary);
        }
        analysis.records.extend(records);
    }

    analysis
}

/// Convert prompt rows (JSON array or NDJSON) to a report JSON string (stateless, one-shot).
///
/// # Example
/// ```ignore
/// let report_json = prompts_to_report(rows_json)?;
/// ```
pub fn prompts_to_report(rows: &str) -> Result<String, TrajectoryError> {
    // Stage 1: Parse rows
    let prompts = PromptAdapter::parse(rows)?;

    // Stage 2: Build, annotate and aggregate
    let analysis = analyze_prompts(prompts, &AnalysisConfig::default(), None);

    // Stage 3: Encode
    ReportEncoder::new().encode_to_json(&analysis, None, TableFormat::Json)
}

/// Stateful processor holding a configuration and an optional specificity model.
///
/// Use this when a trained model should be reused across several corpora.
pub struct TrajectoryProcessor {
    config: AnalysisConfig,
    model: Option<SpecificityModel>,
    encoder: ReportEncoder,
}

impl Default for TrajectoryProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryProcessor {
    /// Create a processor with the default configuration and no model
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
            model: None,
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: AnalysisConfig) -> Result<Self, TrajectoryError> {
        config.validate()?;
        Ok(Self {
            config,
            model: None,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze prompts, scoring them with the loaded model if any
    pub fn analyze(&self, prompts: Vec<Prompt>) -> CorpusAnalysis {
        analyze_prompts(prompts, &self.config, self.model.as_ref())
    }

    /// Build the report for an analysis produced by this processor
    pub fn report(&self, analysis: &CorpusAnalysis) -> AnalysisReport {
        self.encoder.encode(analysis, self.model.as_ref())
    }

    /// Process prompt rows (JSON array or NDJSON) and return report JSON
    pub fn process(&self, rows: &str) -> Result<String, TrajectoryError> {
        let prompts = PromptAdapter::parse(rows)?;
        let analysis = self.analyze(prompts);
        self.encoder
            .encode_to_json(&analysis, self.model.as_ref(), TableFormat::Json)
    }

    /// Train a specificity model on the corpus and keep it for later analyses.
    ///
    /// A failed training leaves any previously loaded model in place.
    pub fn train(&mut self, prompts: Vec<Prompt>) -> Result<&SpecificityModel, TrajectoryError> {
        let corpus = TrajectoryBuilder::new(&self.config).build_corpus(prompts);
        let records: Vec<TrajectoryRecord> = corpus.records().collect();
        let model = SpecificityModel::train(&records, &self.config.specificity)?;
        Ok(self.model.insert(model))
    }

    /// Score a single text with the loaded model
    pub fn score(&self, text: &str) -> Result<f64, TrajectoryError> {
        self.model
            .as_ref()
            .map(|model| model.score(text))
            .ok_or_else(|| TrajectoryError::ModelError("no specificity model loaded".to_string()))
    }

    /// Save the loaded model to JSON for persistence
    pub fn save_model(&self) -> Result<String, TrajectoryError> {
        match &self.model {
            Some(model) => model.to_json(),
            None => Err(TrajectoryError::ModelError(
                "no specificity model loaded".to_string(),
            )),
        }
    }

    /// Load a model from JSON
    pub fn load_model(&mut self, json: &str) -> Result<(), TrajectoryError> {
        self.model = Some(SpecificityModel::from_json(json)?);
        Ok(())
    }

    pub fn model(&self) -> Option<&SpecificityModel> {
        self.model.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Drop the loaded model
    pub fn clear_model(&mut self) {
        self.model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intent;
    use pretty_assertions::assert_eq;

    fn s1_rows() -> &'static str {
        r#"[
            {"conversation_id": "s1", "sequence_key": 2, "text": "clearly wrong, what's the weakness here?"},
            {"conversation_id": "s1", "sequence_key": 0, "text": "write a draft"},
            {"conversation_id": "s1", "sequence_key": 1, "text": "maybe make it shorter, and more formal"}
        ]"#
    }

    fn training_prompts() -> Vec<Prompt> {
        [
            "write a draft",
            "make it shorter",
            "you must include a table: columns for name, price and rating",
            "fix the intro",
            "draft a formal, concise and professional cover letter; avoid jargon",
            "explain why",
            "brainstorm alternatives",
            "keep it within 200 words and use bullet points only",
            "thanks",
            "rewrite the second paragraph so it is more persuasive and detailed",
            "is this correct",
            "what am i missing",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| Prompt::new(format!("c{}", i % 3), Some(i as u64), *text))
        .collect()
    }

    #[test]
    fn test_s1_end_to_end() {
        let prompts = PromptAdapter::parse(s1_rows()).unwrap();
        let analysis = analyze_prompts(prompts, &AnalysisConfig::default(), None);

        let intents: Vec<Intent> = analysis.records.iter().map(|r| r.annotation.intent).collect();
        assert_eq!(
            intents,
            vec![
                Intent::DelegationGenerate,
                Intent::DelegationModify,
                Intent::Critique
            ]
        );

        let refinement: Vec<bool> = analysis
            .records
            .iter()
            .map(|r| r.annotation.markers.refinement)
            .collect();
        assert_eq!(refinement, vec![false, true, false]);

        let hedging: Vec<bool> = analysis
            .records
            .iter()
            .map(|r| r.annotation.markers.hedging)
            .collect();
        assert_eq!(hedging, vec![false, true, false]);

        let t_norm: Vec<f64> = analysis.records.iter().map(|r| r.t_norm).collect();
        assert_eq!(t_norm, vec![0.0, 0.5, 1.0]);

        assert_eq!(analysis.sessions.len(), 1);
        assert_eq!(analysis.sessions[0].num_prompts, 3);
        assert!(analysis.skipped.is_empty());
    }

    #[test]
    fn test_all_empty_conversation_absent_from_both_tables() {
        let prompts = vec![
            Prompt::new("empty", Some(0), ""),
            Prompt::new("empty", Some(1), "   "),
            Prompt::new("s1", Some(0), "write a draft"),
        ];
        let analysis = analyze_prompts(prompts, &AnalysisConfig::default(), None);

        assert!(analysis.records.iter().all(|r| r.conversation_id() == "s1"));
        assert_eq!(analysis.sessions.len(), 1);
        assert_eq!(analysis.sessions[0].conversation_id, "s1");
        assert!(analysis.skipped.is_empty());
    }

    #[test]
    fn test_summary_invariant_to_input_order() {
        let mut prompts = PromptAdapter::parse(s1_rows()).unwrap();
        let forward = analyze_prompts(prompts.clone(), &AnalysisConfig::default(), None);
        prompts.reverse();
        let backward = analyze_prompts(prompts, &AnalysisConfig::default(), None);

        assert_eq!(forward.sessions, backward.sessions);
    }

    #[test]
    fn test_failing_conversation_is_skipped_not_fatal() {
        let rows = r#"
{"conversation_id": "", "sequence_key": 0, "text": "orphan"}
{"conversation_id": "ok", "sequence_key": 0, "text": "write a draft"}
"#;
        let analysis = analyze_prompts(
            PromptAdapter::parse(rows).unwrap(),
            &AnalysisConfig::default(),
            None,
        );

        assert_eq!(analysis.sessions.len(), 1);
        assert_eq!(analysis.skipped.len(), 1);
        assert_eq!(analysis.records.len(), 1);
    }

    #[test]
    fn test_prompts_to_report_stateless() {
        let json = prompts_to_report(s1_rows()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["producer"]["name"], "prompt-trajectory");
        assert_eq!(payload["trajectories"].as_array().unwrap().len(), 3);
        assert_eq!(payload["sessions"][0]["num_prompts"], 3);
        assert!(payload["sessions"][0]["avg_specificity"].is_null());
        assert!(payload.get("model").is_none());
    }

    #[test]
    fn test_prompts_to_report_rejects_garbage() {
        assert!(prompts_to_report("not json").is_err());
    }

    #[test]
    fn test_processor_train_and_score() {
        let mut processor = TrajectoryProcessor::new();
        assert!(!processor.has_model());
        assert!(processor.score("anything").is_err());

        let model = processor.train(training_prompts()).unwrap();
        assert_eq!(model.training_prompts, 12);

        let analysis = processor.analyze(training_prompts());
        assert!(analysis.records.iter().all(|r| r.specificity_pred.is_some()));
        assert!(analysis.sessions.iter().all(|s| s.avg_specificity.is_some()));

        let report = processor.report(&analysis);
        let info = report.model.unwrap();
        assert!(!info.stale);
    }

    #[test]
    fn test_processor_insufficient_data_keeps_pipeline_working() {
        let mut processor = TrajectoryProcessor::new();
        let err = processor
            .train(PromptAdapter::parse(s1_rows()).unwrap())
            .unwrap_err();
        assert!(matches!(err, TrajectoryError::InsufficientData { found: 3, .. }));
        assert!(!processor.has_model());

        let json = processor.process(s1_rows()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["sessions"][0]["num_prompts"], 3);
    }

    #[test]
    fn test_processor_model_persistence() {
        let mut processor = TrajectoryProcessor::new();
        processor.train(training_prompts()).unwrap();
        let saved = processor.save_model().unwrap();

        let mut restored = TrajectoryProcessor::new();
        restored.load_model(&saved).unwrap();
        assert_eq!(
            restored.score("write a formal letter").unwrap(),
            processor.score("write a formal letter").unwrap()
        );

        restored.clear_model();
        assert!(!restored.has_model());
        assert!(restored.save_model().is_err());
    }

    #[test]
    fn test_processor_rejects_invalid_config() {
        let mut config = AnalysisConfig::default();
        config.specificity.alpha = 0.0;
        assert!(TrajectoryProcessor::with_config(config).is_err());
    }
}
