//! Trained specificity artifact
//!
//! The model learns to predict a weak, rule-derived specificity target from
//! the prompt text alone. It is tied to the rules that produced its target and
//! to the corpus it was fitted on; [`SpecificityModel::is_stale`] reports when
//! either has changed and the model should be retrained.

use crate::config::SpecificityConfig;
use crate::error::TrajectoryError;
use crate::specificity::ridge::fit_ridge;
use crate::specificity::vectorizer::{SparseVector, TfidfVectorizer};
use crate::types::{PromptFeatures, TrajectoryRecord};
use crate::RULES_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

/// Weak specificity target for one prompt
pub fn weak_target(features: &PromptFeatures) -> f64 {
    features.num_constraints as f64
        + 0.25 * features.descriptive_words as f64
        + 0.05 * features.prompt_length as f64
}

/// Z-score `values` using the population standard deviation plus `epsilon`.
///
/// Returns the normalized values, the mean and the standard deviation.
pub fn standardize(values: &[f64], epsilon: f64) -> (Vec<f64>, f64, f64) {
    if values.is_empty() {
        return (Vec::new(), 0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let normalized = values.iter().map(|v| (v - mean) / (std_dev + epsilon)).collect();
    (normalized, mean, std_dev)
}

/// SHA-256 fingerprint of a training corpus under the current rules
pub fn corpus_fingerprint<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(RULES_VERSION.as_bytes());
    for text in texts {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Specificity scores keyed by `(conversation_id, timestep)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecificityColumn {
    scores: HashMap<(String, u32), f64>,
}

/// One row of a specificity column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificityPrediction {
    pub conversation_id: String,
    pub timestep: u32,
    pub text: String,
    pub specificity_pred: f64,
}

impl SpecificityColumn {
    pub fn insert(&mut self, conversation_id: impl Into<String>, timestep: u32, score: f64) {
        self.scores.insert((conversation_id.into(), timestep), score);
    }

    pub fn get(&self, conversation_id: &str, timestep: u32) -> Option<f64> {
        self.scores
            .get(&(conversation_id.to_string(), timestep))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Attach scores to records; records without a score keep `None`
    pub fn merge(&self, records: Vec<TrajectoryRecord>) -> Vec<TrajectoryRecord> {
        records
            .into_iter()
            .map(|record| {
                let score = self.get(record.conversation_id(), record.timestep);
                record.with_specificity(score)
            })
            .collect()
    }
}

/// Trained specificity scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificityModel {
    /// Annotation rules version the weak target was computed with
    pub rules_version: String,
    /// Fingerprint of the training texts
    pub corpus_fingerprint: String,
    pub trained_at: DateTime<Utc>,
    pub training_prompts: usize,
    /// Mean of the raw weak target
    pub target_mean: f64,
    /// Population standard deviation of the raw weak target
    pub target_std: f64,
    pub config: SpecificityConfig,
    vectorizer: TfidfVectorizer,
    weights: Vec<f64>,
    intercept: f64,
}

impl SpecificityModel {
    /// Train on annotated trajectory records
    pub fn train(
        records: &[TrajectoryRecord],
        config: &SpecificityConfig,
    ) -> Result<Self, TrajectoryError> {
        let texts: Vec<&str> = records.iter().map(TrajectoryRecord::text).collect();
        let features: Vec<PromptFeatures> =
            records.iter().map(|r| r.annotation.features).collect();
        Self::train_on(&texts, &features, config)
    }

    /// Train on parallel slices of texts and their extracted features
    pub fn train_on(
        texts: &[&str],
        features: &[PromptFeatures],
        config: &SpecificityConfig,
    ) -> Result<Self, TrajectoryError> {
        config.validate()?;

        if texts.len() != features.len() {
            return Err(TrajectoryError::ModelError(format!(
                "{} texts but {} feature rows",
                texts.len(),
                features.len()
            )));
        }
        if texts.len() < config.min_training_prompts {
            return Err(TrajectoryError::InsufficientData {
                found: texts.len(),
                required: config.min_training_prompts,
            });
        }

        let raw_targets: Vec<f64> = features.iter().map(weak_target).collect();
        let (targets, target_mean, target_std) = standardize(&raw_targets, config.epsilon);

        let vectorizer = TfidfVectorizer::fit(texts, config)?;
        let rows: Vec<SparseVector> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let fit = fit_ridge(&rows, &targets, vectorizer.len(), config.alpha)?;

        info!(
            prompts = texts.len(),
            vocabulary = vectorizer.len(),
            "trained specificity model"
        );

        Ok(Self {
            rules_version: RULES_VERSION.to_string(),
            corpus_fingerprint: corpus_fingerprint(texts.iter().copied()),
            trained_at: Utc::now(),
            training_prompts: texts.len(),
            target_mean,
            target_std,
            config: config.clone(),
            vectorizer,
            weights: fit.weights,
            intercept: fit.intercept,
        })
    }

    /// Predicted normalized specificity of a text
    pub fn score(&self, text: &str) -> f64 {
        self.vectorizer.transform(text).dot_dense(&self.weights) + self.intercept
    }

    /// Score every record into a column keyed by `(conversation_id, timestep)`
    pub fn score_records<'a>(
        &self,
        records: impl IntoIterator<Item = &'a TrajectoryRecord>,
    ) -> SpecificityColumn {
        let mut column = SpecificityColumn::default();
        for record in records {
            column.insert(
                record.conversation_id(),
                record.timestep,
                self.score(record.text()),
            );
        }
        column
    }

    /// Flat prediction rows for the given records, in record order
    pub fn predictions<'a>(
        &self,
        records: impl IntoIterator<Item = &'a TrajectoryRecord>,
    ) -> Vec<SpecificityPrediction> {
        records
            .into_iter()
            .map(|record| SpecificityPrediction {
                conversation_id: record.conversation_id().to_string(),
                timestep: record.timestep,
                text: record.text().to_string(),
                specificity_pred: self.score(record.text()),
            })
            .collect()
    }

    /// Whether the model no longer matches the current rules or the given corpus
    pub fn is_stale<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> bool {
        self.rules_version != RULES_VERSION || self.corpus_fingerprint != corpus_fingerprint(texts)
    }

    /// Whether the model was trained under a different rules version
    pub fn rules_outdated(&self) -> bool {
        self.rules_version != RULES_VERSION
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.len()
    }

    pub fn to_json(&self) -> Result<String, TrajectoryError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TrajectoryError> {
        let model: SpecificityModel = serde_json::from_str(json)
            .map_err(|e| TrajectoryError::ModelError(format!("invalid model artifact: {}", e)))?;
        model.vectorizer.validate()?;
        if model.weights.len() != model.vectorizer.len() {
            return Err(TrajectoryError::ModelError(format!(
                "artifact has {} weights for {} features",
                model.weights.len(),
                model.vectorizer.len()
            )));
        }
        if !model.intercept.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(TrajectoryError::ModelError(
                "artifact has non-finite coefficients".to_string(),
            ));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use pretty_assertions::assert_eq;

    const CORPUS: &[&str] = &[
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
    ];

    fn features(texts: &[&str]) -> Vec<PromptFeatures> {
        texts.iter().map(|t| annotate(t).features).collect()
    }

    fn trained() -> SpecificityModel {
        SpecificityModel::train_on(CORPUS, &features(CORPUS), &SpecificityConfig::default())
            .unwrap()
    }

    #[test]
    fn test_weak_target_formula() {
        let f = PromptFeatures {
            prompt_length: 20,
            num_constraints: 3,
            descriptive_words: 4,
        };
        assert!((weak_target(&f) - (3.0 + 1.0 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_standardize() {
        let (z, mean, std) = standardize(&[1.0, 2.0, 3.0], 0.0);
        assert_eq!(mean, 2.0);
        assert!((std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((z.iter().sum::<f64>()).abs() < 1e-12);
    }

    #[test]
    fn test_standardize_zero_variance_is_guarded() {
        let (z, _, std) = standardize(&[4.0, 4.0, 4.0], 1e-9);
        assert_eq!(std, 0.0);
        assert!(z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_insufficient_data() {
        let texts = &CORPUS[..5];
        let err = SpecificityModel::train_on(
            texts,
            &features(texts),
            &SpecificityConfig::default(),
        )
        .unwrap_err();

        match err {
            TrajectoryError::InsufficientData { found, required } => {
                assert_eq!(found, 5);
                assert_eq!(required, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scores_are_deterministic() {
        let model = trained();
        let text = "draft a concise table of prices";
        assert_eq!(model.score(text), model.score(text));
        assert!(model.score(text).is_finite());
    }

    #[test]
    fn test_constrained_prompts_score_higher() {
        let model = trained();
        let constrained = model.score("you must include a table and keep it within 200 words");
        let bare = model.score("thanks");
        assert!(constrained > bare);
    }

    #[test]
    fn test_unknown_text_scores_intercept() {
        let model = trained();
        assert_eq!(model.score("zzz qqq"), model.intercept);
    }

    #[test]
    fn test_artifact_round_trip() {
        let model = trained();
        let json = model.to_json().unwrap();
        let loaded = SpecificityModel::from_json(&json).unwrap();

        assert_eq!(loaded.vocabulary_len(), model.vocabulary_len());
        assert_eq!(loaded.score("write a formal letter"), model.score("write a formal letter"));
    }

    #[test]
    fn test_corrupt_artifact_rejected() {
        let err = SpecificityModel::from_json("{\"weights\": []}").unwrap_err();
        assert!(matches!(err, TrajectoryError::ModelError(_)));
    }

    #[test]
    fn test_truncated_idf_rejected_on_load() {
        let mut artifact: serde_json::Value =
            serde_json::from_str(&trained().to_json().unwrap()).unwrap();
        artifact["vectorizer"]["idf"] = serde_json::json!([1.0]);

        let err = SpecificityModel::from_json(&artifact.to_string()).unwrap_err();
        assert!(matches!(err, TrajectoryError::ModelError(_)));
    }

    #[test]
    fn test_unsorted_vocabulary_rejected_on_load() {
        let mut artifact: serde_json::Value =
            serde_json::from_str(&trained().to_json().unwrap()).unwrap();
        if let Some(terms) = artifact["vectorizer"]["terms"].as_array_mut() {
            terms.reverse();
        }

        assert!(SpecificityModel::from_json(&artifact.to_string()).is_err());
    }

    #[test]
    fn test_staleness() {
        let model = trained();
        assert!(!model.is_stale(CORPUS.iter().copied()));
        assert!(model.is_stale(CORPUS[1..].iter().copied()));

        let mut outdated = model.clone();
        outdated.rules_version = "prompt-rules.v0".to_string();
        assert!(outdated.rules_outdated());
        assert!(outdated.is_stale(CORPUS.iter().copied()));
    }

    #[test]
    fn test_column_merge_leaves_unscored_records_absent() {
        use crate::trajectory::TrajectoryBuilder;
        use crate::types::Prompt;

        let trajectory = TrajectoryBuilder::default()
            .build(
                "s1",
                vec![Prompt::new("s1", Some(0), "a b"), Prompt::new("s1", Some(1), "c d")],
            )
            .unwrap()
            .unwrap();

        let mut column = SpecificityColumn::default();
        column.insert("s1", 1, 0.75);

        let merged = column.merge(trajectory.records().collect());
        assert_eq!(merged[0].specificity_pred, None);
        assert_eq!(merged[1].specificity_pred, Some(0.75));
    }
}
