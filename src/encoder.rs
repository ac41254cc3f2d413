//! Output encoding
//!
//! Flattens trajectory records into table rows and wraps a corpus analysis in
//! a report envelope carrying producer metadata. Tables can be written as
//! NDJSON (one row per line) or as a JSON array.

use crate::error::TrajectoryError;
use crate::pipeline::CorpusAnalysis;
use crate::specificity::SpecificityModel;
use crate::types::{Intent, SessionSummary, SkippedConversation, TrajectoryRecord};
use crate::{PRODUCER_NAME, RULES_VERSION, VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serialization format for tables and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// One JSON object per line
    #[default]
    Ndjson,
    Json,
    JsonPretty,
}

/// Flat per-prompt trajectory row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub conversation_id: String,
    pub timestep: u32,
    pub t_norm: f64,
    pub intent: Intent,
    pub hedging: bool,
    pub certainty: bool,
    pub authority_transfer: bool,
    pub meta_cognitive: bool,
    pub refinement: bool,
    pub prompt_length: u32,
    pub num_constraints: u32,
    pub descriptive_words: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specificity_pred: Option<f64>,
}

impl From<&TrajectoryRecord> for TrajectoryRow {
    fn from(record: &TrajectoryRecord) -> Self {
        let markers = &record.annotation.markers;
        let features = &record.annotation.features;
        Self {
            conversation_id: record.conversation_id().to_string(),
            timestep: record.timestep,
            t_norm: record.t_norm,
            intent: record.annotation.intent,
            hedging: markers.hedging,
            certainty: markers.certainty,
            authority_transfer: markers.authority_transfer,
            meta_cognitive: markers.meta_cognitive,
            refinement: markers.refinement,
            prompt_length: features.prompt_length,
            num_constraints: features.num_constraints,
            descriptive_words: features.descriptive_words,
            specificity_pred: record.specificity_pred,
        }
    }
}

/// Report producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Summary of the specificity model applied to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub rules_version: String,
    pub training_prompts: usize,
    pub vocabulary_size: usize,
    pub corpus_fingerprint: String,
    pub trained_at_utc: String,
    /// Whether the model was trained on a different corpus or rule set
    pub stale: bool,
}

/// Full analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub rules_version: String,
    pub trajectories: Vec<TrajectoryRow>,
    pub sessions: Vec<SessionSummary>,
    pub skipped: Vec<SkippedConversation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
}

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build the report for an analysis, optionally describing the model that scored it
    pub fn encode(
        &self,
        analysis: &CorpusAnalysis,
        model: Option<&SpecificityModel>,
    ) -> AnalysisReport {
        let model = model.map(|model| ModelInfo {
            rules_version: model.rules_version.clone(),
            training_prompts: model.training_prompts,
            vocabulary_size: model.vocabulary_len(),
            corpus_fingerprint: model.corpus_fingerprint.clone(),
            trained_at_utc: model.trained_at.to_rfc3339(),
            stale: model.is_stale(analysis.texts()),
        });

        AnalysisReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            rules_version: RULES_VERSION.to_string(),
            trajectories: trajectory_rows(&analysis.records),
            sessions: analysis.sessions.clone(),
            skipped: analysis.skipped.clone(),
            model,
        }
    }

    /// Encode a report as JSON. NDJSON has no meaning for a single document,
    /// so it is written compact.
    pub fn encode_to_json(
        &self,
        analysis: &CorpusAnalysis,
        model: Option<&SpecificityModel>,
        format: TableFormat,
    ) -> Result<String, TrajectoryError> {
        let report = self.encode(analysis, model);
        let json = match format {
            TableFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
            TableFormat::Json | TableFormat::Ndjson => serde_json::to_string(&report)?,
        };
        Ok(json)
    }
}

/// Flatten records into table rows
pub fn trajectory_rows(records: &[TrajectoryRecord]) -> Vec<TrajectoryRow> {
    records.iter().map(TrajectoryRow::from).collect()
}

/// Encode a table of rows
pub fn encode_rows<T: Serialize>(rows: &[T], format: TableFormat) -> Result<String, TrajectoryError> {
    match format {
        TableFormat::Ndjson => {
            let mut out = String::new();
            for row in rows {
                let line = serde_json::to_string(row)
                    .map_err(|e| TrajectoryError::EncodingError(e.to_string()))?;
                out.push_str(&line);
                out.push('\n');
            }
            Ok(out)
        }
        TableFormat::Json => {
            serde_json::to_string(rows).map_err(|e| TrajectoryError::EncodingError(e.to_string()))
        }
        TableFormat::JsonPretty => serde_json::to_string_pretty(rows)
            .map_err(|e| TrajectoryError::EncodingError(e.to_string())),
    }
}
