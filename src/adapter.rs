//! Prompt row ingestion
//!
//! Parses prompt rows produced by an upstream log extractor into [`Prompt`]s.
//! Rows arrive as a JSON array or as NDJSON. Individual fields are coerced
//! leniently: a bad `text` or `sequence_key` becomes `None` instead of failing
//! the row. Only a row that cannot be attributed to a conversation is dropped.

use crate::error::TrajectoryError;
use crate::types::{Prompt, Timestamp};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

const CONVERSATION_ID_FIELDS: &[&str] = &["conversation_id", "session_id"];
const SEQUENCE_KEY_FIELDS: &[&str] = &["sequence_key", "action_index"];

/// Adapter for converting prompt rows into prompts
pub struct PromptAdapter;

impl PromptAdapter {
    /// Parse a JSON array of prompt rows
    pub fn parse_array(json: &str) -> Result<Vec<Prompt>, TrajectoryError> {
        Ok(Self::to_prompts(&Self::rows_from_array(json)?))
    }

    /// Parse NDJSON (newline-delimited JSON) prompt rows
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Prompt>, TrajectoryError> {
        Ok(Self::to_prompts(&Self::rows_from_ndjson(ndjson)?))
    }

    /// Parse either format, detected from the first non-whitespace character
    pub fn parse(input: &str) -> Result<Vec<Prompt>, TrajectoryError> {
        Ok(Self::to_prompts(&Self::rows(input)?))
    }

    /// Raw rows in either format
    pub fn rows(input: &str) -> Result<Vec<Value>, TrajectoryError> {
        if input.trim_start().starts_with('[') {
            Self::rows_from_array(input)
        } else {
            Self::rows_from_ndjson(input)
        }
    }

    /// Raw rows of a JSON array
    pub fn rows_from_array(json: &str) -> Result<Vec<Value>, TrajectoryError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Array(rows) => Ok(rows),
            other => Err(TrajectoryError::ParseError(format!(
                "expected an array of prompt rows, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Raw rows of an NDJSON document; blank lines are ignored
    pub fn rows_from_ndjson(ndjson: &str) -> Result<Vec<Value>, TrajectoryError> {
        let mut rows = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    return Err(TrajectoryError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(rows)
    }

    /// Coerce raw rows to prompts, skipping rows without a conversation
    pub fn to_prompts(rows: &[Value]) -> Vec<Prompt> {
        rows.iter()
            .enumerate()
            .filter_map(|(index, row)| match Self::row_to_prompt(row) {
                Ok(prompt) => Some(prompt),
                Err(issue) => {
                    warn!(row = index, issue = %issue, "skipping prompt row");
                    None
                }
            })
            .collect()
    }

    /// Coerce one row. Fails only when the row has no usable conversation id.
    pub fn row_to_prompt(row: &Value) -> Result<Prompt, RowIssue> {
        let fields = row.as_object().ok_or(RowIssue::NotAnObject)?;
        let conversation_id = conversation_id(fields).ok_or(RowIssue::MissingConversationId)?;

        let text = match fields.get("text") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        };

        Ok(Prompt {
            conversation_id,
            sequence_key: first_field(fields, SEQUENCE_KEY_FIELDS).and_then(sequence_key),
            text,
            start_time: timestamp(fields.get("start_time")),
            end_time: timestamp(fields.get("end_time")),
        })
    }

    /// Report every issue found in `rows`; never fails
    pub fn validate_rows(rows: &[Value]) -> Vec<RowReport> {
        let mut reports = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(fields) = row.as_object() else {
                reports.push(RowReport::new(index, None, RowIssue::NotAnObject));
                continue;
            };

            let id = conversation_id(fields);
            let mut report = |issue| reports.push(RowReport::new(index, id.clone(), issue));

            if id.is_none() {
                report(RowIssue::MissingConversationId);
            }

            match fields.get("text") {
                None => report(RowIssue::MissingText),
                Some(Value::String(text)) if text.trim().is_empty() => report(RowIssue::BlankText),
                Some(Value::String(_)) => {}
                Some(_) => report(RowIssue::NonTextPrompt),
            }

            match first_field(fields, SEQUENCE_KEY_FIELDS) {
                None | Some(Value::Null) => report(RowIssue::MissingSequenceKey),
                Some(value) if sequence_key(value).is_none() => {
                    report(RowIssue::InvalidSequenceKey {
                        value: value.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        reports
    }
}

/// A problem found in a single prompt row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIssue {
    #[error("row is not a JSON object")]
    NotAnObject,

    #[error("row has no conversation_id")]
    MissingConversationId,

    #[error("row has no text field")]
    MissingText,

    #[error("text is not a string")]
    NonTextPrompt,

    #[error("text is empty")]
    BlankText,

    #[error("row has no sequence_key")]
    MissingSequenceKey,

    #[error("sequence_key {value} is not a non-negative integer")]
    InvalidSequenceKey { value: String },
}

impl RowIssue {
    /// Whether the row is dropped during ingestion
    pub fn is_fatal(&self) -> bool {
        matches!(self, RowIssue::NotAnObject | RowIssue::MissingConversationId)
    }
}

/// Validation finding for one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    /// 0-based row position in the input
    pub index: usize,
    pub conversation_id: Option<String>,
    pub issue: RowIssue,
    pub fatal: bool,
    pub message: String,
}

impl RowReport {
    fn new(index: usize, conversation_id: Option<String>, issue: RowIssue) -> Self {
        Self {
            index,
            conversation_id,
            fatal: issue.is_fatal(),
            message: issue.to_string(),
            issue,
        }
    }
}

fn first_field<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| fields.get(*name))
}

/// Strings are taken verbatim (blank ids are rejected later, per conversation);
/// numeric ids are stringified.
fn conversation_id(fields: &Map<String, Value>) -> Option<String> {
    match first_field(fields, CONVERSATION_ID_FIELDS)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn sequence_key(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp(value: Option<&Value>) -> Option<Timestamp> {
    match value? {
        Value::Null => None,
        value => serde_json::from_value(value.clone()).ok(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
