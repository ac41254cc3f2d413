//! Prompt Trajectory - Rule-based annotation and trajectory aggregation for prompt sessions
//!
//! The engine turns the prompts of a session into an annotated trajectory
//! through a deterministic pipeline: row ingestion → per-prompt annotation
//! (intent, behavioral markers, density features) → trajectory building →
//! session aggregation → report encoding.
//!
//! ## Modules
//!
//! - **Annotation**: `intent`, `markers` and `features`, combined by `annotate`
//! - **Trajectories**: `trajectory` orders prompts and `summary` reduces sessions
//! - **Specificity**: an optional TF-IDF ridge scorer trained on a weak rule-based target

pub mod adapter;
pub mod annotate;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod intent;
pub mod markers;
pub mod pipeline;
pub mod specificity;
pub mod summary;
pub mod trajectory;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use adapter::PromptAdapter;
pub use annotate::annotate;
pub use config::{AnalysisConfig, SpecificityConfig};
pub use encoder::{AnalysisReport, ReportEncoder, TableFormat};
pub use error::TrajectoryError;
pub use pipeline::{analyze_prompts, prompts_to_report, CorpusAnalysis, TrajectoryProcessor};
pub use specificity::SpecificityModel;
pub use types::{Annotation, Intent, Prompt, SessionSummary, TrajectoryRecord};

/// Library version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "prompt-trajectory";

/// Version of the annotation rule set. Bump whenever a rule table, marker
/// list or feature heuristic changes; trained models record it.
pub const RULES_VERSION: &str = "prompt-rules.v2";
