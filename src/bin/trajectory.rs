//! Trajectory CLI - Command-line interface for Prompt Trajectory
//!
//! Commands:
//! - analyze: Annotate prompt rows and produce trajectory and session tables
//! - train: Fit a specificity model on a corpus
//! - score: Score texts with a trained specificity model
//! - classify: Annotate a single prompt
//! - validate: Check prompt rows before ingestion
//! - doctor: Diagnose installation and model artifacts

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use prompt_trajectory::adapter::PromptAdapter;
use prompt_trajectory::encoder::{encode_rows, trajectory_rows, TableFormat};
use prompt_trajectory::{
    annotate, AnalysisConfig, Prompt, SpecificityModel, TrajectoryError, TrajectoryProcessor,
    PRODUCER_NAME, RULES_VERSION, VERSION,
};

/// Trajectory - Rule-based annotation and trajectory aggregation for prompt sessions
#[derive(Parser)]
#[command(name = "trajectory")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Annotate prompt sessions and summarize their trajectories", long_about = None)]
struct Cli {
    /// Log progress (info level) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate prompt rows and write trajectory and session tables
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout). Receives the full report, or
        /// the trajectory table when --sessions-out is given
        #[arg(short, long)]
        output: PathBuf,

        /// Write the session table here and the trajectory table to --output
        #[arg(long)]
        sessions_out: Option<PathBuf>,

        /// Specificity model artifact used to score prompts
        #[arg(long)]
        model: Option<PathBuf>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Keep empty prompts as zero-signal records
        #[arg(long)]
        keep_blank: bool,
    },

    /// Train a specificity model on a corpus of prompt rows
    Train {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the model artifact (use - for stdout)
        #[arg(long)]
        model_out: PathBuf,

        /// Also write per-prompt predictions (NDJSON)
        #[arg(long)]
        predictions_out: Option<PathBuf>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,
    },

    /// Score texts with a trained model (reads stdin lines when no text is given)
    Score {
        /// Specificity model artifact
        #[arg(long)]
        model: PathBuf,

        /// Texts to score
        text: Vec<String>,
    },

    /// Annotate a single prompt
    Classify {
        /// Prompt text
        text: String,
    },

    /// Validate prompt rows
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose installation and model artifacts
    Doctor {
        /// Check a model artifact
        #[arg(long)]
        model: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one prompt row per line)
    Ndjson,
    /// JSON array of prompt rows
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl From<&OutputFormat> for TableFormat {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Ndjson => TableFormat::Ndjson,
            OutputFormat::Json => TableFormat::Json,
            OutputFormat::JsonPretty => TableFormat::JsonPretty,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays clean for tables
fn init_logging(verbose: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let filter = verbosity_filter(filter, verbose);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// `--verbose` raises the level to INFO but never lowers a more verbose `RUST_LOG`
fn verbosity_filter(filter: EnvFilter, verbose: bool) -> EnvFilter {
    let below_info = filter
        .max_level_hint()
        .map_or(true, |hint| hint < LevelFilter::INFO);
    if verbose && below_info {
        filter.add_directive(LevelFilter::INFO.into())
    } else {
        filter
    }
}

fn run(cli: Cli) -> Result<(), TrajectoryCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            sessions_out,
            model,
            config,
            input_format,
            output_format,
            keep_blank,
        } => cmd_analyze(
            &input,
            &output,
            sessions_out.as_deref(),
            model.as_deref(),
            config.as_deref(),
            input_format,
            output_format,
            keep_blank,
        ),

        Commands::Train {
            input,
            model_out,
            predictions_out,
            config,
            input_format,
        } => cmd_train(
            &input,
            &model_out,
            predictions_out.as_deref(),
            config.as_deref(),
            input_format,
        ),

        Commands::Score { model, text } => cmd_score(&model, text),

        Commands::Classify { text } => cmd_classify(&text),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { model, json } => cmd_doctor(model.as_deref(), json),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: &Path,
    output: &Path,
    sessions_out: Option<&Path>,
    model: Option<&Path>,
    config: Option<&Path>,
    input_format: InputFormat,
    output_format: OutputFormat,
    keep_blank: bool,
) -> Result<(), TrajectoryCliError> {
    let mut config = load_config(config)?;
    if keep_blank {
        config.keep_blank_prompts = true;
    }

    let mut processor = TrajectoryProcessor::with_config(config)?;
    if let Some(model_path) = model {
        processor.load_model(&fs::read_to_string(model_path)?)?;
    }

    let prompts = read_prompts(input, &input_format)?;
    let analysis = processor.analyze(prompts);
    let format = TableFormat::from(&output_format);

    match sessions_out {
        Some(sessions_path) => {
            write_output(output, &encode_rows(&trajectory_rows(&analysis.records), format)?)?;
            write_output(sessions_path, &encode_rows(&analysis.sessions, format)?)?;
        }
        None => {
            let report = processor.report(&analysis);
            let mut data = match format {
                TableFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
                TableFormat::Json | TableFormat::Ndjson => serde_json::to_string(&report)?,
            };
            data.push('\n');
            write_output(output, &data)?;
        }
    }

    Ok(())
}

fn cmd_train(
    input: &Path,
    model_out: &Path,
    predictions_out: Option<&Path>,
    config: Option<&Path>,
    input_format: InputFormat,
) -> Result<(), TrajectoryCliError> {
    let mut processor = TrajectoryProcessor::with_config(load_config(config)?)?;
    let prompts = read_prompts(input, &input_format)?;

    let model = processor.train(prompts.clone())?;
    let summary = format!(
        "Trained on {} prompts (vocabulary {}, rules {})",
        model.training_prompts,
        model.vocabulary_len(),
        model.rules_version
    );

    write_output(model_out, &processor.save_model()?)?;

    if let Some(predictions_path) = predictions_out {
        let analysis = processor.analyze(prompts);
        if let Some(model) = processor.model() {
            let predictions = model.predictions(&analysis.records);
            write_output(predictions_path, &encode_rows(&predictions, TableFormat::Ndjson)?)?;
        }
    }

    if !is_stdio(model_out) {
        println!("{}", summary);
    }

    Ok(())
}

fn cmd_score(model_path: &Path, texts: Vec<String>) -> Result<(), TrajectoryCliError> {
    let model = SpecificityModel::from_json(&fs::read_to_string(model_path)?)?;
    if model.rules_outdated() {
        warn!(
            model_rules = %model.rules_version,
            current_rules = RULES_VERSION,
            "model was trained under different annotation rules; retrain it"
        );
    }

    let texts = if texts.is_empty() {
        io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
    } else {
        texts
    };

    for text in texts.iter().filter(|t| !t.trim().is_empty()) {
        let row = serde_json::json!({
            "text": text,
            "specificity_pred": model.score(text),
        });
        println!("{}", serde_json::to_string(&row)?);
    }

    Ok(())
}

fn cmd_classify(text: &str) -> Result<(), TrajectoryCliError> {
    println!("{}", serde_json::to_string_pretty(&annotate(text))?);
    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), TrajectoryCliError> {
    let rows = read_rows(input, &input_format)?;
    let issues = PromptAdapter::validate_rows(&rows);

    let mut skipped: Vec<usize> = issues.iter().filter(|r| r.fatal).map(|r| r.index).collect();
    skipped.dedup();

    let report = ValidationReport {
        total_rows: rows.len(),
        usable_rows: rows.len() - skipped.len(),
        skipped_rows: skipped.len(),
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rows:   {}", report.total_rows);
        println!("Usable rows:  {}", report.usable_rows);
        println!("Skipped rows: {}", report.skipped_rows);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!(
                    "  - {} row {} ({}): {}",
                    if issue.fatal { "[ERR] " } else { "[WARN]" },
                    issue.index,
                    issue.conversation_id.as_deref().unwrap_or("unknown"),
                    issue.message
                );
            }
        }
    }

    if report.skipped_rows > 0 {
        Err(TrajectoryCliError::ValidationFailed(report.skipped_rows))
    } else {
        Ok(())
    }
}

fn cmd_doctor(model: Option<&Path>, json: bool) -> Result<(), TrajectoryCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck {
            name: "version".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} version {}", PRODUCER_NAME, VERSION),
        },
        DoctorCheck {
            name: "rules_version".to_string(),
            status: CheckStatus::Ok,
            message: format!("Annotation rules: {}", RULES_VERSION),
        },
    ];

    if let Some(model_path) = model {
        checks.push(check_model(model_path));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for '-i -')".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        rules_version: RULES_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Trajectory Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("Rules:    {}", report.rules_version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(TrajectoryCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_model(model_path: &Path) -> DoctorCheck {
    let (status, message) = if !model_path.exists() {
        (CheckStatus::Warning, "Model file does not exist".to_string())
    } else {
        match fs::read_to_string(model_path) {
            Err(e) => (CheckStatus::Error, format!("Cannot read model file: {}", e)),
            Ok(content) => match SpecificityModel::from_json(&content) {
                Err(e) => (CheckStatus::Error, e.to_string()),
                Ok(model) if model.rules_outdated() => (
                    CheckStatus::Warning,
                    format!(
                        "Model trained under rules {} (current {}); retrain it",
                        model.rules_version, RULES_VERSION
                    ),
                ),
                Ok(model) => (
                    CheckStatus::Ok,
                    format!(
                        "Model valid ({} prompts, vocabulary {}, trained {})",
                        model.training_prompts,
                        model.vocabulary_len(),
                        model.trained_at.to_rfc3339()
                    ),
                ),
            },
        }
    };

    DoctorCheck {
        name: "model".to_string(),
        status,
        message,
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_input(input: &Path) -> Result<String, TrajectoryCliError> {
    if is_stdio(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), TrajectoryCliError> {
    if is_stdio(output) {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn read_rows(input: &Path, input_format: &InputFormat) -> Result<Vec<Value>, TrajectoryCliError> {
    let data = read_input(input)?;
    let rows = match input_format {
        InputFormat::Ndjson => PromptAdapter::rows_from_ndjson(&data)?,
        InputFormat::Json => PromptAdapter::rows_from_array(&data)?,
    };
    Ok(rows)
}

fn read_prompts(
    input: &Path,
    input_format: &InputFormat,
) -> Result<Vec<Prompt>, TrajectoryCliError> {
    let prompts = PromptAdapter::to_prompts(&read_rows(input, input_format)?);
    if prompts.is_empty() {
        return Err(TrajectoryCliError::NoPrompts);
    }
    Ok(prompts)
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, TrajectoryCliError> {
    match path {
        Some(path) => Ok(AnalysisConfig::from_path(path)?),
        None => Ok(AnalysisConfig::default()),
    }
}

#[derive(Debug)]
enum TrajectoryCliError {
    Io(io::Error),
    Analysis(TrajectoryError),
    Json(serde_json::Error),
    NoPrompts,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for TrajectoryCliError {
    fn from(e: io::Error) -> Self {
        TrajectoryCliError::Io(e)
    }
}

impl From<TrajectoryError> for TrajectoryCliError {
    fn from(e: TrajectoryError) -> Self {
        TrajectoryCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for TrajectoryCliError {
    fn from(e: serde_json::Error) -> Self {
        TrajectoryCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TrajectoryCliError> for CliError {
    fn from(e: TrajectoryCliError) -> Self {
        match e {
            TrajectoryCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TrajectoryCliError::Analysis(e) => {
                let (code, hint) = match &e {
                    TrajectoryError::InsufficientData { .. } => (
                        "INSUFFICIENT_DATA",
                        "Provide more prompts or lower min_training_prompts",
                    ),
                    TrajectoryError::ModelError(_) => {
                        ("MODEL_ERROR", "Retrain the model with 'trajectory train'")
                    }
                    TrajectoryError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Check the configuration file")
                    }
                    _ => (
                        "PARSE_ERROR",
                        "Ensure each row has conversation_id, sequence_key and text",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            TrajectoryCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TrajectoryCliError::NoPrompts => CliError {
                code: "NO_PROMPTS".to_string(),
                message: "No prompt rows found in input".to_string(),
                hint: Some("Run 'trajectory validate' for details".to_string()),
            },
            TrajectoryCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} rows cannot be ingested", count),
                hint: Some("Fix the reported rows and retry".to_string()),
            },
            TrajectoryCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_rows: usize,
    usable_rows: usize,
    skipped_rows: usize,
    issues: Vec<prompt_trajectory::adapter::RowReport>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    rules_version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_quiet_filter_to_info() {
        let filter = verbosity_filter(EnvFilter::new("warn"), true);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_verbose_keeps_more_verbose_env_level() {
        let filter = verbosity_filter(EnvFilter::new("debug"), true);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = verbosity_filter(EnvFilter::new("trace"), true);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_quiet_run_leaves_filter_alone() {
        let filter = verbosity_filter(EnvFilter::new("error"), false);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }
}
