mod config;
mod display;
mod execute;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::warn;

use robogen_agent::{ChatClient, LlmGenerator, ModelSettings};
use robogen_core::{CodeGenerationPipeline, PipelineConfig, PipelineResult};
use robogen_critic::{EvaluationMode, LlmEvaluator};
use robogen_logging::{
    init_tracing, init_tracing_with_dir, LogFormat, Logger, SessionModels, SessionWriter,
};

use crate::config::ProjectConfig;
use crate::execute::{ExecutionReport, ScriptRunner, DEFAULT_PYTHON};

const DEFAULT_GENERATOR_MODEL: &str = "gpt-4-turbo";
const DEFAULT_EVALUATOR_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 4000;
const MIN_EVALUATOR_TEMPERATURE: f32 = 0.1;
/// Pipeline event log written under `--log-dir`
const EVENT_LOG_FILE: &str = "robogen-events.jsonl";

#[derive(Parser, Debug)]
#[command(
    name = "robogen",
    about = "Generate, evaluate and refine Reachy 2 robot scripts from natural language",
    version,
    author
)]
struct Cli {
    /// Natural-language request (prompted for on stdin if not provided)
    request: Option<String>,

    /// Natural-language request, as a flag
    #[arg(long = "request", value_name = "REQUEST", conflicts_with = "request")]
    request_flag: Option<String>,

    /// OpenAI API key (default: OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Model used to write code
    #[arg(long)]
    generator_model: Option<String>,

    /// Model used to score code
    #[arg(long)]
    evaluator_model: Option<String>,

    /// Generation temperature (default: 0.2)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum tokens per response (default: 4000)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Skip the optimization rounds
    #[arg(long)]
    no_optimize: bool,

    /// Maximum optimization rounds (default: 2)
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Score a run must reach to succeed (default: 75)
    #[arg(long)]
    threshold: Option<f64>,

    /// Evaluation focus
    #[arg(long, value_enum)]
    evaluation_mode: Option<EvaluationModeChoice>,

    /// Run the final code with the local Python interpreter
    #[arg(long)]
    execute: bool,

    /// Print only the final code
    #[arg(short, long)]
    quiet: bool,

    /// Write the final code to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output the full result as JSON
    #[arg(long)]
    json_output: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also write tracing output to a daily log file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EvaluationModeChoice {
    Standard,
    Detailed,
    SafetyFocus,
}

impl From<EvaluationModeChoice> for EvaluationMode {
    fn from(choice: EvaluationModeChoice) -> Self {
        match choice {
            EvaluationModeChoice::Standard => EvaluationMode::Standard,
            EvaluationModeChoice::Detailed => EvaluationMode::Detailed,
            EvaluationModeChoice::SafetyFocus => EvaluationMode::SafetyFocus,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Defaults read from the environment (and `.env`)
#[derive(Debug, Default)]
struct EnvDefaults {
    api_key: Option<String>,
    model: Option<String>,
    evaluator_model: Option<String>,
    base_url: Option<String>,
}

impl EnvDefaults {
    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: var("OPENAI_API_KEY"),
            model: var("MODEL"),
            evaluator_model: var("EVALUATOR_MODEL"),
            base_url: var("OPENAI_BASE_URL"),
        }
    }
}

/// Everything needed to build the pipeline, resolved from flags, config file and env
#[derive(Debug)]
struct RunSettings {
    generator: ModelSettings,
    evaluator: ModelSettings,
    pipeline: PipelineConfig,
    mode: EvaluationMode,
    base_url: Option<String>,
}

impl RunSettings {
    /// Priority for each value: CLI flag > role table > global config > environment > default
    fn resolve(cli: &Cli, project: &ProjectConfig, env: &EnvDefaults) -> Result<Self> {
        let generator_model = cli
            .generator_model
            .as_deref()
            .or(project.generator_model())
            .or(env.model.as_deref())
            .unwrap_or(DEFAULT_GENERATOR_MODEL);
        let evaluator_model = cli
            .evaluator_model
            .as_deref()
            .or(project.evaluator_model())
            .or(env.evaluator_model.as_deref())
            .unwrap_or(DEFAULT_EVALUATOR_MODEL);

        let generator_temperature = cli
            .temperature
            .or(project.generator.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        // The evaluator runs cooler than the generator unless its table says otherwise
        let evaluator_temperature = match (cli.temperature, project.evaluator.temperature) {
            (None, Some(t)) => t,
            _ => (generator_temperature - 0.1).max(MIN_EVALUATOR_TEMPERATURE),
        };

        let generator = ModelSettings::new(generator_model)
            .with_temperature(generator_temperature)
            .with_max_tokens(
                cli.max_tokens
                    .or(project.generator.max_tokens)
                    .unwrap_or(DEFAULT_MAX_TOKENS),
            );
        let evaluator = ModelSettings::new(evaluator_model)
            .with_temperature(evaluator_temperature)
            .with_max_tokens(
                cli.max_tokens
                    .or(project.evaluator.max_tokens)
                    .unwrap_or(DEFAULT_MAX_TOKENS),
            );

        let defaults = PipelineConfig::default();
        let mut pipeline = PipelineConfig::default()
            .with_threshold(
                cli.threshold
                    .or(project.pipeline.threshold)
                    .unwrap_or(defaults.evaluation_threshold),
            )
            .with_max_iterations(
                cli.max_iterations
                    .or(project.pipeline.max_iterations)
                    .unwrap_or(defaults.max_iterations),
            );
        if let Some(timeout) = project.call_timeout() {
            pipeline = pipeline.with_call_timeout(timeout);
        }
        if let Some(timeout) = project.run_timeout() {
            pipeline = pipeline.with_run_timeout(timeout);
        }

        let mode: EvaluationMode = match (cli.evaluation_mode, project.pipeline.evaluation_mode.as_deref()) {
            (Some(choice), _) => choice.into(),
            (None, Some(name)) => name
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid [pipeline].evaluation_mode")?,
            (None, None) => EvaluationMode::default(),
        };

        let base_url = project.base_url.clone().or_else(|| env.base_url.clone());

        Ok(Self {
            generator,
            evaluator,
            pipeline,
            mode,
            base_url,
        })
    }
}

/// JSON document printed by `--json-output`
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a PipelineResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<&'a ExecutionReport>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let _log_guard = match &cli.log_dir {
        Some(dir) => Some(init_tracing_with_dir(&cli.log_level, log_format, dir)),
        None => {
            init_tracing(&cli.log_level, log_format);
            None
        }
    };

    let env = EnvDefaults::from_env();
    let Some(api_key) = cli
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| env.api_key.clone())
    else {
        eprintln!(
            "ERROR: No OpenAI API key provided. Please set the OPENAI_API_KEY environment variable or use --api-key."
        );
        std::process::exit(1);
    };

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let project = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let settings = RunSettings::resolve(&cli, &project, &env)?;

    let request = read_request(&cli)?;
    if request.is_empty() {
        eprintln!("No request provided, nothing to do.");
        return Ok(());
    }

    let pipeline = build_pipeline(&cli, &project, &settings, &api_key, log_format)?;
    let optimize = !cli.no_optimize;

    if !cli.quiet && !cli.json_output {
        display::print_run_header(
            &request,
            &settings.generator.model,
            &settings.evaluator.model,
            &settings.pipeline,
            optimize,
        );
    }

    let pipeline = match open_session(&request, &settings) {
        Some(session) => pipeline.with_session_writer(session),
        None => pipeline,
    };

    let result = pipeline.generate_code(&request, &[], optimize).await;
    let threshold = settings.pipeline.evaluation_threshold;

    if let Some(path) = &cli.output {
        match std::fs::write(path, result.final_code()) {
            Ok(()) if !cli.quiet => eprintln!("Generated code written to {}", path.display()),
            Ok(()) => {}
            Err(e) => eprintln!("Failed to write {}: {}", path.display(), e),
        }
    }

    let execution = if cli.execute {
        run_script(&cli, &project, &result).await
    } else {
        None
    };

    if cli.json_output {
        let report = JsonReport {
            result: &result,
            execution: execution.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if cli.quiet {
        if result.has_code() {
            println!("{}", result.final_code());
        }
    } else {
        display::print_result(&result, threshold);
        if let Some(report) = &execution {
            display::print_execution(report);
        }
    }

    Ok(())
}

fn read_request(cli: &Cli) -> Result<String> {
    if let Some(request) = cli.request.as_ref().or(cli.request_flag.as_ref()) {
        return Ok(request.trim().to_string());
    }

    eprintln!("Please enter your code generation request:");
    eprint!("> ");
    std::io::stderr().flush().context("Failed to flush prompt")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read request from stdin")?;
    Ok(line.trim().to_string())
}

fn build_pipeline(
    cli: &Cli,
    project: &ProjectConfig,
    settings: &RunSettings,
    api_key: &str,
    log_format: LogFormat,
) -> Result<CodeGenerationPipeline> {
    let mut client = ChatClient::new(api_key).context("Failed to create chat client")?;
    if let Some(base_url) = &settings.base_url {
        client = client.with_base_url(base_url);
    }
    let client = Arc::new(client);

    let mut generator = LlmGenerator::new(client.clone(), settings.generator.clone());
    if let Some(path) = &project.generator.api_summary {
        let summary = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read API summary {}", path.display()))?;
        generator = generator.with_api_summary(&summary);
    }
    let evaluator = LlmEvaluator::new(client, settings.evaluator.clone()).with_mode(settings.mode);

    let mut pipeline = CodeGenerationPipeline::new(
        Arc::new(generator),
        Arc::new(evaluator),
        settings.pipeline.clone(),
    );

    if !cli.quiet && !cli.json_output {
        pipeline = pipeline.with_progress(display::print_progress);
    }
    if let Some(logger) = event_logger(cli, log_format) {
        pipeline = pipeline.with_logger(Arc::new(logger));
    }

    Ok(pipeline)
}

/// Console event rendering for interactive runs, plus a JSONL event file under `--log-dir`
fn event_logger(cli: &Cli, log_format: LogFormat) -> Option<Logger> {
    let console = !cli.quiet && !cli.json_output;
    let Some(dir) = &cli.log_dir else {
        return console.then(|| Logger::new(log_format));
    };

    match Logger::with_file(log_format, &dir.join(EVENT_LOG_FILE)) {
        Ok(logger) if console => Some(logger),
        Ok(logger) => Some(logger.without_console()),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Could not open event log, continuing without it");
            console.then(|| Logger::new(log_format))
        }
    }
}

fn open_session(request: &str, settings: &RunSettings) -> Option<Arc<SessionWriter>> {
    match SessionWriter::new(request) {
        Ok(writer) => Some(Arc::new(writer.with_models(SessionModels {
            generator: Some(settings.generator.model.clone()),
            evaluator: Some(settings.evaluator.model.clone()),
        }))),
        Err(e) => {
            warn!(error = %e, "Could not create session file, continuing without one");
            None
        }
    }
}

async fn run_script(
    cli: &Cli,
    project: &ProjectConfig,
    result: &PipelineResult,
) -> Option<ExecutionReport> {
    if !result.has_code() {
        eprintln!("No code was generated, cannot execute.");
        return None;
    }

    let interpreter = project.execution.python.as_deref().unwrap_or(DEFAULT_PYTHON);
    let mut runner = ScriptRunner::new(interpreter);
    if let Some(timeout) = project.execution_timeout() {
        runner = runner.with_timeout(timeout);
    }

    if !cli.quiet && !cli.json_output {
        eprintln!();
        eprintln!("Executing code with {}...", interpreter);
    }

    Some(runner.run(result.final_code()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use robogen_logging::LogEvent;
    use std::time::Duration;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["robogen"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn parse_config(content: &str) -> ProjectConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = RunSettings::resolve(
            &cli(&["wave"]),
            &ProjectConfig::default(),
            &EnvDefaults::default(),
        )
        .unwrap();

        assert_eq!(settings.generator.model, "gpt-4-turbo");
        assert_eq!(settings.evaluator.model, "gpt-4o-mini");
        assert!((settings.generator.temperature - 0.2).abs() < 1e-6);
        assert!((settings.evaluator.temperature - 0.1).abs() < 1e-6);
        assert_eq!(settings.generator.max_tokens, 4000);
        assert_eq!(settings.pipeline.evaluation_threshold, 75.0);
        assert_eq!(settings.pipeline.max_iterations, 2);
        assert_eq!(settings.mode, EvaluationMode::Standard);
        assert!(settings.base_url.is_none());
    }

    #[test]
    fn test_evaluator_temperature_has_floor() {
        let settings = RunSettings::resolve(
            &cli(&["wave", "--temperature", "0.05"]),
            &ProjectConfig::default(),
            &EnvDefaults::default(),
        )
        .unwrap();
        assert!((settings.evaluator.temperature - 0.1).abs() < 1e-6);

        let settings = RunSettings::resolve(
            &cli(&["wave", "--temperature", "0.7"]),
            &ProjectConfig::default(),
            &EnvDefaults::default(),
        )
        .unwrap();
        assert!((settings.evaluator.temperature - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_precedence() {
        let project = parse_config(
            r#"
model = "config-global"

[evaluator]
model = "config-evaluator"
temperature = 0.3

[pipeline]
threshold = 90.0
max_iterations = 5
evaluation_mode = "detailed"
"#,
        );
        let env = EnvDefaults {
            model: Some("env-model".to_string()),
            evaluator_model: Some("env-evaluator".to_string()),
            base_url: Some("http://localhost:1234/v1".to_string()),
            ..EnvDefaults::default()
        };

        let settings =
            RunSettings::resolve(&cli(&["wave", "--max-iterations", "1"]), &project, &env)
                .unwrap();
        assert_eq!(settings.generator.model, "config-global");
        assert_eq!(settings.evaluator.model, "config-evaluator");
        assert!((settings.evaluator.temperature - 0.3).abs() < 1e-6);
        assert_eq!(settings.pipeline.evaluation_threshold, 90.0);
        assert_eq!(settings.pipeline.max_iterations, 1);
        assert_eq!(settings.mode, EvaluationMode::Detailed);
        assert_eq!(settings.base_url.as_deref(), Some("http://localhost:1234/v1"));

        let settings = RunSettings::resolve(
            &cli(&[
                "wave",
                "--generator-model",
                "flag-model",
                "--evaluation-mode",
                "safety-focus",
            ]),
            &ProjectConfig::default(),
            &env,
        )
        .unwrap();
        assert_eq!(settings.generator.model, "flag-model");
        assert_eq!(settings.evaluator.model, "env-evaluator");
        assert_eq!(settings.mode, EvaluationMode::SafetyFocus);
    }

    #[test]
    fn test_invalid_mode_in_config() {
        let project = parse_config("[pipeline]\nevaluation_mode = \"lenient\"\n");
        let err = RunSettings::resolve(&cli(&["wave"]), &project, &EnvDefaults::default())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown evaluation mode"));
    }

    #[test]
    fn test_request_sources() {
        let parsed = cli(&["--request", "turn the head left"]);
        assert_eq!(read_request(&parsed).unwrap(), "turn the head left");

        let parsed = cli(&["  wave hello  "]);
        assert_eq!(read_request(&parsed).unwrap(), "wave hello");

        assert!(Cli::try_parse_from(["robogen", "a", "--request", "b"]).is_err());
    }

    #[test]
    fn test_timeouts_from_config() {
        let project = parse_config("[pipeline]\ncall_timeout_secs = 20\nrun_timeout_secs = 120\n");
        let settings =
            RunSettings::resolve(&cli(&["wave"]), &project, &EnvDefaults::default()).unwrap();
        assert_eq!(settings.pipeline.call_timeout, Some(Duration::from_secs(20)));
        assert_eq!(settings.pipeline.run_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_event_log_under_log_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let dir_arg = dir.path().to_str().unwrap();

        assert!(event_logger(&cli(&["wave", "--json-output"]), LogFormat::Json).is_none());
        assert!(event_logger(&cli(&["wave"]), LogFormat::Pretty).is_some());

        let logger =
            event_logger(&cli(&["wave", "--quiet", "--log-dir", dir_arg]), LogFormat::Pretty)
                .unwrap();
        logger.log(&LogEvent::CodeUnchanged { iteration: 2 });

        let content = std::fs::read_to_string(dir.path().join(EVENT_LOG_FILE)).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["event"], "code_unchanged");
        assert_eq!(line["iteration"], 2);
    }
}
