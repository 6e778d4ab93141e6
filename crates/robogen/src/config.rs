//! Project configuration file support for robogen.
//!
//! Loads configuration from `robogen.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-level configuration loaded from `robogen.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default model (applies to both generator and evaluator)
    pub model: Option<String>,
    /// OpenAI-compatible endpoint
    pub base_url: Option<String>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub evaluator: RoleConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub execution: ExecutionSection,
}

/// Model settings for one role
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Generator settings; the role settings plus an optional robot API summary file
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Text file appended to the generator's system prompt
    pub api_summary: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    pub threshold: Option<f64>,
    pub max_iterations: Option<usize>,
    pub call_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
    pub evaluation_mode: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSection {
    /// Interpreter used for `--execute`
    pub python: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "robogen.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Priority: [generator].model > global model > None
    pub fn generator_model(&self) -> Option<&str> {
        self.generator.model.as_deref().or(self.model.as_deref())
    }

    /// Priority: [evaluator].model > global model > None
    pub fn evaluator_model(&self) -> Option<&str> {
        self.evaluator.model.as_deref().or(self.model.as_deref())
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.pipeline.call_timeout_secs.map(Duration::from_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.pipeline.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_role_precedence() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
model = "gpt-4o"

[evaluator]
model = "gpt-4o-mini"
temperature = 0.1
"#,
        );

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.generator_model(), Some("gpt-4o"));
        assert_eq!(config.evaluator_model(), Some("gpt-4o-mini"));
        assert_eq!(config.evaluator.temperature, Some(0.1));
        assert!(config.generator.temperature.is_none());
    }

    #[test]
    fn test_full_file() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
base_url = "http://localhost:8080/v1"

[generator]
model = "gpt-4-turbo"
max_tokens = 2000
api_summary = "docs/reachy_api.md"

[pipeline]
threshold = 80.0
max_iterations = 4
call_timeout_secs = 45
run_timeout_secs = 300
evaluation_mode = "safety-focus"

[execution]
python = "python3.11"
timeout_secs = 10
"#,
        );

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.generator.max_tokens, Some(2000));
        assert_eq!(
            config.generator.api_summary.as_deref(),
            Some(Path::new("docs/reachy_api.md"))
        );
        assert_eq!(config.pipeline.threshold, Some(80.0));
        assert_eq!(config.pipeline.max_iterations, Some(4));
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.pipeline.evaluation_mode.as_deref(), Some("safety-focus"));
        assert_eq!(config.execution.python.as_deref(), Some("python3.11"));
        assert_eq!(config.execution_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[generator]\nagent = \"claude\"\n");

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_evaluator_rejects_api_summary() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[evaluator]\napi_summary = \"x.md\"\n");
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
