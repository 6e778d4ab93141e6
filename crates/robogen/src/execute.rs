//! Runs a generated script with a local Python interpreter.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one script run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub success: bool,
    /// None when the process was killed or timed out
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_secs: f64,
    /// Set when the script could not be run at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionReport {
    fn failed(error: &anyhow::Error, duration_secs: f64) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            duration_secs,
            error: Some(format!("{:#}", error)),
        }
    }
}

pub struct ScriptRunner {
    interpreter: String,
    timeout: Duration,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_PYTHON.to_string(),
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

impl ScriptRunner {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Write `code` to a temporary `.py` file and run it, capturing both streams.
    ///
    /// Failures to create the file or start the interpreter are folded into the report.
    pub async fn run(&self, code: &str) -> ExecutionReport {
        let start = Instant::now();
        match self.try_run(code, start).await {
            Ok(report) => report,
            Err(e) => {
                warn!(interpreter = %self.interpreter, error = %e, "Could not execute script");
                ExecutionReport::failed(&e, start.elapsed().as_secs_f64())
            }
        }
    }

    async fn try_run(&self, code: &str, start: Instant) -> Result<ExecutionReport> {
        let mut script = tempfile::Builder::new()
            .prefix("robogen_")
            .suffix(".py")
            .tempfile()
            .context("Failed to create temporary script file")?;
        script
            .write_all(code.as_bytes())
            .and_then(|_| script.flush())
            .context("Failed to write temporary script file")?;

        debug!(
            interpreter = %self.interpreter,
            script = %script.path().display(),
            timeout_secs = self.timeout.as_secs(),
            "Executing generated script"
        );

        let child = Command::new(&self.interpreter)
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start interpreter '{}'", self.interpreter))?;

        let report = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.context("Failed to collect script output")?;
                ExecutionReport {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    timed_out: false,
                    duration_secs: start.elapsed().as_secs_f64(),
                    error: None,
                }
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "Script execution timed out");
                ExecutionReport {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!(
                        "Execution timed out after {} seconds",
                        self.timeout.as_secs_f64()
                    ),
                    timed_out: true,
                    duration_secs: start.elapsed().as_secs_f64(),
                    error: None,
                }
            }
        };

        debug!(
            success = report.success,
            exit_code = report.exit_code.unwrap_or(-1),
            duration_secs = report.duration_secs,
            "Script finished"
        );

        Ok(report)
    }
}
