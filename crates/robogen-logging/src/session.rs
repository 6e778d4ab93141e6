use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        request: String,
        generator_model: Option<String>,
        evaluator_model: Option<String>,
        threshold: f64,
        max_iterations: usize,
        optimize: bool,
    },
    Iteration {
        iteration_number: usize,
        code: String,
        score: f64,
        valid: bool,
        errors: Vec<String>,
        warnings: Vec<String>,
        change_note: Option<String>,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        success: bool,
        final_score: f64,
        iterations: usize,
        duration_secs: f64,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// Model names recorded in the session header
#[derive(Debug, Clone, Default)]
pub struct SessionModels {
    pub generator: Option<String>,
    pub evaluator: Option<String>,
}

/// Writes session data as JSONL to a file in ~/.local/share/robogen/sessions/.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
    models: SessionModels,
}

impl SessionWriter {
    /// Create a new SessionWriter in the default sessions directory.
    pub fn new(request: &str) -> io::Result<Self> {
        Self::in_dir(&Self::sessions_dir()?, request)
    }

    /// Create a SessionWriter in `dir`. The file name is built from the current UTC
    /// timestamp and a hash of the request.
    pub fn in_dir(dir: &Path, request: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let now = Utc::now();
        let timestamp_str = now.format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(request.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let filename = format!("{}_{}.jsonl", timestamp_str, short_hash);
        let path = dir.join(filename);

        let file = File::create(&path)?;
        let writer = BufWriter::new(file);

        Ok(Self {
            file: Mutex::new(writer),
            path,
            models: SessionModels::default(),
        })
    }

    pub fn with_models(mut self, models: SessionModels) -> Self {
        self.models = models;
        self
    }

    /// Returns the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the session start line.
    pub fn write_start(&self, request: &str, threshold: f64, max_iterations: usize, optimize: bool) {
        let line = SessionLine::SessionStart {
            timestamp: Utc::now(),
            request: request.to_string(),
            generator_model: self.models.generator.clone(),
            evaluator_model: self.models.evaluator.clone(),
            threshold,
            max_iterations,
            optimize,
        };
        self.write_line(&line);
    }

    /// Write an iteration line. Takes plain fields so this crate does not depend on the
    /// evaluation types.
    #[allow(clippy::too_many_arguments)]
    pub fn write_iteration(
        &self,
        iteration_number: usize,
        code: &str,
        score: f64,
        valid: bool,
        errors: &[String],
        warnings: &[String],
        change_note: Option<&str>,
    ) {
        let line = SessionLine::Iteration {
            iteration_number,
            code: code.to_string(),
            score,
            valid,
            errors: errors.to_vec(),
            warnings: warnings.to_vec(),
            change_note: change_note.map(String::from),
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    /// Write the session end line.
    pub fn write_end(
        &self,
        success: bool,
        final_score: f64,
        iterations: usize,
        duration_secs: f64,
        error: Option<&str>,
    ) {
        let line = SessionLine::SessionEnd {
            success,
            final_score,
            iterations,
            duration_secs,
            error: error.map(String::from),
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    fn write_line(&self, line: &SessionLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("robogen").join("sessions"))
    }
}
