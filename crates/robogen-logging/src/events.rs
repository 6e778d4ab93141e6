use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the generate-evaluate-optimize pipeline.
///
/// `iteration` is 0 for the initial generation and N for optimization round N.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    PipelineStarted {
        request: String,
        optimize: bool,
        threshold: f64,
        max_iterations: usize,
    },
    GenerationStarted {
        iteration: usize,
    },
    GenerationCompleted {
        iteration: usize,
        code_lines: usize,
        duration_secs: f64,
    },
    EvaluationStarted {
        iteration: usize,
    },
    EvaluationCompleted {
        iteration: usize,
        score: f64,
        valid: bool,
        errors: usize,
        warnings: usize,
    },
    OptimizationStarted {
        iteration: usize,
        max_iterations: usize,
        score: f64,
    },
    /// The generator returned the code it was given
    CodeUnchanged {
        iteration: usize,
    },
    ScoreChanged {
        iteration: usize,
        previous: f64,
        current: f64,
    },
    ThresholdMet {
        iteration: usize,
        score: f64,
        threshold: f64,
    },
    PipelineCompleted {
        success: bool,
        final_score: f64,
        iterations: usize,
        duration_secs: f64,
    },
    ErrorEncountered {
        iteration: usize,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for pipeline events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    /// Suppress console rendering (file output, if any, is kept)
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn log(&self, event: &LogEvent) {
        // Always JSON in the file
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::PipelineStarted {
                request,
                optimize,
                threshold,
                max_iterations,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "robogen".bold().bright_white(),
                    " ".repeat(60) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Request:".dimmed(),
                    Self::truncate_with_padding(request, 56, 67).dimmed()
                );
                let settings = if *optimize {
                    format!("threshold {:.0}, up to {} rounds", threshold, max_iterations)
                } else {
                    format!("threshold {:.0}, optimization off", threshold)
                };
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Policy:".dimmed(),
                    Self::truncate_with_padding(&settings, 57, 68).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::GenerationStarted { iteration } => {
                let title = if *iteration == 0 {
                    "─ Initial generation ".to_string()
                } else {
                    format!("─ Optimization {} ", iteration)
                };
                let padding = "─".repeat(67usize.saturating_sub(title.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    title.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    "GENERATOR".bright_cyan().bold()
                );
            }
            LogEvent::GenerationCompleted {
                code_lines,
                duration_secs,
                ..
            } => {
                if *code_lines > 0 {
                    let _ = writeln!(
                        stderr,
                        "    {} {} {} ({:.1}s)",
                        "✓".bright_green(),
                        code_lines,
                        if *code_lines == 1 { "line" } else { "lines" },
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} No code in response ({:.1}s)",
                        "✗".bright_red(),
                        duration_secs
                    );
                }
                let _ = writeln!(stderr);
            }
            LogEvent::EvaluationStarted { .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "EVALUATOR".bright_magenta().bold()
                );
            }
            LogEvent::EvaluationCompleted {
                score,
                valid,
                errors,
                warnings,
                ..
            } => {
                let line = format!(
                    "Score {:.1}/100, {} errors, {} warnings",
                    score, errors, warnings
                );
                let styled = if *valid {
                    format!("✓ {}", line).bright_green().to_string()
                } else {
                    format!("→ {}", line).bright_yellow().to_string()
                };
                let _ = writeln!(stderr, "    {}", styled);
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::OptimizationStarted {
                iteration,
                max_iterations,
                score,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} Optimizing {}/{} from score {:.1}",
                    "↻".bright_cyan(),
                    iteration,
                    max_iterations,
                    score
                );
            }
            LogEvent::CodeUnchanged { iteration } => {
                let _ = writeln!(
                    stderr,
                    "    {} Round {} returned identical code, stopping",
                    "■".bright_yellow(),
                    iteration
                );
                let _ = writeln!(stderr);
            }
            LogEvent::ScoreChanged {
                previous, current, ..
            } => {
                let delta = current - previous;
                let text = format!("{:.1} → {:.1}", previous, current);
                let styled = if delta > 0.0 {
                    text.green()
                } else if delta < 0.0 {
                    text.red()
                } else {
                    text.dimmed()
                };
                let _ = writeln!(stderr, "    {} {}", "Score:".dimmed(), styled);
            }
            LogEvent::ThresholdMet {
                score, threshold, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Score {:.1} meets threshold {:.1}",
                    "✓".bright_green(),
                    score,
                    threshold
                );
            }
            LogEvent::PipelineCompleted { .. } => {
                // The binary prints the final result itself
            }
            LogEvent::ErrorEncountered { iteration, error } => {
                let _ = writeln!(stderr);
                let where_ = if *iteration == 0 {
                    "initial pass".to_string()
                } else {
                    format!("optimization {}", iteration)
                };
                let _ = writeln!(
                    stderr,
                    "{} Error in {}: {}",
                    "✗".bright_red(),
                    where_,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::PipelineStarted { .. } => format!("[{}] pipeline:start", timestamp),
            LogEvent::GenerationStarted { iteration } => {
                format!("[{}] generate:start:{}", timestamp, iteration)
            }
            LogEvent::GenerationCompleted {
                iteration,
                code_lines,
                duration_secs,
            } => format!(
                "[{}] generate:done:{} lines={} {:.1}s",
                timestamp, iteration, code_lines, duration_secs
            ),
            LogEvent::EvaluationStarted { iteration } => {
                format!("[{}] evaluate:start:{}", timestamp, iteration)
            }
            LogEvent::EvaluationCompleted {
                iteration,
                score,
                valid,
                ..
            } => format!(
                "[{}] evaluate:done:{} score={:.1} valid={}",
                timestamp, iteration, score, valid
            ),
            LogEvent::OptimizationStarted {
                iteration,
                max_iterations,
                score,
            } => format!(
                "[{}] optimize:start:{}/{} score={:.1}",
                timestamp, iteration, max_iterations, score
            ),
            LogEvent::CodeUnchanged { iteration } => {
                format!("[{}] optimize:unchanged:{}", timestamp, iteration)
            }
            LogEvent::ScoreChanged {
                iteration,
                previous,
                current,
            } => format!(
                "[{}] optimize:score:{} {:.1}->{:.1}",
                timestamp, iteration, previous, current
            ),
            LogEvent::ThresholdMet {
                iteration, score, ..
            } => format!("[{}] threshold:met:{} {:.1}", timestamp, iteration, score),
            LogEvent::PipelineCompleted {
                success,
                final_score,
                iterations,
                duration_secs,
            } => format!(
                "[{}] pipeline:done success={} score={:.1} rounds={} {:.1}s",
                timestamp, success, final_score, iterations, duration_secs
            ),
            LogEvent::ErrorEncountered { iteration, error } => {
                format!("[{}] error:{}:{}", timestamp, iteration, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LogEvent::EvaluationCompleted {
            iteration: 1,
            score: 82.0,
            valid: true,
            errors: 0,
            warnings: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "evaluation_completed");
        assert_eq!(json["score"], 82.0);
    }

    #[test]
    fn test_file_logging_appends_timestamped_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path)
            .unwrap()
            .without_console();

        logger.log(&LogEvent::GenerationStarted { iteration: 0 });
        logger.log(&LogEvent::CodeUnchanged { iteration: 1 });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "generation_started");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding() {
        let padded = Logger::truncate_with_padding("short", 10, 12);
        assert_eq!(padded, "short      │");

        let truncated = Logger::truncate_with_padding("a much longer request", 10, 12);
        assert_eq!(truncated, "a much ... │");
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
