use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

const NO_EXPLANATION: &str = "No explanation provided.";

/// The evaluator's verdict on one code sample.
///
/// Values are only built through the constructors below, which normalize whatever the
/// backend returned: the score is always within `[0, 100]` and every list holds plain
/// strings. Once built a result is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct EvaluationResult {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
    score: f64,
    explanation: String,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl EvaluationResult {
    pub fn new(valid: bool, score: f64) -> Self {
        Self {
            valid,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            score: clamp_score(score),
            explanation: String::new(),
        }
    }

    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = errors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_warnings<I, S>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings = warnings.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Verdict for empty code; no backend is consulted
    pub fn no_code() -> Self {
        Self::new(false, MIN_SCORE)
            .with_errors(["No code provided for evaluation"])
            .with_explanation("No code was provided for evaluation.")
    }

    /// Verdict when the evaluation backend could not be reached or errored
    pub fn backend_failure(detail: impl std::fmt::Display) -> Self {
        Self::new(false, MIN_SCORE)
            .with_errors([format!("Evaluation error: {}", detail)])
            .with_explanation(format!("An error occurred during evaluation: {}", detail))
    }

    /// Verdict when the backend answered with something that is not an evaluation payload
    pub fn parse_failure(detail: impl std::fmt::Display) -> Self {
        Self::new(false, MIN_SCORE)
            .with_errors([format!("Failed to parse evaluation response: {}", detail)])
            .with_suggestions(["Retry code generation to obtain a well-formed evaluation."])
            .with_explanation("The evaluator returned a response that could not be parsed.")
    }

    /// Build a result from a loosely-typed payload, coercing every field.
    ///
    /// - `valid`: booleans, or the strings "true"/"false"; anything else is `false`
    /// - `errors`/`warnings`/`suggestions`: arrays are stringified item by item; a
    ///   non-empty scalar becomes a one-element list
    /// - `score`: numbers or numeric strings, clamped to `[0, 100]`; anything else is 0
    /// - `explanation`: defaults to "No explanation provided."
    pub fn from_payload(payload: &Value) -> Self {
        let field = |name: &str| payload.get(name).unwrap_or(&Value::Null);

        let explanation = match field("explanation") {
            Value::Null => NO_EXPLANATION.to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        Self {
            valid: coerce_bool(field("valid")),
            errors: coerce_list(field("errors")),
            warnings: coerce_list(field("warnings")),
            suggestions: coerce_list(field("suggestions")),
            score: coerce_score(field("score")),
            explanation,
        }
    }

    /// Parse raw backend text into a result. Tolerates a surrounding ```json fence.
    pub fn from_response_text(text: &str) -> Result<Self, PayloadError> {
        let body = strip_json_fence(text);
        let payload: Value = serde_json::from_str(body)?;

        if !payload.is_object() {
            return Err(PayloadError::NotAnObject(json_type_name(&payload)));
        }

        debug!("Parsed evaluation payload");
        Ok(Self::from_payload(&payload))
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Markdown summary for display
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("## Code Evaluation Score: {:.1}/100", self.score)];

        lines.push(if self.valid {
            "✅ **Valid code**".to_string()
        } else {
            "❌ **Invalid code**".to_string()
        });

        let sections = [
            ("Critical Errors", "🚫", &self.errors),
            ("Warnings", "⚠️", &self.warnings),
            ("Suggestions", "💡", &self.suggestions),
        ];
        for (title, icon, items) in sections {
            if items.is_empty() {
                continue;
            }
            lines.push(format!("\n### {}:", title));
            lines.extend(items.iter().map(|item| format!("- {} {}", icon, item)));
        }

        if !self.explanation.is_empty() {
            lines.push("\n### Explanation:".to_string());
            lines.push(self.explanation.clone());
        }

        lines.join("\n")
    }
}

impl From<Value> for EvaluationResult {
    fn from(payload: Value) -> Self {
        Self::from_payload(&payload)
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(MIN_SCORE, MAX_SCORE)
    } else {
        MIN_SCORE
    }
}

fn coerce_score(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.map(clamp_score).unwrap_or(MIN_SCORE)
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn coerce_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(stringify)
            .collect(),
        Value::Null | Value::Bool(false) => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::Object(map) if map.is_empty() => Vec::new(),
        other => vec![stringify(other)],
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
