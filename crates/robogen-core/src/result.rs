use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use robogen_agent::ScriptValidation;
use robogen_critic::EvaluationResult;

/// Number of change notes listed before the summary collapses the rest
const SUMMARY_CHANGES: usize = 3;

/// Everything a pipeline run produced, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub original_request: String,
    /// First generated code, never overwritten by optimization
    pub generated_code: String,
    /// Code current when the run ended
    pub optimized_code: String,
    /// Explanation extracted from the first generation
    pub explanation: String,
    /// Static checks over the first generation
    #[serde(default)]
    pub validation: ScriptValidation,
    pub evaluation_result: Option<EvaluationResult>,
    pub final_score: f64,
    pub success: bool,
    /// Optimization rounds executed
    pub iterations: usize,
    pub changes: Vec<String>,
    /// Wall time in seconds
    pub duration: f64,
    /// Raw text of the last generation call
    pub raw_response: String,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PipelineResult {
    pub(crate) fn empty(user_request: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            original_request: user_request.to_string(),
            generated_code: String::new(),
            optimized_code: String::new(),
            explanation: String::new(),
            validation: ScriptValidation::default(),
            evaluation_result: None,
            final_score: 0.0,
            success: false,
            iterations: 0,
            changes: Vec::new(),
            duration: 0.0,
            raw_response: String::new(),
            error: None,
            timestamp,
        }
    }

    /// The code to hand to the user: optimized if present, else the first generation
    pub fn final_code(&self) -> &str {
        if self.optimized_code.is_empty() {
            &self.generated_code
        } else {
            &self.optimized_code
        }
    }

    pub fn has_code(&self) -> bool {
        !self.final_code().trim().is_empty()
    }

    /// Plain-text report of the run
    pub fn summary(&self, threshold: f64) -> String {
        let mut out = String::new();

        out.push_str("Code Generation Summary\n");
        out.push_str("=======================\n");
        out.push_str(&format!("Request: {}\n", self.original_request));
        out.push_str(&format!(
            "Timestamp: {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!("Duration: {:.2} seconds\n", self.duration));
        out.push_str(&format!(
            "Final score: {:.1}/100 (threshold {:.1})\n",
            self.final_score, threshold
        ));
        out.push_str(&format!(
            "Success: {}\n",
            if self.success { "yes" } else { "no" }
        ));
        out.push_str(&format!("Optimization iterations: {}\n", self.iterations));

        if let Some(evaluation) = &self.evaluation_result {
            out.push_str(&format!(
                "Evaluation: {} errors, {} warnings, {} suggestions\n",
                evaluation.errors().len(),
                evaluation.warnings().len(),
                evaluation.suggestions().len()
            ));
        }

        if let Some(error) = &self.error {
            out.push_str(&format!("Error: {}\n", error));
        }

        if !self.validation.errors.is_empty() || !self.validation.warnings.is_empty() {
            out.push_str("\nStatic checks:\n");
            for error in &self.validation.errors {
                out.push_str(&format!("- error: {}\n", error));
            }
            for warning in &self.validation.warnings {
                out.push_str(&format!("- warning: {}\n", warning));
            }
        }

        if !self.changes.is_empty() {
            out.push_str("\nOptimization changes:\n");
            for change in self.changes.iter().take(SUMMARY_CHANGES) {
                out.push_str(&format!("- {}\n", change));
            }
            if self.changes.len() > SUMMARY_CHANGES {
                out.push_str(&format!(
                    "... and {} more\n",
                    self.changes.len() - SUMMARY_CHANGES
                ));
            }
        }

        out.push_str("\nFinal code:\n```python\n");
        out.push_str(self.final_code());
        out.push_str("\n```\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PipelineResult {
        let mut result = PipelineResult::empty("wave the right arm", Utc::now());
        result.generated_code = "reachy.turn_on()".to_string();
        result.final_score = 82.0;
        result.success = true;
        result
    }

    #[test]
    fn test_final_code_falls_back_to_generated() {
        let mut result = sample();
        assert_eq!(result.final_code(), "reachy.turn_on()");

        result.optimized_code = "reachy.turn_off_smoothly()".to_string();
        assert_eq!(result.final_code(), "reachy.turn_off_smoothly()");
        assert!(result.has_code());

        let empty = PipelineResult::empty("noop", Utc::now());
        assert!(!empty.has_code());
    }

    #[test]
    fn test_summary_truncates_changes() {
        let mut result = sample();
        result.changes = (1..=5)
            .map(|n| format!("Iteration {}: code updated from evaluation feedback", n))
            .collect();

        let summary = result.summary(75.0);
        assert!(summary.contains("Request: wave the right arm"));
        assert!(summary.contains("Final score: 82.0/100 (threshold 75.0)"));
        assert!(summary.contains("Iteration 3:"));
        assert!(!summary.contains("Iteration 4:"));
        assert!(summary.contains("... and 2 more"));
        assert!(summary.ends_with("```python\nreachy.turn_on()\n```\n"));
    }

    #[test]
    fn test_summary_lists_static_checks() {
        let mut result = sample();
        result.validation = ScriptValidation {
            valid: false,
            errors: vec!["Potentially unsafe operation detected: os.system".to_string()],
            warnings: vec!["No finally block found for ensuring cleanup operations".to_string()],
        };

        let summary = result.summary(75.0);
        assert!(summary.contains("Static checks:"));
        assert!(summary.contains("- error: Potentially unsafe operation detected: os.system"));
        assert!(summary.contains("- warning: No finally block found"));

        assert!(!sample().summary(75.0).contains("Static checks:"));
    }

    #[test]
    fn test_serializes_with_optional_evaluation() {
        let mut result = sample();
        result.evaluation_result = Some(EvaluationResult::new(true, 82.0));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["final_score"], 82.0);
        assert_eq!(json["evaluation_result"]["score"], 82.0);
        assert!(json["error"].is_null());
        assert_eq!(json["validation"]["valid"], false);

        let back: PipelineResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.evaluation_result.unwrap().score(), 82.0);
    }
}
