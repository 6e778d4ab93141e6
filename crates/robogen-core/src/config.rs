use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_THRESHOLD: f64 = 75.0;
pub const DEFAULT_MAX_ITERATIONS: usize = 2;

/// Settings that shape one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum score (0-100) for a run to count as successful
    pub evaluation_threshold: f64,
    /// Maximum number of optimization rounds
    pub max_iterations: usize,
    /// Limit for each generator or evaluator call
    pub call_timeout: Option<Duration>,
    /// Limit for the whole run
    pub run_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evaluation_threshold: DEFAULT_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout: None,
            run_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.evaluation_threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.evaluation_threshold, 75.0);
        assert_eq!(config.max_iterations, 2);
        assert!(config.call_timeout.is_none());
        assert!(config.run_timeout.is_none());
    }

    #[test]
    fn test_builders() {
        let config = PipelineConfig::default()
            .with_threshold(90.0)
            .with_max_iterations(5)
            .with_call_timeout(Duration::from_secs(20));
        assert_eq!(config.evaluation_threshold, 90.0);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.call_timeout, Some(Duration::from_secs(20)));
    }
}
