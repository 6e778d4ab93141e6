use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use robogen_agent::{ChatBackend, ChatMessage, ChatRequest, ModelSettings};

use crate::{EvaluationMode, EvaluationResult, EvaluatorPrompts};

/// Produces a structured verdict for a code sample.
///
/// Implementations never fail: backend and parse problems are folded into the returned
/// [`EvaluationResult`].
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Human-readable name of the evaluator
    fn name(&self) -> &str;

    /// Evaluate `code` against the request it was written for
    async fn evaluate(&self, code: &str, user_request: &str) -> EvaluationResult;
}

/// Evaluator backed by a chat-completions model answering in JSON
pub struct LlmEvaluator {
    backend: Arc<dyn ChatBackend>,
    settings: ModelSettings,
    mode: EvaluationMode,
}

impl LlmEvaluator {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ModelSettings) -> Self {
        Self {
            backend,
            settings,
            mode: EvaluationMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    fn build_request(&self, code: &str, user_request: &str) -> ChatRequest {
        let messages = vec![
            ChatMessage::system(EvaluatorPrompts::system_prompt(self.mode)),
            ChatMessage::user(EvaluatorPrompts::evaluation_request(user_request, code)),
        ];

        ChatRequest::new(self.settings.model.clone(), messages)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .json()
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn evaluate(&self, code: &str, user_request: &str) -> EvaluationResult {
        if code.trim().is_empty() {
            debug!("Skipping evaluation of empty code");
            return EvaluationResult::no_code();
        }

        debug!(
            model = %self.settings.model,
            mode = %self.mode,
            code_len = code.len(),
            "Running code evaluation"
        );

        let request = self.build_request(code, user_request);
        let text = match self.backend.complete(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Evaluation backend failed");
                return EvaluationResult::backend_failure(e);
            }
        };

        match EvaluationResult::from_response_text(&text) {
            Ok(result) => {
                info!(
                    score = result.score(),
                    valid = result.valid(),
                    errors = result.errors().len(),
                    warnings = result.warnings().len(),
                    "Evaluation completed"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, response_len = text.len(), "Could not parse evaluation response");
                EvaluationResult::parse_failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robogen_agent::AgentError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        reply: Result<String, u16>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
            assert!(request.json_response);
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(AgentError::Api {
                    status: *status,
                    body: "upstream unavailable".to_string(),
                }),
            }
        }
    }

    fn evaluator(backend: Arc<ScriptedBackend>) -> LlmEvaluator {
        LlmEvaluator::new(backend, ModelSettings::new("gpt-4o-mini").with_temperature(0.1))
    }

    #[tokio::test]
    async fn test_empty_code_skips_backend() {
        let backend = ScriptedBackend::ok("{}");
        let result = evaluator(backend.clone()).evaluate("", "wave hello").await;

        assert!(!result.valid());
        assert_eq!(result.score(), 0.0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        let result = evaluator(backend.clone()).evaluate(" \n\t", "wave hello").await;
        assert_eq!(result.score(), 0.0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_well_formed_response() {
        let backend = ScriptedBackend::ok(
            r#"{"valid": true, "errors": [], "warnings": ["Add a docstring"], "suggestions": [], "score": 150, "explanation": "Good"}"#,
        );
        let result = evaluator(backend.clone()).evaluate("reachy.turn_on()", "power on").await;

        assert!(result.valid());
        assert_eq!(result.score(), 100.0);
        assert_eq!(result.warnings(), ["Add a docstring"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_parse_failure() {
        let backend = ScriptedBackend::ok("{\"valid\": true, \"score\": 9");
        let result = evaluator(backend).evaluate("reachy.turn_on()", "power on").await;

        assert!(!result.valid());
        assert_eq!(result.score(), 0.0);
        assert!(result.errors()[0].contains("Failed to parse evaluation response"));
        assert!(!result.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_is_recovered() {
        let backend = ScriptedBackend::failing(503);
        let result = evaluator(backend).evaluate("reachy.turn_on()", "power on").await;

        assert!(!result.valid());
        assert_eq!(result.score(), 0.0);
        assert!(result.errors()[0].starts_with("Evaluation error: API error 503"));
    }

    #[test]
    fn test_request_uses_mode_and_settings() {
        let evaluator = evaluator(ScriptedBackend::ok("{}")).with_mode(EvaluationMode::Detailed);
        let request = evaluator.build_request("x = 1", "do something");

        assert_eq!(request.model, "gpt-4o-mini");
        assert!(request.json_response);
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert!(request.messages[0].content.contains("Detailed Evaluation Mode"));
        assert!(request.messages[1].content.contains("x = 1"));
    }
}
