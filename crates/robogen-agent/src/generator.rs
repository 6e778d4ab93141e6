use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    extract_code_and_explanation, validate_script, AgentError, ChatBackend, ChatMessage,
    ChatRequest, Generation, Generator, GeneratorPrompts, ModelSettings, Role,
};

/// Number of prior turns kept when a history is supplied
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Generator backed by a chat-completions model
pub struct LlmGenerator {
    backend: Arc<dyn ChatBackend>,
    settings: ModelSettings,
    system_prompt: String,
    history_window: usize,
}

impl LlmGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ModelSettings) -> Self {
        Self {
            backend,
            settings,
            system_prompt: GeneratorPrompts::system_prompt(""),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Embed an SDK API summary into the system prompt
    pub fn with_api_summary(mut self, api_summary: &str) -> Self {
        self.system_prompt = GeneratorPrompts::system_prompt(api_summary);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// System prompt, then the most recent history turns, then the new instruction
    fn build_messages(&self, prompt: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let turns: Vec<&ChatMessage> = history.iter().filter(|m| m.role != Role::System).collect();
        let skip = turns.len().saturating_sub(self.history_window);

        let mut messages = Vec::with_capacity(turns.len() - skip + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(turns.into_iter().skip(skip).cloned());
        messages.push(ChatMessage::user(prompt));
        messages
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<Generation, AgentError> {
        let messages = self.build_messages(prompt, history);

        debug!(
            model = %self.settings.model,
            prompt_len = prompt.len(),
            history = history.len(),
            "Generating code"
        );

        let request = ChatRequest::new(self.settings.model.clone(), messages)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);
        let raw_response = self.backend.complete(&request).await?;

        let extracted = extract_code_and_explanation(&raw_response);
        let validation = validate_script(&extracted.code);

        info!(
            code_len = extracted.code.len(),
            unterminated_fence = extracted.unterminated_fence,
            static_errors = validation.errors.len(),
            static_warnings = validation.warnings.len(),
            "Generation completed"
        );
        for error in &validation.errors {
            debug!(%error, "Static check error");
        }
        for warning in &validation.warnings {
            debug!(%warning, "Static check warning");
        }

        Ok(Generation {
            code: extracted.code,
            explanation: extracted.explanation,
            raw_response,
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBackend {
        reply: String,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl RecordingBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &ChatRequest) -> Result<String, AgentError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_generate_extracts_code() {
        let backend = RecordingBackend::new("Turns the head.\n```python\nreachy.head.turn_on()\n```");
        let generator = LlmGenerator::new(backend.clone(), ModelSettings::new("gpt-4o"));

        let generation = generator.generate("turn the head left", &[]).await.unwrap();
        assert_eq!(generation.code, "reachy.head.turn_on()");
        assert_eq!(generation.explanation, "Turns the head.");
        assert!(generation.raw_response.contains("```python"));

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o");
        assert!(!requests[0].json_response);
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[1].content, "turn the head left");
    }

    #[tokio::test]
    async fn test_generation_carries_static_checks() {
        let backend = RecordingBackend::new("```python\nreachy.head.look_at(0.5, 0.2, 0.0)\n```");
        let generator = LlmGenerator::new(backend, ModelSettings::default());

        let generation = generator.generate("look forward", &[]).await.unwrap();
        assert!(generation
            .validation
            .warnings
            .iter()
            .any(|w| w.contains("Missing reachy.turn_on() call")));
        assert!(generation.validation.errors.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_windowed_and_newest_instruction_last() {
        let backend = RecordingBackend::new("no code here");
        let generator =
            LlmGenerator::new(backend.clone(), ModelSettings::default()).with_history_window(2);

        let history = vec![
            ChatMessage::system("ignored"),
            ChatMessage::user("first"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("second"),
            ChatMessage::assistant("second answer"),
        ];
        let generation = generator.generate("third", &history).await.unwrap();
        assert!(!generation.has_code());

        let requests = backend.requests.lock().unwrap();
        let contents: Vec<&str> = requests[0]
            .messages
            .iter()
            .skip(1)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["second", "second answer", "third"]);
        assert_eq!(
            requests[0].messages.iter().filter(|m| m.role == Role::System).count(),
            1
        );
    }
}
