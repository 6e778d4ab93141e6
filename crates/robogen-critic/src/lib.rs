mod evaluation;
pub mod evaluator;
mod feedback;
mod prompts;

pub use evaluation::{EvaluationResult, PayloadError, MAX_SCORE, MIN_SCORE};
pub use evaluator::{Evaluator, LlmEvaluator};
pub use feedback::{build_optimization_prompt, format_feedback};
pub use prompts::{EvaluationMode, EvaluatorPrompts};
