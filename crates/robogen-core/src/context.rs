use chrono::Utc;
use std::time::{Duration, Instant};

use robogen_agent::Generation;
use robogen_critic::EvaluationResult;

use crate::{PipelineError, PipelineResult};

/// Step of a pipeline run, used for errors and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitialGeneration,
    InitialEvaluation,
    Optimization(usize),
    ReEvaluation(usize),
}

impl Phase {
    /// 0 for the initial pass, N for optimization round N
    pub fn iteration(&self) -> usize {
        match self {
            Phase::InitialGeneration | Phase::InitialEvaluation => 0,
            Phase::Optimization(n) | Phase::ReEvaluation(n) => *n,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::InitialGeneration => write!(f, "initial generation"),
            Phase::InitialEvaluation => write!(f, "initial evaluation"),
            Phase::Optimization(n) => write!(f, "optimization round {}", n),
            Phase::ReEvaluation(n) => write!(f, "re-evaluation in round {}", n),
        }
    }
}

/// How long the next collaborator call may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallLimit {
    /// Bounded by the per-call timeout
    PerCall(Duration),
    /// Bounded by what is left of the run deadline
    Deadline(Duration),
}

/// Mutable state of a single pipeline run
#[derive(Debug)]
pub(crate) struct RunContext {
    started_at: Instant,
    deadline: Option<Instant>,
    result: PipelineResult,
    current_code: String,
    current_evaluation: Option<EvaluationResult>,
}

impl RunContext {
    pub fn new(user_request: &str, run_timeout: Option<Duration>) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: run_timeout.map(|t| started_at + t),
            result: PipelineResult::empty(user_request, Utc::now()),
            current_code: String::new(),
            current_evaluation: None,
        }
    }

    pub fn request(&self) -> &str {
        &self.result.original_request
    }

    pub fn current_code(&self) -> &str {
        &self.current_code
    }

    pub fn current_evaluation(&self) -> Option<&EvaluationResult> {
        self.current_evaluation.as_ref()
    }

    pub fn current_score(&self) -> f64 {
        self.current_evaluation
            .as_ref()
            .map(EvaluationResult::score)
            .unwrap_or_default()
    }

    /// Pick the tighter of the per-call timeout and the remaining run budget
    pub fn call_limit(&self, call_timeout: Option<Duration>) -> Option<CallLimit> {
        let remaining = self
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()));

        match (call_timeout, remaining) {
            (None, None) => None,
            (Some(t), None) => Some(CallLimit::PerCall(t)),
            (None, Some(r)) => Some(CallLimit::Deadline(r)),
            (Some(t), Some(r)) if t <= r => Some(CallLimit::PerCall(t)),
            (Some(_), Some(r)) => Some(CallLimit::Deadline(r)),
        }
    }

    /// Record the first generation; it seeds the current code
    pub fn record_initial_generation(&mut self, generation: Generation) {
        self.current_code = generation.code.clone();
        self.result.generated_code = generation.code;
        self.result.explanation = generation.explanation;
        self.result.raw_response = generation.raw_response;
        self.result.validation = generation.validation;
    }

    pub fn record_initial_evaluation(&mut self, evaluation: EvaluationResult) {
        self.current_evaluation = Some(evaluation);
    }

    /// Keep the latest raw response even when the round ends early
    pub fn record_raw_response(&mut self, raw_response: String) {
        self.result.raw_response = raw_response;
    }

    /// Count a round whose generation returned the current code unchanged
    pub fn record_unchanged_round(&mut self) {
        self.result.iterations += 1;
    }

    /// Adopt a round's code and its evaluation, whether or not the score improved.
    ///
    /// Returns the change note recorded for the round.
    pub fn commit_round(
        &mut self,
        round: usize,
        code: String,
        evaluation: EvaluationResult,
    ) -> &str {
        self.current_code = code;
        self.current_evaluation = Some(evaluation);
        self.result.iterations += 1;
        self.result
            .changes
            .push(format!("Iteration {}: code updated from evaluation feedback", round));
        self.result.changes.last().map(String::as_str).unwrap_or_default()
    }

    pub fn record_error(&mut self, error: &PipelineError) {
        self.result.error = Some(error.to_string());
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Assemble the final result
    pub fn finish(mut self, threshold: f64) -> PipelineResult {
        self.result.final_score = self.current_score();
        self.result.success = self.current_evaluation.is_some() && self.result.final_score >= threshold;
        self.result.optimized_code = self.current_code;
        self.result.evaluation_result = self.current_evaluation;
        self.result.duration = self.started_at.elapsed().as_secs_f64();
        self.result
    }
}
