use futures::FutureExt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use robogen_agent::{ChatMessage, Generation, Generator};
use robogen_critic::{build_optimization_prompt, format_feedback, EvaluationResult, Evaluator};
use robogen_logging::{LogEvent, Logger, SessionWriter};

use crate::context::{CallLimit, Phase, RunContext};
use crate::{PipelineConfig, PipelineError, PipelineResult};

/// Observer notified with a short status line at each phase transition
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Runs the generate, evaluate and optimize loop for one request at a time.
///
/// The pipeline only holds shared collaborators and immutable configuration, so one
/// instance can serve concurrent runs.
pub struct CodeGenerationPipeline {
    generator: Arc<dyn Generator>,
    evaluator: Arc<dyn Evaluator>,
    config: PipelineConfig,
    progress: Option<ProgressCallback>,
    logger: Option<Arc<Logger>>,
    session: Option<Arc<SessionWriter>>,
}

impl CodeGenerationPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            evaluator,
            config,
            progress: None,
            logger: None,
            session: None,
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_session_writer(mut self, session: Arc<SessionWriter>) -> Self {
        self.session = Some(session);
        self
    }

    /// Generate code for `user_request`, evaluate it and, when `optimize` is set, refine it
    /// from evaluation feedback until it meets the threshold or the round budget runs out.
    ///
    /// Never fails: problems end the run early and are reported through
    /// [`PipelineResult::success`] and [`PipelineResult::error`].
    pub async fn generate_code(
        &self,
        user_request: &str,
        history: &[ChatMessage],
        optimize: bool,
    ) -> PipelineResult {
        let mut ctx = RunContext::new(user_request, self.config.run_timeout);

        info!(
            generator = self.generator.name(),
            evaluator = self.evaluator.name(),
            optimize,
            threshold = self.config.evaluation_threshold,
            "Starting code generation"
        );
        self.log(&LogEvent::PipelineStarted {
            request: user_request.to_string(),
            optimize,
            threshold: self.config.evaluation_threshold,
            max_iterations: self.config.max_iterations,
        });
        if let Some(session) = &self.session {
            session.write_start(
                user_request,
                self.config.evaluation_threshold,
                self.config.max_iterations,
                optimize,
            );
        }

        if let Err(e) = self.run_initial(&mut ctx, history).await {
            self.record_failure(&mut ctx, &e);
        } else if ctx.current_score() >= self.config.evaluation_threshold {
            self.log(&LogEvent::ThresholdMet {
                iteration: 0,
                score: ctx.current_score(),
                threshold: self.config.evaluation_threshold,
            });
        } else if optimize {
            self.optimize(&mut ctx).await;
        }

        let result = ctx.finish(self.config.evaluation_threshold);

        info!(
            success = result.success,
            final_score = result.final_score,
            iterations = result.iterations,
            duration_secs = result.duration,
            "Code generation finished"
        );
        self.log(&LogEvent::PipelineCompleted {
            success: result.success,
            final_score: result.final_score,
            iterations: result.iterations,
            duration_secs: result.duration,
        });
        if let Some(session) = &self.session {
            session.write_end(
                result.success,
                result.final_score,
                result.iterations,
                result.duration,
                result.error.as_deref(),
            );
        }

        result
    }

    /// First generation and its evaluation
    async fn run_initial(
        &self,
        ctx: &mut RunContext,
        history: &[ChatMessage],
    ) -> Result<(), PipelineError> {
        self.notify("Generating initial code...");
        let generation = self
            .timed_generate(ctx, Phase::InitialGeneration, ctx.request(), history)
            .await?;
        let has_code = generation.has_code();
        ctx.record_initial_generation(generation);
        if !has_code {
            return Err(PipelineError::NoCodeGenerated {
                phase: Phase::InitialGeneration,
            });
        }

        self.notify("Evaluating generated code...");
        let evaluation = self
            .timed_evaluate(ctx, Phase::InitialEvaluation, ctx.current_code())
            .await?;
        ctx.record_initial_evaluation(evaluation);
        self.record_iteration(ctx, 0, None);

        Ok(())
    }

    async fn optimize(&self, ctx: &mut RunContext) {
        let max = self.config.max_iterations;

        for round in 1..=max {
            let Some(current) = ctx.current_evaluation() else {
                break;
            };
            self.notify(&format!("Optimizing code (iteration {}/{})...", round, max));
            self.log(&LogEvent::OptimizationStarted {
                iteration: round,
                max_iterations: max,
                score: current.score(),
            });

            let feedback = format_feedback(current);
            let prompt = build_optimization_prompt(ctx.request(), ctx.current_code(), &feedback);

            // Rounds run from the feedback prompt alone, without the caller's history
            let Generation {
                code, raw_response, ..
            } = match self
                .timed_generate(ctx, Phase::Optimization(round), &prompt, &[])
                .await
            {
                Ok(generation) => generation,
                Err(e) => {
                    self.record_failure(ctx, &e);
                    break;
                }
            };
            ctx.record_raw_response(raw_response);

            if code.trim().is_empty() || code == ctx.current_code() {
                info!(round, "Optimization produced no new code, stopping");
                self.log(&LogEvent::CodeUnchanged { iteration: round });
                ctx.record_unchanged_round();
                break;
            }

            self.notify(&format!(
                "Re-evaluating optimized code (iteration {}/{})...",
                round, max
            ));
            let evaluation = match self
                .timed_evaluate(ctx, Phase::ReEvaluation(round), &code)
                .await
            {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    self.record_failure(ctx, &e);
                    break;
                }
            };

            let previous = ctx.current_score();
            let score = evaluation.score();
            let note = ctx.commit_round(round, code, evaluation).to_string();
            self.record_iteration(ctx, round, Some(&note));

            self.log(&LogEvent::ScoreChanged {
                iteration: round,
                previous,
                current: score,
            });

            if score > previous {
                info!(round, previous, score, "Score improved");
                if score >= self.config.evaluation_threshold {
                    self.log(&LogEvent::ThresholdMet {
                        iteration: round,
                        score,
                        threshold: self.config.evaluation_threshold,
                    });
                    break;
                }
            } else {
                // The newer code is kept even when it scores lower
                info!(round, previous, score, "Score did not improve");
            }
        }
    }

    async fn timed_generate(
        &self,
        ctx: &RunContext,
        phase: Phase,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<Generation, PipelineError> {
        let iteration = phase.iteration();
        self.log(&LogEvent::GenerationStarted { iteration });
        let started = Instant::now();

        let generation = self
            .bounded(ctx, phase, self.generator.generate(prompt, history))
            .await?
            .map_err(|source| PipelineError::Generation { phase, source })?;

        debug!(
            %phase,
            code_len = generation.code.len(),
            explanation_len = generation.explanation.len(),
            "Generation returned"
        );
        self.log(&LogEvent::GenerationCompleted {
            iteration,
            code_lines: generation.code.lines().count(),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        Ok(generation)
    }

    async fn timed_evaluate(
        &self,
        ctx: &RunContext,
        phase: Phase,
        code: &str,
    ) -> Result<EvaluationResult, PipelineError> {
        let iteration = phase.iteration();
        self.log(&LogEvent::EvaluationStarted { iteration });

        let evaluation = self
            .bounded(ctx, phase, self.evaluator.evaluate(code, ctx.request()))
            .await?;

        self.log(&LogEvent::EvaluationCompleted {
            iteration,
            score: evaluation.score(),
            valid: evaluation.valid(),
            errors: evaluation.errors().len(),
            warnings: evaluation.warnings().len(),
        });

        Ok(evaluation)
    }

    /// Apply the per-call timeout and the remaining run budget to a collaborator call.
    ///
    /// A panic inside the call is caught and reported as [`PipelineError::Panicked`].
    async fn bounded<F, T>(&self, ctx: &RunContext, phase: Phase, call: F) -> Result<T, PipelineError>
    where
        F: Future<Output = T>,
    {
        let call = AssertUnwindSafe(call).catch_unwind();

        let outcome = match ctx.call_limit(self.config.call_timeout) {
            None => call.await,
            Some(CallLimit::PerCall(after)) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| PipelineError::Timeout { phase, after })?,
            Some(CallLimit::Deadline(remaining)) => {
                if remaining.is_zero() {
                    return Err(PipelineError::DeadlineExceeded { phase });
                }
                tokio::time::timeout(remaining, call)
                    .await
                    .map_err(|_| PipelineError::DeadlineExceeded { phase })?
            }
        };

        outcome.map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            debug!(%phase, panic = %message, "Collaborator panicked");
            PipelineError::Panicked { phase }
        })
    }

    fn record_failure(&self, ctx: &mut RunContext, error: &PipelineError) {
        warn!(
            error = %error,
            phase = %error.phase(),
            elapsed_secs = ctx.elapsed().as_secs_f64(),
            "Pipeline step failed"
        );
        self.log(&LogEvent::ErrorEncountered {
            iteration: error.phase().iteration(),
            error: error.to_string(),
        });
        ctx.record_error(error);
    }

    /// Write the current code and its evaluation to the session file
    fn record_iteration(&self, ctx: &RunContext, iteration: usize, change_note: Option<&str>) {
        if let (Some(session), Some(evaluation)) = (&self.session, ctx.current_evaluation()) {
            session.write_iteration(
                iteration,
                ctx.current_code(),
                evaluation.score(),
                evaluation.valid(),
                evaluation.errors(),
                evaluation.warnings(),
                change_note,
            );
        }
    }

    fn log(&self, event: &LogEvent) {
        if let Some(logger) = &self.logger {
            logger.log(event);
        }
    }

    fn notify(&self, status: &str) {
        if let Some(callback) = &self.progress {
            if catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
                warn!(status, "Progress callback panicked");
            }
        }
    }
}
