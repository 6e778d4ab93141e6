use std::time::Duration;
use thiserror::Error;

use crate::Phase;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Generation failed during {phase}: {source}")]
    Generation {
        phase: Phase,
        #[source]
        source: robogen_agent::AgentError,
    },

    #[error("No code was generated during {phase}")]
    NoCodeGenerated { phase: Phase },

    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: Phase, after: Duration },

    #[error("Run deadline exceeded during {phase}")]
    DeadlineExceeded { phase: Phase },

    #[error("{phase} panicked")]
    Panicked { phase: Phase },
}

impl PipelineError {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Generation { phase, .. }
            | PipelineError::NoCodeGenerated { phase }
            | PipelineError::Timeout { phase, .. }
            | PipelineError::DeadlineExceeded { phase }
            | PipelineError::Panicked { phase } => *phase,
        }
    }
}
