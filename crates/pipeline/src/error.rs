//! Error types for the pipeline runtime.
//!
//! All errors implement `std::error::Error` via the `thiserror` crate.
//! User-supplied code (processors, sources, sinks) reports failures as
//! boxed errors which the runtime wraps with positional context before
//! publishing them on the shared error channel.

use std::fmt;

use thiserror::Error;

/// Boxed error type produced by user-supplied processors, sources and sinks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience result type using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors published by pipeline workers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage processor failed. Carries the position of the stage in
    /// the pipeline.
    #[error("pipeline stage {stage}: {source}")]
    Stage {
        /// Zero-based position of the failing stage.
        stage: usize,
        /// The processor's error.
        source: BoxError,
    },

    /// The payload source reported an error after iteration stopped.
    #[error("pipeline source: {0}")]
    Source(#[source] BoxError),

    /// The sink rejected a payload.
    #[error("pipeline sink: {0}")]
    Sink(#[source] BoxError),

    /// A runner was constructed with an invalid configuration.
    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    /// The supplied context was cancelled before the run completed.
    #[error("pipeline cancelled")]
    Cancelled,
}

/// Accumulates every error published during a single pipeline run.
///
/// A run can surface more than one failure (for example a stage error
/// followed by the source error it provoked), so `process` collects them
/// all instead of returning only the first.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<PipelineError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: PipelineError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The collected errors, in the order they were published.
    pub fn errors(&self) -> &[PipelineError] {
        &self.errors
    }

    /// Converts the accumulator into a result: `Ok` when nothing was
    /// collected, the accumulator itself otherwise.
    pub fn into_result(self) -> std::result::Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", self.errors[0]),
            n => {
                writeln!(f, "{n} errors occurred:")?;
                for err in &self.errors {
                    writeln!(f, "  * {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_carries_position() {
        let err = PipelineError::Stage {
            stage: 5,
            source: "boom".into(),
        };
        assert_eq!(err.to_string(), "pipeline stage 5: boom");
    }

    #[test]
    fn multi_error_display_single() {
        let mut merr = MultiError::new();
        merr.push(PipelineError::Source("dead feed".into()));
        assert_eq!(merr.to_string(), "pipeline source: dead feed");
    }

    #[test]
    fn multi_error_display_several() {
        let mut merr = MultiError::new();
        merr.push(PipelineError::Stage {
            stage: 0,
            source: "a".into(),
        });
        merr.push(PipelineError::Cancelled);
        let rendered = merr.to_string();
        assert!(rendered.contains("2 errors occurred"));
        assert!(rendered.contains("pipeline stage 0: a"));
        assert!(rendered.contains("pipeline cancelled"));
    }

    #[test]
    fn empty_accumulator_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
    }
}
