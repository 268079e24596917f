//! Runtime error taxonomy
//!
//! Everything here is recoverable and scoped: a failed mutation leaves the
//! canvas unchanged, a failed trial is recorded on its own trace. The
//! service facade maps these into `success = false` envelopes with a stable
//! machine code per variant.

use sdlsim_core::SimError;
use thiserror::Error;

/// Convenience result type using [`CanvasError`]
pub type Result<T> = std::result::Result<T, CanvasError>;

/// Errors surfaced by canvas operations
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("canvas not found: {0}")]
    CanvasNotFound(String),

    #[error("canvas already exists: {0}")]
    CanvasExists(String),

    #[error("no file loaded")]
    NoFileLoaded,

    #[error("no active system")]
    NoActiveSystem,

    /// The external parser collaborator rejected the source
    #[error("parse failed: {0}")]
    Parse(String),

    /// The file resolver collaborator could not produce the source
    #[error("file resolution failed: {0}")]
    Resolve(String),

    #[error("generator not found: {0}")]
    GeneratorNotFound(String),

    #[error("generator already exists: {0}")]
    GeneratorExists(String),

    #[error("metric not found: {0}")]
    MetricNotFound(String),

    #[error("metric already exists: {0}")]
    MetricExists(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Structural engine failures (binding, targets, parameter paths,
    /// type coercion)
    #[error(transparent)]
    Sim(#[from] SimError),
}

impl CanvasError {
    /// Stable machine-readable code for service envelopes
    pub fn code(&self) -> &'static str {
        match self {
            CanvasError::CanvasNotFound(_) => "CANVAS_NOT_FOUND",
            CanvasError::CanvasExists(_) => "CANVAS_EXISTS",
            CanvasError::NoFileLoaded => "NO_FILE_LOADED",
            CanvasError::NoActiveSystem => "NO_ACTIVE_SYSTEM",
            CanvasError::Parse(_) => "PARSE_ERROR",
            CanvasError::Resolve(_) => "RESOLVE_ERROR",
            CanvasError::GeneratorNotFound(_) => "GENERATOR_NOT_FOUND",
            CanvasError::GeneratorExists(_) => "GENERATOR_EXISTS",
            CanvasError::MetricNotFound(_) => "METRIC_NOT_FOUND",
            CanvasError::MetricExists(_) => "METRIC_EXISTS",
            CanvasError::InvalidRequest(_) => "INVALID_REQUEST",
            CanvasError::Sim(SimError::InstanceBinding(_)) => "INSTANCE_BINDING_ERROR",
            CanvasError::Sim(SimError::TypeMismatch { .. }) => "TYPE_MISMATCH",
            CanvasError::Sim(SimError::UnknownSystem(_)) => "UNKNOWN_SYSTEM",
            CanvasError::Sim(SimError::UnknownComponent(_)) => "UNKNOWN_COMPONENT",
            CanvasError::Sim(SimError::UnknownParameter(_)) => "UNKNOWN_PARAMETER",
            CanvasError::Sim(SimError::UnknownTarget(_)) => "UNKNOWN_TARGET",
            CanvasError::Sim(SimError::Eval(_)) => "EVAL_ERROR",
        }
    }
}
