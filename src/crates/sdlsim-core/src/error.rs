//! Error types for the simulation engine
//!
//! Two layers of failure exist in the engine and they are deliberately kept
//! apart:
//!
//! - [`SimError`] covers structural operations: binding a system, resolving a
//!   parameter path, coercing an override. These surface to the caller and
//!   leave engine state untouched.
//! - [`EvalError`] covers faults inside a single trial: division by zero,
//!   unknown identifiers, sampling an empty distribution. A trial that hits
//!   one aborts, records a failed exit event, and never affects sibling
//!   trials.

use thiserror::Error;

/// Convenience result type using [`SimError`]
pub type Result<T> = std::result::Result<T, SimError>;

/// Structural errors raised outside of trial evaluation
#[derive(Debug, Error)]
pub enum SimError {
    /// A `uses` dependency or instance reference did not resolve during binding
    #[error("instance binding failed: {0}")]
    InstanceBinding(String),

    /// The requested system declaration does not exist in the active file
    #[error("unknown system: {0}")]
    UnknownSystem(String),

    /// The instance declaration names a component type that is neither a
    /// built-in nor declared in the file
    #[error("unknown component type: {0}")]
    UnknownComponent(String),

    /// A dotted parameter path did not resolve to an instance parameter
    #[error("unknown parameter path: {0}")]
    UnknownParameter(String),

    /// A value written through the override path could not be coerced to the
    /// declared parameter type
    #[error("type mismatch for {path}: expected {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// A target of the form `instance.method` did not resolve
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// Trial evaluation failed
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// Faults scoped to a single trial
///
/// These are recoverable: the trial is recorded as failed and the run
/// continues. They are `Clone + PartialEq` because a failed result is itself
/// a [`Value`](crate::value::Value) variant that flows through traces and
/// result series.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("unknown instance: {0}")]
    UnknownInstance(String),

    #[error("unknown method: {instance}.{method}")]
    UnknownMethod { instance: String, method: String },

    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot sample an empty distribution")]
    EmptyDistribution,

    #[error("wrong number of arguments to {target}: expected {expected}, got {found}")]
    Arity {
        target: String,
        expected: usize,
        found: usize,
    },

    #[error("wait target is not a task handle")]
    NotAHandle,

    #[error("task handle already joined")]
    AlreadyJoined,

    #[error("child task failed: {0}")]
    ChildFailed(String),

    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("loop iteration limit of {0} exceeded")]
    LoopLimitExceeded(u64),
}
