//! Method-body evaluation
//!
//! Two modes share the resolved AST: the sampling evaluator
//! ([`Interpreter`]) runs one stochastic trial per invocation, and the
//! branch walker ([`enumerate_paths`]) expands every `sample`/`if` branch
//! into a probability-labelled tree.

mod eval;
mod paths;

pub use eval::{Interpreter, InterpreterConfig};
pub use paths::{enumerate_paths, PathNode, PathNodeKind};
