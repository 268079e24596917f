//! Steady-state flow rates over the call graph
//!
//! Generators impose boundary arrival rates on entry methods; the solver
//! propagates them along probability-weighted call edges to every
//! `(instance, method)` node. The computed rates feed queueing-model
//! components through their `ArrivalRate` parameter.

mod graph;
mod solver;

pub use graph::{static_graph, FlowEdge, FlowGraph};
pub use solver::{runtime_graph, solve, FlowConfig, FlowOutcome, FlowStatus, FlowStrategy};
