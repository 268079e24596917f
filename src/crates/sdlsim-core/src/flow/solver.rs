//! Fixed-point flow solver
//!
//! Given generator rates as boundary conditions on `(instance, method)`
//! nodes, the solver propagates per-edge call rates through the flow graph
//! until the largest change drops below epsilon or the iteration cap hits.
//! The contraction converges whenever no method calls itself transitively
//! with expected multiplicity ≥ 1; past the cap the solve reports
//! `Diverged` with the partial rates.

use super::graph::FlowGraph;
use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::params::OverrideMap;
use crate::system::SystemGraph;
use crate::trace::{CollectingTracer, TraceKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How edge probabilities are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStrategy {
    /// Declared weights only; never executes
    Static,
    /// Empirical: evaluates entry methods and measures branch-take ratios
    Runtime,
}

/// Solve status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Converged,
    Diverged,
}

/// Solver tuning knobs
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub epsilon: f64,
    pub max_iterations: u32,
    /// Trials per entry method for the runtime strategy
    pub runtime_trials: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            epsilon: 1e-6,
            max_iterations: 100,
            runtime_trials: 100,
        }
    }
}

/// Result of one flow solve
#[derive(Debug, Clone, Serialize)]
pub struct FlowOutcome {
    /// Steady-state arrival rate per `instance.method` node, in rps
    pub rates: HashMap<String, f64>,
    pub iterations: u32,
    pub status: FlowStatus,
    pub warnings: Vec<String>,
}

/// Propagate boundary rates through the graph by fixed-point iteration.
pub fn solve(
    graph: &FlowGraph,
    boundary: &HashMap<String, f64>,
    config: &FlowConfig,
) -> FlowOutcome {
    let mut nodes = graph.nodes();
    for node in boundary.keys() {
        if !nodes.contains(node) {
            nodes.push(node.clone());
        }
    }

    let mut rates: HashMap<String, f64> = nodes
        .iter()
        .map(|n| (n.clone(), boundary.get(n).copied().unwrap_or(0.0)))
        .collect();

    let mut warnings = Vec::new();
    let mut iterations = 0;
    let mut status = FlowStatus::Diverged;

    while iterations < config.max_iterations {
        iterations += 1;
        let mut max_delta = 0.0_f64;
        let mut next = HashMap::with_capacity(rates.len());
        for node in &nodes {
            let mut rate = boundary.get(node).copied().unwrap_or(0.0);
            for edge in graph.edges_into(node) {
                rate += rates.get(&edge.from).copied().unwrap_or(0.0)
                    * edge.calls_per_invocation;
            }
            let delta = (rate - rates[node]).abs();
            max_delta = max_delta.max(delta);
            next.insert(node.clone(), rate);
        }
        rates = next;
        if max_delta < config.epsilon {
            status = FlowStatus::Converged;
            break;
        }
    }

    if status == FlowStatus::Diverged {
        warnings.push(format!(
            "flow solve did not converge within {} iterations; rates are partial",
            config.max_iterations
        ));
        tracing::warn!(
            iterations = config.max_iterations,
            "flow solve diverged"
        );
    } else {
        tracing::debug!(iterations, nodes = rates.len(), "flow solve converged");
    }

    FlowOutcome {
        rates,
        iterations,
        status,
        warnings,
    }
}

/// Derive the flow graph empirically by evaluating each entry method
/// `trials` times and measuring calls per invocation from the collected
/// traces.
pub fn runtime_graph(
    system: &SystemGraph,
    overrides: &OverrideMap,
    entries: &[String],
    trials: u32,
    seed: u64,
) -> Result<(FlowGraph, Vec<String>)> {
    let mut invocations: HashMap<String, u64> = HashMap::new();
    let mut edge_counts: HashMap<(String, String), u64> = HashMap::new();
    let mut warnings = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let tracer = CollectingTracer::new();
        let mut interp = Interpreter::new(system, overrides, &tracer, seed.wrapping_add(i as u64));
        let mut failures = 0u32;
        for _ in 0..trials.max(1) {
            let value = interp.invoke(entry)?;
            if !value.is_success() {
                failures += 1;
            }
        }
        if failures > 0 {
            warnings.push(format!(
                "{entry}: {failures}/{trials} estimation trials failed"
            ));
        }

        // Reconstruct parent/child call pairs from the enter events.
        let events = tracer.take();
        let mut target_of: HashMap<u64, String> = HashMap::new();
        for event in &events {
            if event.kind == TraceKind::Enter {
                target_of.insert(event.id, event.target.clone());
            }
        }
        for event in &events {
            if event.kind != TraceKind::Enter {
                continue;
            }
            *invocations.entry(event.target.clone()).or_insert(0) += 1;
            if event.parent_id != 0 {
                if let Some(parent) = target_of.get(&event.parent_id) {
                    *edge_counts
                        .entry((parent.clone(), event.target.clone()))
                        .or_insert(0) += 1;
                }
            }
        }
    }

    let mut graph = FlowGraph::new();
    for ((from, to), count) in &edge_counts {
        let calls = invocations.get(from).copied().unwrap_or(0);
        if calls > 0 {
            graph.add_edge(from, to, *count as f64 / calls as f64);
        }
    }
    Ok((graph, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ComponentDecl, Expr, FileDecl, InstanceDecl, SystemDecl};
    use crate::flow::graph::static_graph;

    fn chain_system() -> SystemGraph {
        let file = FileDecl::new("chain.sdl")
            .component(ComponentDecl::new("Client").uses("server", "Server").method(
                "Start",
                vec![],
                vec![Expr::ret(Expr::call("server", "Handle", vec![]))],
            ))
            .component(ComponentDecl::new("Server").uses("db", "HashIndex").method(
                "Handle",
                vec![],
                vec![Expr::ret(Expr::call("db", "Find", vec![]))],
            ))
            .system(
                SystemDecl::new("Main")
                    .instance(InstanceDecl::new("client", "Client").bind("server", "server"))
                    .instance(InstanceDecl::new("server", "Server").bind("db", "db"))
                    .instance(InstanceDecl::new("db", "HashIndex")),
            );
        SystemGraph::bind(&file, "Main").unwrap()
    }

    #[test]
    fn test_rates_propagate_down_a_chain() {
        let system = chain_system();
        let (graph, _) = static_graph(&system);
        let boundary = HashMap::from([("client.Start".to_string(), 50.0)]);
        let outcome = solve(&graph, &boundary, &FlowConfig::default());

        assert_eq!(outcome.status, FlowStatus::Converged);
        assert!((outcome.rates["client.Start"] - 50.0).abs() < 1e-6);
        assert!((outcome.rates["server.Handle"] - 50.0).abs() < 1e-6);
        assert!((outcome.rates["db.Find"] - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_boundary_rates_sum_on_shared_target() {
        let system = chain_system();
        let (graph, _) = static_graph(&system);
        // Two generators on the same entry: inputs sum.
        let boundary = HashMap::from([("server.Handle".to_string(), 30.0 + 20.0)]);
        let outcome = solve(&graph, &boundary, &FlowConfig::default());
        assert!((outcome.rates["db.Find"] - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_self_amplifying_cycle_diverges() {
        let mut graph = FlowGraph::new();
        graph.add_edge("a.M", "b.M", 1.0);
        graph.add_edge("b.M", "a.M", 1.5);
        let boundary = HashMap::from([("a.M".to_string(), 1.0)]);
        let outcome = solve(&graph, &boundary, &FlowConfig::default());
        assert_eq!(outcome.status, FlowStatus::Diverged);
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn test_damped_cycle_converges() {
        let mut graph = FlowGraph::new();
        graph.add_edge("a.M", "b.M", 1.0);
        graph.add_edge("b.M", "a.M", 0.5);
        let boundary = HashMap::from([("a.M".to_string(), 10.0)]);
        let outcome = solve(&graph, &boundary, &FlowConfig::default());
        assert_eq!(outcome.status, FlowStatus::Converged);
        // a = 10 + 0.5·b, b = a → a = 20, b = 20.
        assert!((outcome.rates["a.M"] - 20.0).abs() < 1e-3);
        assert!((outcome.rates["b.M"] - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_runtime_graph_measures_branch_ratios() {
        let file = FileDecl::new("branch.sdl")
            .component(
                ComponentDecl::new("App")
                    .uses("fast", "Cache")
                    .uses("slow", "HashIndex")
                    .method(
                        "M",
                        vec![],
                        vec![Expr::if_else(
                            Expr::sample_dist(vec![
                                (0.7, Expr::bool(true)),
                                (0.3, Expr::bool(false)),
                            ]),
                            vec![Expr::call("fast", "Read", vec![])],
                            vec![Expr::call("slow", "Find", vec![])],
                        )],
                    ),
            )
            .system(
                SystemDecl::new("Main")
                    .instance(
                        InstanceDecl::new("app", "App")
                            .bind("fast", "c")
                            .bind("slow", "h"),
                    )
                    .instance(InstanceDecl::new("c", "Cache"))
                    .instance(InstanceDecl::new("h", "HashIndex")),
            );
        let system = SystemGraph::bind(&file, "Main").unwrap();
        let overrides = OverrideMap::new();
        let entries = vec!["app.M".to_string()];
        let (graph, warnings) =
            runtime_graph(&system, &overrides, &entries, 2000, 11).unwrap();
        assert!(warnings.is_empty());

        let fast = graph
            .edges
            .iter()
            .find(|e| e.to == "c.Read")
            .expect("edge to cache");
        assert!((fast.calls_per_invocation - 0.7).abs() < 0.05);
        let slow = graph.edges.iter().find(|e| e.to == "h.Find").unwrap();
        assert!((slow.calls_per_invocation - 0.3).abs() < 0.05);
    }

    #[test]
    fn test_fixed_point_is_stable_on_reapply() {
        let system = chain_system();
        let (graph, _) = static_graph(&system);
        let boundary = HashMap::from([("client.Start".to_string(), 50.0)]);
        let first = solve(&graph, &boundary, &FlowConfig::default());
        let second = solve(&graph, &boundary, &FlowConfig::default());
        for (node, rate) in &first.rates {
            assert!((second.rates[node] - rate).abs() < 1e-9);
        }
    }
}
