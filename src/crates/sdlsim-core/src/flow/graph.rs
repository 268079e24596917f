//! Call-graph derivation for the flow solver
//!
//! The flow graph is a directed multigraph over `(instance, method)` nodes.
//! An edge carries the expected number of calls the source method makes to
//! the target per invocation: branch probabilities multiply, literal loop
//! counts scale, and parallel forks count fully.
//!
//! Two derivations exist: the static walk here, which only reads declared
//! weights, and the empirical estimate in the solver module, which measures
//! branch-take ratios from collected traces.

use crate::ast::{Block, Expr, ForRange, Literal};
use crate::system::{ComponentBody, InstanceId, SystemGraph};
use serde::Serialize;
use std::collections::HashMap;

/// An edge of the flow graph, keyed by `instance.method` target names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    /// Expected calls to `to` per single invocation of `from`
    pub calls_per_invocation: f64,
}

/// Directed multigraph over `(instance, method)` nodes
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowGraph {
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `multiplier` expected calls to an edge, merging parallels
    pub fn add_edge(&mut self, from: &str, to: &str, multiplier: f64) {
        if let Some(edge) = self
            .edges
            .iter_mut()
            .find(|e| e.from == from && e.to == to)
        {
            edge.calls_per_invocation += multiplier;
        } else {
            self.edges.push(FlowEdge {
                from: from.to_string(),
                to: to.to_string(),
                calls_per_invocation: multiplier,
            });
        }
    }

    /// Every node mentioned by any edge
    pub fn nodes(&self) -> Vec<String> {
        let mut seen = HashMap::new();
        let mut out = Vec::new();
        for edge in &self.edges {
            for node in [&edge.from, &edge.to] {
                if seen.insert(node.clone(), ()).is_none() {
                    out.push(node.clone());
                }
            }
        }
        out
    }

    pub fn edges_into<'a, 'b>(&'a self, node: &'b str) -> impl Iterator<Item = &'a FlowEdge> + 'b
    where
        'a: 'b,
    {
        self.edges.iter().filter(move |e| e.to == node)
    }
}

/// Derive the flow graph from declared weights alone, never executing.
///
/// `if` conditions without a statically known probability split evenly and
/// add a warning; non-literal loop counts count as one iteration.
pub fn static_graph(system: &SystemGraph) -> (FlowGraph, Vec<String>) {
    let mut graph = FlowGraph::new();
    let mut warnings = Vec::new();

    for (id, instance) in system.iter() {
        if let ComponentBody::Defined(decl) = &instance.body {
            for method in &decl.methods {
                let from = format!("{}.{}", instance.name, method.name);
                let mut walker = StaticWalker {
                    system,
                    graph: &mut graph,
                    warnings: &mut warnings,
                    from: &from,
                };
                walker.walk_block(&method.body, id, 1.0);
            }
        }
    }
    (graph, warnings)
}

struct StaticWalker<'a> {
    system: &'a SystemGraph,
    graph: &'a mut FlowGraph,
    warnings: &'a mut Vec<String>,
    from: &'a str,
}

impl<'a> StaticWalker<'a> {
    fn walk_block(&mut self, block: &Block, instance: InstanceId, multiplier: f64) {
        for expr in block {
            self.walk_expr(expr, instance, multiplier);
        }
    }

    fn walk_expr(&mut self, expr: &Expr, instance: InstanceId, multiplier: f64) {
        if multiplier <= 0.0 {
            return;
        }
        match expr {
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                for arg in args {
                    self.walk_expr(arg, instance, multiplier);
                }
                match self.system.resolve_receiver(instance, receiver) {
                    Some(target) => {
                        let to = format!("{}.{}", self.system.get(target).name, method);
                        self.graph.add_edge(self.from, &to, multiplier);
                    }
                    None => self.warnings.push(format!(
                        "{}: unresolved receiver {}",
                        self.from,
                        receiver.join(".")
                    )),
                }
            }

            Expr::If {
                cond,
                then_body,
                else_body,
            } => {
                self.walk_expr(cond, instance, multiplier);
                let p = match static_true_probability(cond) {
                    Some(p) => p,
                    None => {
                        self.warnings.push(format!(
                            "{}: if-branch probability unknown, assuming 0.5",
                            self.from
                        ));
                        0.5
                    }
                };
                self.walk_block(then_body, instance, multiplier * p);
                if let Some(body) = else_body {
                    self.walk_block(body, instance, multiplier * (1.0 - p));
                }
            }

            Expr::SampleDist { arms } => {
                let total: f64 = arms.iter().map(|a| a.weight).sum();
                if total <= 0.0 {
                    return;
                }
                for arm in arms {
                    self.walk_expr(&arm.body, instance, multiplier * arm.weight / total);
                }
            }

            Expr::For { range, body } => {
                let count = match range {
                    ForRange::Count(count) => {
                        self.walk_expr(count, instance, multiplier);
                        match count.as_ref() {
                            Expr::Literal(Literal::Int(n)) => (*n).max(0) as f64,
                            Expr::Literal(Literal::Float(f)) => f.max(0.0).floor(),
                            _ => {
                                self.warnings.push(format!(
                                    "{}: dynamic loop count, assuming 1",
                                    self.from
                                ));
                                1.0
                            }
                        }
                    }
                    ForRange::While(cond) => {
                        self.walk_expr(cond, instance, multiplier);
                        self.warnings.push(format!(
                            "{}: conditional loop, assuming 1 iteration",
                            self.from
                        ));
                        1.0
                    }
                };
                self.walk_block(body, instance, multiplier * count);
            }

            Expr::Go { body } => self.walk_expr(body, instance, multiplier),
            Expr::Wait { handles } => {
                for h in handles {
                    self.walk_expr(h, instance, multiplier);
                }
            }
            Expr::Return { value } => {
                if let Some(v) = value {
                    self.walk_expr(v, instance, multiplier);
                }
            }
            Expr::Delay { seconds } => self.walk_expr(seconds, instance, multiplier),
            Expr::Log { args, .. } => {
                for a in args {
                    self.walk_expr(a, instance, multiplier);
                }
            }
            Expr::Let { value, .. } => self.walk_expr(value, instance, multiplier),
            Expr::Unary { operand, .. } => self.walk_expr(operand, instance, multiplier),
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs, instance, multiplier);
                self.walk_expr(rhs, instance, multiplier);
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.walk_expr(item, instance, multiplier);
                }
            }
            Expr::Block(block) => self.walk_block(block, instance, multiplier),
            Expr::Literal(_) | Expr::Ident(_) => {}
        }
    }
}

/// Statically known truth probability of an `if` condition (a `sample dist`
/// over boolean literals); `None` otherwise.
fn static_true_probability(cond: &Expr) -> Option<f64> {
    let Expr::SampleDist { arms } = cond else {
        return None;
    };
    let total: f64 = arms.iter().map(|a| a.weight).sum();
    if total <= 0.0 {
        return None;
    }
    let mut mass = 0.0;
    for arm in arms {
        match &arm.body {
            Expr::Literal(Literal::Bool(true)) => mass += arm.weight,
            Expr::Literal(Literal::Bool(false)) => {}
            _ => return None,
        }
    }
    Some(mass / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ComponentDecl, Expr, FileDecl, InstanceDecl, SystemDecl};

    fn chain_system() -> SystemGraph {
        let file = FileDecl::new("chain.sdl")
            .component(
                ComponentDecl::new("Server").uses("db", "HashIndex").method(
                    "Handle",
                    vec![],
                    vec![Expr::ret(Expr::call("db", "Query", vec![]))],
                ),
            )
            .component(
                ComponentDecl::new("Db").method(
                    "Query",
                    vec![],
                    vec![Expr::delay(Expr::float(0.001))],
                ),
            )
            .system(
                SystemDecl::new("Main")
                    .instance(InstanceDecl::new("server", "Server").bind("db", "db"))
                    .instance(InstanceDecl::new("db", "Db")),
            );
        SystemGraph::bind(&file, "Main").unwrap()
    }

    #[test]
    fn test_unconditional_call_edge() {
        let (graph, warnings) = static_graph(&chain_system());
        assert!(warnings.is_empty());
        assert_eq!(graph.edges.len(), 1);
        let edge = &graph.edges[0];
        assert_eq!(edge.from, "server.Handle");
        assert_eq!(edge.to, "db.Query");
        assert!((edge.calls_per_invocation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_weights_scale_edges() {
        let file = FileDecl::new("split.sdl")
            .component(
                ComponentDecl::new("App")
                    .uses("fast", "Cache")
                    .uses("slow", "HashIndex")
                    .method(
                        "M",
                        vec![],
                        vec![Expr::sample_dist(vec![
                            (0.9, Expr::call("fast", "Read", vec![])),
                            (0.1, Expr::call("slow", "Find", vec![])),
                        ])],
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
        let (graph, _) = static_graph(&system);

        let read = graph
            .edges
            .iter()
            .find(|e| e.to == "c.Read")
            .expect("edge to cache");
        assert!((read.calls_per_invocation - 0.9).abs() < 1e-12);
        let find = graph.edges.iter().find(|e| e.to == "h.Find").unwrap();
        assert!((find.calls_per_invocation - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_opaque_if_splits_evenly_with_warning() {
        let file = FileDecl::new("if.sdl")
            .component(
                ComponentDecl::new("App").uses("db", "HashIndex").method(
                    "M",
                    vec!["flag"],
                    vec![Expr::if_then(
                        Expr::ident("flag"),
                        vec![Expr::call("db", "Find", vec![])],
                    )],
                ),
            )
            .system(
                SystemDecl::new("Main")
                    .instance(InstanceDecl::new("app", "App").bind("db", "db"))
                    .instance(InstanceDecl::new("db", "HashIndex")),
            );
        let system = SystemGraph::bind(&file, "Main").unwrap();
        let (graph, warnings) = static_graph(&system);

        assert_eq!(warnings.len(), 1);
        let edge = graph.edges.iter().find(|e| e.to == "db.Find").unwrap();
        assert!((edge.calls_per_invocation - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_literal_loop_count_multiplies() {
        let file = FileDecl::new("loop.sdl")
            .component(
                ComponentDecl::new("App").uses("db", "HashIndex").method(
                    "M",
                    vec![],
                    vec![Expr::for_count(
                        Expr::int(3),
                        vec![Expr::call("db", "Find", vec![])],
                    )],
                ),
            )
            .system(
                SystemDecl::new("Main")
                    .instance(InstanceDecl::new("app", "App").bind("db", "db"))
                    .instance(InstanceDecl::new("db", "HashIndex")),
            );
        let system = SystemGraph::bind(&file, "Main").unwrap();
        let (graph, _) = static_graph(&system);
        let edge = graph.edges.iter().find(|e| e.to == "db.Find").unwrap();
        assert!((edge.calls_per_invocation - 3.0).abs() < 1e-12);
    }
}
