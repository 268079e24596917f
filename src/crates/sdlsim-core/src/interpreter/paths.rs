//! Branch-enumeration mode
//!
//! Instead of sampling, this walker visits every `sample` and `if` branch
//! of a method body breadth-first, producing a tree of possible call sites
//! labelled with probabilities. Recursion into user-defined callees is
//! capped by `max_depth` and guarded against call cycles.

use crate::ast::{Block, Expr, ForRange};
use crate::error::Result;
use crate::system::{InstanceId, SystemGraph};
use serde::Serialize;

/// Node kind in an enumerated path tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathNodeKind {
    /// The root method being enumerated
    Root,
    /// A call site `instance.method`
    Call,
    /// One branch of an `if` or one arm of a `sample dist`
    Branch,
}

/// A node of the enumerated tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathNode {
    pub label: String,
    pub kind: PathNodeKind,
    /// Branch probability when statically known
    pub probability: Option<f64>,
    pub children: Vec<PathNode>,
}

impl PathNode {
    fn new(label: impl Into<String>, kind: PathNodeKind, probability: Option<f64>) -> Self {
        PathNode {
            label: label.into(),
            kind,
            probability,
            children: Vec::new(),
        }
    }

    /// Number of leaves, i.e. distinct terminal paths through the tree
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(PathNode::leaf_count).sum()
        }
    }
}

/// Enumerate every branch of `instance.method`.
pub fn enumerate_paths(
    system: &SystemGraph,
    target: &str,
    max_depth: Option<usize>,
) -> Result<PathNode> {
    let (id, method) = system.resolve_target(target)?;
    let mut root = PathNode::new(target, PathNodeKind::Root, None);
    let mut walker = Walker {
        system,
        max_depth: max_depth.unwrap_or(usize::MAX),
        stack: vec![(id, method.clone())],
    };
    if let Some(body) = system.get(id).find_method(&method).map(|m| m.body.clone()) {
        walker.walk_block(&body, id, 0, &mut root.children);
    }
    Ok(root)
}

struct Walker<'a> {
    system: &'a SystemGraph,
    max_depth: usize,
    /// Call stack of (instance, method) pairs, for cycle cut-off
    stack: Vec<(InstanceId, String)>,
}

impl<'a> Walker<'a> {
    fn walk_block(
        &mut self,
        block: &Block,
        instance: InstanceId,
        depth: usize,
        out: &mut Vec<PathNode>,
    ) {
        for expr in block {
            self.walk_expr(expr, instance, depth, out);
        }
    }

    fn walk_expr(
        &mut self,
        expr: &Expr,
        instance: InstanceId,
        depth: usize,
        out: &mut Vec<PathNode>,
    ) {
        match expr {
            Expr::Call {
                receiver,
                method,
                args,
            } => {
                for arg in args {
                    self.walk_expr(arg, instance, depth, out);
                }
                let Some(target) = self.system.resolve_receiver(instance, receiver) else {
                    out.push(PathNode::new(
                        format!("{}.{method} (unresolved)", receiver.join(".")),
                        PathNodeKind::Call,
                        None,
                    ));
                    return;
                };
                let label = format!("{}.{}", self.system.get(target).name, method);
                let mut node = PathNode::new(&label, PathNodeKind::Call, None);

                let key = (target, method.clone());
                let recurse = depth < self.max_depth && !self.stack.contains(&key);
                if recurse {
                    if let Some(body) =
                        self.system.get(target).find_method(method).map(|m| m.body.clone())
                    {
                        self.stack.push(key);
                        self.walk_block(&body, target, depth + 1, &mut node.children);
                        self.stack.pop();
                    }
                }
                out.push(node);
            }

            Expr::If {
                cond,
                then_body,
                else_body,
            } => {
                // Calls inside the condition happen on every path.
                self.walk_expr(cond, instance, depth, out);

                let (p_then, p_else) = match branch_probability(cond) {
                    Some(p) => (Some(p), Some(1.0 - p)),
                    None => (None, None),
                };
                let mut then_node = PathNode::new("then", PathNodeKind::Branch, p_then);
                self.walk_block(then_body, instance, depth, &mut then_node.children);
                let mut else_node = PathNode::new("else", PathNodeKind::Branch, p_else);
                if let Some(body) = else_body {
                    self.walk_block(body, instance, depth, &mut else_node.children);
                }
                out.push(then_node);
                out.push(else_node);
            }

            Expr::SampleDist { arms } => {
                let total: f64 = arms.iter().map(|a| a.weight).sum();
                for (i, arm) in arms.iter().enumerate() {
                    let probability = if total > 0.0 {
                        Some(arm.weight / total)
                    } else {
                        None
                    };
                    let mut node = PathNode::new(
                        format!("arm {i}"),
                        PathNodeKind::Branch,
                        probability,
                    );
                    self.walk_expr(&arm.body, instance, depth, &mut node.children);
                    out.push(node);
                }
            }

            Expr::For { range, body } => {
                match range {
                    ForRange::Count(count) => self.walk_expr(count, instance, depth, out),
                    ForRange::While(cond) => self.walk_expr(cond, instance, depth, out),
                }
                self.walk_block(body, instance, depth, out);
            }

            Expr::Go { body } => self.walk_expr(body, instance, depth, out),
            Expr::Wait { handles } => {
                for h in handles {
                    self.walk_expr(h, instance, depth, out);
                }
            }
            Expr::Return { value } => {
                if let Some(v) = value {
                    self.walk_expr(v, instance, depth, out);
                }
            }
            Expr::Delay { seconds } => self.walk_expr(seconds, instance, depth, out),
            Expr::Log { args, .. } => {
                for a in args {
                    self.walk_expr(a, instance, depth, out);
                }
            }
            Expr::Let { value, .. } => self.walk_expr(value, instance, depth, out),
            Expr::Unary { operand, .. } => self.walk_expr(operand, instance, depth, out),
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs, instance, depth, out);
                self.walk_expr(rhs, instance, depth, out);
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.walk_expr(item, instance, depth, out);
                }
            }
            Expr::Block(block) => self.walk_block(block, instance, depth, out),
            Expr::Literal(_) | Expr::Ident(_) => {}
        }
    }
}

/// Statically known probability that an `if` condition holds: the
/// true-labelled mass of a literal-boolean `sample dist` condition.
fn branch_probability(cond: &Expr) -> Option<f64> {
    let Expr::SampleDist { arms } = cond else {
        return None;
    };
    let total: f64 = arms.iter().map(|a| a.weight).sum();
    if total <= 0.0 {
        return None;
    }
    let mut mass_true = 0.0;
    for arm in arms {
        match &arm.body {
            Expr::Literal(crate::ast::Literal::Bool(true)) => mass_true += arm.weight,
            Expr::Literal(crate::ast::Literal::Bool(false)) => {}
            _ => return None,
        }
    }
    Some(mass_true / total)
}
