//! Resolved AST consumed by the interpreter
//!
//! Parsing SDL text into this tree is an external collaborator's job; the
//! engine only consumes the resolved form. The builder methods on the
//! declaration types exist so hosts and tests can assemble programs without
//! a parser, in the same fluent style graphs are built elsewhere in the
//! workspace.

use crate::params::{ParamType, ParamValue};
use crate::value::{BinOp, UnOp};
use serde::{Deserialize, Serialize};

/// Literal values appearing in method bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A sequence of expressions evaluated in order; the block's value is the
/// value of its last expression.
pub type Block = Vec<Expr>;

/// Loop bound: fixed count or condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForRange {
    /// `for N { ... }`
    Count(Box<Expr>),
    /// `for cond { ... }`
    While(Box<Expr>),
}

/// One weighted arm of a `sample dist` expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleArm {
    pub weight: f64,
    pub body: Expr,
}

/// Expression forms of the language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Variable or argument reference
    Ident(String),
    Tuple(Vec<Expr>),
    /// `receiver.method(args)`. The receiver path walks `uses` bindings
    /// starting from the current instance; an empty path targets a method on
    /// the current instance itself.
    Call {
        receiver: Vec<String>,
        method: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_body: Block,
        else_body: Option<Block>,
    },
    For {
        range: ForRange,
        body: Block,
    },
    /// `sample dist { w1 => e1; w2 => e2; ... }`
    SampleDist { arms: Vec<SampleArm> },
    /// Fork a child trial; evaluates to a task handle
    Go { body: Box<Expr> },
    /// Join forked children. Empty handle list joins every outstanding child
    /// of the current method frame.
    Wait { handles: Vec<Expr> },
    Return { value: Option<Box<Expr>> },
    /// Deterministic latency in seconds
    Delay { seconds: Box<Expr> },
    /// Observable side effect; emits a log trace event and yields nil
    Log { message: String, args: Vec<Expr> },
    Let { name: String, value: Box<Expr> },
    Block(Block),
}

impl Expr {
    pub fn nil() -> Expr {
        Expr::Literal(Literal::Nil)
    }

    pub fn bool(b: bool) -> Expr {
        Expr::Literal(Literal::Bool(b))
    }

    pub fn int(i: i64) -> Expr {
        Expr::Literal(Literal::Int(i))
    }

    pub fn float(f: f64) -> Expr {
        Expr::Literal(Literal::Float(f))
    }

    pub fn str(s: impl Into<String>) -> Expr {
        Expr::Literal(Literal::Str(s.into()))
    }

    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(name.into())
    }

    /// Call `receiver.method(args)` through one binding hop
    pub fn call(receiver: &str, method: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: vec![receiver.to_string()],
            method: method.to_string(),
            args,
        }
    }

    /// Call a method on the current instance
    pub fn self_call(method: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: Vec::new(),
            method: method.to_string(),
            args,
        }
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn if_then(cond: Expr, then_body: Block) -> Expr {
        Expr::If {
            cond: Box::new(cond),
            then_body,
            else_body: None,
        }
    }

    pub fn if_else(cond: Expr, then_body: Block, else_body: Block) -> Expr {
        Expr::If {
            cond: Box::new(cond),
            then_body,
            else_body: Some(else_body),
        }
    }

    pub fn for_count(count: Expr, body: Block) -> Expr {
        Expr::For {
            range: ForRange::Count(Box::new(count)),
            body,
        }
    }

    pub fn for_while(cond: Expr, body: Block) -> Expr {
        Expr::For {
            range: ForRange::While(Box::new(cond)),
            body,
        }
    }

    pub fn sample_dist(arms: Vec<(f64, Expr)>) -> Expr {
        Expr::SampleDist {
            arms: arms
                .into_iter()
                .map(|(weight, body)| SampleArm { weight, body })
                .collect(),
        }
    }

    pub fn go(body: Expr) -> Expr {
        Expr::Go { body: Box::new(body) }
    }

    pub fn wait_all() -> Expr {
        Expr::Wait { handles: Vec::new() }
    }

    pub fn wait(handles: Vec<Expr>) -> Expr {
        Expr::Wait { handles }
    }

    pub fn ret(value: Expr) -> Expr {
        Expr::Return { value: Some(Box::new(value)) }
    }

    pub fn delay(seconds: Expr) -> Expr {
        Expr::Delay { seconds: Box::new(seconds) }
    }

    pub fn log(message: &str, args: Vec<Expr>) -> Expr {
        Expr::Log {
            message: message.to_string(),
            args,
        }
    }

    pub fn let_(name: &str, value: Expr) -> Expr {
        Expr::Let {
            name: name.to_string(),
            value: Box::new(value),
        }
    }
}

/// Declared parameter of a component: name, type, default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub ty: ParamType,
    pub default: ParamValue,
}

/// Declared dependency slot of a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsesDecl {
    /// Local name the component's methods call through
    pub binding: String,
    /// Component type the slot expects (informational; binding is by name)
    pub target_type: String,
}

/// A method declaration: name, positional parameters, body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

/// A user-defined component declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub uses: Vec<UsesDecl>,
    pub methods: Vec<MethodDecl>,
}

impl ComponentDecl {
    pub fn new(name: impl Into<String>) -> Self {
        ComponentDecl {
            name: name.into(),
            params: Vec::new(),
            uses: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, ty: ParamType, default: ParamValue) -> Self {
        self.params.push(ParamDecl {
            name: name.to_string(),
            ty,
            default,
        });
        self
    }

    pub fn uses(mut self, binding: &str, target_type: &str) -> Self {
        self.uses.push(UsesDecl {
            binding: binding.to_string(),
            target_type: target_type.to_string(),
        });
        self
    }

    pub fn method(mut self, name: &str, params: Vec<&str>, body: Block) -> Self {
        self.methods.push(MethodDecl {
            name: name.to_string(),
            params: params.into_iter().map(str::to_string).collect(),
            body,
        });
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// An instance declaration within a system: component type, parameter
/// assignments, and `uses` wiring (slot name → instance name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDecl {
    pub name: String,
    pub component: String,
    pub params: Vec<(String, ParamValue)>,
    pub bindings: Vec<(String, String)>,
}

impl InstanceDecl {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        InstanceDecl {
            name: name.into(),
            component: component.into(),
            params: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: ParamValue) -> Self {
        self.params.push((name.to_string(), value));
        self
    }

    pub fn bind(mut self, slot: &str, instance: &str) -> Self {
        self.bindings.push((slot.to_string(), instance.to_string()));
        self
    }
}

/// A top-level system declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDecl {
    pub name: String,
    pub instances: Vec<InstanceDecl>,
}

impl SystemDecl {
    pub fn new(name: impl Into<String>) -> Self {
        SystemDecl {
            name: name.into(),
            instances: Vec::new(),
        }
    }

    pub fn instance(mut self, decl: InstanceDecl) -> Self {
        self.instances.push(decl);
        self
    }
}

/// A parsed file: component and system declarations plus the source name
/// the parser reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDecl {
    pub source: String,
    pub components: Vec<ComponentDecl>,
    pub systems: Vec<SystemDecl>,
}

impl FileDecl {
    pub fn new(source: impl Into<String>) -> Self {
        FileDecl {
            source: source.into(),
            components: Vec::new(),
            systems: Vec::new(),
        }
    }

    pub fn component(mut self, decl: ComponentDecl) -> Self {
        self.components.push(decl);
        self
    }

    pub fn system(mut self, decl: SystemDecl) -> Self {
        self.systems.push(decl);
        self
    }

    pub fn find_component(&self, name: &str) -> Option<&ComponentDecl> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn find_system(&self, name: &str) -> Option<&SystemDecl> {
        self.systems.iter().find(|s| s.name == name)
    }
}
