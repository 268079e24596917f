//! Sampling evaluator
//!
//! Evaluates one trial of a method invocation against a bound system,
//! producing a single [`Value`] whose `time` field is the simulated latency
//! accumulated along the sampled path. Built-in calls sample the model's
//! outcome distribution; user-defined calls recurse into the method body in
//! a child frame.
//!
//! `go` forks are evaluated immediately in program order with an
//! independent time base, and `wait` joins them with the maximum of the
//! children's times. Simulated latency is bookkeeping, not wall time, so
//! in-order evaluation gives the same distribution as real task spawning
//! while keeping a trial bit-reproducible under a fixed seed.

use crate::ast::{Block, Expr, ForRange, Literal};
use crate::error::{EvalError, Result, SimError};
use crate::params::{OverrideMap, ParamView};
use crate::system::{ComponentBody, InstanceId, SystemGraph};
use crate::trace::{TraceEvent, Tracer};
use crate::value::{TaskHandle, Value, ValueKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Evaluation limits; defaults are far beyond any reasonable model
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub max_call_depth: usize,
    pub max_loop_iterations: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: 64,
            max_loop_iterations: 1_000_000,
        }
    }
}

/// Result of a finished child task, held until `wait` joins it
struct TaskSlot {
    outcome: std::result::Result<Value, EvalError>,
    joined: bool,
}

/// One method activation: local variables plus outstanding forks
struct Frame {
    instance: InstanceId,
    vars: HashMap<String, Value>,
    tasks: Vec<TaskSlot>,
    /// Enter-event id of this activation, parent for nested events
    event_id: u64,
}

/// Control flow out of an expression: plain value or early return
enum Flow {
    Val(Value),
    Ret(Value),
}

macro_rules! flow_val {
    ($e:expr) => {
        match $e {
            Flow::Val(v) => v,
            ret @ Flow::Ret(_) => return Ok(ret),
        }
    };
}

/// Single-trial evaluator over a bound system
pub struct Interpreter<'a> {
    system: &'a SystemGraph,
    overrides: &'a OverrideMap,
    tracer: &'a dyn Tracer,
    rng: StdRng,
    config: InterpreterConfig,
    next_event_id: u64,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        system: &'a SystemGraph,
        overrides: &'a OverrideMap,
        tracer: &'a dyn Tracer,
        seed: u64,
    ) -> Self {
        Interpreter {
            system,
            overrides,
            tracer,
            rng: StdRng::seed_from_u64(seed),
            config: InterpreterConfig::default(),
            next_event_id: 0,
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluate one trial of `instance.method` with no arguments.
    ///
    /// Structural failures (unknown target) surface as errors; faults
    /// during evaluation are a *failed trial* and come back as an error
    /// [`Value`], already recorded on the trial's exit event.
    pub fn invoke(&mut self, target: &str) -> Result<Value> {
        self.invoke_with_args(target, Vec::new())
    }

    pub fn invoke_with_args(&mut self, target: &str, args: Vec<Value>) -> Result<Value> {
        let (id, method) = self.system.resolve_target(target)?;
        match self.call_method(id, &method, args, 0.0, 0) {
            Ok(value) => Ok(value),
            Err(err) => Ok(Value::error(err)),
        }
    }

    /// Convenience wrapper surfacing the eval fault instead of folding it
    /// into a failed-trial value; used by hosts that need the raw error.
    pub fn try_invoke(&mut self, target: &str) -> Result<Value> {
        let (id, method) = self.system.resolve_target(target)?;
        self.call_method(id, &method, Vec::new(), 0.0, 0)
            .map_err(SimError::Eval)
    }

    fn next_id(&mut self) -> u64 {
        self.next_event_id += 1;
        self.next_event_id
    }

    /// Invoke a method on an instance at absolute sim time `now`.
    ///
    /// Emits the enter/exit event pair. The returned value's `time` is the
    /// full elapsed duration of the call.
    fn call_method(
        &mut self,
        id: InstanceId,
        method: &str,
        args: Vec<Value>,
        now: f64,
        parent_event: u64,
    ) -> std::result::Result<Value, EvalError> {
        let instance = self.system.get(id);
        let component = instance.name.clone();
        let event_id = self.next_id();
        self.tracer.emit(TraceEvent::enter(
            event_id,
            parent_event,
            now,
            &component,
            method,
            args.iter().map(Value::to_json).collect(),
        ));

        let result = match &instance.body {
            ComponentBody::Builtin(kind) => {
                let kind = *kind;
                let view = ParamView::new(&instance.name, self.overrides, &instance.params);
                match kind.outcomes(method, &args, &view) {
                    Ok(dist) => dist.sample(&mut self.rng).map(|bucket| {
                        bucket.value.clone().with_time(bucket.duration)
                    }),
                    Err(err) => Err(err),
                }
            }
            ComponentBody::Defined(decl) => {
                let decl = decl.clone();
                let method_decl = match decl.find_method(method) {
                    Some(m) => m,
                    None => {
                        let err = EvalError::UnknownMethod {
                            instance: component.clone(),
                            method: method.to_string(),
                        };
                        self.emit_exit(event_id, parent_event, now, &component, method, 0.0, None, Some(&err));
                        return Err(err);
                    }
                };
                if method_decl.params.len() != args.len() {
                    let err = EvalError::Arity {
                        target: format!("{component}.{method}"),
                        expected: method_decl.params.len(),
                        found: args.len(),
                    };
                    self.emit_exit(event_id, parent_event, now, &component, method, 0.0, None, Some(&err));
                    return Err(err);
                }

                if self.depth >= self.config.max_call_depth {
                    let err = EvalError::CallDepthExceeded(self.config.max_call_depth);
                    self.emit_exit(event_id, parent_event, now, &component, method, 0.0, None, Some(&err));
                    return Err(err);
                }

                let mut vars = HashMap::with_capacity(args.len());
                for (name, value) in method_decl.params.iter().zip(args) {
                    vars.insert(name.clone(), value.with_time(0.0));
                }
                let mut frame = Frame {
                    instance: id,
                    vars,
                    tasks: Vec::new(),
                    event_id,
                };

                self.depth += 1;
                let body = self.run_block(&method_decl.body, &mut frame, now);
                self.depth -= 1;
                body
            }
        };

        match result {
            Ok(value) => {
                self.emit_exit(
                    event_id,
                    parent_event,
                    now + value.time,
                    &component,
                    method,
                    value.time,
                    Some(value.to_json()),
                    None,
                );
                Ok(value)
            }
            Err(err) => {
                self.emit_exit(event_id, parent_event, now, &component, method, 0.0, None, Some(&err));
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_exit(
        &self,
        event_id: u64,
        parent_event: u64,
        timestamp: f64,
        component: &str,
        method: &str,
        duration: f64,
        return_value: Option<serde_json::Value>,
        error: Option<&EvalError>,
    ) {
        self.tracer.emit(TraceEvent::exit(
            event_id,
            parent_event,
            timestamp,
            component,
            method,
            duration,
            return_value,
            error.map(ToString::to_string),
        ));
    }

    /// Evaluate a statement sequence; the result's `time` is the total
    /// elapsed duration of the executed prefix.
    fn run_block(
        &mut self,
        block: &Block,
        frame: &mut Frame,
        now: f64,
    ) -> std::result::Result<Value, EvalError> {
        let mut acc = 0.0;
        let mut result = Value::nil();
        for expr in block {
            match self.eval(expr, frame, now + acc)? {
                Flow::Val(v) => {
                    acc += v.time;
                    result = v;
                }
                Flow::Ret(v) => {
                    acc += v.time;
                    return Ok(v.with_time(acc));
                }
            }
        }
        Ok(result.with_time(acc))
    }

    /// Like [`run_block`](Self::run_block) but keeps early returns flowing
    /// upward for enclosing control structures.
    fn eval_block(
        &mut self,
        block: &Block,
        frame: &mut Frame,
        now: f64,
    ) -> std::result::Result<Flow, EvalError> {
        let mut acc = 0.0;
        let mut result = Value::nil();
        for expr in block {
            match self.eval(expr, frame, now + acc)? {
                Flow::Val(v) => {
                    acc += v.time;
                    result = v;
                }
                Flow::Ret(v) => {
                    let total = acc + v.time;
                    return Ok(Flow::Ret(v.with_time(total)));
                }
            }
        }
        Ok(Flow::Val(result.with_time(acc)))
    }

    fn eval(
        &mut self,
        expr: &Expr,
        frame: &mut Frame,
        now: f64,
    ) -> std::result::Result<Flow, EvalError> {
        match expr {
            Expr::Literal(lit) => Ok(Flow::Val(literal_value(lit))),

            Expr::Ident(name) => match frame.vars.get(name) {
                Some(v) => Ok(Flow::Val(v.clone().with_time(0.0))),
                None => Err(EvalError::UnknownIdentifier(name.clone())),
            },

            Expr::Tuple(items) => {
                let mut acc = 0.0;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let v = flow_val!(self.eval(item, frame, now + acc)?);
                    acc += v.time;
                    values.push(v.with_time(0.0));
                }
                Ok(Flow::Val(Value::tuple(values).with_time(acc)))
            }

            Expr::Unary { op, operand } => {
                let v = flow_val!(self.eval(operand, frame, now)?);
                Ok(Flow::Val(Value::unary(*op, &v)?))
            }

            Expr::Binary { op, lhs, rhs } => {
                let l = flow_val!(self.eval(lhs, frame, now)?);
                let r = flow_val!(self.eval(rhs, frame, now + l.time)?);
                Ok(Flow::Val(Value::binary(*op, &l, &r)?))
            }

            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let target = self
                    .system
                    .resolve_receiver(frame.instance, receiver)
                    .ok_or_else(|| EvalError::UnknownInstance(receiver.join(".")))?;
                let mut acc = 0.0;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    let v = flow_val!(self.eval(arg, frame, now + acc)?);
                    acc += v.time;
                    arg_values.push(v.with_time(0.0));
                }
                let result =
                    self.call_method(target, method, arg_values, now + acc, frame.event_id)?;
                Ok(Flow::Val(result.add_time(acc)))
            }

            Expr::If {
                cond,
                then_body,
                else_body,
            } => {
                // The condition is charged unconditionally; only the taken
                // branch contributes further.
                let c = flow_val!(self.eval(cond, frame, now)?);
                let taken = c.truthy()?;
                let acc = c.time;
                let branch = if taken {
                    self.eval_block(then_body, frame, now + acc)?
                } else {
                    match else_body {
                        Some(body) => self.eval_block(body, frame, now + acc)?,
                        None => Flow::Val(Value::nil()),
                    }
                };
                Ok(match branch {
                    Flow::Val(v) => {
                        let t = acc + v.time;
                        Flow::Val(v.with_time(t))
                    }
                    Flow::Ret(v) => {
                        let t = acc + v.time;
                        Flow::Ret(v.with_time(t))
                    }
                })
            }

            Expr::For { range, body } => self.eval_for(range, body, frame, now),

            Expr::SampleDist { arms } => {
                let total: f64 = arms.iter().map(|a| a.weight).sum();
                if arms.is_empty() || total <= 0.0 {
                    return Err(EvalError::EmptyDistribution);
                }
                let draw = self.rng.gen_range(0.0..total);
                let mut cum = 0.0;
                let mut chosen = arms.len() - 1;
                for (i, arm) in arms.iter().enumerate() {
                    cum += arm.weight;
                    if draw < cum {
                        chosen = i;
                        break;
                    }
                }
                // The draw itself is free; the chosen arm carries its own
                // time.
                self.eval(&arms[chosen].body, frame, now)
            }

            Expr::Go { body } => {
                // Fork: evaluate the child on its own time base, in
                // snapshot scope. The parent's clock does not advance.
                let mut child = Frame {
                    instance: frame.instance,
                    vars: frame.vars.clone(),
                    tasks: Vec::new(),
                    event_id: frame.event_id,
                };
                let outcome = match self.eval(body, &mut child, now) {
                    Ok(Flow::Val(v)) | Ok(Flow::Ret(v)) => Ok(v),
                    Err(e) => Err(e),
                };
                frame.tasks.push(TaskSlot {
                    outcome,
                    joined: false,
                });
                let handle = TaskHandle(frame.tasks.len() - 1);
                Ok(Flow::Val(Value::handle(handle)))
            }

            Expr::Wait { handles } => {
                let indices: Vec<usize> = if handles.is_empty() {
                    (0..frame.tasks.len())
                        .filter(|i| !frame.tasks[*i].joined)
                        .collect()
                } else {
                    let mut out = Vec::with_capacity(handles.len());
                    for h in handles {
                        let v = flow_val!(self.eval(h, frame, now)?);
                        match v.kind {
                            ValueKind::Handle(TaskHandle(i)) => out.push(i),
                            _ => return Err(EvalError::NotAHandle),
                        }
                    }
                    out
                };

                let mut max_time = 0.0_f64;
                let mut joined = Vec::with_capacity(indices.len());
                for i in indices {
                    let slot = frame.tasks.get_mut(i).ok_or(EvalError::NotAHandle)?;
                    if slot.joined {
                        return Err(EvalError::AlreadyJoined);
                    }
                    slot.joined = true;
                    match &slot.outcome {
                        Ok(v) => {
                            max_time = max_time.max(v.time);
                            joined.push(v.clone().with_time(0.0));
                        }
                        Err(e) => {
                            return Err(EvalError::ChildFailed(e.to_string()));
                        }
                    }
                }

                let value = match joined.len() {
                    0 => Value::nil(),
                    1 => joined.into_iter().next().expect("one joined value"),
                    _ => Value::tuple(joined),
                };
                Ok(Flow::Val(value.with_time(max_time)))
            }

            Expr::Return { value } => {
                let v = match value {
                    Some(inner) => flow_val!(self.eval(inner, frame, now)?),
                    None => Value::nil(),
                };
                Ok(Flow::Ret(v))
            }

            Expr::Delay { seconds } => {
                let v = flow_val!(self.eval(seconds, frame, now)?);
                let d = v.as_f64()?.max(0.0);
                Ok(Flow::Val(Value::nil().with_time(v.time + d)))
            }

            Expr::Log { message, args } => {
                let mut acc = 0.0;
                let mut payload = vec![serde_json::json!(message)];
                for arg in args {
                    let v = flow_val!(self.eval(arg, frame, now + acc)?);
                    acc += v.time;
                    payload.push(v.to_json());
                }
                let instance = &self.system.get(frame.instance).name;
                let id = self.next_id();
                self.tracer.emit(TraceEvent::log(
                    id,
                    frame.event_id,
                    now + acc,
                    instance,
                    "log",
                    payload,
                ));
                Ok(Flow::Val(Value::nil().with_time(acc)))
            }

            Expr::Let { name, value } => {
                let v = flow_val!(self.eval(value, frame, now)?);
                let elapsed = v.time;
                frame.vars.insert(name.clone(), v.with_time(0.0));
                Ok(Flow::Val(Value::nil().with_time(elapsed)))
            }

            Expr::Block(block) => self.eval_block(block, frame, now),
        }
    }

    fn eval_for(
        &mut self,
        range: &ForRange,
        body: &Block,
        frame: &mut Frame,
        now: f64,
    ) -> std::result::Result<Flow, EvalError> {
        let mut acc = 0.0;
        let mut result = Value::nil();
        match range {
            ForRange::Count(count) => {
                let c = flow_val!(self.eval(count, frame, now)?);
                acc += c.time;
                let n = c.as_f64()?.floor().max(0.0) as u64;
                if n > self.config.max_loop_iterations {
                    return Err(EvalError::LoopLimitExceeded(self.config.max_loop_iterations));
                }
                for _ in 0..n {
                    let v = flow_val!(self.eval_block(body, frame, now + acc)?);
                    acc += v.time;
                    result = v;
                }
            }
            ForRange::While(cond) => {
                let mut iterations = 0u64;
                loop {
                    let c = flow_val!(self.eval(cond, frame, now + acc)?);
                    acc += c.time;
                    if !c.truthy()? {
                        break;
                    }
                    let v = flow_val!(self.eval_block(body, frame, now + acc)?);
                    acc += v.time;
                    result = v;
                    iterations += 1;
                    if iterations > self.config.max_loop_iterations {
                        return Err(EvalError::LoopLimitExceeded(
                            self.config.max_loop_iterations,
                        ));
                    }
                }
            }
        }
        Ok(Flow::Val(result.with_time(acc)))
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Nil => Value::nil(),
        Literal::Bool(b) => Value::bool(*b),
        Literal::Int(i) => Value::int(*i),
        Literal::Float(f) => Value::float(*f),
        Literal::Str(s) => Value::str(s.clone()),
    }
}
