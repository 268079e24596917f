//! # sdlsim-core: simulation engine for system design models
//!
//! The core evaluates **system design language** programs: declarative
//! descriptions of distributed systems built from parameterized components
//! (caches, queues, disks, indexes, links) whose methods yield
//! probability-weighted latency distributions. One *trial* invokes an entry
//! method, samples a path through the model, and returns a single value
//! carrying the simulated latency of that path.
//!
//! ## Layers
//!
//! - [`outcome`]: the weighted (duration, payload) distribution algebra
//!   and its combinators (sequential, parallel, choice, reduction).
//! - [`value`]: the universal result type; every expression evaluates to a
//!   [`Value`](value::Value) with an accumulated `time`.
//! - [`ast`]: the resolved declaration and expression forms the engine
//!   consumes. Parsing text into them is a collaborator's concern.
//! - [`components`]: the built-in model library, parameterized through
//!   the override-aware [`ParamView`](params::ParamView).
//! - [`system`]: binding a `system` declaration into an instance arena.
//! - [`interpreter`]: the sampling evaluator and the exhaustive branch
//!   walker.
//! - [`trace`]: enter/exit event records and the tracer seam.
//! - [`flow`]: steady-state arrival-rate propagation over the call graph.
//!
//! ## Quick start
//!
//! ```rust
//! use sdlsim_core::ast::{ComponentDecl, Expr, FileDecl, InstanceDecl, SystemDecl};
//! use sdlsim_core::interpreter::Interpreter;
//! use sdlsim_core::params::OverrideMap;
//! use sdlsim_core::system::SystemGraph;
//! use sdlsim_core::trace::NullTracer;
//!
//! let file = FileDecl::new("demo.sdl")
//!     .component(
//!         ComponentDecl::new("App").uses("cache", "Cache").method(
//!             "Get",
//!             vec![],
//!             vec![Expr::ret(Expr::call("cache", "Read", vec![]))],
//!         ),
//!     )
//!     .system(
//!         SystemDecl::new("Demo")
//!             .instance(InstanceDecl::new("app", "App").bind("cache", "cache"))
//!             .instance(InstanceDecl::new("cache", "Cache")),
//!     );
//!
//! let system = SystemGraph::bind(&file, "Demo").unwrap();
//! let overrides = OverrideMap::new();
//! let tracer = NullTracer;
//! let mut interp = Interpreter::new(&system, &overrides, &tracer, 42);
//! let result = interp.invoke("app.Get").unwrap();
//! assert!(result.time >= 0.0);
//! ```
//!
//! ## Determinism
//!
//! Every stochastic choice draws from one seeded RNG per trial; equal seeds
//! give equal results and equal trace trees. Statistical agreement, not
//! bit-exactness, is the contract across releases.

pub mod ast;
pub mod components;
pub mod error;
pub mod flow;
pub mod interpreter;
pub mod outcome;
pub mod params;
pub mod system;
pub mod trace;
pub mod value;

pub use error::{EvalError, Result, SimError};
pub use interpreter::{enumerate_paths, Interpreter, InterpreterConfig, PathNode};
pub use outcome::{Bucket, Outcomes};
pub use params::{OverrideMap, ParamType, ParamValue, ParamView};
pub use system::{ComponentBody, ComponentInstance, InstanceId, SystemGraph};
pub use trace::{CollectingTracer, NullTracer, TraceEvent, TraceKind, Tracer};
pub use value::{TaskHandle, Value, ValueKind};
