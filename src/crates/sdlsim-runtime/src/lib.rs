//! # sdlsim-runtime: hosting layer for the simulation engine
//!
//! Where `sdlsim-core` evaluates one trial at a time, this crate runs the
//! operation: stateful [`Canvas`] workspaces, Poisson traffic
//! [`generator`]s driving the interpreter, a per-canvas trace [`bus`], and
//! windowed [`metrics`] aggregation over the event stream. The
//! [`api::CanvasService`] facade exposes the whole surface behind typed
//! request/response models so transport shells stay thin.
//!
//! ## Concurrency model
//!
//! One canvas-wide write lock serializes mutations (load, bind, set,
//! registry changes). Evaluation never holds it: every trial, whether an
//! on-demand `run` or a generator tick, snapshots the bound system and
//! override map up front, so a parameter set mid-run lands between trials.
//! Each generator is one cooperative tokio task; stop is acknowledged
//! between ticks and bounded by a five-second deadline at reset.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sdlsim_runtime::canvas::Canvas;
//! use sdlsim_runtime::generator::GeneratorConfig;
//! use sdlsim_runtime::metrics::{MetricKind, MetricSpec};
//! use sdlsim_core::ast::{FileDecl, InstanceDecl, SystemDecl};
//!
//! # async fn demo() {
//! let canvas = Canvas::new("c1");
//! let file = FileDecl::new("demo.sdl")
//!     .system(SystemDecl::new("Demo").instance(InstanceDecl::new("cache", "Cache")));
//! canvas.load_parsed(file);
//! canvas.use_system("Demo").unwrap();
//!
//! canvas
//!     .add_generator(GeneratorConfig::new("g1", "cache.Read", 50.0))
//!     .unwrap();
//! canvas
//!     .add_metric(MetricSpec::new("m1", "cache", MetricKind::Count))
//!     .unwrap();
//! # }
//! ```

pub mod api;
pub mod bus;
pub mod canvas;
pub mod error;
pub mod generator;
pub mod loader;
pub mod metrics;
pub mod registry;
pub mod state;

pub use api::CanvasService;
pub use bus::{BusTracer, TraceBus};
pub use canvas::Canvas;
pub use error::{CanvasError, Result};
pub use generator::GeneratorConfig;
pub use loader::{FileResolver, FsResolver, JsonParser, MemoryResolver, SdlParser};
pub use metrics::{Aggregation, MetricEngine, MetricKind, MetricPoint, MetricSpec};
pub use registry::CanvasRegistry;
