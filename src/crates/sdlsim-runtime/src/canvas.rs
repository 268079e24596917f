//! The canvas: one loaded model, its overrides, generators and metrics
//!
//! A canvas serializes mutating operations behind a write lock and lets
//! read-only evaluation (on-demand runs, generator ticks, path walks) work
//! against per-trial snapshots. Multiple canvases coexist without shared
//! state; see [`CanvasRegistry`](crate::registry::CanvasRegistry).

use crate::bus::{BusTracer, TraceBus, DEFAULT_SUBSCRIBER_CAPACITY};
use crate::error::{CanvasError, Result};
use crate::generator::{GeneratorConfig, GeneratorHandle};
use crate::loader::{FileResolver, SdlParser};
use crate::metrics::{MetricEngine, MetricPoint, MetricSpec};
use crate::state::SharedState;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sdlsim_core::ast::FileDecl;
use sdlsim_core::components::BuiltinKind;
use sdlsim_core::flow::{self, FlowConfig, FlowOutcome, FlowStrategy};
use sdlsim_core::interpreter::{enumerate_paths, Interpreter, PathNode};
use sdlsim_core::params::{ParamValue, ParamView};
use sdlsim_core::system::{ComponentBody, SystemGraph};
use sdlsim_core::trace::{CollectingTracer, TraceEvent};
use sdlsim_core::value::Value;
use sdlsim_core::SimError;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Bounded wait for generator acknowledgement during stop/reset
const STOP_DEADLINE: Duration = Duration::from_secs(5);

/// One stateful simulation workspace
pub struct Canvas {
    id: String,
    state: Arc<SharedState>,
    bus: Arc<TraceBus>,
    engine: Arc<MetricEngine>,
    generators: Mutex<HashMap<String, GeneratorHandle>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    base_seed: u64,
    trial_counter: AtomicU64,
    created_at: DateTime<Utc>,
}

impl Canvas {
    /// Create a canvas with an entropy-derived seed. Must be called inside
    /// a tokio runtime (the metric pump task starts here).
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_seed(id, rand::random())
    }

    /// Create a canvas whose trials are reproducible from `seed`
    pub fn with_seed(id: impl Into<String>, seed: u64) -> Self {
        let bus = TraceBus::new();
        let engine = MetricEngine::new();
        let pump = MetricEngine::pump(engine.clone(), bus.subscribe(DEFAULT_SUBSCRIBER_CAPACITY));
        let id = id.into();
        tracing::info!(canvas = %id, "canvas created");
        Canvas {
            id,
            state: SharedState::new(),
            bus,
            engine,
            generators: Mutex::new(HashMap::new()),
            pump: Mutex::new(Some(pump)),
            base_seed: seed,
            trial_counter: AtomicU64::new(0),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn bus(&self) -> Arc<TraceBus> {
        self.bus.clone()
    }

    /// Events lost to slow bus subscribers
    pub fn trace_dropped(&self) -> u64 {
        self.bus.dropped()
    }

    // ---- file / system ----------------------------------------------------

    /// Replace the active file with an already-parsed declaration tree.
    /// Clears the active system; registered generators idle until a system
    /// is bound again.
    pub fn load_parsed(&self, file: FileDecl) {
        self.state.write(|s| {
            tracing::info!(canvas = %self.id, source = %file.source, "file loaded");
            s.file = Some(Arc::new(file));
            s.system = None;
            s.flow_managed.clear();
            s.last_flow = None;
        });
    }

    /// Resolve and parse `path` through the collaborator seams, then load
    pub async fn load_path(
        &self,
        path: &str,
        resolver: &dyn FileResolver,
        parser: &dyn SdlParser,
    ) -> Result<()> {
        let bytes = resolver.resolve(path).await?;
        let source = String::from_utf8(bytes)
            .map_err(|e| CanvasError::Parse(format!("{path}: invalid utf-8: {e}")))?;
        let file = parser.parse(&source, path)?;
        self.load_parsed(file);
        Ok(())
    }

    /// Bind a system declaration from the active file. On failure the
    /// previously bound system stays active.
    pub fn use_system(&self, name: &str) -> Result<()> {
        let file = self
            .state
            .read(|s| s.file.clone())
            .ok_or(CanvasError::NoFileLoaded)?;
        let graph = SystemGraph::bind(&file, name)?;
        self.state.write(|s| {
            s.system = Some(Arc::new(graph));
            s.flow_managed.clear();
            s.last_flow = None;
        });
        tracing::info!(canvas = %self.id, system = %name, "system bound");
        Ok(())
    }

    pub fn active_system(&self) -> Option<String> {
        self.state.read(|s| s.system.as_ref().map(|g| g.name.clone()))
    }

    // ---- parameters -------------------------------------------------------

    /// Write one override. The value is coerced to the declared parameter
    /// type where one exists; a manual set takes the path away from the
    /// flow solver for good.
    pub fn set(&self, path: &str, value: ParamValue) -> Result<()> {
        self.state.write(|s| {
            let system = s.system.as_ref().ok_or(CanvasError::NoActiveSystem)?;
            let (id, param) = system.resolve_param_path(path)?;
            let canonical = system.canonical_param_path(id, &param);
            let coerced = match system.get(id).params.get(&param) {
                Some(declared) => value.coerce(declared.param_type(), &canonical)?,
                None => value,
            };
            tracing::debug!(canvas = %self.id, path = %canonical, "parameter set");
            s.flow_managed.remove(&canonical);
            s.overrides.insert(canonical, coerced);
            Ok(())
        })
    }

    /// Read one parameter (override first, declared value second), or
    /// every override when `path` is `None`.
    pub fn get(&self, path: Option<&str>) -> Result<Vec<(String, ParamValue)>> {
        self.state.read(|s| match path {
            None => {
                let mut all: Vec<(String, ParamValue)> = s
                    .overrides
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                all.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(all)
            }
            Some(path) => {
                let system = s.system.as_ref().ok_or(CanvasError::NoActiveSystem)?;
                let (id, param) = system.resolve_param_path(path)?;
                let canonical = system.canonical_param_path(id, &param);
                let value = s
                    .overrides
                    .get(&canonical)
                    .or_else(|| system.get(id).params.get(&param))
                    .cloned()
                    .ok_or_else(|| SimError::UnknownParameter(path.to_string()))?;
                Ok(vec![(canonical, value)])
            }
        })
    }

    // ---- evaluation -------------------------------------------------------

    fn next_trial_seed(&self) -> u64 {
        self.base_seed
            .wrapping_add(self.trial_counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Evaluate `target` `runs` times, storing the result series under
    /// `var_name`. Each trial snapshots the override map, so concurrent
    /// sets land between trials, not inside them.
    pub fn run(&self, var_name: &str, target: &str, runs: usize) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(runs);
        for _ in 0..runs {
            let (system, overrides) = self
                .state
                .snapshot()
                .ok_or(CanvasError::NoActiveSystem)?;
            let tracer = BusTracer::new(self.bus.clone());
            let mut interp =
                Interpreter::new(&system, &overrides, &tracer, self.next_trial_seed());
            results.push(interp.invoke(target)?);
        }
        self.state.write(|s| {
            s.results.insert(var_name.to_string(), results.clone());
        });
        tracing::debug!(canvas = %self.id, target, runs, "run complete");
        Ok(results)
    }

    /// Stored result series from earlier [`run`](Canvas::run) calls
    pub fn results(&self, var_name: &str) -> Option<Vec<Value>> {
        self.state.read(|s| s.results.get(var_name).cloned())
    }

    /// One traced trial: returns the result and the collected event tree
    pub fn execute_trace(&self, target: &str) -> Result<(Value, Vec<TraceEvent>)> {
        let (system, overrides) = self
            .state
            .snapshot()
            .ok_or(CanvasError::NoActiveSystem)?;
        let tracer = CollectingTracer::new();
        let mut interp = Interpreter::new(&system, &overrides, &tracer, self.next_trial_seed());
        let value = interp.invoke(target)?;
        Ok((value, tracer.take()))
    }

    /// Exhaustive branch enumeration of `target`
    pub fn trace_all_paths(&self, target: &str, max_depth: Option<usize>) -> Result<PathNode> {
        let (system, _) = self
            .state
            .snapshot()
            .ok_or(CanvasError::NoActiveSystem)?;
        Ok(enumerate_paths(&system, target, max_depth)?)
    }

    /// Model-level utilization of queueing components, from their current
    /// parameters (overrides included). Components without a queueing
    /// model are omitted.
    pub fn utilization(&self, components: &[String]) -> Result<HashMap<String, f64>> {
        self.state.read(|s| {
            let system = s.system.as_ref().ok_or(CanvasError::NoActiveSystem)?;
            let mut out = HashMap::new();
            for name in components {
                let Some(id) = system.lookup(name) else {
                    return Err(SimError::UnknownTarget(name.clone()).into());
                };
                let instance = system.get(id);
                let view = ParamView::new(&instance.name, &s.overrides, &instance.params);
                let utilization = match &instance.body {
                    ComponentBody::Builtin(BuiltinKind::Queue) => {
                        let m = sdlsim_core::components::queuing::mmck(
                            view.u64("Servers", 1).max(1),
                            view.u64("Capacity", 16),
                            view.f64("ArrivalRate", 10.0).max(0.0),
                            view.f64("ServiceTime", 0.01).max(0.0),
                        );
                        Some(m.utilization)
                    }
                    ComponentBody::Builtin(BuiltinKind::ResourcePool) => {
                        let size = view.u64("Size", 10).max(1);
                        let rate = view.f64("ArrivalRate", 10.0).max(0.0);
                        let hold = view.f64("HoldTime", 0.05).max(1e-9);
                        Some(
                            sdlsim_core::components::queuing::mmc(size, rate, hold)
                                .map(|m| m.utilization)
                                .unwrap_or(1.0),
                        )
                    }
                    _ => None,
                };
                if let Some(utilization) = utilization {
                    out.insert(name.clone(), utilization);
                }
            }
            Ok(out)
        })
    }

    // ---- generators -------------------------------------------------------

    fn generator_seed(&self, id: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        self.base_seed.wrapping_add(hasher.finish())
    }

    /// Register a generator; enabled ones start immediately
    pub fn add_generator(&self, config: GeneratorConfig) -> Result<()> {
        let mut generators = self.generators.lock();
        if generators.contains_key(&config.id) {
            return Err(CanvasError::GeneratorExists(config.id));
        }
        let enabled = config.enabled;
        let id = config.id.clone();
        let mut handle = GeneratorHandle::new(config);
        if enabled {
            handle.start(self.state.clone(), self.bus.clone(), self.generator_seed(&id));
        }
        generators.insert(id, handle);
        Ok(())
    }

    /// Change a generator's rate; a running generator restarts with the
    /// new pace.
    pub async fn update_generator_rate(&self, id: &str, rate_rps: f64) -> Result<()> {
        let (was_running, task) = {
            let mut generators = self.generators.lock();
            let handle = generators
                .get_mut(id)
                .ok_or_else(|| CanvasError::GeneratorNotFound(id.to_string()))?;
            let was_running = handle.is_running();
            handle.config.rate_rps = rate_rps;
            let task = if was_running { handle.stop() } else { None };
            (was_running, task)
        };
        self.await_stopped(task).await;
        if was_running {
            let mut generators = self.generators.lock();
            if let Some(handle) = generators.get_mut(id) {
                handle.start(self.state.clone(), self.bus.clone(), self.generator_seed(id));
            }
        }
        Ok(())
    }

    /// Stop a generator's task, keeping its registration
    pub async fn pause_generator(&self, id: &str) -> Result<()> {
        let task = {
            let mut generators = self.generators.lock();
            let handle = generators
                .get_mut(id)
                .ok_or_else(|| CanvasError::GeneratorNotFound(id.to_string()))?;
            handle.stop()
        };
        self.await_stopped(task).await;
        Ok(())
    }

    /// Restart a paused generator; running ones are left alone
    pub fn resume_generator(&self, id: &str) -> Result<()> {
        let mut generators = self.generators.lock();
        let handle = generators
            .get_mut(id)
            .ok_or_else(|| CanvasError::GeneratorNotFound(id.to_string()))?;
        handle.start(self.state.clone(), self.bus.clone(), self.generator_seed(id));
        Ok(())
    }

    pub async fn remove_generator(&self, id: &str) -> Result<()> {
        let task = {
            let mut generators = self.generators.lock();
            let mut handle = generators
                .remove(id)
                .ok_or_else(|| CanvasError::GeneratorNotFound(id.to_string()))?;
            handle.stop()
        };
        self.await_stopped(task).await;
        Ok(())
    }

    pub fn start_all_generators(&self) {
        let mut generators = self.generators.lock();
        for (id, handle) in generators.iter_mut() {
            handle.start(self.state.clone(), self.bus.clone(), self.generator_seed(id));
        }
    }

    pub async fn stop_all_generators(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut generators = self.generators.lock();
            generators
                .values_mut()
                .filter_map(GeneratorHandle::stop)
                .collect()
        };
        if tasks.is_empty() {
            return;
        }
        if tokio::time::timeout(STOP_DEADLINE, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            tracing::warn!(
                canvas = %self.id,
                "generators did not acknowledge stop within deadline; proceeding"
            );
        }
    }

    pub fn generators(&self) -> Vec<GeneratorConfig> {
        let generators = self.generators.lock();
        let mut configs: Vec<GeneratorConfig> =
            generators.values().map(|h| h.config.clone()).collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        configs
    }

    /// Ticks dropped at the fan-out ceiling
    pub fn generator_dropped(&self, id: &str) -> Result<u64> {
        let generators = self.generators.lock();
        generators
            .get(id)
            .map(|h| h.dropped.load(Ordering::Relaxed))
            .ok_or_else(|| CanvasError::GeneratorNotFound(id.to_string()))
    }

    async fn await_stopped(&self, task: Option<JoinHandle<()>>) {
        if let Some(task) = task {
            if tokio::time::timeout(STOP_DEADLINE, task).await.is_err() {
                tracing::warn!(
                    canvas = %self.id,
                    "generator did not acknowledge stop within deadline; proceeding"
                );
            }
        }
    }

    // ---- metrics ----------------------------------------------------------

    pub fn add_metric(&self, spec: MetricSpec) -> Result<()> {
        self.engine.add(spec)
    }

    pub fn remove_metric(&self, id: &str) -> Result<()> {
        self.engine.remove(id)
    }

    pub fn list_metrics(&self) -> Vec<MetricSpec> {
        self.engine.list()
    }

    pub fn query_metrics(
        &self,
        id: &str,
        start: Option<f64>,
        end: Option<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<MetricPoint>> {
        self.engine.query(id, start, end, limit)
    }

    // ---- flow -------------------------------------------------------------

    /// Solve steady-state flow rates and write them back to each
    /// component's `ArrivalRate` parameter. Manual overrides win: a path
    /// the operator has set is never regenerated.
    pub fn evaluate_flows(&self, strategy: FlowStrategy) -> Result<FlowOutcome> {
        let (system, overrides) = self
            .state
            .snapshot()
            .ok_or(CanvasError::NoActiveSystem)?;

        // Boundary conditions: enabled generators, rates summed per target.
        let mut boundary: HashMap<String, f64> = HashMap::new();
        for config in self.generators() {
            if config.enabled {
                *boundary.entry(config.target.clone()).or_insert(0.0) += config.rate_rps;
            }
        }

        let config = FlowConfig::default();
        let (graph, mut warnings) = match strategy {
            FlowStrategy::Static => flow::static_graph(&system),
            FlowStrategy::Runtime => {
                let entries: Vec<String> = boundary.keys().cloned().collect();
                flow::runtime_graph(
                    &system,
                    &overrides,
                    &entries,
                    config.runtime_trials,
                    self.base_seed,
                )?
            }
        };
        let mut outcome = flow::solve(&graph, &boundary, &config);
        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;

        // Fold per-method rates into per-instance arrival rates.
        let mut arrivals: HashMap<String, f64> = HashMap::new();
        for (node, rate) in &outcome.rates {
            if let Some((instance, _)) = node.split_once('.') {
                *arrivals.entry(instance.to_string()).or_insert(0.0) += rate;
            }
        }

        self.state.write(|s| {
            for (instance, rate) in arrivals {
                let path = format!("{instance}.ArrivalRate");
                let manual =
                    s.overrides.contains_key(&path) && !s.flow_managed.contains(&path);
                if manual {
                    tracing::debug!(path = %path, "manual override wins, not regenerated");
                    continue;
                }
                s.overrides.insert(path.clone(), ParamValue::Float(rate));
                s.flow_managed.insert(path);
            }
            s.last_flow = Some(outcome.clone());
        });
        Ok(outcome)
    }

    /// Last flow solve, if any
    pub fn flow_state(&self) -> Option<FlowOutcome> {
        self.state.read(|s| s.last_flow.clone())
    }

    // ---- lifecycle --------------------------------------------------------

    /// Stop everything and clear all state, keeping the canvas id
    pub async fn reset(&self) {
        self.stop_all_generators().await;
        self.generators.lock().clear();
        self.engine.clear();
        self.state.write(|s| {
            s.file = None;
            s.system = None;
            s.overrides.clear();
            s.flow_managed.clear();
            s.results.clear();
            s.last_flow = None;
        });
        tracing::info!(canvas = %self.id, "canvas reset");
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("id", &self.id)
            .field("system", &self.active_system())
            .finish()
    }
}
