//! Windowed metric aggregation over the trace stream
//!
//! Each registered metric filters the bus down to exit events of one
//! component (optionally a method subset), keeps the raw samples in a
//! bounded ring, and aggregates lazily on query over window-sized slices.
//! Events older than the open window are dropped and counted rather than
//! re-opening closed windows.

use crate::error::{CanvasError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use sdlsim_core::trace::{TraceEvent, TraceKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a metric measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Matching exits per window
    Count,
    /// Reduction over exit durations per window
    Latency,
    /// Busy time over window length
    Utilization,
}

/// Reduction applied within each window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Rate,
    Avg,
    Min,
    Max,
    P50,
    P90,
    P95,
    P99,
}

impl Aggregation {
    fn quantile(self) -> Option<f64> {
        match self {
            Aggregation::P50 => Some(0.50),
            Aggregation::P90 => Some(0.90),
            Aggregation::P95 => Some(0.95),
            Aggregation::P99 => Some(0.99),
            _ => None,
        }
    }
}

/// Configuration of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub id: String,
    pub name: String,
    /// Instance name the metric watches
    pub component: String,
    /// Method subset; empty means every method of the component
    pub methods: Vec<String>,
    pub kind: MetricKind,
    pub aggregation: Aggregation,
    pub window_seconds: f64,
    /// Ring-buffer bound on raw samples
    pub capacity: usize,
    pub enabled: bool,
}

impl MetricSpec {
    pub fn new(id: impl Into<String>, component: impl Into<String>, kind: MetricKind) -> Self {
        let id = id.into();
        MetricSpec {
            name: id.clone(),
            id,
            component: component.into(),
            methods: Vec::new(),
            kind,
            aggregation: match kind {
                MetricKind::Count => Aggregation::Sum,
                MetricKind::Latency => Aggregation::Avg,
                MetricKind::Utilization => Aggregation::Avg,
            },
            window_seconds: 1.0,
            capacity: 8192,
            enabled: true,
        }
    }

    pub fn with_methods(mut self, methods: Vec<&str>) -> Self {
        self.methods = methods.into_iter().map(str::to_string).collect();
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_window(mut self, seconds: f64) -> Self {
        self.window_seconds = seconds;
        self
    }
}

/// One aggregated data point; `timestamp` is the window start in unix
/// seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    wall: f64,
    duration: f64,
}

#[derive(Debug, Default)]
struct Ring {
    samples: VecDeque<Sample>,
    watermark: f64,
}

/// A registered metric: filter, ring buffer, lazy aggregation
#[derive(Debug)]
pub struct Metric {
    spec: MetricSpec,
    enabled: AtomicBool,
    ring: Mutex<Ring>,
    late_dropped: AtomicU64,
}

impl Metric {
    fn new(spec: MetricSpec) -> Self {
        let enabled = spec.enabled;
        Metric {
            spec,
            enabled: AtomicBool::new(enabled),
            ring: Mutex::new(Ring::default()),
            late_dropped: AtomicU64::new(0),
        }
    }

    pub fn spec(&self) -> &MetricSpec {
        &self.spec
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn late_dropped(&self) -> u64 {
        self.late_dropped.load(Ordering::Relaxed)
    }

    fn matches(&self, event: &TraceEvent) -> bool {
        event.kind == TraceKind::Exit
            && event.component == self.spec.component
            && (self.spec.methods.is_empty()
                || self.spec.methods.iter().any(|m| *m == event.method))
    }

    /// Feed one bus event through the filter into the ring
    pub fn record(&self, event: &TraceEvent) {
        if !self.is_enabled() || !self.matches(event) {
            return;
        }
        let Some(duration) = event.duration else {
            return;
        };
        let wall = event.wall.timestamp_micros() as f64 / 1e6;

        let mut ring = self.ring.lock();
        let window = self.spec.window_seconds.max(1e-3);
        let open_window_start = (ring.watermark / window).floor() * window;
        if ring.watermark > 0.0 && wall < open_window_start {
            self.late_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        ring.watermark = ring.watermark.max(wall);
        ring.samples.push_back(Sample { wall, duration });
        while ring.samples.len() > self.spec.capacity.max(1) {
            ring.samples.pop_front();
        }
    }

    /// Aggregate on demand over window-sized slices of the retained
    /// samples, oldest window first.
    pub fn query(
        &self,
        start: Option<f64>,
        end: Option<f64>,
        limit: Option<usize>,
    ) -> Vec<MetricPoint> {
        let window = self.spec.window_seconds.max(1e-3);
        let ring = self.ring.lock();

        let mut grouped: Vec<(i64, Vec<f64>)> = Vec::new();
        for sample in &ring.samples {
            if start.is_some_and(|s| sample.wall < s) || end.is_some_and(|e| sample.wall >= e) {
                continue;
            }
            let index = (sample.wall / window).floor() as i64;
            match grouped.iter_mut().find(|(i, _)| *i == index) {
                Some((_, durations)) => durations.push(sample.duration),
                None => grouped.push((index, vec![sample.duration])),
            }
        }
        grouped.sort_by_key(|(i, _)| *i);

        let mut points: Vec<MetricPoint> = grouped
            .into_iter()
            .map(|(index, durations)| MetricPoint {
                timestamp: index as f64 * window,
                value: self.aggregate(&durations, window),
            })
            .collect();

        if let Some(limit) = limit {
            if points.len() > limit {
                points.drain(..points.len() - limit);
            }
        }
        points
    }

    fn aggregate(&self, durations: &[f64], window: f64) -> f64 {
        match self.spec.kind {
            MetricKind::Count => {
                let n = durations.len() as f64;
                match self.spec.aggregation {
                    Aggregation::Rate => n / window,
                    _ => n,
                }
            }
            MetricKind::Latency => reduce(durations, self.spec.aggregation),
            MetricKind::Utilization => {
                // Busy time integrated over the window. Trials are
                // instantaneous in wall time, so the simulated durations of
                // the exits landing in the window are the busy intervals.
                durations.iter().sum::<f64>() / window
            }
        }
    }
}

fn reduce(durations: &[f64], aggregation: Aggregation) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    match aggregation {
        Aggregation::Sum => durations.iter().sum(),
        Aggregation::Rate => durations.iter().sum(),
        Aggregation::Avg => durations.iter().sum::<f64>() / durations.len() as f64,
        Aggregation::Min => durations.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => durations.iter().copied().fold(0.0, f64::max),
        quantile => {
            let q = quantile.quantile().unwrap_or(0.5);
            let mut sorted = durations.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let rank = ((sorted.len() as f64 * q).ceil() as usize).clamp(1, sorted.len());
            sorted[rank - 1]
        }
    }
}

/// Registry of metrics plus the bus pump feeding them
#[derive(Debug, Default)]
pub struct MetricEngine {
    metrics: DashMap<String, Arc<Metric>>,
}

impl MetricEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, spec: MetricSpec) -> Result<()> {
        if self.metrics.contains_key(&spec.id) {
            return Err(CanvasError::MetricExists(spec.id));
        }
        tracing::debug!(metric = %spec.id, component = %spec.component, "metric registered");
        self.metrics.insert(spec.id.clone(), Arc::new(Metric::new(spec)));
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.metrics
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CanvasError::MetricNotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Metric>> {
        self.metrics.get(id).map(|m| m.clone())
    }

    pub fn list(&self) -> Vec<MetricSpec> {
        let mut specs: Vec<MetricSpec> =
            self.metrics.iter().map(|m| m.spec().clone()).collect();
        specs.sort_by(|a, b| a.id.cmp(&b.id));
        specs
    }

    pub fn query(
        &self,
        id: &str,
        start: Option<f64>,
        end: Option<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<MetricPoint>> {
        self.get(id)
            .map(|m| m.query(start, end, limit))
            .ok_or_else(|| CanvasError::MetricNotFound(id.to_string()))
    }

    pub fn clear(&self) {
        self.metrics.clear();
    }

    /// Route one trace event to every enabled metric
    pub fn observe(&self, event: &TraceEvent) {
        for metric in self.metrics.iter() {
            metric.record(event);
        }
    }

    /// Drain a bus subscription into the engine until the bus closes
    pub fn pump(engine: Arc<Self>, mut rx: mpsc::Receiver<TraceEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.observe(&event);
            }
            tracing::debug!("metric pump stopped");
        })
    }
}
