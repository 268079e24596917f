//! Shared mutable core of a canvas
//!
//! Mutating operations take the write lock; trials (on-demand runs,
//! generator ticks, path walks) take a read snapshot (an `Arc` of the
//! bound system plus a clone of the override map) at the start of each
//! trial. A `set` issued mid-run therefore affects subsequent trials, never
//! in-flight ones.

use parking_lot::RwLock;
use sdlsim_core::ast::FileDecl;
use sdlsim_core::flow::FlowOutcome;
use sdlsim_core::params::OverrideMap;
use sdlsim_core::system::SystemGraph;
use sdlsim_core::value::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Lock-protected canvas state
#[derive(Debug, Default)]
pub struct SharedState {
    inner: RwLock<CanvasState>,
}

/// The data under the canvas lock
#[derive(Debug, Default)]
pub struct CanvasState {
    pub file: Option<Arc<FileDecl>>,
    pub system: Option<Arc<SystemGraph>>,
    pub overrides: OverrideMap,
    /// `ArrivalRate` override paths the flow solver owns; a manual `set`
    /// takes a path out of this set and the solver never touches it again
    pub flow_managed: HashSet<String>,
    /// Result series stored by `run`, keyed by variable name
    pub results: HashMap<String, Vec<Value>>,
    pub last_flow: Option<FlowOutcome>,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Read snapshot for one trial
    pub fn snapshot(&self) -> Option<(Arc<SystemGraph>, OverrideMap)> {
        let state = self.inner.read();
        state
            .system
            .as_ref()
            .map(|system| (system.clone(), state.overrides.clone()))
    }

    pub fn read<R>(&self, f: impl FnOnce(&CanvasState) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut CanvasState) -> R) -> R {
        f(&mut self.inner.write())
    }
}
