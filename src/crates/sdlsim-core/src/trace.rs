//! Trace events and the tracer seam
//!
//! The interpreter pushes an `enter` event for every method call and an
//! `exit` with the measured duration (or the error) when the call returns.
//! Events form a forest: one tree per top-level trial, linked through
//! `parent_id`. Where the events go is a collaborator decision behind the
//! [`Tracer`] trait: the hosting runtime bridges them onto its trace bus,
//! while trace/path inspection uses [`CollectingTracer`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Kind of a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Enter,
    Exit,
    Log,
}

/// A single trace record
///
/// `timestamp` is simulated seconds since the trial's start; `wall` is the
/// wall-clock instant the event was created, used only by windowed metric
/// aggregation. Every `enter` with id X is closed by exactly one `exit`
/// with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub id: u64,
    /// Id of the enclosing call's `enter` event; 0 for trial roots
    pub parent_id: u64,
    pub kind: TraceKind,
    /// Simulated seconds since the trial started
    pub timestamp: f64,
    /// Wall-clock instant the event was emitted
    pub wall: DateTime<Utc>,
    pub component: String,
    pub method: String,
    /// `component.method`, the form metric filters match on
    pub target: String,
    pub args: Vec<serde_json::Value>,
    pub return_value: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Simulated duration of the call; present on `exit` events
    pub duration: Option<f64>,
}

impl TraceEvent {
    pub fn enter(
        id: u64,
        parent_id: u64,
        timestamp: f64,
        component: &str,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Self {
        TraceEvent {
            id,
            parent_id,
            kind: TraceKind::Enter,
            timestamp,
            wall: Utc::now(),
            component: component.to_string(),
            method: method.to_string(),
            target: format!("{component}.{method}"),
            args,
            return_value: None,
            error_message: None,
            duration: None,
        }
    }

    pub fn exit(
        id: u64,
        parent_id: u64,
        timestamp: f64,
        component: &str,
        method: &str,
        duration: f64,
        return_value: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> Self {
        TraceEvent {
            id,
            parent_id,
            kind: TraceKind::Exit,
            timestamp,
            wall: Utc::now(),
            component: component.to_string(),
            method: method.to_string(),
            target: format!("{component}.{method}"),
            args: Vec::new(),
            return_value,
            error_message,
            duration: Some(duration),
        }
    }

    pub fn log(
        id: u64,
        parent_id: u64,
        timestamp: f64,
        component: &str,
        method: &str,
        args: Vec<serde_json::Value>,
    ) -> Self {
        TraceEvent {
            id,
            parent_id,
            kind: TraceKind::Log,
            timestamp,
            wall: Utc::now(),
            component: component.to_string(),
            method: method.to_string(),
            target: format!("{component}.{method}"),
            args,
            return_value: None,
            error_message: None,
            duration: None,
        }
    }

    pub fn is_exit(&self) -> bool {
        self.kind == TraceKind::Exit
    }

    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Sink for interpreter trace events
pub trait Tracer: Send + Sync {
    fn emit(&self, event: TraceEvent);
}

/// Discards every event; the default for detached evaluation
#[derive(Debug, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn emit(&self, _event: TraceEvent) {}
}

/// Buffers events in memory for trace and path inspection
#[derive(Debug, Default)]
pub struct CollectingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl CollectingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything collected so far
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("tracer lock poisoned").clone()
    }

    /// Drain the buffer
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock().expect("tracer lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("tracer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Tracer for CollectingTracer {
    fn emit(&self, event: TraceEvent) {
        self.events.lock().expect("tracer lock poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_exit_pairing_fields() {
        let enter = TraceEvent::enter(1, 0, 0.0, "app", "Lookup", vec![]);
        let exit = TraceEvent::exit(1, 0, 0.012, "app", "Lookup", 0.012, None, None);
        assert_eq!(enter.id, exit.id);
        assert_eq!(enter.target, "app.Lookup");
        assert_eq!(exit.duration, Some(0.012));
        assert!(!exit.is_failure());
    }

    #[test]
    fn test_collecting_tracer_buffers_in_order() {
        let tracer = CollectingTracer::new();
        tracer.emit(TraceEvent::enter(1, 0, 0.0, "a", "M", vec![]));
        tracer.emit(TraceEvent::exit(1, 0, 0.5, "a", "M", 0.5, None, None));

        let events = tracer.take();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TraceKind::Enter);
        assert_eq!(events[1].kind, TraceKind::Exit);
        assert!(tracer.is_empty());
    }

    #[test]
    fn test_serialized_field_names_are_stable() {
        let event = TraceEvent::exit(
            3,
            1,
            0.25,
            "db",
            "Find",
            0.25,
            Some(serde_json::json!(true)),
            None,
        );
        let json = serde_json::to_value(&event).unwrap();
        for field in [
            "id",
            "parent_id",
            "kind",
            "timestamp",
            "component",
            "method",
            "target",
            "args",
            "return_value",
            "error_message",
            "duration",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["kind"], "exit");
    }
}
