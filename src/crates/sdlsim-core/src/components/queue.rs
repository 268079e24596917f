//! Bounded queue model (M/M/c/K)
//!
//! Parameters: `ArrivalRate` (10 rps), `ServiceTime` (0.01 s), `Servers`
//! (1), `Capacity` (16 total in system), `EnqueueLatency` (0),
//! `BucketCount` (8). `Enqueue` fails with the steady-state blocking
//! probability; `Dequeue` charges the queueing delay of an admitted
//! customer.

use super::queuing;
use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

struct QueueParams {
    arrival_rate: f64,
    service_time: f64,
    servers: u64,
    capacity: u64,
    buckets: usize,
}

fn params(view: &ParamView<'_>) -> QueueParams {
    QueueParams {
        arrival_rate: view.f64("ArrivalRate", 10.0).max(0.0),
        service_time: view.f64("ServiceTime", 0.01).max(0.0),
        servers: view.u64("Servers", 1).max(1),
        capacity: view.u64("Capacity", 16),
        buckets: view.usize("BucketCount", 8),
    }
}

pub fn enqueue(view: &ParamView<'_>) -> Outcomes<Value> {
    let p = params(view);
    let m = queuing::mmck(p.servers, p.capacity, p.arrival_rate, p.service_time);
    let latency = view.f64("EnqueueLatency", 0.0).max(0.0);

    let mut out = Outcomes::new();
    if m.blocking < 1.0 {
        out.push(1.0 - m.blocking, latency, Value::bool(true));
    }
    if m.blocking > 0.0 {
        out.push(m.blocking, latency, Value::bool(false));
    }
    out
}

pub fn dequeue(view: &ParamView<'_>) -> Outcomes<Value> {
    let p = params(view);
    let m = queuing::mmck(p.servers, p.capacity, p.arrival_rate, p.service_time);

    let tail_mass = 1.0 - m.prob_no_wait;
    let tail_mean = if tail_mass > f64::EPSILON {
        m.mean_wait / tail_mass
    } else {
        0.0
    };
    let mut out = Outcomes::new();
    for (weight, duration) in queuing::discretized_wait(m.prob_no_wait, tail_mean, p.buckets) {
        out.push(weight, duration, Value::bool(true));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{OverrideMap, ParamValue};
    use std::collections::HashMap;

    fn declared(pairs: &[(&str, ParamValue)]) -> HashMap<String, ParamValue> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_enqueue_blocking_matches_mmck() {
        let overrides = OverrideMap::new();
        let declared = declared(&[
            ("ArrivalRate", ParamValue::Float(100.0)),
            ("ServiceTime", ParamValue::Float(0.02)),
            ("Servers", ParamValue::Int(1)),
            ("Capacity", ParamValue::Int(2)),
        ]);
        let view = ParamView::new("q", &overrides, &declared);

        let dist = enqueue(&view);
        let success = dist.mass_where(|v| v.is_success());
        assert!((success - 3.0 / 7.0).abs() < 0.02 * (3.0 / 7.0));
    }

    #[test]
    fn test_dequeue_wait_tracks_mean() {
        let overrides = OverrideMap::new();
        let declared = declared(&[
            ("ArrivalRate", ParamValue::Float(50.0)),
            ("ServiceTime", ParamValue::Float(0.01)),
            ("Servers", ParamValue::Int(1)),
            ("Capacity", ParamValue::Int(20)),
        ]);
        let view = ParamView::new("q", &overrides, &declared);

        let m = queuing::mmck(1, 20, 50.0, 0.01);
        let dist = dequeue(&view);
        assert!((dist.total_weight() - 1.0).abs() < 1e-9);
        assert!((dist.mean_duration() - m.mean_wait).abs() < 0.15 * m.mean_wait.max(1e-6));
    }
}
