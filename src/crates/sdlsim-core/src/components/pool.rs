//! Resource pool model (M/M/c)
//!
//! Parameters: `Size` (10 servers), `ArrivalRate` (10 rps), `HoldTime`
//! (0.05 s), `Timeout` (1 s), `BucketCount` (8). `Acquire` waits the
//! Erlang-C queueing delay. A pool driven at or past saturation has no
//! steady state; acquisition then fails after the timeout.

use super::queuing;
use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

pub fn acquire(view: &ParamView<'_>) -> Outcomes<Value> {
    let size = view.u64("Size", 10).max(1);
    let arrival_rate = view.f64("ArrivalRate", 10.0).max(0.0);
    let hold_time = view.f64("HoldTime", 0.05).max(1e-9);
    let timeout = view.f64("Timeout", 1.0).max(0.0);
    let buckets = view.usize("BucketCount", 8);

    match queuing::mmc(size, arrival_rate, hold_time) {
        Some(m) => {
            let mut out = Outcomes::new();
            for (weight, duration) in
                queuing::discretized_wait(1.0 - m.prob_wait, m.cond_wait, buckets)
            {
                out.push(weight, duration, Value::bool(true));
            }
            out
        }
        None => {
            tracing::warn!(
                instance = view.instance(),
                size,
                arrival_rate,
                hold_time,
                "resource pool saturated; Acquire fails after timeout"
            );
            Outcomes::unit(timeout, Value::bool(false))
        }
    }
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
    fn test_acquire_mean_matches_erlang_c() {
        let overrides = OverrideMap::new();
        let declared = declared(&[
            ("Size", ParamValue::Int(1)),
            ("ArrivalRate", ParamValue::Float(5.0)),
            ("HoldTime", ParamValue::Float(0.1)),
        ]);
        let view = ParamView::new("pool", &overrides, &declared);

        // M/M/1, ρ = 0.5 → Wq = 0.1.
        let dist = acquire(&view);
        assert!((dist.mean_duration() - 0.1).abs() < 0.015);
        assert!((dist.mass_where(|v| v.is_success()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_saturated_pool_fails() {
        let overrides = OverrideMap::new();
        let declared = declared(&[
            ("Size", ParamValue::Int(1)),
            ("ArrivalRate", ParamValue::Float(100.0)),
            ("HoldTime", ParamValue::Float(0.1)),
            ("Timeout", ParamValue::Float(2.0)),
        ]);
        let view = ParamView::new("pool", &overrides, &declared);

        let dist = acquire(&view);
        assert_eq!(dist.len(), 1);
        assert!(!dist.buckets()[0].value.is_success());
        assert_eq!(dist.buckets()[0].duration, 2.0);
    }
}
