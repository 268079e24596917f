//! Cache model: hit-rate branch with an optional uniform failure layer
//!
//! Parameters: `HitRate` (0.8), `HitLatency` (1 ms), `MissLatency` (10 ms),
//! `WriteLatency` (2 ms), `FailureProb` (0). A read hit yields `true`, a
//! miss yields `false` so callers can branch to the backing store. Failures
//! present as misses after the full miss latency.

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

pub fn read(view: &ParamView<'_>) -> Outcomes<Value> {
    let hit_rate = view.f64("HitRate", 0.8).clamp(0.0, 1.0);
    let hit_latency = view.f64("HitLatency", 1e-3);
    let miss_latency = view.f64("MissLatency", 10e-3);
    let failure = view.f64("FailureProb", 0.0).clamp(0.0, 1.0);

    let mut out = Outcomes::new();
    let ok = 1.0 - failure;
    if ok * hit_rate > 0.0 {
        out.push(ok * hit_rate, hit_latency, Value::bool(true));
    }
    if ok * (1.0 - hit_rate) > 0.0 {
        out.push(ok * (1.0 - hit_rate), miss_latency, Value::bool(false));
    }
    if failure > 0.0 {
        out.push(failure, miss_latency, Value::bool(false));
    }
    out
}

pub fn write(view: &ParamView<'_>) -> Outcomes<Value> {
    let write_latency = view.f64("WriteLatency", 2e-3);
    let failure = view.f64("FailureProb", 0.0).clamp(0.0, 1.0);

    let mut out = Outcomes::new();
    if failure < 1.0 {
        out.push(1.0 - failure, write_latency, Value::bool(true));
    }
    if failure > 0.0 {
        out.push(failure, write_latency, Value::bool(false));
    }
    out
}
