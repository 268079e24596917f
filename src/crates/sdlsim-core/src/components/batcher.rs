//! Batcher model
//!
//! Parameters: `Policy` ("size", "timeout" or "hybrid", default hybrid),
//! `BatchSize` (10), `Timeout` (10 ms), `ArrivalRate` (100 rps),
//! `DownstreamBatchTime` (1 ms), `BucketCount` (6). `Submit` charges the
//! expected wait until the batch closes plus the downstream processing of
//! the whole batch. Composing with a real downstream component is done in
//! the language by wiring the batcher ahead of it; the built-in amortizes
//! the downstream as a parameter.

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

/// Expected wait of a random arrival until its batch closes, and the batch
/// size the policy actually achieves.
fn batch_wait(policy: &str, size: f64, timeout: f64, rate: f64) -> (f64, f64) {
    let fill_time = if rate > 0.0 { (size - 1.0) / rate } else { f64::INFINITY };
    match policy {
        // Wait for the batch to fill; a uniformly random position in the
        // batch waits half the fill time on average.
        "size" => (fill_time / 2.0, size),
        // Flush on a fixed clock regardless of fill.
        "timeout" => {
            let effective = if rate > 0.0 { (rate * timeout).max(1.0).min(size) } else { 1.0 };
            (timeout / 2.0, effective)
        }
        // Whichever closes the batch first.
        _ => {
            if fill_time <= timeout {
                (fill_time / 2.0, size)
            } else {
                let effective = if rate > 0.0 { (rate * timeout).max(1.0) } else { 1.0 };
                (timeout / 2.0, effective)
            }
        }
    }
}

pub fn submit(view: &ParamView<'_>) -> Outcomes<Value> {
    let policy = view.str("Policy", "hybrid");
    let size = view.f64("BatchSize", 10.0).max(1.0);
    let timeout = view.f64("Timeout", 10e-3).max(0.0);
    let rate = view.f64("ArrivalRate", 100.0).max(0.0);
    let downstream = view.f64("DownstreamBatchTime", 1e-3).max(0.0);
    let buckets = view.usize("BucketCount", 6).max(1);

    let (mean_wait, effective_batch) = batch_wait(&policy, size, timeout, rate);
    let mean_wait = if mean_wait.is_finite() { mean_wait } else { timeout.max(0.0) };

    // Spread the wait uniformly over the closing window: position in the
    // batch is uniform, so the wait is too.
    let mut out = Outcomes::new();
    let span = mean_wait * 2.0;
    let per_bucket = 1.0 / buckets as f64;
    for i in 0..buckets {
        let frac = (i as f64 + 0.5) / buckets as f64;
        out.push(per_bucket, span * frac, Value::bool(true));
    }

    // Downstream processes the whole batch before results return; cost
    // grows mildly with the batch it actually carries.
    let downstream_cost = downstream * (1.0 + effective_batch.log2().max(0.0) / 10.0);
    out.and(&Outcomes::unit(downstream_cost, true), |a, _| a.clone())
}
