//! Network link model
//!
//! Parameters: `BaseLatency` (1 ms), `MaxJitter` (0.5 ms),
//! `PacketLossProb` (0.001), `BucketCount` (5). The continuous jitter law
//! is discretized into evenly spaced latency buckets; packet loss is a
//! separate failure bucket charged the base latency (the caller learns of
//! the loss no sooner than the transfer would have taken).

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

pub fn transfer(view: &ParamView<'_>) -> Outcomes<Value> {
    let base = view.f64("BaseLatency", 1e-3).max(0.0);
    let jitter = view.f64("MaxJitter", 0.5e-3).max(0.0);
    let loss = view.f64("PacketLossProb", 0.001).clamp(0.0, 1.0);
    let buckets = view.usize("BucketCount", 5).max(1);

    let mut out = Outcomes::new();
    let delivered = 1.0 - loss;
    if delivered > 0.0 {
        let per_bucket = delivered / buckets as f64;
        for i in 0..buckets {
            let frac = if buckets == 1 {
                0.5
            } else {
                i as f64 / (buckets - 1) as f64
            };
            out.push(per_bucket, base + jitter * frac, Value::bool(true));
        }
    }
    if loss > 0.0 {
        out.push(loss, base, Value::bool(false));
    }
    out
}
