//! B-tree index model
//!
//! Parameters: `Fanout` (100), `NumRecords` (1e6), `PageAccessTime`
//! (200 µs), `NodeSearchTime` (5 µs), `WriteTime` (= PageAccessTime),
//! `BufferHitRate` (0.8), `BucketCount` (trim cap, 24). Tree height is
//! ⌈log_fanout(records)⌉; a lookup pays one node visit per level, each
//! visit hitting the buffer pool with `BufferHitRate`. Inserts and deletes
//! add a leaf write plus a split/merge propagation scaled by 1/Fanout.

use super::DEFAULT_TRIM_BUCKETS;
use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

fn height(fanout: f64, records: f64) -> u64 {
    if records <= 1.0 || fanout <= 1.0 {
        return 1;
    }
    (records.ln() / fanout.ln()).ceil().max(1.0) as u64
}

fn level_visit(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    let cpu = view.f64("NodeSearchTime", 5e-6);
    let hit = view.f64("BufferHitRate", 0.8).clamp(0.0, 1.0);

    let mut out = Outcomes::new();
    if hit > 0.0 {
        out.push(hit, cpu, Value::bool(true));
    }
    if hit < 1.0 {
        out.push(1.0 - hit, page + cpu, Value::bool(true));
    }
    out
}

pub fn find(view: &ParamView<'_>) -> Outcomes<Value> {
    let fanout = view.f64("Fanout", 100.0);
    let records = view.f64("NumRecords", 1e6);
    let trim = view.usize("BucketCount", DEFAULT_TRIM_BUCKETS);
    let levels = height(fanout, records);

    let visit = level_visit(view);
    let mut out = Outcomes::unit(0.0, Value::bool(true));
    for _ in 0..levels {
        out = out
            .and(&visit, |a, b| {
                Value::bool(a.is_success() && b.is_success())
            })
            .trim_to_size(trim, trim);
    }
    out
}

fn mutate(view: &ParamView<'_>) -> Outcomes<Value> {
    let fanout = view.f64("Fanout", 100.0).max(2.0);
    let records = view.f64("NumRecords", 1e6);
    let page = view.f64("PageAccessTime", 200e-6);
    let write = view.f64("WriteTime", page);
    let trim = view.usize("BucketCount", DEFAULT_TRIM_BUCKETS);
    let levels = height(fanout, records);

    // Leaf write always happens; a structural change propagates one write
    // per level with probability ~1/fanout.
    let propagation_prob = (1.0 / fanout).clamp(0.0, 1.0);
    let leaf = Outcomes::unit(write, Value::bool(true));
    let structural = Outcomes::new()
        .add(1.0 - propagation_prob, 0.0, Value::bool(true))
        .add(propagation_prob, levels as f64 * write, Value::bool(true));

    find(view)
        .and(&leaf, |a, _| a.clone())
        .and(&structural, |a, _| a.clone())
        .trim_to_size(trim, trim)
}

pub fn insert(view: &ParamView<'_>) -> Outcomes<Value> {
    mutate(view)
}

pub fn delete(view: &ParamView<'_>) -> Outcomes<Value> {
    mutate(view)
}
