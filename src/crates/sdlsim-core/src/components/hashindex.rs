//! Hash index model
//!
//! Parameters: `PageAccessTime` (200 µs), `AvgOverflowReads` (0.2),
//! `WriteTime` (= PageAccessTime), `ResizeProb` (0.001), `ResizeCost`
//! (50 ms). A lookup reads the primary bucket page plus a fractional
//! number of overflow pages; the fraction is expressed as a two-bucket
//! split so the distribution keeps the average without inventing partial
//! page reads.

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

pub fn find(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    let overflow = view.f64("AvgOverflowReads", 0.2).max(0.0);

    let base_reads = 1.0 + overflow.floor();
    let frac = overflow - overflow.floor();

    let mut out = Outcomes::new();
    if frac < 1.0 {
        out.push(1.0 - frac, base_reads * page, Value::bool(true));
    }
    if frac > 0.0 {
        out.push(frac, (base_reads + 1.0) * page, Value::bool(true));
    }
    out
}

fn with_write(view: &ParamView<'_>, resize: bool) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    let write = view.f64("WriteTime", page);

    let mut out = find(view).and(&Outcomes::unit(write, true), |a, _| a.clone());
    if resize {
        let resize_prob = view.f64("ResizeProb", 0.001).clamp(0.0, 1.0);
        let resize_cost = view.f64("ResizeCost", 0.05);
        if resize_prob > 0.0 {
            let amortized = Outcomes::new()
                .add(1.0 - resize_prob, 0.0, Value::bool(true))
                .add(resize_prob, resize_cost, Value::bool(true));
            out = out.and(&amortized, |a, _| a.clone());
        }
    }
    out
}

pub fn insert(view: &ParamView<'_>) -> Outcomes<Value> {
    with_write(view, true)
}

pub fn delete(view: &ParamView<'_>) -> Outcomes<Value> {
    with_write(view, false)
}
