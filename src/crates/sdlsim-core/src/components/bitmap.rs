//! Bitmap index model
//!
//! Parameters: `NumRecords` (1e6), `Cardinality` (100), `Selectivity`
//! (0.1), `LoadTime` (1 ms), `BitOpTimePerWord` (2 ns),
//! `PerResultTime` (100 ns), `WriteTime` (1 ms). An operation loads the
//! relevant bit vectors, runs bitwise combines over the record bitmap,
//! then processes the qualifying rows (records × selectivity, bounded by
//! cardinality fan-out).

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

struct BitmapCosts {
    load: f64,
    ops: f64,
    results: f64,
    write: f64,
}

fn costs(view: &ParamView<'_>) -> BitmapCosts {
    let records = view.f64("NumRecords", 1e6).max(1.0);
    let cardinality = view.f64("Cardinality", 100.0).max(1.0);
    let selectivity = view.f64("Selectivity", 0.1).clamp(0.0, 1.0);
    let load = view.f64("LoadTime", 1e-3);
    let op_per_word = view.f64("BitOpTimePerWord", 2e-9);
    let per_result = view.f64("PerResultTime", 100e-9);
    let write = view.f64("WriteTime", 1e-3);

    // One bit vector per distinct value touched; point operations combine
    // a couple of vectors, so scale word ops by a small constant.
    let words = (records / 64.0).ceil();
    let vectors_touched = 2.0_f64.min(cardinality);
    BitmapCosts {
        load,
        ops: words * vectors_touched * op_per_word,
        results: records * selectivity * per_result,
        write,
    }
}

pub fn find(view: &ParamView<'_>) -> Outcomes<Value> {
    let c = costs(view);
    Outcomes::unit(c.load + c.ops + c.results, Value::bool(true))
}

pub fn insert(view: &ParamView<'_>) -> Outcomes<Value> {
    let c = costs(view);
    Outcomes::unit(c.load + c.ops + c.write, Value::bool(true))
}

pub fn delete(view: &ParamView<'_>) -> Outcomes<Value> {
    insert(view)
}

pub fn update(view: &ParamView<'_>) -> Outcomes<Value> {
    let c = costs(view);
    // Update clears one bit vector position and sets another.
    Outcomes::unit(c.load + c.ops + 2.0 * c.write, Value::bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{OverrideMap, ParamValue};
    use std::collections::HashMap;

    #[test]
    fn test_result_processing_scales_with_selectivity() {
        let overrides = OverrideMap::new();
        let mut low = HashMap::new();
        low.insert("Selectivity".to_string(), ParamValue::Float(0.01));
        let mut high = HashMap::new();
        high.insert("Selectivity".to_string(), ParamValue::Float(0.5));

        let low_cost = find(&ParamView::new("bi", &overrides, &low)).mean_duration();
        let high_cost = find(&ParamView::new("bi", &overrides, &high)).mean_duration();
        assert!(high_cost > low_cost);
    }

    #[test]
    fn test_update_is_dearer_than_insert() {
        let overrides = OverrideMap::new();
        let declared = HashMap::new();
        let view = ParamView::new("bi", &overrides, &declared);
        assert!(update(&view).mean_duration() > insert(&view).mean_duration());
    }
}
