//! Heap file model
//!
//! Parameters: `NumRecords` (1e6), `RecordsPerPage` (100),
//! `PageAccessTime` (200 µs), `WriteTime` (= PageAccessTime). Scans touch
//! every page; a point lookup scans half the file on average; inserts
//! append to the tail page; deletes find then rewrite the page.

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

fn num_pages(view: &ParamView<'_>) -> f64 {
    let records = view.f64("NumRecords", 1e6).max(1.0);
    let per_page = view.f64("RecordsPerPage", 100.0).max(1.0);
    (records / per_page).ceil().max(1.0)
}

pub fn scan(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    Outcomes::unit(num_pages(view) * page, Value::bool(true))
}

pub fn find(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    Outcomes::unit(0.5 * num_pages(view) * page, Value::bool(true))
}

pub fn insert(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    let write = view.f64("WriteTime", page);
    // Tail append: read the last page, write it back.
    Outcomes::unit(page + write, Value::bool(true))
}

pub fn delete(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    let write = view.f64("WriteTime", page);
    find(view).and(&Outcomes::unit(write, true), |a, _| a.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{OverrideMap, ParamValue};
    use std::collections::HashMap;

    #[test]
    fn test_find_is_half_scan() {
        let overrides = OverrideMap::new();
        let declared = HashMap::new();
        let view = ParamView::new("heap", &overrides, &declared);
        let ratio = find(&view).mean_duration() / scan(&view).mean_duration();
        assert!((ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_insert_is_constant() {
        let overrides = OverrideMap::new();
        let mut small = HashMap::new();
        small.insert("NumRecords".to_string(), ParamValue::Float(100.0));
        let mut large = HashMap::new();
        large.insert("NumRecords".to_string(), ParamValue::Float(1e8));

        let small_cost = insert(&ParamView::new("h", &overrides, &small)).mean_duration();
        let large_cost = insert(&ParamView::new("h", &overrides, &large)).mean_duration();
        assert!((small_cost - large_cost).abs() < 1e-12);
    }

    #[test]
    fn test_delete_exceeds_find() {
        let overrides = OverrideMap::new();
        let declared = HashMap::new();
        let view = ParamView::new("heap", &overrides, &declared);
        assert!(delete(&view).mean_duration() > find(&view).mean_duration());
    }
}
