//! Sorted file model
//!
//! Parameters: `NumRecords` (1e6), `RecordsPerPage` (100),
//! `PageAccessTime` (200 µs), `CompareTime` (1 µs), `WriteTime`
//! (= PageAccessTime). A full scan touches every page; a point lookup
//! binary-searches pages then records within the page; inserts and deletes
//! shift a quarter of the pages on average to keep order.

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
    let compare = view.f64("CompareTime", 1e-6);
    let per_page = view.f64("RecordsPerPage", 100.0).max(1.0);

    let page_probes = num_pages(view).log2().ceil().max(1.0);
    let record_probes = per_page.log2().ceil().max(1.0);
    Outcomes::unit(
        page_probes * page + record_probes * compare,
        Value::bool(true),
    )
}

fn shift(view: &ParamView<'_>) -> Outcomes<Value> {
    let page = view.f64("PageAccessTime", 200e-6);
    let write = view.f64("WriteTime", page);
    // Keeping the file sorted rewrites a quarter of the pages on average.
    Outcomes::unit(0.25 * num_pages(view) * (page + write), Value::bool(true))
}

pub fn insert(view: &ParamView<'_>) -> Outcomes<Value> {
    find(view).and(&shift(view), |a, b| {
        Value::bool(a.is_success() && b.is_success())
    })
}

pub fn delete(view: &ParamView<'_>) -> Outcomes<Value> {
    insert(view)
}
