//! Disk model: bucketed latency profiles per media type
//!
//! Parameters: `Profile` ("SSD" or "HDD", default SSD). The profiles are
//! three-bucket approximations of typical/degraded/tail access latency.

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

const SSD_READ: &[(f64, f64)] = &[(0.95, 50e-6), (0.04, 200e-6), (0.01, 1e-3)];
const SSD_WRITE: &[(f64, f64)] = &[(0.95, 80e-6), (0.04, 500e-6), (0.01, 2e-3)];
const HDD_READ: &[(f64, f64)] = &[(0.90, 4e-3), (0.08, 8e-3), (0.02, 20e-3)];
const HDD_WRITE: &[(f64, f64)] = &[(0.90, 5e-3), (0.08, 10e-3), (0.02, 25e-3)];

fn profile(view: &ParamView<'_>, ssd: &[(f64, f64)], hdd: &[(f64, f64)]) -> Outcomes<Value> {
    let name = view.str("Profile", "SSD");
    let table = if name.eq_ignore_ascii_case("HDD") { hdd } else { ssd };
    let mut out = Outcomes::new();
    for (weight, duration) in table {
        out.push(*weight, *duration, Value::bool(true));
    }
    out
}

pub fn read(view: &ParamView<'_>) -> Outcomes<Value> {
    profile(view, SSD_READ, HDD_READ)
}

pub fn write(view: &ParamView<'_>) -> Outcomes<Value> {
    profile(view, SSD_WRITE, HDD_WRITE)
}

/// Read, process for `extra` simulated seconds, then write
pub fn read_process_write(view: &ParamView<'_>, extra: f64) -> Outcomes<Value> {
    let extra = extra.max(0.0);
    read(view)
        .and(&Outcomes::unit(extra, true), |a, _| a.clone())
        .and(&write(view), |a, b| {
            Value::bool(a.is_success() && b.is_success())
        })
}
