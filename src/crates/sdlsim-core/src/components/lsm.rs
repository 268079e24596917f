//! LSM tree model
//!
//! Parameters: `MemtableHitRate` (0.05), `MemtableReadTime` (10 µs),
//! `Levels` (3), `SSTableReadTime` (200 µs), `ReadAmpFactor` (1.5),
//! `WriteLatency` (50 µs), `WriteAmpFactor` (4), `CompactionProb` (0.05),
//! `CompactionSlowdown` (5 ms). Reads walk memtable → L0 → deeper levels,
//! paying one amplified SSTable read per level descended; the probability
//! mass not absorbed by the memtable spreads evenly over the levels.
//! Writes pay the amplified write path. Both operations carry a
//! probabilistic compaction-interference layer.

use crate::outcome::Outcomes;
use crate::params::ParamView;
use crate::value::Value;

fn compaction_layer(view: &ParamView<'_>) -> Outcomes<Value> {
    let prob = view.f64("CompactionProb", 0.05).clamp(0.0, 1.0);
    let slowdown = view.f64("CompactionSlowdown", 5e-3);
    let mut out = Outcomes::new();
    if prob < 1.0 {
        out.push(1.0 - prob, 0.0, Value::bool(true));
    }
    if prob > 0.0 {
        out.push(prob, slowdown, Value::bool(true));
    }
    out
}

pub fn read(view: &ParamView<'_>) -> Outcomes<Value> {
    let mem_hit = view.f64("MemtableHitRate", 0.05).clamp(0.0, 1.0);
    let mem_read = view.f64("MemtableReadTime", 10e-6);
    let levels = view.u64("Levels", 3).max(1);
    let sstable_read = view.f64("SSTableReadTime", 200e-6);
    let read_amp = view.f64("ReadAmpFactor", 1.5).max(1.0);

    let mut out = Outcomes::new();
    if mem_hit > 0.0 {
        out.push(mem_hit, mem_read, Value::bool(true));
    }
    let disk_mass = 1.0 - mem_hit;
    if disk_mass > 0.0 {
        let per_level = disk_mass / levels as f64;
        for level in 1..=levels {
            out.push(
                per_level,
                mem_read + level as f64 * sstable_read * read_amp,
                Value::bool(true),
            );
        }
    }
    out.and(&compaction_layer(view), |a, _| a.clone())
}

pub fn write(view: &ParamView<'_>) -> Outcomes<Value> {
    let write_latency = view.f64("WriteLatency", 50e-6);
    let write_amp = view.f64("WriteAmpFactor", 4.0).max(1.0);

    Outcomes::unit(write_latency * write_amp, Value::bool(true))
        .and(&compaction_layer(view), |a, _| a.clone())
}
