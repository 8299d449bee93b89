//! CSV policy loader and writer.
//!
//! # CSV format
//!
//! Two columns, one row per named value.  Rows may appear in any order and
//! omitted names keep their defaults.
//!
//! ```csv
//! name,value
//! emergency_agent_count,8
//! region_restricted,true
//! low_cargo_recall_days,7.5
//! ```
//!
//! Unknown names and unparsable values are errors; out-of-range numbers are
//! clamped rather than rejected.

use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, PolicyParams};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize, Serialize)]
struct PolicyRecord {
    name:  String,
    value: String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load [`PolicyParams`] from a CSV file.
pub fn load_policy_csv(path: &Path) -> CoreResult<PolicyParams> {
    let file = std::fs::File::open(path)?;
    load_policy_reader(file)
}

/// Like [`load_policy_csv`] but accepts any `Read` source.
pub fn load_policy_reader<R: Read>(reader: R) -> CoreResult<PolicyParams> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut params = PolicyParams::default();

    for result in csv_reader.deserialize::<PolicyRecord>() {
        let record = result?;
        apply(&mut params, record.name.trim(), record.value.trim())?;
    }

    Ok(params.clamped())
}

/// Write `params` as a `name,value` CSV.
pub fn save_policy_writer<W: Write>(params: &PolicyParams, writer: W) -> CoreResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (name, value) in entries(params) {
        csv_writer.serialize(PolicyRecord { name: name.to_string(), value })?;
    }
    csv_writer.flush()?;
    Ok(())
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn parse<T: FromStr>(name: &str, value: &str) -> CoreResult<T> {
    value
        .parse()
        .map_err(|_| CoreError::Parse(format!("invalid value {value:?} for {name}")))
}

fn apply(p: &mut PolicyParams, name: &str, value: &str) -> CoreResult<()> {
    match name {
        "emergency_agent_count"     => p.emergency_agent_count     = parse(name, value)?,
        "swarm_redirect_group_size" => p.swarm_redirect_group_size = parse(name, value)?,
        "load_threshold"            => p.load_threshold            = parse(name, value)?,
        "normal_dispatch_count"     => p.normal_dispatch_count     = parse(name, value)?,
        "region_restricted"         => p.region_restricted         = parse(name, value)?,
        "respect_facility_capacity" => p.respect_facility_capacity = parse(name, value)?,
        "enable_low_cargo_recall"   => p.enable_low_cargo_recall   = parse(name, value)?,
        "low_cargo_recall_days"     => p.low_cargo_recall_days     = parse(name, value)?,
        "low_cargo_threshold"       => p.low_cargo_threshold       = parse(name, value)?,
        "scan_frequency_ms"         => p.scan_frequency_ms         = parse(name, value)?,
        "log_dispatch"              => p.log_dispatch              = parse(name, value)?,
        "log_emergency"             => p.log_emergency             = parse(name, value)?,
        "log_recalls"               => p.log_recalls               = parse(name, value)?,
        "log_verbose"               => p.log_verbose               = parse(name, value)?,
        other => return Err(CoreError::Config(format!("unknown policy parameter {other:?}"))),
    }
    Ok(())
}

fn entries(p: &PolicyParams) -> Vec<(&'static str, String)> {
    vec![
        ("emergency_agent_count",     p.emergency_agent_count.to_string()),
        ("swarm_redirect_group_size", p.swarm_redirect_group_size.to_string()),
        ("load_threshold",            p.load_threshold.to_string()),
        ("normal_dispatch_count",     p.normal_dispatch_count.to_string()),
        ("region_restricted",         p.region_restricted.to_string()),
        ("respect_facility_capacity", p.respect_facility_capacity.to_string()),
        ("enable_low_cargo_recall",   p.enable_low_cargo_recall.to_string()),
        ("low_cargo_recall_days",     p.low_cargo_recall_days.to_string()),
        ("low_cargo_threshold",       p.low_cargo_threshold.to_string()),
        ("scan_frequency_ms",         p.scan_frequency_ms.to_string()),
        ("log_dispatch",              p.log_dispatch.to_string()),
        ("log_emergency",             p.log_emergency.to_string()),
        ("log_recalls",               p.log_recalls.to_string()),
        ("log_verbose",               p.log_verbose.to_string()),
    ]
}
