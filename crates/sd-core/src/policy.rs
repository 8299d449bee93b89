//! Policy parameters and tuning constants.
//!
//! [`PolicyParams`] are the user-facing named values (counts, thresholds,
//! toggles) persisted by the host.  [`Tuning`] holds the fixed constants the
//! heuristics were calibrated with; tests and embedders may override them
//! programmatically but they are never persisted.

use serde::{Deserialize, Serialize};

// ── PolicyParams ──────────────────────────────────────────────────────────────

/// User-facing dispatch policy.  All fields have defaults; see
/// [`PolicyParams::clamped`] for the accepted ranges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyParams {
    /// Agents burst-dispatched when an emergency is detected.  1–50.
    pub emergency_agent_count:     u32,
    /// Agents redirected to each replacement site once a swarm resolves.  1–10.
    pub swarm_redirect_group_size: u32,
    /// Minimum load for a site to count as a demand site.  100–10000.
    pub load_threshold:            u32,
    /// Agents sent to the single normal-mode target.  1–10.
    pub normal_dispatch_count:     u32,
    /// Restrict agents to sites in their home facility's region.
    pub region_restricted:         bool,
    /// Skip dispatch when the facility lacks storage space.
    pub respect_facility_capacity: bool,
    pub enable_low_cargo_recall:   bool,
    /// Game days on route before the low-cargo check applies.  1–30.
    pub low_cargo_recall_days:     f64,
    /// Cargo below which a long-running agent is recalled.  0–20000.
    pub low_cargo_threshold:       u32,
    /// Milliseconds between scans; 0 scans every tick.  0–2000.
    pub scan_frequency_ms:         u32,

    pub log_dispatch:              bool,
    pub log_emergency:             bool,
    pub log_recalls:               bool,
    pub log_verbose:               bool,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            emergency_agent_count:     5,
            swarm_redirect_group_size: 3,
            load_threshold:            1_500,
            normal_dispatch_count:     2,
            region_restricted:         false,
            respect_facility_capacity: true,
            enable_low_cargo_recall:   true,
            low_cargo_recall_days:     10.0,
            low_cargo_threshold:       2_000,
            scan_frequency_ms:         333,
            log_dispatch:              false,
            log_emergency:             false,
            log_recalls:               false,
            log_verbose:               false,
        }
    }
}

impl PolicyParams {
    /// Return a copy with every numeric value forced into its valid range.
    pub fn clamped(&self) -> Self {
        Self {
            emergency_agent_count:     self.emergency_agent_count.clamp(1, 50),
            swarm_redirect_group_size: self.swarm_redirect_group_size.clamp(1, 10),
            load_threshold:            self.load_threshold.clamp(100, 10_000),
            normal_dispatch_count:     self.normal_dispatch_count.clamp(1, 10),
            low_cargo_recall_days:     self.low_cargo_recall_days.clamp(1.0, 30.0),
            low_cargo_threshold:       self.low_cargo_threshold.min(20_000),
            scan_frequency_ms:         self.scan_frequency_ms.min(2_000),
            ..self.clone()
        }
    }

    /// Scan interval in seconds.
    #[inline]
    pub fn scan_interval_secs(&self) -> f64 {
        self.scan_frequency_ms as f64 / 1_000.0
    }
}

// ── Tuning ────────────────────────────────────────────────────────────────────

/// Fixed constants of the dispatch heuristics.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuning {
    /// Squared distance under which a claim becomes uncontestable and a
    /// candidate reaches immediacy tier 2.
    pub close_range_sq:            f32,
    /// Squared distance under which a candidate can reach tier 1, and beyond
    /// which it can count as "along the way".
    pub medium_range_sq:           f32,
    /// Radius for snapping a world position to the path network.
    pub approach_search_radius:    f32,
    /// A second approach candidate is dropped when the first is closer than this.
    pub min_approach_distance:     f32,
    /// A challenger must be within this ratio of the incumbent's distance.
    pub distance_buffer:           f32,
    pub max_path_cost:             u32,
    pub max_retry_attempts:        u32,
    /// Free storage a consuming facility needs before it dispatches.
    pub min_space_for_dispatch:    u32,
    pub target_change_window_secs: f64,
    pub swarm_timeout_secs:        f64,
    pub full_scan_interval_secs:   f64,
    pub retarget_cooldown_days:    f64,
    pub max_failed_targets:        usize,
    pub target_change_list_limit:  usize,
    /// Load at or below which a swarm's target is considered cleared.
    pub swarm_cleared_load:        u32,
    /// Old-target count beyond which the closest-target search stops early.
    pub thrash_old_target_limit:   usize,
    pub offer_priority:            u8,
    /// Max offset applied to unspawn positions, per axis.
    pub unspawn_jitter:            f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            close_range_sq:            4_000.0,
            medium_range_sq:           20_000.0,
            approach_search_radius:    32.0,
            min_approach_distance:     10.0,
            distance_buffer:           0.9,
            max_path_cost:             20_000,
            max_retry_attempts:        20,
            min_space_for_dispatch:    20_000,
            target_change_window_secs: 10.0,
            swarm_timeout_secs:        5.0,
            full_scan_interval_secs:   10.0,
            retarget_cooldown_days:    0.5,
            max_failed_targets:        20,
            target_change_list_limit:  20,
            swarm_cleared_load:        100,
            thrash_old_target_limit:   5,
            offer_priority:            7,
            unspawn_jitter:            4.0,
        }
    }
}

// ── DispatchConfig ────────────────────────────────────────────────────────────

/// Read-only configuration handed to every dispatch component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchConfig {
    pub policy: PolicyParams,
    pub tuning: Tuning,
}

impl DispatchConfig {
    pub fn new(policy: PolicyParams) -> Self {
        Self { policy: policy.clamped(), tuning: Tuning::default() }
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }
}
