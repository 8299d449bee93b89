//! Fluent builder for constructing an [`Orchestrator`].

use std::path::PathBuf;

use sd_core::{load_policy_csv, DispatchConfig, PolicyParams, Tuning};
use sd_world::PathService;

use crate::{Orchestrator, SimError, SimResult};

/// Fluent builder for [`Orchestrator<P>`].
///
/// # Required inputs
///
/// - `P: PathService`: the host's movement planner (e.g.
///   [`sd_world::NetworkPathService`])
///
/// # Optional inputs (have defaults)
///
/// | Method              | Default                  |
/// |---------------------|--------------------------|
/// | `.policy(p)`        | `PolicyParams::default()` |
/// | `.policy_file(f)`   | n/a                      |
/// | `.tuning(t)`        | `Tuning::default()`      |
///
/// `.policy` and `.policy_file` are mutually exclusive.
///
/// # Example
///
/// ```rust,ignore
/// let mut orch = OrchestratorBuilder::new(NetworkPathService::new(network, DijkstraRouter))
///     .policy_file("policy.csv")
///     .build()?;
/// ```
pub struct OrchestratorBuilder<P: PathService> {
    paths:       P,
    policy:      Option<PolicyParams>,
    policy_file: Option<PathBuf>,
    tuning:      Option<Tuning>,
}

impl<P: PathService> OrchestratorBuilder<P> {
    pub fn new(paths: P) -> Self {
        Self { paths, policy: None, policy_file: None, tuning: None }
    }

    /// Use `policy`; out-of-range values are clamped.
    pub fn policy(mut self, policy: PolicyParams) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Load the policy from a `name,value` CSV file at build time.
    pub fn policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_file = Some(path.into());
        self
    }

    /// Override the heuristic constants.
    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = Some(tuning);
        self
    }

    /// Resolve the configuration, validate it and return an orchestrator
    /// that builds its baseline on the first `update`.
    pub fn build(self) -> SimResult<Orchestrator<P>> {
        // ── Resolve the policy ────────────────────────────────────────────
        let policy = match (self.policy, self.policy_file) {
            (Some(_), Some(_)) => {
                return Err(SimError::Config("both a policy and a policy file were given".into()));
            }
            (Some(p), None) => p,
            (None, Some(path)) => load_policy_csv(&path)?,
            (None, None) => PolicyParams::default(),
        };

        let config = DispatchConfig::new(policy).with_tuning(self.tuning.unwrap_or_default());
        validate_config(&config)?;
        Ok(Orchestrator::new(config, self.paths))
    }
}

/// Reject tuning constants the heuristics cannot work with.
pub fn validate_config(config: &DispatchConfig) -> SimResult<()> {
    let t = &config.tuning;
    if !(t.close_range_sq > 0.0 && t.close_range_sq < t.medium_range_sq) {
        return Err(SimError::Config(format!(
            "close range² ({}) must be positive and below medium range² ({})",
            t.close_range_sq, t.medium_range_sq
        )));
    }
    if !(t.distance_buffer > 0.0 && t.distance_buffer <= 1.0) {
        return Err(SimError::Config(format!("distance buffer {} outside (0, 1]", t.distance_buffer)));
    }
    if t.max_retry_attempts == 0 || t.max_failed_targets == 0 || t.target_change_list_limit == 0 {
        return Err(SimError::Config("retry, failed-target and change-list limits must be at least 1".into()));
    }
    if t.approach_search_radius <= 0.0 {
        return Err(SimError::Config(format!("approach search radius {} must be positive", t.approach_search_radius)));
    }
    Ok(())
}
