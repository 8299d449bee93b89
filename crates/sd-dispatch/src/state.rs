//! The shared dispatch tables.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use sd_core::{AgentId, FacilityId, SiteId, Tuning};

use crate::{ClaimRegistry, DispatchEnv, DispatchError, DispatchResult, OldTargets, PendingSwarm, ServiceArea};

/// Everything the dispatch operations read and write between calls.
///
/// Owned by exactly one caller; operations borrow the fields they need.
pub struct DispatchState {
    pub areas:          BTreeMap<FacilityId, ServiceArea>,
    pub claims:         ClaimRegistry,
    pub old_targets:    OldTargets,
    /// Game seconds of each agent's last accepted retarget.
    pub last_change:    FxHashMap<AgentId, f64>,
    pub pending_swarms: BTreeMap<SiteId, PendingSwarm>,
}

/// The tables a service-area operation works on, borrowed alongside the
/// area itself.
pub struct Ledger<'s> {
    pub claims:         &'s mut ClaimRegistry,
    pub old_targets:    &'s mut OldTargets,
    pub last_change:    &'s FxHashMap<AgentId, f64>,
    pub pending_swarms: &'s mut BTreeMap<SiteId, PendingSwarm>,
}

impl DispatchState {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            areas:          BTreeMap::new(),
            claims:         ClaimRegistry::new(),
            old_targets:    OldTargets::new(tuning.max_failed_targets),
            last_change:    FxHashMap::default(),
            pending_swarms: BTreeMap::new(),
        }
    }

    /// Split the state into `facility`'s area and the shared tables.
    pub fn area_and_ledger(&mut self, facility: FacilityId) -> DispatchResult<(&mut ServiceArea, Ledger<'_>)> {
        let area = self.areas.get_mut(&facility).ok_or(DispatchError::UnknownArea(facility))?;
        let ledger = Ledger {
            claims:         &mut self.claims,
            old_targets:    &mut self.old_targets,
            last_change:    &self.last_change,
            pending_swarms: &mut self.pending_swarms,
        };
        Ok((area, ledger))
    }

    /// Register `site` with every service area.
    pub fn add_site_everywhere(&mut self, site: SiteId, env: &DispatchEnv<'_>) {
        for area in self.areas.values_mut() {
            area.add_demand_site(site, env);
        }
    }

    /// Best unclaimed site of `facility`'s area for `agent`.
    pub fn unclaimed_target(
        &mut self,
        facility: FacilityId,
        agent:    Option<AgentId>,
        env:      &DispatchEnv<'_>,
    ) -> DispatchResult<Option<SiteId>> {
        let (area, mut ledger) = self.area_and_ledger(facility)?;
        Ok(area.unclaimed_target(&mut ledger, agent, env))
    }

    /// Drop every per-agent entry held for `agent`.
    pub fn forget_agent(&mut self, agent: AgentId) {
        self.old_targets.clear(agent);
        self.last_change.remove(&agent);
        self.claims.release_agent(agent);
    }
}
