//! Facility and demand-site discovery.
//!
//! A full scan walks every site and facility of the world.  It runs when
//! the number of sites plus facilities changed since the last scan, or when
//! the periodic full-scan interval (game time) elapsed.  Otherwise a quick
//! scan only re-checks the demand sites already known, dropping the ones
//! that were removed or no longer need service.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::debug;

use sd_core::{DispatchConfig, FacilityId, Priority, SimClock, SiteId};
use sd_world::World;

/// A site whose priority went up since the previous scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Escalation {
    pub site: SiteId,
    pub from: Priority,
    pub to:   Priority,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanReport {
    pub full:        bool,
    pub escalations: Vec<Escalation>,
}

#[derive(Default)]
pub struct Scanner {
    facilities: BTreeSet<FacilityId>,
    /// Sites over the load threshold or carrying an escalated priority.
    demand:     BTreeSet<SiteId>,
    priorities: FxHashMap<SiteId, Priority>,
    last_count: Option<usize>,
    /// Game seconds of the last full scan.
    last_full:  Option<f64>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facilities(&self) -> &BTreeSet<FacilityId> {
        &self.facilities
    }

    pub fn demand_sites(&self) -> &BTreeSet<SiteId> {
        &self.demand
    }

    /// Full or quick scan, whichever is due.
    pub fn scan(&mut self, world: &World, clock: SimClock, config: &DispatchConfig) -> ScanReport {
        let count = world.site_count() + world.facility_ids().count();
        let interval = config.tuning.full_scan_interval_secs;
        let stale = self.last_full.is_none_or(|t| clock.game_secs - t > interval);
        if stale || self.last_count != Some(count) {
            self.full_scan(world, clock, config)
        } else {
            self.quick_scan(world, config)
        }
    }

    pub fn full_scan(&mut self, world: &World, clock: SimClock, config: &DispatchConfig) -> ScanReport {
        let threshold = config.policy.load_threshold;
        let mut escalations = Vec::new();
        let mut priorities = FxHashMap::default();

        self.facilities = world.facility_ids().collect();
        self.demand.clear();
        for (id, site) in world.sites() {
            let last = self.priorities.get(&id).copied().unwrap_or_default();
            if site.priority > last {
                escalations.push(Escalation { site: id, from: last, to: site.priority });
            }
            priorities.insert(id, site.priority);
            if world.qualifies(id, threshold) || site.priority.is_escalated() {
                self.demand.insert(id);
            }
        }
        self.priorities = priorities;
        self.last_count = Some(world.site_count() + self.facilities.len());
        self.last_full = Some(clock.game_secs);

        log_escalations(world, &escalations, config);
        ScanReport { full: true, escalations }
    }

    fn quick_scan(&mut self, world: &World, config: &DispatchConfig) -> ScanReport {
        let threshold = config.policy.load_threshold;
        let mut escalations = Vec::new();
        let priorities = &mut self.priorities;

        self.demand.retain(|&id| {
            let Some(site) = world.site(id) else {
                priorities.remove(&id);
                return false;
            };
            let escalated = site.priority.is_escalated();
            if escalated {
                let last = priorities.insert(id, site.priority).unwrap_or_default();
                if site.priority > last {
                    escalations.push(Escalation { site: id, from: last, to: site.priority });
                }
            }
            let keep = escalated || world.qualifies(id, threshold);
            if !keep {
                priorities.remove(&id);
            }
            keep
        });

        log_escalations(world, &escalations, config);
        ScanReport { full: false, escalations }
    }
}

fn log_escalations(world: &World, escalations: &[Escalation], config: &DispatchConfig) {
    if !config.policy.log_emergency {
        return;
    }
    for e in escalations {
        let load = world.site(e.site).map_or(0, |s| s.load);
        debug!(target: "sd::emergency", site = %e.site, from = %e.from, to = %e.to, load,
            threshold = config.policy.load_threshold, "site priority escalated");
    }
}
