//! Per-facility service area.
//!
//! A facility tracks the demand sites it may serve in two zones:
//!
//! * **primary**: same region as the facility (and, for a facility outside
//!   any region, also within its service radius);
//! * **secondary**: anything else within the service radius.
//!
//! Zones only ever hold site keys.  Sites that stop qualifying are purged
//! lazily by whichever search runs into them first.

use std::collections::BTreeSet;

use tracing::debug;

use sd_core::time::SECS_PER_DAY;
use sd_core::{AgentId, AgentStatus, FacilityId, LanePosition, Priority, RegionId, SiteId, WorldPos};
use sd_world::WorldError;

use crate::heuristic::{immediate_search_direction, score, Contest, Incumbent, SearchDirection};
use crate::{DispatchEnv, DispatchResult, Ledger, PendingSwarm};

// ── Dispatch outcome ──────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    Emergency,
    Normal,
}

/// What one `dispatch_idle_agents` call sent out.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchOutcome {
    pub mode:       DispatchMode,
    /// Sites that received agents, in dispatch order.
    pub targets:    Vec<SiteId>,
    pub dispatched: u32,
}

// ── ServiceArea ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ServiceArea {
    facility:  FacilityId,
    primary:   BTreeSet<SiteId>,
    secondary: BTreeSet<SiteId>,
}

/// The parts of an agent a target search reads.
struct Seeker {
    id:       AgentId,
    target:   Option<SiteId>,
    position: WorldPos,
    heading:  f64,
}

impl ServiceArea {
    pub fn new(facility: FacilityId) -> Self {
        Self { facility, primary: BTreeSet::new(), secondary: BTreeSet::new() }
    }

    #[inline]
    pub fn facility(&self) -> FacilityId {
        self.facility
    }

    pub fn primary(&self) -> &BTreeSet<SiteId> {
        &self.primary
    }

    pub fn secondary(&self) -> &BTreeSet<SiteId> {
        &self.secondary
    }

    pub fn contains(&self, site: SiteId) -> bool {
        self.primary.contains(&site) || self.secondary.contains(&site)
    }

    /// Both zones, primary first.
    pub fn sites(&self) -> impl Iterator<Item = SiteId> + '_ {
        self.primary.iter().chain(self.secondary.iter()).copied()
    }

    pub fn remove_site(&mut self, site: SiteId) {
        self.primary.remove(&site);
        self.secondary.remove(&site);
    }

    /// Place `site` in the primary or secondary zone, or nowhere if it is
    /// out of range.  A site already tracked stays where it is.
    pub fn add_demand_site(&mut self, site: SiteId, env: &DispatchEnv<'_>) {
        if self.contains(site) {
            return;
        }
        let (Some(f), Some(s)) = (env.world.facility(self.facility), env.world.site(site)) else {
            return;
        };
        let within_radius = f.position.dist_sq(s.position) <= f.service_radius * f.service_radius;
        if f.region == s.region && (f.region.is_some() || within_radius) {
            self.primary.insert(site);
        } else if within_radius {
            self.secondary.insert(site);
        }
    }

    fn home_region(&self, env: &DispatchEnv<'_>) -> DispatchResult<Option<RegionId>> {
        let f = env.world.facility(self.facility).ok_or(WorldError::FacilityNotFound(self.facility))?;
        Ok(f.region)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    /// Send idle agents out of the facility: a burst towards escalated sites
    /// if there are any, otherwise a fixed-size group to one unclaimed site.
    pub fn dispatch_idle_agents(
        &mut self,
        ledger: &mut Ledger<'_>,
        env:    &mut DispatchEnv<'_>,
    ) -> DispatchResult<Option<DispatchOutcome>> {
        let fid = self.facility;
        let f = env.world.facility(fid).ok_or(WorldError::FacilityNotFound(fid))?;
        if f.shutting_down || (!f.active && f.production_rate == 0) || f.evacuating || f.full {
            return Ok(None);
        }
        let region = f.region;
        let max = f.max_working_agents() as i64;
        let now = env.world.facility_agents(fid).len() as i64;

        if env.policy().respect_facility_capacity {
            let required = if f.consumes_load { env.tuning().min_space_for_dispatch } else { 1 };
            if f.free_storage() < required {
                if env.policy().log_dispatch {
                    debug!(target: "sd::dispatch", facility = %fid, free = f.free_storage(), required,
                        "facility too full, skipping dispatch");
                }
                return Ok(None);
            }
        }

        let priority = |s: SiteId| env.world.site_priority(s);
        let cross_region = !env.policy().region_restricted || region.is_none();
        let escalated = self.primary.iter().any(|&s| priority(s) >= Priority::Warning)
            || (cross_region && self.secondary.iter().any(|&s| priority(s) == Priority::Critical));

        if escalated {
            self.dispatch_emergency(ledger, env, region, max - now)
        } else {
            self.dispatch_normal(ledger, env, region, max - now)
        }
    }

    fn dispatch_emergency(
        &mut self,
        ledger:    &mut Ledger<'_>,
        env:       &mut DispatchEnv<'_>,
        region:    Option<RegionId>,
        available: i64,
    ) -> DispatchResult<Option<DispatchOutcome>> {
        let fid = self.facility;
        let log = env.policy().log_emergency;
        let cross_region = !env.policy().region_restricted || region.is_none();

        // Claimed sites stay eligible.
        let mut targets: Vec<SiteId> = self
            .primary
            .iter()
            .copied()
            .filter(|&s| env.world.site_priority(s) >= Priority::Warning)
            .filter(|&s| {
                let ok = env.region_allows(region, s);
                if !ok && log {
                    debug!(target: "sd::emergency", facility = %fid, site = %s, "skipping out-of-region emergency site");
                }
                ok
            })
            .collect();
        if cross_region {
            targets.extend(
                self.secondary.iter().copied().filter(|&s| env.world.site_priority(s) == Priority::Critical),
            );
        }
        if targets.is_empty() {
            return Ok(None);
        }
        if log {
            debug!(target: "sd::emergency", facility = %fid, targets = targets.len(), available,
                "emergency dispatch");
        }
        if available <= 0 {
            return Ok(None);
        }

        let n = (env.policy().emergency_agent_count as i64).min(available) as usize;
        let mut sent = Vec::with_capacity(n);
        for &site in targets.iter().cycle().take(n) {
            env.world.start_transfer(fid, site);
            sent.push(site);
        }

        let key = targets[0];
        let game_secs = env.clock.game_secs;
        ledger
            .pending_swarms
            .entry(key)
            .and_modify(|p| p.expected += n as u32)
            .or_insert(PendingSwarm { expected: n as u32, created_at: game_secs });
        if log {
            debug!(target: "sd::emergency", facility = %fid, site = %key, agents = n, "pending swarm registered");
        }

        Ok(Some(DispatchOutcome { mode: DispatchMode::Emergency, targets: sent, dispatched: n as u32 }))
    }

    fn dispatch_normal(
        &mut self,
        ledger:    &mut Ledger<'_>,
        env:       &mut DispatchEnv<'_>,
        region:    Option<RegionId>,
        available: i64,
    ) -> DispatchResult<Option<DispatchOutcome>> {
        let n = (env.policy().normal_dispatch_count as i64).min(available);
        if n <= 0 {
            return Ok(None);
        }

        let target = {
            let view: &DispatchEnv<'_> = env;
            let mut open = |s: SiteId| {
                view.region_allows(region, s) && view.qualifies(s) && !firmly_claimed(s, ledger, view)
            };
            self.primary
                .iter()
                .copied()
                .find(|&s| open(s))
                .or_else(|| self.secondary.iter().copied().find(|&s| open(s)))
        };
        let Some(target) = target else {
            return Ok(None);
        };

        for _ in 0..n {
            env.world.start_transfer(self.facility, target);
        }
        if env.policy().log_dispatch {
            debug!(target: "sd::dispatch", facility = %self.facility, site = %target, agents = n, "normal dispatch");
        }
        Ok(Some(DispatchOutcome { mode: DispatchMode::Normal, targets: vec![target], dispatched: n as u32 }))
    }

    // ── Target search ─────────────────────────────────────────────────────

    /// Highest-priority site nobody holds firmly, nearest to the facility
    /// among equals.  Primary zone first.  Sites in `agent`'s old-targets set
    /// are skipped.
    pub fn unclaimed_target(
        &mut self,
        ledger: &mut Ledger<'_>,
        agent:  Option<AgentId>,
        env:    &DispatchEnv<'_>,
    ) -> Option<SiteId> {
        let f = env.world.facility(self.facility)?;
        let (origin, region) = (f.position, f.region);
        unclaimed_in(&mut self.primary, origin, region, agent, ledger, env)
            .or_else(|| unclaimed_in(&mut self.secondary, origin, region, agent, ledger, env))
    }

    /// The site `agent` should head for next, or `None` to leave it alone.
    ///
    /// Returns the agent's current target when no better site turns up.
    pub fn assign_target(
        &mut self,
        ledger: &mut Ledger<'_>,
        agent:  AgentId,
        env:    &DispatchEnv<'_>,
    ) -> DispatchResult<Option<SiteId>> {
        let a = env.world.try_agent(agent)?;
        if a.home != Some(self.facility) || a.is_near_path_end() {
            return Ok(None);
        }
        let region = self.home_region(env)?;
        let status = a.status();
        let lane: Option<LanePosition> = a.lane.clone();
        let seeker = Seeker { id: agent, target: a.target, position: a.position, heading: a.velocity.heading() };

        let mut current = seeker.target;
        match current {
            Some(t) if !env.region_allows(region, t) => {
                if env.policy().log_dispatch {
                    debug!(target: "sd::dispatch", agent = %agent, site = %t, "dropping out-of-region target");
                }
                ledger.old_targets.clear(agent);
                current = None;
            }
            Some(t) if !env.qualifies(t) => {
                ledger.old_targets.clear(agent);
                ledger.claims.remove_claim(t);
                self.remove_site(t);
                current = None;
            }
            Some(t) if ledger.claims.is_held_by_other(t, agent, env) => current = None,
            Some(_) => {}
            None => ledger.old_targets.clear(agent),
        }

        if current.is_some() && status == AgentStatus::EnRouteReturning {
            let cooldown = env.tuning().retarget_cooldown_days;
            let recent = ledger
                .last_change
                .get(&agent)
                .is_some_and(|&t| (env.clock.game_secs - t) / SECS_PER_DAY < cooldown);
            if recent {
                return Ok(None);
            }
        }

        let in_zone = current.is_some_and(|t| self.contains(t));
        let dir = immediate_search_direction(lane.as_ref());
        let found = if in_zone && dir.is_none() {
            current
        } else {
            closest_target(&mut self.primary, &seeker, in_zone, dir, region, ledger, env)
                .or_else(|| closest_target(&mut self.secondary, &seeker, in_zone, dir, region, ledger, env))
        };

        match found {
            Some(t) => Ok(Some(t)),
            None => {
                ledger.old_targets.clear(agent);
                Ok(seeker.target)
            }
        }
    }
}

// ── Zone scans ────────────────────────────────────────────────────────────────

fn firmly_claimed(site: SiteId, ledger: &mut Ledger<'_>, env: &DispatchEnv<'_>) -> bool {
    ledger.claims.get_claim(site, env).is_some_and(|c| c.is_valid() && !c.is_challengeable())
}

fn purge(zone: &mut BTreeSet<SiteId>, dead: Vec<SiteId>, ledger: &mut Ledger<'_>) {
    for s in dead {
        ledger.claims.remove_claim(s);
        zone.remove(&s);
    }
}

fn unclaimed_in(
    zone:   &mut BTreeSet<SiteId>,
    origin: WorldPos,
    region: Option<RegionId>,
    agent:  Option<AgentId>,
    ledger: &mut Ledger<'_>,
    env:    &DispatchEnv<'_>,
) -> Option<SiteId> {
    let mut dead = Vec::new();
    let mut best: Option<(SiteId, Priority, f32)> = None;

    for &site in zone.iter() {
        if agent.is_some_and(|a| ledger.old_targets.contains(a, site)) || !env.region_allows(region, site) {
            continue;
        }
        if !env.qualifies(site) {
            dead.push(site);
            continue;
        }
        if firmly_claimed(site, ledger, env) {
            continue;
        }
        let Some(s) = env.world.site(site) else { continue };
        let d = origin.dist_sq(s.position);
        let better = match best {
            None => true,
            Some((_, bp, bd)) => s.priority > bp || (s.priority == bp && d <= bd),
        };
        if better {
            best = Some((site, s.priority, d));
        }
    }

    purge(zone, dead, ledger);
    best.map(|(site, _, _)| site)
}

fn closest_target(
    zone:           &mut BTreeSet<SiteId>,
    seeker:         &Seeker,
    immediate_only: bool,
    dir:            SearchDirection,
    region:         Option<RegionId>,
    ledger:         &mut Ledger<'_>,
    env:            &DispatchEnv<'_>,
) -> Option<SiteId> {
    let agent = seeker.id;
    let tuning = env.tuning();
    let mut dead = Vec::new();

    let mut current = seeker.target;
    if current.is_some_and(|t| ledger.claims.is_held_by_other(t, agent, env)) {
        current = None;
    }

    let mut best = Incumbent::empty();
    match current {
        Some(t) if zone.contains(&t) => {
            if !env.qualifies(t) {
                dead.push(t);
            } else if let Some(s) = env.world.site(t) {
                best = Incumbent::current(
                    t,
                    s.priority,
                    seeker.position.dist_sq(s.position),
                    seeker.position.bearing_to(s.position),
                );
            }
        }
        Some(t) if immediate_only => best.site = Some(t),
        _ => {}
    }

    let thrashing = ledger.old_targets.count(agent) > tuning.thrash_old_target_limit;

    for &site in zone.iter() {
        if best.site == Some(site) || !env.region_allows(region, site) {
            continue;
        }
        if !env.qualifies(site) {
            dead.push(site);
            continue;
        }
        let contest = match ledger.claims.get_claim(site, env) {
            Some(c) if c.is_valid() => {
                if !c.is_challengeable() {
                    continue;
                }
                let holder_committed = c.agent() != agent
                    && env
                        .world
                        .agent(c.agent())
                        .is_some_and(|h| h.flags.spawned && h.path.is_some() && h.is_near_path_end());
                if holder_committed {
                    continue;
                }
                Contest::Challengeable { holder_dist: c.distance().as_f32() }
            }
            _ => Contest::Open,
        };
        let Some(s) = env.world.site(site) else { continue };
        let cand = score(site, s.position, s.priority, seeker.position, seeker.heading, dir, tuning);

        if thrashing && best.priority >= cand.priority {
            break;
        }
        let tried = ledger.old_targets.contains(agent, site);
        if best.prefers(&cand, contest, immediate_only, tried, tuning) {
            best.replace(&cand);
        }
    }

    purge(zone, dead, ledger);
    best.site
}
