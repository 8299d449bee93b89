//! The `Orchestrator` and its per-frame loop.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, info, trace, warn};

use sd_core::time::SECS_PER_DAY;
use sd_core::{
    AgentId, AgentStatus, DispatchConfig, FacilityId, PathHandle, Priority, SimClock, SiteId, SwarmId, Tuning,
};
use sd_dispatch::{
    plan_redirects, send_home, set_target, DispatchEnv, DispatchState, PendingSwarm, ServiceArea, SetTargetOutcome,
    Swarm, TargetChangeLog,
};
use sd_world::{PathService, PathStatus, World};

use crate::scan::Scanner;
use crate::{validate_config, DispatchObserver, RecallReason, SimResult};

/// Lifecycle of an [`Orchestrator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The next `update` builds the baseline.
    Uninitialized,
    Running,
    /// Initialization failed or `teardown` was called; `update` does nothing.
    Terminated,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// Owns every dispatch table and drives them once per host frame.
///
/// Create via [`OrchestratorBuilder`][crate::OrchestratorBuilder].
pub struct Orchestrator<P: PathService> {
    /// Policy and tuning.  Edits take effect on the next frame; edits that
    /// fail validation are only caught by the next baseline.
    pub config: DispatchConfig,

    /// The host's movement planner.  Hosts with a queued planner drive it
    /// through this field between frames.
    pub paths: P,

    phase:  Phase,
    tables: Tables,
}

impl<P: PathService> Orchestrator<P> {
    pub(crate) fn new(config: DispatchConfig, paths: P) -> Self {
        let tables = Tables::new(&config.tuning);
        Self { config, paths, phase: Phase::Uninitialized, tables }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run one host frame.
    ///
    /// Only a failed initialization is returned as an error; it also halts
    /// the orchestrator.  Running-frame failures go to the log and to
    /// [`DispatchObserver::on_tick_error`].
    pub fn update<O: DispatchObserver>(
        &mut self,
        world:    &mut World,
        clock:    SimClock,
        observer: &mut O,
    ) -> SimResult<()> {
        match self.phase {
            Phase::Terminated => return Ok(()),
            Phase::Uninitialized => {
                self.tables = Tables::new(&self.config.tuning);
                let env = DispatchEnv::new(world, &mut self.paths, &self.config, clock);
                if let Err(e) = self.tables.build_baseline(&env) {
                    error!(error = %e, "dispatch initialization failed, halting");
                    self.phase = Phase::Terminated;
                    return Err(e);
                }
                info!(
                    facilities = self.tables.state.areas.len(),
                    sites = self.tables.scanner.demand_sites().len(),
                    "dispatch baseline built"
                );
                self.phase = Phase::Running;
                return Ok(());
            }
            Phase::Running => {}
        }

        let tick = clock.current_tick;
        observer.on_tick_start(tick);
        let mut env = DispatchEnv::new(world, &mut self.paths, &self.config, clock);
        if let Err(e) = self.tables.run_frame(&mut env, observer) {
            error!(tick = %tick, error = %e, "dispatch frame failed");
            observer.on_tick_error(tick, &e);
        }
        observer.on_tick_end(tick);
        Ok(())
    }

    /// Host entry point replacing its own target choice for `agent`.
    ///
    /// Returns `Ok(None)` while the orchestrator is not running so the host
    /// falls back to its default behavior.
    pub fn set_target(
        &mut self,
        world:  &mut World,
        clock:  SimClock,
        agent:  AgentId,
        target: Option<SiteId>,
    ) -> SimResult<Option<SetTargetOutcome>> {
        if self.phase != Phase::Running {
            return Ok(None);
        }
        let mut env = DispatchEnv::new(world, &mut self.paths, &self.config, clock);
        Ok(Some(set_target(&mut self.tables.state, &mut env, agent, target)?))
    }

    /// Send home every collecting agent whose target lies outside its home
    /// facility's region.  Does nothing unless the region restriction is on.
    ///
    /// Returns the number of agents recalled.
    pub fn recall_out_of_region_agents<O: DispatchObserver>(
        &mut self,
        world:    &mut World,
        clock:    SimClock,
        observer: &mut O,
    ) -> SimResult<usize> {
        if self.phase != Phase::Running || !self.config.policy.region_restricted {
            return Ok(0);
        }
        let mut env = DispatchEnv::new(world, &mut self.paths, &self.config, clock);
        self.tables.recall_out_of_region(&mut env, observer)
    }

    /// Drop all dispatch state.  The next `update` rebuilds the baseline.
    pub fn reset(&mut self) {
        self.tables = Tables::new(&self.config.tuning);
        self.phase = Phase::Uninitialized;
    }

    /// Stop dispatching for good.
    pub fn teardown(&mut self) {
        self.tables = Tables::new(&self.config.tuning);
        self.phase = Phase::Terminated;
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &DispatchState {
        &self.tables.state
    }

    pub fn scanner(&self) -> &Scanner {
        &self.tables.scanner
    }

    pub fn active_swarms(&self) -> &BTreeMap<SwarmId, Swarm> {
        &self.tables.swarms
    }

    pub fn target_changes(&self) -> &TargetChangeLog {
        &self.tables.target_changes
    }

    /// `true` while `agent` is on its way home after a recall.
    pub fn is_going_home(&self, agent: AgentId) -> bool {
        self.tables.going_home.contains(&agent)
    }

    /// The target `agent` gave up on its last accepted retarget.
    pub fn last_target(&self, agent: AgentId) -> Option<SiteId> {
        self.tables.last_targets.get(&agent).copied()
    }

    /// Path-failure retries spent on `agent` since its last ready path.
    pub fn pathfind_attempts(&self, agent: AgentId) -> u32 {
        self.tables.pathfind_count.get(&agent).copied().unwrap_or(0)
    }
}

// ── Tables ────────────────────────────────────────────────────────────────────

/// Everything the orchestrator keeps between frames.
struct Tables {
    state:          DispatchState,
    scanner:        Scanner,
    swarms:         BTreeMap<SwarmId, Swarm>,
    next_swarm:     u32,
    /// Target each agent left behind on its last accepted retarget.
    last_targets:   FxHashMap<AgentId, SiteId>,
    pathfind_count: FxHashMap<AgentId, u32>,
    /// Game seconds at which each agent was first seen on the road.
    on_route_since: FxHashMap<AgentId, f64>,
    going_home:     FxHashSet<AgentId>,
    target_changes: TargetChangeLog,
    /// Real seconds of the last scan.
    last_scan:      Option<f64>,
    /// Agents present at the end of the previous frame.
    seen:           BTreeSet<AgentId>,
}

impl Tables {
    fn new(tuning: &Tuning) -> Self {
        Self {
            state:          DispatchState::new(tuning),
            scanner:        Scanner::new(),
            swarms:         BTreeMap::new(),
            next_swarm:     0,
            last_targets:   FxHashMap::default(),
            pathfind_count: FxHashMap::default(),
            on_route_since: FxHashMap::default(),
            going_home:     FxHashSet::default(),
            target_changes: TargetChangeLog::new(tuning.target_change_window_secs, tuning.target_change_list_limit),
            last_scan:      None,
            seen:           BTreeSet::new(),
        }
    }

    fn build_baseline(&mut self, env: &DispatchEnv<'_>) -> SimResult<()> {
        validate_config(env.config)?;
        self.scanner.full_scan(env.world, env.clock, env.config);
        self.sync_areas(env);
        self.seen = env.world.agent_ids().collect();
        Ok(())
    }

    fn run_frame<O: DispatchObserver>(&mut self, env: &mut DispatchEnv<'_>, observer: &mut O) -> SimResult<()> {
        let now = env.clock.real_secs;
        let interval = env.policy().scan_interval_secs();
        let due = interval == 0.0 || self.last_scan.is_none_or(|t| now - t >= interval);

        if due {
            // ── Phase 1: scan ─────────────────────────────────────────────
            let report = self.scanner.scan(env.world, env.clock, env.config);
            trace!(full = report.full, escalations = report.escalations.len(), "scan complete");

            // ── Phase 2: sync service areas ───────────────────────────────
            self.sync_areas(env);

            // ── Phase 3: dispatch ─────────────────────────────────────────
            if !env.world.paused {
                self.dispatch_idle(env, observer)?;
            }
            self.last_scan = Some(now);

            // ── Phase 4: target-change history GC ─────────────────────────
            self.target_changes.collect_garbage(now);

            // ── Phase 5–6: swarms ─────────────────────────────────────────
            self.promote_pending_swarms(env, observer);
            self.resolve_swarms(env, observer)?;
        }

        // ── Phase 7: per-agent bookkeeping ────────────────────────────────
        self.update_agents(env, observer)?;

        // ── Phase 8: movement-plan failures ───────────────────────────────
        self.handle_path_failures(env, observer)?;

        // ── Phase 9: critical-region recall ───────────────────────────────
        if !env.world.paused {
            self.recall_from_critical_regions(env, observer)?;
        }
        Ok(())
    }

    // ── Scan & dispatch ───────────────────────────────────────────────────

    /// Match the service areas to the scanned facilities and register every
    /// known demand site with each of them.
    fn sync_areas(&mut self, env: &DispatchEnv<'_>) {
        let facilities = self.scanner.facilities();
        self.state.areas.retain(|fid, _| {
            let keep = facilities.contains(fid);
            if !keep {
                debug!(facility = %fid, "facility removed, dropping its service area");
            }
            keep
        });
        for &fid in facilities {
            self.state.areas.entry(fid).or_insert_with(|| {
                debug!(facility = %fid, "new facility, creating service area");
                ServiceArea::new(fid)
            });
        }
        for &site in self.scanner.demand_sites() {
            self.state.add_site_everywhere(site, env);
        }
    }

    fn dispatch_idle<O: DispatchObserver>(&mut self, env: &mut DispatchEnv<'_>, observer: &mut O) -> SimResult<()> {
        let facilities: Vec<FacilityId> = self.state.areas.keys().copied().collect();
        for fid in facilities {
            let (area, mut ledger) = self.state.area_and_ledger(fid)?;
            if let Some(outcome) = area.dispatch_idle_agents(&mut ledger, env)? {
                observer.on_dispatch(fid, &outcome);
            }
        }
        Ok(())
    }

    // ── Swarms ────────────────────────────────────────────────────────────

    fn promote_pending_swarms<O: DispatchObserver>(&mut self, env: &DispatchEnv<'_>, observer: &mut O) {
        let now = env.clock.game_secs;
        let timeout = env.tuning().swarm_timeout_secs;
        let log = env.policy().log_emergency;

        self.state.pending_swarms.retain(|site, p| {
            let age = now - p.created_at;
            if age > timeout {
                if log {
                    debug!(target: "sd::emergency", site = %site, age, expected = p.expected,
                        "pending swarm timed out");
                }
                return false;
            }
            true
        });

        let pending: Vec<(SiteId, PendingSwarm)> =
            self.state.pending_swarms.iter().map(|(&s, &p)| (s, p)).collect();
        for (site, p) in pending {
            let found: Vec<AgentId> = self
                .state
                .areas
                .keys()
                .flat_map(|&fid| env.world.facility_agents(fid))
                .filter(|&a| env.world.agent(a).is_some_and(|a| a.target == Some(site)))
                .collect();
            if found.len() < p.expected as usize {
                if log {
                    debug!(target: "sd::emergency", site = %site, found = found.len(), expected = p.expected,
                        "pending swarm waiting for agents");
                }
                continue;
            }
            let Some(facility) = found.first().and_then(|&a| env.world.agent(a)).and_then(|a| a.home) else {
                continue;
            };

            let id = SwarmId(self.next_swarm);
            self.next_swarm += 1;
            let swarm = Swarm { target: site, facility, agents: found };
            if log {
                debug!(target: "sd::emergency", swarm = %id, site = %site, agents = ?swarm.agents, "swarm formed");
            }
            observer.on_swarm_formed(id, &swarm);
            self.swarms.insert(id, swarm);
            self.state.pending_swarms.remove(&site);
        }
    }

    /// Break up every swarm whose target was cleared, handing its agents
    /// still on the way out to other sites in groups.
    fn resolve_swarms<O: DispatchObserver>(&mut self, env: &mut DispatchEnv<'_>, observer: &mut O) -> SimResult<()> {
        let cleared_load = env.tuning().swarm_cleared_load;
        let group_size = env.policy().swarm_redirect_group_size as usize;
        let log = env.policy().log_emergency;

        let cleared: Vec<SwarmId> = self
            .swarms
            .iter()
            .filter(|(_, s)| env.world.site(s.target).map_or(0, |site| site.load) <= cleared_load)
            .map(|(&id, _)| id)
            .collect();

        for id in cleared {
            let Some(swarm) = self.swarms.remove(&id) else {
                continue;
            };
            let en_route: Vec<AgentId> = swarm
                .agents
                .iter()
                .copied()
                .filter(|&a| env.world.agent(a).is_some_and(|a| a.target == Some(swarm.target)))
                .collect();
            if log {
                debug!(target: "sd::emergency", swarm = %id, site = %swarm.target, en_route = en_route.len(),
                    "swarm target cleared");
            }

            let mut redirected = 0;
            if let Some(&first) = en_route.first() {
                let facility = env.world.agent(first).and_then(|a| a.home).unwrap_or(swarm.facility);
                let ranked = self
                    .state
                    .areas
                    .get(&facility)
                    .map(|area| ranked_by_load(area, swarm.target, env))
                    .unwrap_or_default();
                let plan = plan_redirects(&en_route, &ranked, group_size);
                if plan.len() < en_route.len() && log {
                    debug!(target: "sd::emergency", swarm = %id, left = en_route.len() - plan.len(),
                        "ran out of redirect targets");
                }
                for (agent, site) in plan {
                    set_target(&mut self.state, env, agent, Some(site))?;
                    redirected += 1;
                }
            }
            observer.on_swarm_resolved(id, redirected);
        }
        Ok(())
    }

    // ── Agents ────────────────────────────────────────────────────────────

    fn update_agents<O: DispatchObserver>(&mut self, env: &mut DispatchEnv<'_>, observer: &mut O) -> SimResult<()> {
        let present: BTreeSet<AgentId> = env.world.agent_ids().collect();
        let removed: Vec<AgentId> = self.seen.difference(&present).copied().collect();
        for agent in removed {
            self.forget_agent(agent, env);
        }
        self.seen = present;

        if env.world.paused {
            return Ok(());
        }
        let agents: Vec<AgentId> = self.seen.iter().copied().collect();
        for agent in agents {
            self.update_agent(agent, env, observer)?;
        }
        Ok(())
    }

    fn forget_agent(&mut self, agent: AgentId, env: &DispatchEnv<'_>) {
        if let Some(site) = self.last_targets.remove(&agent) {
            if env.qualifies(site) {
                self.state.add_site_everywhere(site, env);
            }
        }
        self.state.forget_agent(agent);
        self.pathfind_count.remove(&agent);
        self.on_route_since.remove(&agent);
        self.going_home.remove(&agent);
        self.target_changes.forget(agent);
        trace!(agent = %agent, "agent gone, bookkeeping released");
    }

    fn update_agent<O: DispatchObserver>(
        &mut self,
        agent:    AgentId,
        env:      &mut DispatchEnv<'_>,
        observer: &mut O,
    ) -> SimResult<()> {
        let Some(a) = env.world.agent(agent) else {
            return Ok(());
        };
        let Some(home) = a.home.filter(|h| self.state.areas.contains_key(h)) else {
            return Ok(());
        };
        if !a.flags.spawned || a.path.is_none() {
            return Ok(());
        }
        if self.going_home.contains(&agent) {
            if a.flags.going_back {
                return Ok(());
            }
            // Back in service.
            self.going_home.remove(&agent);
        }

        let (cargo, status, target) = (a.cargo, a.status(), a.target);
        let config: &DispatchConfig = env.config;
        let policy = &config.policy;
        let now = env.clock.game_secs;
        let since = *self.on_route_since.entry(agent).or_insert(now);

        // ── Low-cargo recall ──────────────────────────────────────────────
        let days = (now - since) / SECS_PER_DAY;
        if policy.enable_low_cargo_recall && days > policy.low_cargo_recall_days && cargo < policy.low_cargo_threshold {
            if policy.log_recalls {
                debug!(target: "sd::recall", agent = %agent, days, cargo, threshold = policy.low_cargo_threshold,
                    "low cargo after a long route, recalling");
            }
            return self.recall(agent, RecallReason::LowCargo, env, observer);
        }

        // ── Region violation ──────────────────────────────────────────────
        if policy.region_restricted {
            let home_region = env.world.facility(home).and_then(|f| f.region);
            let outside = home_region.is_some()
                && target.and_then(|t| env.world.site(t)).is_some_and(|s| s.region != home_region);
            if outside {
                if policy.log_recalls {
                    debug!(target: "sd::recall", agent = %agent, facility = %home, "target outside home region, recalling");
                }
                return self.recall(agent, RecallReason::RegionViolation, env, observer);
            }
        }

        match status {
            AgentStatus::Idle => {
                if let Some(site) = self.last_targets.remove(&agent) {
                    if env.qualifies(site) {
                        self.state.add_site_everywhere(site, env);
                    }
                }
                self.state.old_targets.clear(agent);
                Ok(())
            }
            AgentStatus::WaitingToReturn | AgentStatus::EnRouteReturning => {
                self.retarget(agent, home, status, target, env)
            }
            _ => Ok(()),
        }
    }

    /// Ask the agent's service area for a better target and switch to it.
    fn retarget(
        &mut self,
        agent:   AgentId,
        home:    FacilityId,
        status:  AgentStatus,
        current: Option<SiteId>,
        env:     &mut DispatchEnv<'_>,
    ) -> SimResult<()> {
        let assigned = {
            let (area, mut ledger) = self.state.area_and_ledger(home)?;
            area.assign_target(&mut ledger, agent, env)?
        };

        match assigned {
            Some(next) if Some(next) != current => {
                if let Some(old) = current {
                    if env.qualifies(old) {
                        self.state.add_site_everywhere(old, env);
                    }
                    self.state.claims.remove_claim(old);
                    if status == AgentStatus::EnRouteReturning {
                        self.last_targets.insert(agent, old);
                        self.state.last_change.insert(agent, env.clock.game_secs);
                    }
                }
                let outcome = set_target(&mut self.state, env, agent, Some(next))?;
                if env.policy().log_verbose {
                    trace!(agent = %agent, from = ?current, to = %next, outcome = ?outcome, "retargeted");
                }
                if self.target_changes.record(agent, next, env.clock.real_secs) {
                    warn!(agent = %agent, limit = env.tuning().target_change_list_limit,
                        "target change list capped, agent keeps switching targets");
                }
            }
            _ => {
                if let Some(t) = current {
                    self.state.claims.claim_for(t, agent, env);
                }
            }
        }
        Ok(())
    }

    fn handle_path_failures<O: DispatchObserver>(
        &mut self,
        env:      &mut DispatchEnv<'_>,
        observer: &mut O,
    ) -> SimResult<()> {
        let agents: Vec<AgentId> = env.world.agent_ids().collect();
        for agent in agents {
            let Some(a) = env.world.agent(agent) else {
                continue;
            };
            let Some(path) = a.path.filter(|_| a.flags.waiting_path) else {
                continue;
            };
            match env.paths.path_status(path) {
                PathStatus::Pending => {}
                PathStatus::Ready => {
                    self.pathfind_count.remove(&agent);
                }
                PathStatus::Failed => self.path_failed(agent, path, env, observer)?,
            }
        }
        Ok(())
    }

    fn path_failed<O: DispatchObserver>(
        &mut self,
        agent:    AgentId,
        path:     PathHandle,
        env:      &mut DispatchEnv<'_>,
        observer: &mut O,
    ) -> SimResult<()> {
        let a = env.world.try_agent(agent)?;
        let (status, spawned, home) = (a.status(), a.flags.spawned, a.home);

        if let Some(previous) = self.last_targets.remove(&agent) {
            drop_path(env, agent, path)?;
            set_target(&mut self.state, env, agent, Some(previous))?;
            return Ok(());
        }
        if self.going_home.contains(&agent) {
            if env.policy().log_recalls {
                debug!(target: "sd::recall", agent = %agent, "no path home, unspawning");
            }
            env.world.unspawn(agent);
            return Ok(());
        }

        let Some(home) = home.filter(|h| self.state.areas.contains_key(h)) else {
            return Ok(());
        };
        if !status.is_collecting() || !spawned {
            return Ok(());
        }

        let attempts = self.pathfind_count.get(&agent).copied().unwrap_or(0);
        if attempts >= env.tuning().max_retry_attempts {
            if env.policy().log_recalls {
                debug!(target: "sd::recall", agent = %agent, attempts, "path retries exhausted, recalling");
            }
            return self.recall(agent, RecallReason::PathFailure, env, observer);
        }
        self.pathfind_count.insert(agent, attempts + 1);

        let Some(next) = self.state.unclaimed_target(home, Some(agent), env)? else {
            if env.policy().log_recalls {
                debug!(target: "sd::recall", agent = %agent, "path failed and no alternative site, recalling");
            }
            return self.recall(agent, RecallReason::PathFailure, env, observer);
        };

        if self.state.old_targets.count(agent) >= self.state.old_targets.limit() {
            warn!(agent = %agent, limit = self.state.old_targets.limit(),
                "path planning failed against too many sites, recalling");
            self.state.old_targets.clear(agent);
            return self.recall(agent, RecallReason::PathFailure, env, observer);
        }
        self.state.old_targets.add(agent, next);
        drop_path(env, agent, path)?;
        set_target(&mut self.state, env, agent, Some(next))?;
        Ok(())
    }

    // ── Recalls ───────────────────────────────────────────────────────────

    fn recall<O: DispatchObserver>(
        &mut self,
        agent:    AgentId,
        reason:   RecallReason,
        env:      &mut DispatchEnv<'_>,
        observer: &mut O,
    ) -> SimResult<()> {
        let outcome = send_home(&mut self.state, env, agent)?;
        self.going_home.insert(agent);
        trace!(agent = %agent, reason = %reason, outcome = ?outcome, "agent recalled");
        observer.on_recall(agent, reason);
        Ok(())
    }

    /// While any site of a facility's zones is critical, pull back that
    /// facility's delivering agents that are outside its region.
    fn recall_from_critical_regions<O: DispatchObserver>(
        &mut self,
        env:      &mut DispatchEnv<'_>,
        observer: &mut O,
    ) -> SimResult<()> {
        let critical: Vec<FacilityId> = self
            .state
            .areas
            .iter()
            .filter(|(_, area)| area.sites().any(|s| env.world.site_priority(s) == Priority::Critical))
            .map(|(&fid, _)| fid)
            .collect();

        for fid in critical {
            let Some(region) = env.world.facility(fid).map(|f| f.region) else {
                continue;
            };
            for agent in env.world.facility_agents(fid) {
                let away = env.world.agent(agent).is_some_and(|a| {
                    a.status() == AgentStatus::EnRouteOutbound && env.world.region_at(a.position) != region
                });
                if !away {
                    continue;
                }
                if env.policy().log_emergency {
                    debug!(target: "sd::emergency", agent = %agent, facility = %fid,
                        "recalling out-of-region delivery during critical emergency");
                }
                set_target(&mut self.state, env, agent, None)?;
                observer.on_recall(agent, RecallReason::CriticalRegion);
            }
        }
        Ok(())
    }

    fn recall_out_of_region<O: DispatchObserver>(
        &mut self,
        env:      &mut DispatchEnv<'_>,
        observer: &mut O,
    ) -> SimResult<usize> {
        let mut recalled = 0;
        let facilities: Vec<FacilityId> = self.state.areas.keys().copied().collect();
        for fid in facilities {
            let Some(region) = env.world.facility(fid).and_then(|f| f.region) else {
                continue;
            };
            for agent in env.world.facility_agents(fid) {
                let outside = env.world.agent(agent).is_some_and(|a| {
                    a.status().is_collecting()
                        && a.target.and_then(|t| env.world.site(t)).is_some_and(|s| s.region != Some(region))
                });
                if !outside {
                    continue;
                }
                if env.policy().log_recalls {
                    debug!(target: "sd::recall", agent = %agent, facility = %fid, "bulk out-of-region recall");
                }
                self.recall(agent, RecallReason::OutOfRegion, env, observer)?;
                recalled += 1;
            }
        }
        Ok(recalled)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Sites of `area` the facility may serve that still hold load, heaviest
/// first.  Primary-zone sites win ties.
fn ranked_by_load(area: &ServiceArea, skip: SiteId, env: &DispatchEnv<'_>) -> Vec<SiteId> {
    let region = env.world.facility(area.facility()).and_then(|f| f.region);
    let mut ranked: Vec<(SiteId, u32)> = area
        .sites()
        .filter(|&s| s != skip && env.region_allows(region, s))
        .filter_map(|s| env.world.site(s).map(|site| (s, site.load)))
        .filter(|&(_, load)| load > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().map(|(s, _)| s).collect()
}

/// Release a failed movement plan so the agent can be given a new one.
fn drop_path(env: &mut DispatchEnv<'_>, agent: AgentId, path: PathHandle) -> SimResult<()> {
    env.paths.release_path(path);
    let a = env.world.try_agent_mut(agent)?;
    a.path = None;
    a.progress = None;
    a.flags.waiting_path = false;
    Ok(())
}
