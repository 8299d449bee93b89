//! Integration tests for sd-sim.

#[cfg(test)]
mod helpers {
    use sd_core::{AgentId, FacilityId, PolicyParams, RegionId, SimClock, SiteId, Tick, WorldPos};
    use sd_dispatch::{DispatchOutcome, Swarm};
    use sd_world::{Agent, Facility, HostCommand, ScriptedPathService, Site, World};

    use crate::{DispatchObserver, NoopObserver, Orchestrator, OrchestratorBuilder, RecallReason, SimError};

    pub const HOME: FacilityId = FacilityId(1);
    pub const A1: AgentId = AgentId(1);

    /// Facility 1 at the origin (region 1, radius 1000, four crews):
    ///
    /// | site | position  | region | load |
    /// |------|-----------|--------|------|
    /// | 10   | (300, 0)  | 1      | 2000 |
    /// | 11   | (0, 400)  | 1      | 3000 |
    /// | 12   | (600, 0)  | 2      | 2000 |
    pub fn world() -> World {
        let mut w = World::new(3);
        w.insert_facility(HOME, Facility::new(WorldPos::ORIGIN, Some(RegionId(1)), 1_000.0, 4));
        w.insert_site(SiteId(10), Site::new(WorldPos::new(300.0, 0.0), Some(RegionId(1)), 2_000));
        w.insert_site(SiteId(11), Site::new(WorldPos::new(0.0, 400.0), Some(RegionId(1)), 3_000));
        w.insert_site(SiteId(12), Site::new(WorldPos::new(600.0, 0.0), Some(RegionId(2)), 2_000));
        w
    }

    /// Facility 1 and only the given sites of [`world`].
    pub fn world_with(sites: &[u32]) -> World {
        let mut w = world();
        for id in [10, 11, 12] {
            if !sites.contains(&id) {
                w.remove_site(SiteId(id));
            }
        }
        w
    }

    pub fn clock(tick: u64) -> SimClock {
        SimClock { current_tick: Tick(tick), game_secs: tick as f64, real_secs: tick as f64 }
    }

    /// Scan every frame.
    pub fn policy() -> PolicyParams {
        PolicyParams { scan_frequency_ms: 0, ..PolicyParams::default() }
    }

    pub fn collector(x: f32, z: f32, target: Option<SiteId>) -> Agent {
        let mut a = Agent::collector(HOME, WorldPos::new(x, z), 20_000);
        a.target = target;
        a
    }

    /// An orchestrator whose baseline was built on `w` at tick 0.
    pub fn running(w: &mut World, policy: PolicyParams, paths: ScriptedPathService) -> Orchestrator<ScriptedPathService> {
        let mut orch = OrchestratorBuilder::new(paths).policy(policy).build().unwrap();
        orch.update(w, clock(0), &mut NoopObserver).unwrap();
        orch
    }

    pub fn transfers(cmds: &[HostCommand]) -> Vec<SiteId> {
        cmds.iter()
            .filter_map(|c| match c {
                HostCommand::StartTransfer { site, .. } => Some(*site),
                _ => None,
            })
            .collect()
    }

    #[derive(Default)]
    pub struct Recorder {
        pub ticks:      usize,
        pub dispatches: Vec<(FacilityId, DispatchOutcome)>,
        pub formed:     Vec<(sd_core::SwarmId, Vec<AgentId>)>,
        pub resolved:   Vec<(sd_core::SwarmId, usize)>,
        pub recalls:    Vec<(AgentId, RecallReason)>,
        pub errors:     usize,
    }

    impl DispatchObserver for Recorder {
        fn on_tick_end(&mut self, _tick: Tick) {
            self.ticks += 1;
        }

        fn on_dispatch(&mut self, facility: FacilityId, outcome: &DispatchOutcome) {
            self.dispatches.push((facility, outcome.clone()));
        }

        fn on_swarm_formed(&mut self, id: sd_core::SwarmId, swarm: &Swarm) {
            self.formed.push((id, swarm.agents.clone()));
        }

        fn on_swarm_resolved(&mut self, id: sd_core::SwarmId, redirected: usize) {
            self.resolved.push((id, redirected));
        }

        fn on_recall(&mut self, agent: AgentId, reason: RecallReason) {
            self.recalls.push((agent, reason));
        }

        fn on_tick_error(&mut self, _tick: Tick, _error: &SimError) {
            self.errors += 1;
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use sd_core::{PolicyParams, Tuning};
    use sd_world::ScriptedPathService;

    use crate::{OrchestratorBuilder, Phase, SimError};

    #[test]
    fn defaults_build_uninitialized() {
        let orch = OrchestratorBuilder::new(ScriptedPathService::default()).build().unwrap();
        assert_eq!(orch.phase(), Phase::Uninitialized);
        assert_eq!(orch.config.policy, PolicyParams::default());
    }

    #[test]
    fn policy_is_clamped() {
        let policy = PolicyParams { emergency_agent_count: 500, ..PolicyParams::default() };
        let orch = OrchestratorBuilder::new(ScriptedPathService::default()).policy(policy).build().unwrap();
        assert_eq!(orch.config.policy.emergency_agent_count, 50);
    }

    #[test]
    fn policy_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.csv");
        std::fs::write(&path, "name,value\nemergency_agent_count,8\nregion_restricted,true\n").unwrap();

        let orch = OrchestratorBuilder::new(ScriptedPathService::default()).policy_file(&path).build().unwrap();
        assert_eq!(orch.config.policy.emergency_agent_count, 8);
        assert!(orch.config.policy.region_restricted);
    }

    #[test]
    fn missing_policy_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = OrchestratorBuilder::new(ScriptedPathService::default())
            .policy_file(dir.path().join("absent.csv"))
            .build();
        assert!(matches!(result, Err(SimError::Policy(_))));
    }

    #[test]
    fn policy_and_policy_file_conflict() {
        let result = OrchestratorBuilder::new(ScriptedPathService::default())
            .policy(PolicyParams::default())
            .policy_file("policy.csv")
            .build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let tuning = Tuning { close_range_sq: 30_000.0, ..Tuning::default() };
        let result = OrchestratorBuilder::new(ScriptedPathService::default()).tuning(tuning).build();
        assert!(matches!(result, Err(SimError::Config(_))));
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod scan {
    use sd_core::{DispatchConfig, Priority, RegionId, SiteId, WorldPos};
    use sd_world::Site;

    use crate::{Escalation, Scanner};

    use super::helpers::{clock, world, HOME};

    #[test]
    fn first_scan_is_full() {
        let w = world();
        let mut s = Scanner::new();
        let report = s.scan(&w, clock(0), &DispatchConfig::default());
        assert!(report.full);
        assert!(s.facilities().contains(&HOME));
        assert_eq!(s.demand_sites().len(), 3);
    }

    #[test]
    fn quick_scan_tracks_known_sites_only() {
        let mut w = world();
        let cfg = DispatchConfig::default();
        let mut s = Scanner::new();
        s.scan(&w, clock(0), &cfg);

        w.site_mut(SiteId(11)).unwrap().load = 100;
        let report = s.scan(&w, clock(1), &cfg);
        assert!(!report.full);
        assert!(!s.demand_sites().contains(&SiteId(11)));

        // Back over the threshold, but only a full scan finds it again.
        w.site_mut(SiteId(11)).unwrap().load = 3_000;
        s.scan(&w, clock(2), &cfg);
        assert!(!s.demand_sites().contains(&SiteId(11)));
        let report = s.scan(&w, clock(20), &cfg);
        assert!(report.full);
        assert!(s.demand_sites().contains(&SiteId(11)));
    }

    #[test]
    fn new_site_forces_full_scan() {
        let mut w = world();
        let cfg = DispatchConfig::default();
        let mut s = Scanner::new();
        s.scan(&w, clock(0), &cfg);

        w.insert_site(SiteId(20), Site::new(WorldPos::new(10.0, 10.0), Some(RegionId(1)), 5));
        let report = s.scan(&w, clock(1), &cfg);
        assert!(report.full);
        assert!(!s.demand_sites().contains(&SiteId(20)));
    }

    #[test]
    fn escalations_are_reported_once() {
        let mut w = world();
        let cfg = DispatchConfig::default();
        let mut s = Scanner::new();
        s.scan(&w, clock(0), &cfg);

        w.site_mut(SiteId(10)).unwrap().priority = Priority::Warning;
        let report = s.scan(&w, clock(1), &cfg);
        assert_eq!(
            report.escalations,
            vec![Escalation { site: SiteId(10), from: Priority::None, to: Priority::Warning }]
        );
        assert!(s.scan(&w, clock(2), &cfg).escalations.is_empty());
    }

    #[test]
    fn escalated_site_below_threshold_stays_known() {
        let mut w = world();
        let cfg = DispatchConfig::default();
        let mut s = Scanner::new();
        s.scan(&w, clock(0), &cfg);

        let site = w.site_mut(SiteId(10)).unwrap();
        site.load = 10;
        site.priority = Priority::Critical;
        s.scan(&w, clock(1), &cfg);
        assert!(s.demand_sites().contains(&SiteId(10)));
    }
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle {
    use sd_core::{RegionId, SiteId, WorldPos};
    use sd_world::{ScriptedPathService, Site};

    use crate::{NoopObserver, OrchestratorBuilder, Phase, SimError};

    use super::helpers::{clock, collector, policy, running, world, Recorder, A1, HOME};

    #[test]
    fn first_update_builds_baseline_only() {
        let mut w = world();
        let mut orch = OrchestratorBuilder::new(ScriptedPathService::default()).policy(policy()).build().unwrap();
        assert_eq!(orch.set_target(&mut w, clock(0), A1, Some(SiteId(10))).unwrap(), None);

        orch.update(&mut w, clock(0), &mut NoopObserver).unwrap();
        assert_eq!(orch.phase(), Phase::Running);
        let area = &orch.state().areas[&HOME];
        assert_eq!(area.primary().len(), 2);
        assert_eq!(area.secondary().len(), 1);
        assert!(w.pending_commands().is_empty());
    }

    #[test]
    fn failed_initialization_halts_for_good() {
        let mut w = world();
        let mut orch = OrchestratorBuilder::new(ScriptedPathService::default()).policy(policy()).build().unwrap();
        orch.config.tuning.distance_buffer = 0.0;

        let result = orch.update(&mut w, clock(0), &mut NoopObserver);
        assert!(matches!(result, Err(SimError::Config(_))));
        assert_eq!(orch.phase(), Phase::Terminated);

        orch.config.tuning.distance_buffer = 0.9;
        orch.update(&mut w, clock(1), &mut NoopObserver).unwrap();
        assert_eq!(orch.phase(), Phase::Terminated);
        assert!(w.pending_commands().is_empty());
    }

    #[test]
    fn reset_rebuilds_and_teardown_stops() {
        let mut w = world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());

        orch.reset();
        assert_eq!(orch.phase(), Phase::Uninitialized);
        assert!(orch.state().areas.is_empty());
        orch.update(&mut w, clock(1), &mut NoopObserver).unwrap();
        assert_eq!(orch.phase(), Phase::Running);

        orch.teardown();
        w.insert_agent(A1, collector(0.0, 0.0, None));
        assert_eq!(orch.set_target(&mut w, clock(2), A1, Some(SiteId(10))).unwrap(), None);
        orch.update(&mut w, clock(2), &mut NoopObserver).unwrap();
        assert!(w.pending_commands().is_empty());
    }

    #[test]
    fn frame_error_is_reported_and_dispatch_continues() {
        let mut w = world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        // Same site + facility count, so the next scan is a quick one and
        // still believes in the facility.
        w.remove_facility(HOME);
        w.insert_site(SiteId(20), Site::new(WorldPos::new(50.0, 50.0), Some(RegionId(1)), 10));
        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert_eq!(rec.errors, 1);
        assert_eq!(orch.phase(), Phase::Running);

        orch.update(&mut w, clock(12), &mut rec).unwrap();
        assert_eq!(rec.errors, 1);
        assert_eq!(rec.ticks, 2);
        assert!(orch.state().areas.is_empty());
    }

    #[test]
    fn scans_follow_the_configured_interval() {
        let mut w = world();
        let p = sd_core::PolicyParams { scan_frequency_ms: 2_000, ..policy() };
        let mut orch = running(&mut w, p, ScriptedPathService::default());

        let mut sent = Vec::new();
        for tick in 1..=3 {
            orch.update(&mut w, clock(tick), &mut NoopObserver).unwrap();
            sent.push(super::helpers::transfers(&w.drain_commands()).len());
        }
        assert_eq!(sent, vec![2, 0, 2]);
    }

    #[test]
    fn paused_world_dispatches_nothing() {
        let mut w = world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        w.paused = true;
        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert!(rec.dispatches.is_empty());
        assert!(w.pending_commands().is_empty());
    }
}

// ── Dispatch scenarios ────────────────────────────────────────────────────────

#[cfg(test)]
mod scenarios {
    use sd_core::{AgentFlags, AgentId, PolicyParams, Priority, RegionId, SiteId, WorldPos};
    use sd_dispatch::{ClaimDistance, DispatchMode, SetTargetOutcome};
    use sd_world::{Agent, HostCommand, OfferKind, RegionBounds, ScriptedPathService};

    use crate::RecallReason;

    use super::helpers::{clock, collector, policy, running, transfers, world, world_with, Recorder, A1, HOME};

    #[test]
    fn single_site_gets_one_agent_and_a_measured_claim() {
        let mut w = world_with(&[10]);
        let p = PolicyParams { normal_dispatch_count: 1, ..policy() };
        let mut orch = running(&mut w, p, ScriptedPathService::default());

        orch.update(&mut w, clock(1), &mut Recorder::default()).unwrap();
        assert_eq!(w.drain_commands(), vec![HostCommand::StartTransfer { facility: HOME, site: SiteId(10) }]);

        // The host spawns the agent and hands its target to the orchestrator.
        w.insert_agent(A1, collector(0.0, 0.0, None));
        let outcome = orch.set_target(&mut w, clock(1), A1, Some(SiteId(10))).unwrap();
        assert_eq!(outcome, Some(SetTargetOutcome::Planned(Some(SiteId(10)))));

        orch.update(&mut w, clock(2), &mut Recorder::default()).unwrap();
        let claim = orch.state().claims.peek(SiteId(10)).unwrap();
        assert_eq!(claim.agent(), A1);
        assert_eq!(claim.distance(), ClaimDistance::Measured(90_000.0));
        assert_eq!(w.agent(A1).unwrap().target, Some(SiteId(10)));
    }

    #[test]
    fn uncontestable_claim_survives_a_far_challenger() {
        let mut w = world_with(&[10]);
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());

        // A1 stands next to the site; A2 heads for it from the facility.
        w.insert_agent(A1, collector(295.0, 0.0, None));
        orch.set_target(&mut w, clock(1), A1, Some(SiteId(10))).unwrap();
        let mut far = collector(0.0, 0.0, Some(SiteId(10)));
        far.path = Some(sd_core::PathHandle(99));
        w.insert_agent(AgentId(2), far);

        for tick in 2..6 {
            orch.update(&mut w, clock(tick), &mut Recorder::default()).unwrap();
            let claim = orch.state().claims.peek(SiteId(10)).unwrap();
            assert_eq!(claim.agent(), A1, "tick {tick}");
            assert_eq!(claim.distance(), ClaimDistance::Uncontestable);
        }
        assert_eq!(w.agent(A1).unwrap().target, Some(SiteId(10)));
    }

    #[test]
    fn facility_at_capacity_dispatches_nothing() {
        let mut w = world();
        w.facility_mut(HOME).unwrap().crew_count = 2;
        w.insert_agent(AgentId(1), collector(0.0, 0.0, None));
        w.insert_agent(AgentId(2), collector(0.0, 0.0, None));
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert!(rec.dispatches.is_empty());
        assert!(transfers(&w.drain_commands()).is_empty());

        w.unspawn(AgentId(2));
        w.drain_commands();
        orch.update(&mut w, clock(2), &mut rec).unwrap();
        assert_eq!(transfers(&w.drain_commands()), vec![SiteId(10)]);
    }

    #[test]
    fn emergency_dispatch_is_bounded_by_capacity() {
        let mut w = world();
        w.facility_mut(HOME).unwrap().crew_count = 5;
        for id in 1..=3 {
            w.insert_agent(AgentId(id), collector(0.0, 0.0, None));
        }
        w.site_mut(SiteId(11)).unwrap().priority = Priority::Critical;
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert_eq!(transfers(&w.drain_commands()), vec![SiteId(11), SiteId(11)]);
        assert_eq!(rec.dispatches.len(), 1);
        assert_eq!(rec.dispatches[0].1.mode, DispatchMode::Emergency);
        assert_eq!(rec.dispatches[0].1.dispatched, 2);
        assert_eq!(orch.state().pending_swarms[&SiteId(11)].expected, 2);
    }

    #[test]
    fn repeated_path_failure_without_alternative_recalls_then_unspawns() {
        let mut w = world_with(&[10]);
        let mut orch = running(&mut w, policy(), ScriptedPathService::new(sd_world::PathStatus::Failed));
        let mut rec = Recorder::default();

        w.insert_agent(A1, collector(0.0, 0.0, None));
        orch.set_target(&mut w, clock(0), A1, Some(SiteId(10))).unwrap();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert_eq!(rec.recalls, vec![(A1, RecallReason::PathFailure)]);
        assert!(orch.is_going_home(A1));
        let a = w.agent(A1).unwrap();
        assert!(a.flags.going_back);
        assert_eq!(a.target, None);

        // The way home fails too.
        orch.update(&mut w, clock(2), &mut rec).unwrap();
        assert!(w.agent(A1).is_none());
        assert!(w.drain_commands().contains(&HostCommand::Unspawn(A1)));

        orch.update(&mut w, clock(3), &mut rec).unwrap();
        assert!(!orch.is_going_home(A1));
        assert_eq!(orch.state().claims.holder(SiteId(10)), None);
    }

    #[test]
    fn path_retries_are_bounded() {
        let mut w = world();
        w.insert_site(SiteId(13), sd_world::Site::new(WorldPos::new(0.0, -500.0), Some(RegionId(1)), 2_000));
        let tuning = sd_core::Tuning { max_retry_attempts: 2, ..sd_core::Tuning::default() };
        let mut orch = crate::OrchestratorBuilder::new(ScriptedPathService::new(sd_world::PathStatus::Failed))
            .policy(policy())
            .tuning(tuning)
            .build()
            .unwrap();
        orch.update(&mut w, clock(0), &mut crate::NoopObserver).unwrap();
        let mut rec = Recorder::default();

        w.insert_agent(A1, collector(0.0, 0.0, None));
        orch.set_target(&mut w, clock(0), A1, Some(SiteId(10))).unwrap();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert_eq!(w.agent(A1).unwrap().target, Some(SiteId(11)));
        orch.update(&mut w, clock(2), &mut rec).unwrap();
        assert_eq!(w.agent(A1).unwrap().target, Some(SiteId(13)));
        assert_eq!(orch.pathfind_attempts(A1), 2);

        orch.update(&mut w, clock(3), &mut rec).unwrap();
        assert_eq!(rec.recalls, vec![(A1, RecallReason::PathFailure)]);
        // Initial plan, two retries, and the way home.
        assert_eq!(orch.paths.requests().len(), 4);
    }

    #[test]
    fn restricted_region_substitutes_in_region_site() {
        let mut w = world();
        let p = PolicyParams { region_restricted: true, ..policy() };
        let mut orch = running(&mut w, p, ScriptedPathService::default());

        w.insert_agent(A1, collector(0.0, 0.0, None));
        let outcome = orch.set_target(&mut w, clock(1), A1, Some(SiteId(12))).unwrap();
        assert_eq!(outcome, Some(SetTargetOutcome::Planned(Some(SiteId(10)))));
        assert_eq!(w.agent(A1).unwrap().target, Some(SiteId(10)));
    }

    #[test]
    fn restricted_region_without_alternative_recalls() {
        let mut w = world_with(&[12]);
        let p = PolicyParams { region_restricted: true, ..policy() };
        let mut orch = running(&mut w, p, ScriptedPathService::default());

        w.insert_agent(A1, collector(0.0, 0.0, None));
        let outcome = orch.set_target(&mut w, clock(1), A1, Some(SiteId(12))).unwrap();
        assert_eq!(outcome, Some(SetTargetOutcome::Recalled));
        assert!(w.agent(A1).unwrap().flags.going_back);
    }

    #[test]
    fn region_violation_is_caught_by_the_safety_net() {
        let mut w = world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        w.insert_agent(A1, collector(0.0, 0.0, None));
        orch.set_target(&mut w, clock(1), A1, Some(SiteId(12))).unwrap();
        orch.config.policy.region_restricted = true;

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert_eq!(rec.recalls, vec![(A1, RecallReason::RegionViolation)]);
        assert!(orch.is_going_home(A1));
    }

    #[test]
    fn bulk_recall_only_when_restricted() {
        let mut w = world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        w.insert_agent(A1, collector(0.0, 0.0, None));
        w.insert_agent(AgentId(2), collector(0.0, 0.0, None));
        orch.set_target(&mut w, clock(1), A1, Some(SiteId(12))).unwrap();
        orch.set_target(&mut w, clock(1), AgentId(2), Some(SiteId(10))).unwrap();

        assert_eq!(orch.recall_out_of_region_agents(&mut w, clock(1), &mut rec).unwrap(), 0);
        orch.config.policy.region_restricted = true;
        assert_eq!(orch.recall_out_of_region_agents(&mut w, clock(1), &mut rec).unwrap(), 1);
        assert_eq!(rec.recalls, vec![(A1, RecallReason::OutOfRegion)]);
        assert!(!orch.is_going_home(AgentId(2)));
    }

    #[test]
    fn long_route_with_little_cargo_is_recalled() {
        let mut w = world();
        let p = PolicyParams { low_cargo_recall_days: 1.0, ..policy() };
        let mut orch = running(&mut w, p, ScriptedPathService::default());
        let mut rec = Recorder::default();

        w.insert_agent(A1, collector(0.0, 0.0, None));
        orch.set_target(&mut w, clock(1), A1, Some(SiteId(10))).unwrap();
        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert!(rec.recalls.is_empty());

        let mut later = clock(2);
        later.game_secs = 1.0 + 1.5 * sd_core::time::SECS_PER_DAY;
        orch.update(&mut w, later, &mut rec).unwrap();
        assert_eq!(rec.recalls, vec![(A1, RecallReason::LowCargo)]);
    }

    #[test]
    fn critical_site_pulls_back_out_of_region_delivery() {
        let mut w = world();
        w.add_region(RegionBounds {
            id:  RegionId(2),
            min: WorldPos::new(500.0, -100.0),
            max: WorldPos::new(700.0, 100.0),
        });
        w.site_mut(SiteId(11)).unwrap().priority = Priority::Critical;
        let mut a = Agent::collector(HOME, WorldPos::new(600.0, 0.0), 20_000);
        a.flags = AgentFlags { transfer_to_target: true, spawned: true, ..AgentFlags::default() };
        a.target = Some(SiteId(12));
        a.cargo = 500;
        w.insert_agent(AgentId(5), a);
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert_eq!(rec.recalls, vec![(AgentId(5), RecallReason::CriticalRegion)]);
        let a = w.agent(AgentId(5)).unwrap();
        assert_eq!(a.target, None);
        assert!(a.flags.waiting_target);
        assert!(w.pending_commands().iter().any(|c| matches!(
            c,
            HostCommand::PostOffer(o) if o.agent == AgentId(5) && o.kind == OfferKind::Outgoing
        )));
    }

    #[test]
    fn removed_agent_releases_its_bookkeeping() {
        let mut w = world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());

        w.insert_agent(A1, collector(0.0, 0.0, None));
        orch.set_target(&mut w, clock(1), A1, Some(SiteId(10))).unwrap();
        orch.update(&mut w, clock(1), &mut Recorder::default()).unwrap();
        assert_eq!(orch.state().claims.holder(SiteId(10)), Some(A1));

        w.unspawn(A1);
        orch.update(&mut w, clock(2), &mut Recorder::default()).unwrap();
        assert_eq!(orch.state().claims.holder(SiteId(10)), None);
        assert_eq!(orch.state().old_targets.count(A1), 0);
    }
}

// ── Swarms ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod swarms {
    use sd_core::{AgentId, PolicyParams, Priority, SiteId, SwarmId};
    use sd_world::{ScriptedPathService, World};

    use super::helpers::{clock, collector, policy, running, world, Recorder, HOME};

    /// Five crews, three agents already out, site 11 critical.
    fn emergency_world() -> World {
        let mut w = world();
        w.facility_mut(HOME).unwrap().crew_count = 5;
        for id in 1..=3 {
            w.insert_agent(AgentId(id), collector(0.0, 0.0, None));
        }
        w.site_mut(SiteId(11)).unwrap().priority = Priority::Critical;
        w
    }

    #[test]
    fn swarm_forms_then_redirects_when_cleared() {
        let mut w = emergency_world();
        let p = PolicyParams { swarm_redirect_group_size: 1, ..policy() };
        let mut orch = running(&mut w, p, ScriptedPathService::default());
        let mut rec = Recorder::default();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        w.drain_commands();
        w.insert_agent(AgentId(10), collector(0.0, 0.0, Some(SiteId(11))));
        w.insert_agent(AgentId(11), collector(0.0, 0.0, Some(SiteId(11))));

        orch.update(&mut w, clock(2), &mut rec).unwrap();
        assert_eq!(rec.formed, vec![(SwarmId(0), vec![AgentId(10), AgentId(11)])]);
        assert!(orch.state().pending_swarms.is_empty());
        assert_eq!(orch.active_swarms()[&SwarmId(0)].facility, HOME);

        let site = w.site_mut(SiteId(11)).unwrap();
        site.load = 50;
        site.priority = Priority::None;
        w.paused = true;
        orch.update(&mut w, clock(3), &mut rec).unwrap();

        assert_eq!(rec.resolved, vec![(SwarmId(0), 2)]);
        assert!(orch.active_swarms().is_empty());
        assert_eq!(w.agent(AgentId(10)).unwrap().target, Some(SiteId(10)));
        assert_eq!(w.agent(AgentId(11)).unwrap().target, Some(SiteId(12)));
    }

    #[test]
    fn swarm_waits_for_expected_agents() {
        let mut w = emergency_world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        w.insert_agent(AgentId(10), collector(0.0, 0.0, Some(SiteId(11))));
        w.paused = true;
        orch.update(&mut w, clock(2), &mut rec).unwrap();
        assert!(rec.formed.is_empty());
        assert_eq!(orch.state().pending_swarms[&SiteId(11)].expected, 2);
    }

    #[test]
    fn stale_pending_swarm_expires() {
        let mut w = emergency_world();
        let mut orch = running(&mut w, policy(), ScriptedPathService::default());
        let mut rec = Recorder::default();

        orch.update(&mut w, clock(1), &mut rec).unwrap();
        assert!(orch.state().pending_swarms.contains_key(&SiteId(11)));

        w.paused = true;
        orch.update(&mut w, clock(7), &mut rec).unwrap();
        assert!(orch.state().pending_swarms.is_empty());
        assert!(rec.formed.is_empty());
    }
}
