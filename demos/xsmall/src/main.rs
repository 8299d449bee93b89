//! xsmall: smallest end-to-end run of the swarm dispatch core.
//!
//! Two facilities on a 9×5 street grid, one per region, serve nine demand
//! sites whose load grows every tick.  The loop below stands in for the
//! host game: it spawns agents on request, drives them along planned
//! routes, collects load, and escalates sites that pile up.  One site sits
//! on an unconnected node so every plan towards it fails.
//!
//! Run with `RUST_LOG=sd=debug` to watch dispatch decisions.

mod network;

use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Instant;

use anyhow::Result;
use rustc_hash::FxHashMap;
use tracing_subscriber::EnvFilter;

use sd_core::{load_policy_reader, AgentId, FacilityId, PathHandle, Priority, RegionId, SimClock, SiteId, SwarmId, Tick, WorldPos};
use sd_dispatch::{start_path_find, DispatchEnv, DispatchOutcome, DispatchMode, Swarm};
use sd_sim::{DispatchObserver, Orchestrator, OrchestratorBuilder, RecallReason, SimError};
use sd_spatial::{DijkstraRouter, RoadNetwork, Route};
use sd_world::{Agent, Facility, HostCommand, NetworkPathService, PathService, PathStatus, RegionBounds, Site, World};

use network::{build_network, cell_pos, ISLAND};

type Paths = NetworkPathService<DijkstraRouter>;

// ── Constants ─────────────────────────────────────────────────────────────────

const SEED:               u64 = 42;
const TICKS:              u64 = 2_000;
const GAME_SECS_PER_TICK: f64 = 60.0;
const REAL_SECS_PER_TICK: f64 = 0.05;
const AGENT_CAPACITY:     u32 = 4_000;
const AGENT_SPEED:        f32 = 40.0; // world units per tick
const WAIT_LIMIT_TICKS:   u32 = 30;   // then the host sends a waiting agent home
const INITIAL_LOAD:       u32 = 1_000;
const WARNING_LOAD:       u32 = 6_000;
const CRITICAL_LOAD:      u32 = 9_000;

const WEST: FacilityId = FacilityId(1);
const EAST: FacilityId = FacilityId(2);

/// `(grid column, grid row, load added per tick)`; site ids start at 1.
const GRID_SITES: [(i32, i32, u32); 8] = [
    (0, 0, 12),
    (1, 3, 20),
    (3, 1, 35),
    (3, 4, 15),
    (5, 0, 18),
    (5, 3, 30),
    (7, 1, 25),
    (8, 4, 10),
];
const ISLAND_SITE: SiteId = SiteId(9);
const ISLAND_RATE: u32 = 20;

const POLICY_CSV: &str = "\
name,value\n\
emergency_agent_count,4\n\
normal_dispatch_count,1\n\
region_restricted,true\n\
scan_frequency_ms,250\n\
log_dispatch,true\n\
log_emergency,true\n\
log_recalls,true\n\
";

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingObserver {
    normal_dispatches:    usize,
    emergency_dispatches: usize,
    swarms_formed:        usize,
    swarms_resolved:      usize,
    redirected:           usize,
    recalls:              BTreeMap<&'static str, usize>,
    errors:               usize,
}

impl DispatchObserver for CountingObserver {
    fn on_dispatch(&mut self, _facility: FacilityId, outcome: &DispatchOutcome) {
        match outcome.mode {
            DispatchMode::Normal => self.normal_dispatches += 1,
            DispatchMode::Emergency => self.emergency_dispatches += 1,
        }
    }

    fn on_swarm_formed(&mut self, _id: SwarmId, _swarm: &Swarm) {
        self.swarms_formed += 1;
    }

    fn on_swarm_resolved(&mut self, _id: SwarmId, redirected: usize) {
        self.swarms_resolved += 1;
        self.redirected += redirected;
    }

    fn on_recall(&mut self, _agent: AgentId, reason: RecallReason) {
        *self.recalls.entry(reason.as_str()).or_default() += 1;
    }

    fn on_tick_error(&mut self, tick: Tick, error: &SimError) {
        tracing::warn!(tick = %tick, error = %error, "dispatch frame failed");
        self.errors += 1;
    }
}

// ── Host ──────────────────────────────────────────────────────────────────────

/// Progress of an agent along its current route.
struct Trip {
    handle:    PathHandle,
    travelled: f32,
}

#[derive(Default)]
struct Host {
    next_agent: u32,
    trips:      FxHashMap<AgentId, Trip>,
    waited:     FxHashMap<AgentId, u32>,
    spawned:    u32,
    collected:  u64,
    delivered:  u64,
    offers:     u32,
    unspawned:  u32,
}

impl Host {
    /// Carry out what the dispatch core asked for during the last update.
    fn handle_commands(&mut self, world: &mut World, orch: &mut Orchestrator<Paths>, clock: SimClock) -> Result<()> {
        for command in world.drain_commands() {
            match command {
                HostCommand::StartTransfer { facility, site } => {
                    let Some(pos) = world.facility(facility).map(|f| f.position) else {
                        continue;
                    };
                    let id = AgentId(self.next_agent);
                    self.next_agent += 1;
                    world.insert_agent(id, Agent::collector(facility, pos, AGENT_CAPACITY));
                    orch.set_target(world, clock, id, Some(site))?;
                    self.spawned += 1;
                }
                HostCommand::PostOffer(_) => self.offers += 1,
                HostCommand::Spawn(_) => {}
                HostCommand::Unspawn(_) => self.unspawned += 1,
            }
        }
        Ok(())
    }

    /// Move every agent with a ready route; handle arrivals.
    fn drive(&mut self, world: &mut World, orch: &mut Orchestrator<Paths>, clock: SimClock) -> Result<()> {
        let agents: Vec<AgentId> = world.agent_ids().collect();
        for id in agents {
            let Some(a) = world.agent(id) else {
                continue;
            };
            let Some(handle) = a.path else {
                continue;
            };
            if a.flags.waiting_target {
                let waited = self.waited.entry(id).or_default();
                *waited += 1;
                if *waited > WAIT_LIMIT_TICKS {
                    self.waited.remove(&id);
                    head_home(world, orch, clock, id)?;
                }
                continue;
            }
            if orch.paths.path_status(handle) != PathStatus::Ready {
                continue;
            }

            let trip = self.trips.entry(id).or_insert(Trip { handle, travelled: 0.0 });
            if trip.handle != handle {
                *trip = Trip { handle, travelled: 0.0 };
            }
            trip.travelled += AGENT_SPEED;
            let Some((pos, arrived)) = orch.paths.route(handle).map(|r| along(orch.paths.network(), r, trip.travelled))
            else {
                continue;
            };

            let a = world.try_agent_mut(id)?;
            a.position = pos;
            a.flags.waiting_path = false;
            if arrived {
                self.trips.remove(&id);
                self.arrive(world, orch, clock, id)?;
            }
        }
        self.trips.retain(|id, _| world.agent(*id).is_some());
        self.waited.retain(|id, _| world.agent(*id).is_some());
        Ok(())
    }

    fn arrive(&mut self, world: &mut World, orch: &mut Orchestrator<Paths>, clock: SimClock, id: AgentId) -> Result<()> {
        let a = world.try_agent(id)?;
        if a.flags.going_back {
            self.delivered += a.cargo as u64;
            world.unspawn(id);
            return Ok(());
        }
        let Some(site) = a.target else {
            return Ok(());
        };
        let room = a.capacity.saturating_sub(a.cargo);
        let taken = world.site_mut(site).map_or(0, |s| {
            let taken = s.load.min(room);
            s.load -= taken;
            taken
        });
        world.try_agent_mut(id)?.cargo += taken;
        self.collected += taken as u64;

        // The host has no follow-up of its own; the dispatch core either
        // parks the agent on an offer or sends it home when full.
        orch.set_target(world, clock, id, None)?;
        Ok(())
    }
}

/// Give up waiting for work and plan the way home.
fn head_home(world: &mut World, orch: &mut Orchestrator<Paths>, clock: SimClock, id: AgentId) -> Result<()> {
    let a = world.try_agent_mut(id)?;
    a.flags.waiting_target = false;
    a.flags.going_back = true;
    let planned = {
        let mut env = DispatchEnv::new(world, &mut orch.paths, &orch.config, clock);
        start_path_find(&mut env, id)?
    };
    if !planned {
        world.unspawn(id);
    }
    Ok(())
}

/// Position `travelled` units along `route`, and whether the end is reached.
fn along(network: &RoadNetwork, route: &Route, travelled: f32) -> (WorldPos, bool) {
    let mut left = travelled;
    for &edge in &route.edges {
        let e = edge.index();
        let len = network.edge_length[e];
        if left < len {
            let from = network.node_pos[network.edge_from[e].index()];
            let to = network.node_pos[network.edge_to[e].index()];
            let t = left / len;
            return (WorldPos::new(from.x + (to.x - from.x) * t, from.z + (to.z - from.z) * t), false);
        }
        left -= len;
    }
    (network.node_pos[route.end.index()], true)
}

// ── World setup ───────────────────────────────────────────────────────────────

fn region_of(pos: WorldPos) -> RegionId {
    if pos.x < 0.0 { RegionId(1) } else { RegionId(2) }
}

fn build_world() -> World {
    let mut world = World::new(SEED);
    world.add_region(RegionBounds {
        id:  RegionId(1),
        min: WorldPos::new(-1_000.0, -600.0),
        max: WorldPos::new(-1.0, 600.0),
    });
    world.add_region(RegionBounds {
        id:  RegionId(2),
        min: WorldPos::new(0.0, -600.0),
        max: WorldPos::new(1_000.0, 1_200.0),
    });

    world.insert_facility(WEST, Facility::new(cell_pos(2, 2), Some(RegionId(1)), 1_200.0, 6));
    world.insert_facility(EAST, Facility::new(cell_pos(6, 2), Some(RegionId(2)), 1_200.0, 6));

    for (i, &(col, row, _)) in GRID_SITES.iter().enumerate() {
        let pos = cell_pos(col, row);
        world.insert_site(SiteId(i as u32 + 1), Site::new(pos, Some(region_of(pos)), INITIAL_LOAD));
    }
    world.insert_site(ISLAND_SITE, Site::new(ISLAND, Some(region_of(ISLAND)), INITIAL_LOAD));
    world
}

/// Add each site's growth and derive its priority from the new load.
fn grow_load(world: &mut World) {
    let rates = GRID_SITES.iter().map(|&(_, _, rate)| rate).chain(std::iter::once(ISLAND_RATE));
    for (i, rate) in rates.enumerate() {
        let Some(site) = world.site_mut(SiteId(i as u32 + 1)) else {
            continue;
        };
        site.load += rate;
        site.priority = match site.load {
            l if l >= CRITICAL_LOAD => Priority::Critical,
            l if l >= WARNING_LOAD => Priority::Warning,
            _ => Priority::None,
        };
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    println!("=== xsmall: swarm dispatch core ===");
    println!("Ticks: {TICKS}  |  Game secs/tick: {GAME_SECS_PER_TICK}  |  Seed: {SEED}");
    println!();

    // 1. Road network and path service.
    let (network, _island) = build_network();
    println!("Road network: {} nodes, {} edges", network.node_count(), network.edge_count());
    let paths = NetworkPathService::new(network, DijkstraRouter);

    // 2. World.
    let mut world = build_world();
    println!("World: {} facilities, {} sites", world.facility_ids().count(), world.site_count());

    // 3. Policy from the embedded CSV.
    let policy = load_policy_reader(Cursor::new(POLICY_CSV))?;
    println!(
        "Policy: emergency {} | normal {} | region restricted {}",
        policy.emergency_agent_count, policy.normal_dispatch_count, policy.region_restricted
    );
    println!();

    // 4. Orchestrator.
    let mut orch = OrchestratorBuilder::new(paths).policy(policy).build()?;
    let mut obs = CountingObserver::default();
    let mut host = Host::default();
    let mut clock = SimClock::new();

    // 5. Run.
    let t0 = Instant::now();
    for _ in 0..TICKS {
        clock.advance(GAME_SECS_PER_TICK, REAL_SECS_PER_TICK);
        grow_load(&mut world);
        orch.update(&mut world, clock, &mut obs)?;
        orch.paths.process_queue();
        host.handle_commands(&mut world, &mut orch, clock)?;
        host.drive(&mut world, &mut orch, clock)?;
    }
    let elapsed = t0.elapsed();

    // 6. Summary.
    println!("Run complete in {:.3} s", elapsed.as_secs_f64());
    println!("  agents spawned      : {}", host.spawned);
    println!("  agents on the road  : {}", world.agent_count());
    println!("  load collected      : {}", host.collected);
    println!("  load delivered      : {}", host.delivered);
    println!("  offers posted       : {}", host.offers);
    println!("  unspawn requests    : {}", host.unspawned);
    println!("  normal dispatches   : {}", obs.normal_dispatches);
    println!("  emergency dispatches: {}", obs.emergency_dispatches);
    println!("  swarms formed       : {}", obs.swarms_formed);
    println!("  swarms resolved     : {} ({} agents redirected)", obs.swarms_resolved, obs.redirected);
    println!("  frame errors        : {}", obs.errors);
    for (reason, n) in &obs.recalls {
        println!("  recalls ({reason:<16}): {n}");
    }
    println!();

    // 7. Final site table.
    println!("{:<6} {:<8} {:<8} {:<10}", "Site", "Region", "Load", "Priority");
    println!("{}", "-".repeat(34));
    for (id, site) in world.sites() {
        let region = site.region.map_or_else(|| "-".to_string(), |r| r.0.to_string());
        println!("{:<6} {:<8} {:<8} {:<10}", id.0, region, site.load, site.priority.as_str());
    }

    Ok(())
}
