//! In-memory mirror of the host world.
//!
//! Sites, facilities and agents live in `BTreeMap`s so every iteration the
//! dispatch core performs visits them in ascending id order; contested claims
//! therefore resolve the same way on every run.
//!
//! The core never moves agents.  It edits the few agent fields it owns
//! (target, flags, path handle) in place and asks the host for everything
//! else through [`HostCommand`]s collected in an outbox.

use std::collections::{BTreeMap, BTreeSet};

use sd_core::{
    AgentFlags, AgentId, AgentRng, AgentStatus, FacilityId, LanePosition, PathHandle, Priority,
    RegionId, SiteId, WorldPos,
};

use crate::{WorldError, WorldResult};

// ── Sites ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    pub position: WorldPos,
    pub region:   Option<RegionId>,
    pub load:     u32,
    pub priority: Priority,
    /// `false` while the site is abandoned or being demolished.
    pub active:   bool,
    /// Agents currently bound to this site as their target.
    pub guests:   BTreeSet<AgentId>,
}

impl Site {
    pub fn new(position: WorldPos, region: Option<RegionId>, load: u32) -> Self {
        Self {
            position,
            region,
            load,
            priority: Priority::None,
            active:   true,
            guests:   BTreeSet::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

// ── Facilities ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Facility {
    pub position:         WorldPos,
    pub region:           Option<RegionId>,
    /// Operating radius of the service area.
    pub service_radius:   f32,
    /// Vehicles the facility is staffed for at full budget.
    pub crew_count:       u32,
    /// Budget-adjusted production rate, 0–100.
    pub production_rate:  u32,
    pub storage_used:     u32,
    pub storage_capacity: u32,
    /// Burns its load instead of storing it; needs headroom before dispatch.
    pub consumes_load:    bool,
    pub active:           bool,
    pub shutting_down:    bool,
    pub evacuating:       bool,
    pub full:             bool,
}

impl Facility {
    pub fn new(position: WorldPos, region: Option<RegionId>, service_radius: f32, crew_count: u32) -> Self {
        Self {
            position,
            region,
            service_radius,
            crew_count,
            production_rate:  100,
            storage_used:     0,
            storage_capacity: 100_000,
            consumes_load:    false,
            active:           true,
            shutting_down:    false,
            evacuating:       false,
            full:             false,
        }
    }

    /// Agents this facility may keep working at once.
    #[inline]
    pub fn max_working_agents(&self) -> u32 {
        (self.production_rate * self.crew_count).div_ceil(100)
    }

    #[inline]
    pub fn free_storage(&self) -> u32 {
        self.storage_capacity.saturating_sub(self.storage_used)
    }
}

// ── Agents ────────────────────────────────────────────────────────────────────

/// Progress along the current unit of an agent's path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathProgress {
    /// Host position index; `u8::MAX` means "not started".  Two index steps
    /// cover one path position.
    pub position_index: u8,
    pub position_count: u8,
    /// `false` when this unit is the last one of the path.
    pub has_next_unit:  bool,
}

impl PathProgress {
    /// `true` once the agent is on the final position of its final unit;
    /// retargeting it now would discard an almost finished trip.
    pub fn is_near_end(&self) -> bool {
        if self.has_next_unit {
            return false;
        }
        let mut index = if self.position_index == u8::MAX { 0 } else { self.position_index };
        if index & 1 == 0 {
            index = index.saturating_add(1);
        }
        (index >> 1) as usize + 1 >= self.position_count as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    pub home:         Option<FacilityId>,
    pub target:       Option<SiteId>,
    pub position:     WorldPos,
    pub velocity:     WorldPos,
    pub cargo:        u32,
    pub capacity:     u32,
    pub flags:        AgentFlags,
    pub path:         Option<PathHandle>,
    pub progress:     Option<PathProgress>,
    pub lane:         Option<LanePosition>,
    pub wait_counter: u8,
}

impl Agent {
    /// A freshly dispatched collecting agent standing at its facility.
    pub fn collector(home: FacilityId, position: WorldPos, capacity: u32) -> Self {
        Self {
            home:         Some(home),
            target:       None,
            position,
            velocity:     WorldPos::ORIGIN,
            cargo:        0,
            capacity,
            flags:        AgentFlags::collecting(),
            path:         None,
            progress:     None,
            lane:         None,
            wait_counter: 0,
        }
    }

    #[inline]
    pub fn status(&self) -> AgentStatus {
        AgentStatus::derive(self.flags, self.target.is_some())
    }

    #[inline]
    pub fn is_near_path_end(&self) -> bool {
        self.progress.is_some_and(|p| p.is_near_end())
    }
}

// ── Regions ───────────────────────────────────────────────────────────────────

/// Axis-aligned extent of a region, used to find the region under an agent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegionBounds {
    pub id:  RegionId,
    pub min: WorldPos,
    pub max: WorldPos,
}

impl RegionBounds {
    pub fn contains(&self, pos: WorldPos) -> bool {
        (self.min.x..=self.max.x).contains(&pos.x) && (self.min.z..=self.max.z).contains(&pos.z)
    }
}

// ── Host commands ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OfferKind {
    /// Agent offers to take more load.
    Incoming,
    /// Agent offers to hand over the load it carries.
    Outgoing,
}

/// An offer posted to the host's transfer board.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransferOffer {
    pub agent:    AgentId,
    pub kind:     OfferKind,
    pub position: WorldPos,
    pub amount:   u32,
    pub priority: u8,
}

/// Requests from the dispatch core that only the host can carry out.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCommand {
    /// Spawn a new agent at `facility` and send it to `site`.
    StartTransfer { facility: FacilityId, site: SiteId },
    PostOffer(TransferOffer),
    /// Put an agent with a ready path back on the road.
    Spawn(AgentId),
    /// Remove the agent from the simulation.
    Unspawn(AgentId),
}

// ── World ─────────────────────────────────────────────────────────────────────

pub struct World {
    sites:      BTreeMap<SiteId, Site>,
    facilities: BTreeMap<FacilityId, Facility>,
    agents:     BTreeMap<AgentId, Agent>,
    regions:    Vec<RegionBounds>,
    outbox:     Vec<HostCommand>,
    /// `true` while the host simulation is paused.
    pub paused: bool,
    seed:       u64,
}

impl World {
    pub fn new(seed: u64) -> Self {
        Self {
            sites:      BTreeMap::new(),
            facilities: BTreeMap::new(),
            agents:     BTreeMap::new(),
            regions:    Vec::new(),
            outbox:     Vec::new(),
            paused:     false,
            seed,
        }
    }

    // ── Sites ─────────────────────────────────────────────────────────────

    pub fn insert_site(&mut self, id: SiteId, site: Site) {
        self.sites.insert(id, site);
    }

    pub fn remove_site(&mut self, id: SiteId) -> Option<Site> {
        self.sites.remove(&id)
    }

    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.get(&id)
    }

    pub fn site_mut(&mut self, id: SiteId) -> Option<&mut Site> {
        self.sites.get_mut(&id)
    }

    pub fn sites(&self) -> impl Iterator<Item = (SiteId, &Site)> + '_ {
        self.sites.iter().map(|(&id, s)| (id, s))
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// `true` if `id` is an active site holding more than `threshold` load.
    pub fn qualifies(&self, id: SiteId, threshold: u32) -> bool {
        self.sites.get(&id).is_some_and(|s| s.active && s.load > threshold)
    }

    pub fn site_priority(&self, id: SiteId) -> Priority {
        self.sites.get(&id).map_or(Priority::None, |s| s.priority)
    }

    // ── Facilities ────────────────────────────────────────────────────────

    pub fn insert_facility(&mut self, id: FacilityId, facility: Facility) {
        self.facilities.insert(id, facility);
    }

    pub fn remove_facility(&mut self, id: FacilityId) -> Option<Facility> {
        self.facilities.remove(&id)
    }

    pub fn facility(&self, id: FacilityId) -> Option<&Facility> {
        self.facilities.get(&id)
    }

    pub fn facility_mut(&mut self, id: FacilityId) -> Option<&mut Facility> {
        self.facilities.get_mut(&id)
    }

    pub fn facility_ids(&self) -> impl Iterator<Item = FacilityId> + '_ {
        self.facilities.keys().copied()
    }

    /// Agents whose home is `id`, in id order.
    pub fn facility_agents(&self, id: FacilityId) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|(_, a)| a.home == Some(id))
            .map(|(&aid, _)| aid)
            .collect()
    }

    // ── Agents ────────────────────────────────────────────────────────────

    pub fn insert_agent(&mut self, id: AgentId, agent: Agent) {
        if let Some(site) = agent.target.and_then(|t| self.sites.get_mut(&t)) {
            site.guests.insert(id);
        }
        self.agents.insert(id, agent);
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    pub fn try_agent(&self, id: AgentId) -> WorldResult<&Agent> {
        self.agents.get(&id).ok_or(WorldError::AgentNotFound(id))
    }

    pub fn try_agent_mut(&mut self, id: AgentId) -> WorldResult<&mut Agent> {
        self.agents.get_mut(&id).ok_or(WorldError::AgentNotFound(id))
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Move `agent`'s site binding from its current target to `target`.
    pub fn bind_target(&mut self, agent: AgentId, target: Option<SiteId>) -> WorldResult<()> {
        let a = self.agents.get_mut(&agent).ok_or(WorldError::AgentNotFound(agent))?;
        let previous = std::mem::replace(&mut a.target, target);
        if let Some(site) = previous.and_then(|p| self.sites.get_mut(&p)) {
            site.guests.remove(&agent);
        }
        if let Some(site) = target.and_then(|t| self.sites.get_mut(&t)) {
            site.guests.insert(agent);
        }
        Ok(())
    }

    /// Remove `agent` from the world and ask the host to despawn it.
    pub fn unspawn(&mut self, agent: AgentId) -> Option<Agent> {
        let removed = self.agents.remove(&agent)?;
        if let Some(site) = removed.target.and_then(|t| self.sites.get_mut(&t)) {
            site.guests.remove(&agent);
        }
        self.outbox.push(HostCommand::Unspawn(agent));
        Some(removed)
    }

    /// Ask the host to put `agent` back on the road along its current path.
    pub fn request_spawn(&mut self, agent: AgentId) -> WorldResult<()> {
        let a = self.try_agent_mut(agent)?;
        a.flags.spawned = true;
        self.outbox.push(HostCommand::Spawn(agent));
        Ok(())
    }

    // ── Regions ───────────────────────────────────────────────────────────

    pub fn add_region(&mut self, bounds: RegionBounds) {
        self.regions.push(bounds);
    }

    /// First region whose bounds contain `pos`.
    pub fn region_at(&self, pos: WorldPos) -> Option<RegionId> {
        self.regions.iter().find(|r| r.contains(pos)).map(|r| r.id)
    }

    // ── Unspawn positions ─────────────────────────────────────────────────

    /// Where `agent` leaves the road when arriving at `site`.
    pub fn site_unspawn_position(&self, site: SiteId, agent: AgentId, jitter: f32) -> WorldResult<WorldPos> {
        let s = self.sites.get(&site).ok_or(WorldError::SiteNotFound(site))?;
        Ok(self.jittered(s.position, agent, jitter))
    }

    /// Where `agent` leaves the road when arriving home at `facility`.
    pub fn facility_unspawn_position(
        &self,
        facility: FacilityId,
        agent:    AgentId,
        jitter:   f32,
    ) -> WorldResult<WorldPos> {
        let f = self.facilities.get(&facility).ok_or(WorldError::FacilityNotFound(facility))?;
        Ok(self.jittered(f.position, agent, jitter))
    }

    fn jittered(&self, base: WorldPos, agent: AgentId, jitter: f32) -> WorldPos {
        let mut rng = AgentRng::new(self.seed, agent);
        let dx = rng.jitter(jitter);
        let dz = rng.jitter(jitter);
        base.offset(dx, dz)
    }

    // ── Outbox ────────────────────────────────────────────────────────────

    pub fn start_transfer(&mut self, facility: FacilityId, site: SiteId) {
        self.outbox.push(HostCommand::StartTransfer { facility, site });
    }

    pub fn post_offer(&mut self, offer: TransferOffer) {
        self.outbox.push(HostCommand::PostOffer(offer));
    }

    pub fn pending_commands(&self) -> &[HostCommand] {
        &self.outbox
    }

    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.outbox)
    }
}
