//! Emergency swarms.
//!
//! A burst dispatch registers a [`PendingSwarm`] keyed by its first target.
//! Dispatched agents take a few frames to appear on the road; once enough of
//! them are seen heading for the site the orchestrator promotes the entry to
//! an active [`Swarm`].  When the site is cleared the swarm's remaining
//! agents are handed out to other sites with [`plan_redirects`].

use sd_core::{AgentId, FacilityId, SiteId};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PendingSwarm {
    pub expected:   u32,
    /// Game seconds at registration.
    pub created_at: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Swarm {
    pub target:   SiteId,
    pub facility: FacilityId,
    pub agents:   Vec<AgentId>,
}

/// Pair each agent with a replacement site, `group_size` agents per site,
/// walking `ranked` in order.  Agents beyond the last site are left out.
pub fn plan_redirects(
    agents:     &[AgentId],
    ranked:     &[SiteId],
    group_size: usize,
) -> Vec<(AgentId, SiteId)> {
    let group_size = group_size.max(1);
    agents
        .chunks(group_size)
        .zip(ranked)
        .flat_map(|(group, &site)| group.iter().map(move |&a| (a, site)))
        .collect()
}
