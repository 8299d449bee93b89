//! Claim registry: which agent currently owns which demand site.
//!
//! A claim's distance is recomputed lazily, at most once per tick:
//!
//! | Regime          | Condition                                              |
//! |-----------------|--------------------------------------------------------|
//! | `Unset`         | agent gone, site no longer qualifies, or the agent's   |
//! |                 | target is some other site                              |
//! | `Uncontestable` | agent within `close_range_sq` of the site              |
//! | `Measured(d)`   | otherwise; `d` is the squared distance                 |
//!
//! The close-range test comes before the target test, so an agent that has
//! just arrived keeps an uncontestable claim for the remainder of the tick in
//! which it was retargeted.

use rustc_hash::FxHashMap;

use sd_core::{AgentId, SiteId, Tick};

use crate::DispatchEnv;

// ── ClaimDistance ─────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClaimDistance {
    Unset,
    Uncontestable,
    Measured(f32),
}

impl ClaimDistance {
    /// Numeric form: `+∞` for `Unset`, `−∞` for `Uncontestable`.
    pub fn as_f32(self) -> f32 {
        match self {
            ClaimDistance::Unset         => f32::INFINITY,
            ClaimDistance::Uncontestable => f32::NEG_INFINITY,
            ClaimDistance::Measured(d)   => d,
        }
    }
}

// ── Claim ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Claim {
    agent:       AgentId,
    distance:    ClaimDistance,
    computed_at: Option<Tick>,
}

impl Claim {
    pub fn new(agent: AgentId) -> Self {
        Self { agent, distance: ClaimDistance::Unset, computed_at: None }
    }

    #[inline]
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Distance as of the last refresh.
    #[inline]
    pub fn distance(&self) -> ClaimDistance {
        self.distance
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.distance != ClaimDistance::Unset
    }

    #[inline]
    pub fn is_challengeable(&self) -> bool {
        self.distance != ClaimDistance::Uncontestable
    }

    fn refresh(&mut self, site: SiteId, env: &DispatchEnv<'_>) {
        let tick = env.tick();
        if self.computed_at == Some(tick) {
            return;
        }
        self.computed_at = Some(tick);
        self.distance = measure(self.agent, site, env);
    }
}

fn measure(agent: AgentId, site: SiteId, env: &DispatchEnv<'_>) -> ClaimDistance {
    let (Some(a), Some(s)) = (env.world.agent(agent), env.world.site(site)) else {
        return ClaimDistance::Unset;
    };
    if !env.qualifies(site) {
        return ClaimDistance::Unset;
    }
    let d = a.position.dist_sq(s.position);
    if d <= env.tuning().close_range_sq {
        ClaimDistance::Uncontestable
    } else if a.target != Some(site) {
        ClaimDistance::Unset
    } else {
        ClaimDistance::Measured(d)
    }
}

// ── ClaimRegistry ─────────────────────────────────────────────────────────────

/// At most one claim per site; a later `set_claim` replaces the earlier one.
#[derive(Default)]
pub struct ClaimRegistry {
    claims: FxHashMap<SiteId, Claim>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `site` to `agent`, replacing any existing claim.
    pub fn set_claim(&mut self, site: SiteId, agent: AgentId) {
        self.claims.insert(site, Claim::new(agent));
    }

    /// The claim on `site` with its distance refreshed for the current tick.
    pub fn get_claim(&mut self, site: SiteId, env: &DispatchEnv<'_>) -> Option<Claim> {
        let claim = self.claims.get_mut(&site)?;
        claim.refresh(site, env);
        Some(*claim)
    }

    pub fn remove_claim(&mut self, site: SiteId) -> Option<Claim> {
        self.claims.remove(&site)
    }

    /// Claimant of `site` without refreshing.
    pub fn holder(&self, site: SiteId) -> Option<AgentId> {
        self.claims.get(&site).map(|c| c.agent)
    }

    /// The claim on `site` as of its last refresh.
    pub fn peek(&self, site: SiteId) -> Option<&Claim> {
        self.claims.get(&site)
    }

    /// `true` if some agent other than `agent` holds a valid claim on `site`.
    pub fn is_held_by_other(&mut self, site: SiteId, agent: AgentId, env: &DispatchEnv<'_>) -> bool {
        self.get_claim(site, env).is_some_and(|c| c.is_valid() && c.agent != agent)
    }

    /// Record `agent` as claimant of `site` unless it already is, or another
    /// agent holds an uncontestable claim.  Returns `true` if `agent` holds
    /// the claim afterwards.
    pub fn claim_for(&mut self, site: SiteId, agent: AgentId, env: &DispatchEnv<'_>) -> bool {
        match self.get_claim(site, env) {
            Some(c) if c.agent == agent => true,
            Some(c) if c.is_valid() && !c.is_challengeable() => false,
            _ => {
                self.set_claim(site, agent);
                true
            }
        }
    }

    /// Drop every claim held by `agent`.
    pub fn release_agent(&mut self, agent: AgentId) {
        self.claims.retain(|_, c| c.agent != agent);
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
