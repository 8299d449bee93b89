//! Per-agent retargeting history.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use sd_core::{AgentId, SiteId};

// ── OldTargets ────────────────────────────────────────────────────────────────

/// Sites an agent already tried, excluded from its later searches.
pub struct OldTargets {
    sets:  FxHashMap<AgentId, BTreeSet<SiteId>>,
    limit: usize,
}

impl OldTargets {
    /// A table holding at most `limit` sites per agent.
    pub fn new(limit: usize) -> Self {
        Self { sets: FxHashMap::default(), limit }
    }

    /// Remember `site` for `agent`.  Returns `false` if the set is full and
    /// `site` was not already in it.
    pub fn add(&mut self, agent: AgentId, site: SiteId) -> bool {
        let set = self.sets.entry(agent).or_default();
        if set.len() >= self.limit && !set.contains(&site) {
            return false;
        }
        set.insert(site);
        true
    }

    pub fn contains(&self, agent: AgentId, site: SiteId) -> bool {
        self.sets.get(&agent).is_some_and(|s| s.contains(&site))
    }

    pub fn count(&self, agent: AgentId) -> usize {
        self.sets.get(&agent).map_or(0, BTreeSet::len)
    }

    pub fn clear(&mut self, agent: AgentId) {
        self.sets.remove(&agent);
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

// ── TargetChangeLog ───────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TargetChange {
    pub target:    SiteId,
    pub real_secs: f64,
}

/// Rolling window of each agent's recent retargets, bounded in age and size.
pub struct TargetChangeLog {
    changes:     FxHashMap<AgentId, Vec<TargetChange>>,
    window_secs: f64,
    limit:       usize,
}

impl TargetChangeLog {
    pub fn new(window_secs: f64, limit: usize) -> Self {
        Self { changes: FxHashMap::default(), window_secs, limit }
    }

    /// Record a retarget at wall-clock `now`.  Returns `true` if the list hit
    /// its size cap and the oldest entries were dropped.
    pub fn record(&mut self, agent: AgentId, target: SiteId, now: f64) -> bool {
        let list = self.changes.entry(agent).or_default();
        list.push(TargetChange { target, real_secs: now });
        let window = self.window_secs;
        list.retain(|c| now - c.real_secs <= window);
        if list.len() > self.limit {
            let excess = list.len() - self.limit;
            list.drain(..excess);
            return true;
        }
        false
    }

    /// Drop entries older than the window and agents left with none.
    pub fn collect_garbage(&mut self, now: f64) {
        let window = self.window_secs;
        self.changes.retain(|_, list| {
            list.retain(|c| now - c.real_secs <= window);
            !list.is_empty()
        });
    }

    pub fn recent(&self, agent: AgentId) -> &[TargetChange] {
        self.changes.get(&agent).map_or(&[], Vec::as_slice)
    }

    pub fn forget(&mut self, agent: AgentId) {
        self.changes.remove(&agent);
    }

    pub fn tracked_agents(&self) -> usize {
        self.changes.len()
    }
}
