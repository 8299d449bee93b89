//! Orchestrator observer trait for progress reporting and diagnostics.

use std::fmt;

use sd_core::{AgentId, FacilityId, SwarmId, Tick};
use sd_dispatch::{DispatchOutcome, Swarm};

use crate::SimError;

/// Why the orchestrator sent an agent home.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecallReason {
    /// On route too long while carrying too little.
    LowCargo,
    /// Target lies outside the home facility's region.
    RegionViolation,
    /// Delivering outside the home region while a home site is critical.
    CriticalRegion,
    /// Path planning kept failing against every alternative site.
    PathFailure,
    /// Bulk recall after the region restriction was switched on.
    OutOfRegion,
}

impl RecallReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RecallReason::LowCargo        => "low_cargo",
            RecallReason::RegionViolation => "region_violation",
            RecallReason::CriticalRegion  => "critical_region",
            RecallReason::PathFailure     => "path_failure",
            RecallReason::OutOfRegion     => "out_of_region",
        }
    }
}

impl fmt::Display for RecallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callbacks invoked by [`Orchestrator::update`][crate::Orchestrator::update]
/// at key points of a frame.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: dispatch counter
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct DispatchCounter { sent: u32 }
///
/// impl DispatchObserver for DispatchCounter {
///     fn on_dispatch(&mut self, _facility: FacilityId, outcome: &DispatchOutcome) {
///         self.sent += outcome.dispatched;
///     }
/// }
/// ```
pub trait DispatchObserver {
    /// Called at the very start of each running frame, before any processing.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called at the end of each running frame, after a failed one too.
    fn on_tick_end(&mut self, _tick: Tick) {}

    /// A facility sent agents out.
    fn on_dispatch(&mut self, _facility: FacilityId, _outcome: &DispatchOutcome) {}

    /// Enough burst-dispatched agents were seen to form a swarm.
    fn on_swarm_formed(&mut self, _id: SwarmId, _swarm: &Swarm) {}

    /// A swarm's target was cleared; `redirected` agents got new targets.
    fn on_swarm_resolved(&mut self, _id: SwarmId, _redirected: usize) {}

    fn on_recall(&mut self, _agent: AgentId, _reason: RecallReason) {}

    /// A running frame failed.  The state from before the failing step is
    /// kept and the next frame proceeds normally.
    fn on_tick_error(&mut self, _tick: Tick, _error: &SimError) {}
}

/// A [`DispatchObserver`] that does nothing.  Use when you need to call
/// `update` but don't want callbacks.
pub struct NoopObserver;

impl DispatchObserver for NoopObserver {}
