//! Agent movement flags and the six-state status derived from them.

use std::fmt;

/// The minimal set of host-side booleans the dispatch core reads or writes.
///
/// `transfer_to_source` is set while an agent is out collecting load to bring
/// back to its source facility; `transfer_to_target` while it is delivering.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentFlags {
    pub transfer_to_source: bool,
    pub transfer_to_target: bool,
    pub going_back:         bool,
    pub waiting_target:     bool,
    pub waiting_path:       bool,
    pub spawned:            bool,
}

impl AgentFlags {
    /// Flags of a freshly dispatched collecting agent.
    pub fn collecting() -> Self {
        Self { transfer_to_source: true, spawned: true, ..Self::default() }
    }
}

/// Per-agent dispatch state, derived once from [`AgentFlags`].
///
/// The numeric discriminants are stable and appear in logs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AgentStatus {
    /// Returning to the home facility.
    Idle              = 0,
    /// Delivering, waiting for an offer to match.
    WaitingForSlot    = 1,
    /// Delivering, moving towards a target.
    EnRouteOutbound   = 2,
    /// Neither collecting nor delivering.
    NoActiveTransfer  = 3,
    /// Collecting, waiting for the next target.
    WaitingToReturn   = 4,
    /// Collecting, moving towards a target.
    EnRouteReturning  = 5,
}

impl AgentStatus {
    /// Derive the status from the agent's flags and whether it has a target.
    pub fn derive(flags: AgentFlags, has_target: bool) -> AgentStatus {
        if flags.transfer_to_source {
            if flags.going_back {
                AgentStatus::Idle
            } else if flags.waiting_target {
                AgentStatus::WaitingToReturn
            } else {
                AgentStatus::EnRouteReturning
            }
        } else if flags.transfer_to_target {
            if flags.going_back {
                AgentStatus::Idle
            } else if flags.waiting_target {
                AgentStatus::WaitingForSlot
            } else if has_target {
                AgentStatus::EnRouteOutbound
            } else {
                AgentStatus::NoActiveTransfer
            }
        } else {
            AgentStatus::NoActiveTransfer
        }
    }

    /// `true` for the two collecting states that take part in retargeting.
    #[inline]
    pub fn is_collecting(self) -> bool {
        matches!(self, AgentStatus::WaitingToReturn | AgentStatus::EnRouteReturning)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Idle             => "idle",
            AgentStatus::WaitingForSlot   => "waiting_for_slot",
            AgentStatus::EnRouteOutbound  => "en_route_outbound",
            AgentStatus::NoActiveTransfer => "no_active_transfer",
            AgentStatus::WaitingToReturn  => "waiting_to_return",
            AgentStatus::EnRouteReturning => "en_route_returning",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), *self as u8)
    }
}
