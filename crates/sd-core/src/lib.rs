//! `sd-core`: foundational types for the swarm dispatch core.
//!
//! This crate is a dependency of every other `sd-*` crate.  It has no `sd-*`
//! dependencies of its own.
//!
//! # What lives here
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`ids`]      | `AgentId`, `SiteId`, `FacilityId`, `RegionId`, `NodeId`, … |
//! | [`geo`]      | `WorldPos`, squared distance, bearings, angle differences  |
//! | [`time`]     | `Tick`, `SimClock` (tick counter + game/real seconds)      |
//! | [`status`]   | `AgentFlags`, six-state `AgentStatus`                      |
//! | [`lane`]     | `Lane`, `LanePosition`: lane layout of a path segment      |
//! | [`priority`] | `Priority` escalation level of a demand site               |
//! | [`policy`]   | `PolicyParams`, `Tuning`, `DispatchConfig`                 |
//! | [`loader`]   | `name,value` CSV load/save for `PolicyParams`              |
//! | [`rng`]      | `AgentRng` (per-agent), `SimRng` (global)                  |
//! | [`error`]    | `CoreError`, `CoreResult`                                  |

pub mod error;
pub mod geo;
pub mod ids;
pub mod lane;
pub mod loader;
pub mod policy;
pub mod priority;
pub mod rng;
pub mod status;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{angle_difference, WorldPos};
pub use ids::{AgentId, EdgeId, FacilityId, NodeId, PathHandle, RegionId, SiteId, SwarmId};
pub use lane::{Lane, LaneDirection, LanePosition};
pub use loader::{load_policy_csv, load_policy_reader, save_policy_writer};
pub use policy::{DispatchConfig, PolicyParams, Tuning};
pub use priority::Priority;
pub use rng::{AgentRng, SimRng};
pub use status::{AgentFlags, AgentStatus};
pub use time::{SimClock, Tick};
