//! `sd-dispatch`: who serves which demand site.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                 |
//! |------------------|----------------------------------------------------------|
//! | [`env`]          | `DispatchEnv`: world, path service, config, clock        |
//! | [`claims`]       | `Claim`, `ClaimDistance`, `ClaimRegistry`                |
//! | [`history`]      | `OldTargets`, `TargetChangeLog`                          |
//! | [`heuristic`]    | search direction, immediacy tiers, candidate scoring     |
//! | [`service_area`] | `ServiceArea`: zones, dispatch, target search            |
//! | [`assign`]       | `set_target` / `send_home` commit state machine          |
//! | [`swarm`]        | `PendingSwarm`, `Swarm`, redirect planning               |
//! | [`state`]        | `DispatchState`: the tables shared by all of the above   |
//! | [`error`]        | `DispatchError`, `DispatchResult<T>`                     |
//!
//! # Ownership
//!
//! Every shared table lives in one [`DispatchState`] owned by the caller
//! (the orchestrator).  Service areas hold only site keys; operations that
//! need claims or history borrow them from the state for the duration of the
//! call.  Nothing here holds a reference across calls.

pub mod assign;
pub mod claims;
pub mod env;
pub mod error;
pub mod heuristic;
pub mod history;
pub mod service_area;
pub mod state;
pub mod swarm;


pub use assign::{send_home, set_target, should_return_to_source, start_path_find, SetTargetOutcome};
pub use claims::{Claim, ClaimDistance, ClaimRegistry};
pub use env::DispatchEnv;
pub use error::{DispatchError, DispatchResult};
pub use heuristic::{immediate_search_direction, CandidateScore, SearchDirection};
pub use history::{OldTargets, TargetChangeLog};
pub use service_area::{DispatchMode, DispatchOutcome, ServiceArea};
pub use state::{DispatchState, Ledger};
pub use swarm::{plan_redirects, PendingSwarm, Swarm};
