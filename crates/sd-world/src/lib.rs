//! `sd-world`: the dispatch core's view of the host simulation.
//!
//! The host owns positions, movement and the path network.  Each frame it
//! mirrors the state the dispatch core reads into a [`World`] and drains the
//! [`HostCommand`]s the core emitted in return.  Path planning stays behind
//! the [`PathService`] trait so hosts can plug in their own planner; the
//! bundled [`NetworkPathService`] plans over an `sd-spatial` road network.
//!
//! | Module            | Contents                                              |
//! |-------------------|-------------------------------------------------------|
//! | [`world`]         | `World`, `Site`, `Facility`, `Agent`, `HostCommand`   |
//! | [`path`]          | `PathService` trait, `PathRequest`, `PathStatus`      |
//! | [`network_paths`] | `NetworkPathService` (queued, resolved per frame)     |
//! | [`scripted`]      | `ScriptedPathService` (fixed outcomes, for tests)     |
//! | [`error`]         | `WorldError`, `PathError`                             |

pub mod error;
pub mod network_paths;
pub mod path;
pub mod scripted;
pub mod world;


pub use error::{PathError, WorldError, WorldResult};
pub use network_paths::NetworkPathService;
pub use path::{PathRequest, PathService, PathStatus};
pub use scripted::ScriptedPathService;
pub use sd_spatial::ApproachPoint;
pub use world::{
    Agent, Facility, HostCommand, OfferKind, PathProgress, RegionBounds, Site, TransferOffer, World,
};
