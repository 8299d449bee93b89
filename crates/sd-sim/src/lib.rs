//! `sd-sim`: per-frame orchestrator for the swarm dispatch core.
//!
//! # Frame loop
//!
//! ```text
//! update(world, clock):
//!   uninitialized → validate config, full scan, build service areas → running
//!   running:
//!     every scan interval (every frame when 0):
//!       ① Scan     : full or quick rescan of facilities and demand sites
//!       ② Sync     : create/drop service areas, register demand sites
//!       ③ Dispatch : idle agents at every facility (skipped while paused)
//!       ④ GC       : expire target-change history
//!       ⑤ Swarms   : promote pending swarms, expire stale ones
//!       ⑥ Resolve  : redirect agents of swarms whose target was cleared
//!     every frame:
//!       ⑦ Agents   : forget removed agents; recalls and retargeting of
//!                    agents on the road (skipped while paused)
//!       ⑧ Paths    : retry failed movement plans against other sites
//!       ⑨ Critical : recall out-of-region deliveries while a home site
//!                    is critical (skipped while paused)
//! ```
//!
//! A failure while initializing halts the orchestrator for good.  A failure
//! in a running frame is logged and reported to the observer; the next frame
//! starts from whatever state the failing step left behind.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use sd_sim::{NoopObserver, OrchestratorBuilder};
//! use sd_world::ScriptedPathService;
//!
//! let mut orch = OrchestratorBuilder::new(ScriptedPathService::default())
//!     .policy(policy)
//!     .build()?;
//! loop {
//!     clock.advance(game_dt, real_dt);
//!     orch.update(&mut world, clock, &mut NoopObserver)?;
//!     for command in world.drain_commands() { /* carry out */ }
//! }
//! ```

pub mod builder;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod scan;

#[cfg(test)]
mod tests;

pub use builder::{validate_config, OrchestratorBuilder};
pub use error::{SimError, SimResult};
pub use observer::{DispatchObserver, NoopObserver, RecallReason};
pub use orchestrator::{Orchestrator, Phase};
pub use scan::{Escalation, ScanReport, Scanner};
