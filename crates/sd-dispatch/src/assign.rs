//! Target commit: binding an agent to a new target and requesting the
//! movement plan that gets it there.
//!
//! ```text
//! set_target(agent, target)
//!   ├─ target outside the home region → substitute an in-region site,
//!   │                                   or recall
//!   ├─ target unchanged               → resume along the current path,
//!   │                                   or plan one
//!   └─ new target
//!        for attempt in 0..retries     (retries > 1 only while waiting)
//!          bind candidate, plan path   → success: record + claim
//!          next candidate = best unclaimed site not tried yet
//!        exhausted                     → restore previous target (en route)
//!                                        or unspawn
//! ```
//!
//! The agent never ends a call holding a target without a movement plan: it
//! either has one requested, is waiting for a host offer, is heading home,
//! or has been removed.

use tracing::{debug, trace};

use sd_core::{AgentId, AgentStatus, FacilityId, SiteId};
use sd_world::{OfferKind, PathRequest, TransferOffer, World};

use crate::{DispatchEnv, DispatchResult, DispatchState};

/// How a `set_target` call ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetTargetOutcome {
    /// Target unchanged; the agent continues along its existing path.
    Resumed,
    /// A movement plan was requested towards the site, or towards home /
    /// an offer wait for `None`.
    Planned(Option<SiteId>),
    /// Every attempt failed; the previous target and path were put back.
    Restored(Option<SiteId>),
    /// Sent back to its facility.
    Recalled,
    /// Removed from the world.
    Unspawned,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mode {
    Assign,
    Recall,
}

/// Point `agent` at `target` (or at nothing) and plan the trip.
pub fn set_target(
    state:  &mut DispatchState,
    env:    &mut DispatchEnv<'_>,
    agent:  AgentId,
    target: Option<SiteId>,
) -> DispatchResult<SetTargetOutcome> {
    commit(state, env, agent, target, Mode::Assign)
}

/// Detach `agent` from its target and send it straight back to its facility.
pub fn send_home(
    state: &mut DispatchState,
    env:   &mut DispatchEnv<'_>,
    agent: AgentId,
) -> DispatchResult<SetTargetOutcome> {
    if env.policy().log_recalls {
        debug!(target: "sd::recall", agent = %agent, "sending agent home");
    }
    commit(state, env, agent, None, Mode::Recall)
}

fn commit(
    state:      &mut DispatchState,
    env:        &mut DispatchEnv<'_>,
    agent:      AgentId,
    mut target: Option<SiteId>,
    mode:       Mode,
) -> DispatchResult<SetTargetOutcome> {
    let a = env.world.try_agent(agent)?;
    let home = a.home;
    let spawned = a.flags.spawned;
    let current = a.target;

    // ── Region substitution ───────────────────────────────────────────────
    if let (Some(t), Some(h)) = (target, home) {
        let home_region = env.world.facility(h).and_then(|f| f.region);
        if home_region.is_some() && !env.region_allows(home_region, t) {
            match state.unclaimed_target(h, Some(agent), env)? {
                Some(sub) => {
                    if env.policy().log_dispatch {
                        debug!(target: "sd::dispatch", agent = %agent, from = %t, to = %sub,
                            "redirecting out-of-region assignment");
                    }
                    target = Some(sub);
                }
                None => {
                    if env.policy().log_recalls {
                        debug!(target: "sd::recall", agent = %agent, site = %t,
                            "no in-region site available, recalling");
                    }
                    if !spawned {
                        env.world.unspawn(agent);
                        return Ok(SetTargetOutcome::Unspawned);
                    }
                    return match send_home(state, env, agent)? {
                        SetTargetOutcome::Unspawned => Ok(SetTargetOutcome::Unspawned),
                        _ => Ok(SetTargetOutcome::Recalled),
                    };
                }
            }
        }
    }

    // ── Same target ───────────────────────────────────────────────────────
    if mode == Mode::Assign && target == current {
        if env.world.try_agent(agent)?.path.is_some() {
            env.world.request_spawn(agent)?;
            return Ok(SetTargetOutcome::Resumed);
        }
        if start_path_find(env, agent)? {
            return Ok(SetTargetOutcome::Planned(target));
        }
        if env.policy().log_recalls {
            debug!(target: "sd::recall", agent = %agent, "no path on spawn attempt, unspawning");
        }
        env.world.unspawn(agent);
        return Ok(SetTargetOutcome::Unspawned);
    }

    // ── New target ────────────────────────────────────────────────────────
    let over_capacity = home.filter(|_| !spawned).and_then(|h| {
        let f = env.world.facility(h)?;
        let (max, now) = (f.max_working_agents() as usize, env.world.facility_agents(h).len());
        (now > max).then_some((now, max))
    });
    if let Some((now, max)) = over_capacity {
        if env.policy().log_recalls {
            debug!(target: "sd::recall", agent = %agent, now, max, "excess agent, unspawning");
        }
        env.world.unspawn(agent);
        return Ok(SetTargetOutcome::Unspawned);
    }

    let a = env.world.try_agent(agent)?;
    let (prev_target, prev_path, prev_progress) = (a.target, a.path, a.progress);
    let status = a.status();
    let retries = if status == AgentStatus::WaitingToReturn {
        state.old_targets.clear(agent);
        env.tuning().max_retry_attempts.max(1)
    } else {
        1
    };

    let mut candidate = target;
    for attempt in 0..retries {
        if attempt > 0 {
            let next = match home {
                Some(h) => state.unclaimed_target(h, Some(agent), env)?,
                None => None,
            };
            let Some(next) = next else {
                break;
            };
            candidate = Some(next);
            trace!(agent = %agent, attempt, site = %next, "retrying with alternative site");
        }

        env.world.bind_target(agent, candidate)?;
        {
            let a = env.world.try_agent_mut(agent)?;
            a.flags.waiting_target = false;
            a.wait_counter = 0;
        }

        let Some(site) = candidate.filter(|_| status.is_collecting()) else {
            if candidate.is_none() {
                park(env, agent, mode)?;
            }
            if start_path_find(env, agent)? {
                return Ok(SetTargetOutcome::Planned(candidate));
            }
            if env.policy().log_recalls {
                debug!(target: "sd::recall", agent = %agent, "no path after assignment, unspawning");
            }
            env.world.unspawn(agent);
            return Ok(SetTargetOutcome::Unspawned);
        };

        state.old_targets.add(agent, site);
        if start_path_find(env, agent)? {
            state.claims.claim_for(site, agent, env);
            return Ok(SetTargetOutcome::Planned(candidate));
        }
    }

    if status == AgentStatus::EnRouteReturning {
        env.world.bind_target(agent, prev_target)?;
        let a = env.world.try_agent_mut(agent)?;
        a.path = prev_path;
        a.progress = prev_progress;
        if let Some(t) = prev_target {
            state.claims.claim_for(t, agent, env);
        }
        return Ok(SetTargetOutcome::Restored(prev_target));
    }

    if env.policy().log_recalls {
        debug!(target: "sd::recall", agent = %agent, status = %status, "retries exhausted, unspawning");
    }
    env.world.unspawn(agent);
    Ok(SetTargetOutcome::Unspawned)
}

/// `true` if the agent's facility wants its agents back.
pub fn should_return_to_source(world: &World, home: Option<FacilityId>) -> bool {
    home.and_then(|h| world.facility(h))
        .is_some_and(|f| f.production_rate == 0 || f.evacuating || f.shutting_down)
}

/// Decide what an agent without a target does next: wait on a host offer
/// for more work, or head home.
fn park(env: &mut DispatchEnv<'_>, agent: AgentId, mode: Mode) -> DispatchResult<()> {
    let a = env.world.try_agent(agent)?;
    let home_pos = a.home.and_then(|h| env.world.facility(h)).map(|f| f.position);
    let offer_pos = home_pos.map_or(a.position, |p| a.position.midpoint(p));
    let returning = should_return_to_source(env.world, a.home);
    let priority = env.tuning().offer_priority;

    let a = env.world.try_agent_mut(agent)?;
    if mode == Mode::Recall {
        a.flags.going_back = true;
        return Ok(());
    }

    let mut offer = None;
    if a.flags.transfer_to_target {
        if a.cargo > 0 {
            offer = Some(OfferKind::Outgoing);
            a.flags.waiting_target = true;
        } else {
            a.flags.going_back = true;
        }
    }
    if a.flags.transfer_to_source {
        if a.cargo < a.capacity && !returning {
            offer = Some(OfferKind::Incoming);
            a.flags.waiting_target = true;
        } else {
            a.flags.going_back = true;
        }
    }

    if let Some(kind) = offer {
        env.world.post_offer(TransferOffer { agent, kind, position: offer_pos, amount: 1, priority });
    }
    Ok(())
}

/// Request a movement plan towards the agent's current destination.
///
/// Returns `false` when no plan could be requested.  A waiting agent needs
/// no plan and always succeeds.
pub fn start_path_find(env: &mut DispatchEnv<'_>, agent: AgentId) -> DispatchResult<bool> {
    let a = env.world.try_agent(agent)?;
    if a.flags.waiting_target {
        return Ok(true);
    }

    let jitter = env.tuning().unspawn_jitter;
    let end = if a.flags.going_back {
        a.home.map(|h| env.world.facility_unspawn_position(h, agent, jitter))
    } else {
        a.target.map(|t| env.world.site_unspawn_position(t, agent, jitter))
    };
    let Some(Ok(end)) = end else {
        return Ok(false);
    };
    let (position, old_path) = (a.position, a.path);

    let radius = env.tuning().approach_search_radius;
    let min_distance = env.tuning().min_approach_distance;
    let mut start = env.paths.find_approach_positions(position, radius);
    if start.len() > 1 && start[0].distance < min_distance {
        start.truncate(1);
    }
    let finish = env.paths.find_approach_positions(end, radius);
    if start.is_empty() || finish.is_empty() {
        return Ok(false);
    }

    let request = PathRequest { start, end: finish, max_cost: env.tuning().max_path_cost };
    match env.paths.create_path(request) {
        Ok(handle) => {
            if let Some(old) = old_path {
                env.paths.release_path(old);
            }
            let a = env.world.try_agent_mut(agent)?;
            a.path = Some(handle);
            a.progress = None;
            a.flags.waiting_path = true;
            Ok(true)
        }
        Err(e) => {
            trace!(agent = %agent, error = %e, "path request rejected");
            Ok(false)
        }
    }
}
