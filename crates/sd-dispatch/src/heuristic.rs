//! Closest-target heuristic: steering options, immediacy tiers, and the
//! incumbent-versus-candidate decision.
//!
//! Everything here is pure.  [`ServiceArea`](crate::ServiceArea) walks its
//! zones, scores each candidate with [`score`], and asks the running
//! [`Incumbent`] whether the candidate should replace it.
//!
//! ```text
//!                 angle to heading
//!        -π/2 ─────────── 0 ─────────── +π/2
//!   d < close   tier 2 inside the steering arc (left / right halves only if
//!               the lane layout allows that turn)
//!   d < medium  tier 1 inside ±π/3, widened to ±π/2 on an allowed side,
//!               and only if the agent can keep going ahead
//!   otherwise   tier 0
//! ```

use std::f64::consts::{FRAC_PI_2, FRAC_PI_3};
use std::ops::BitOr;

use sd_core::{angle_difference, LanePosition, Priority, SiteId, Tuning, WorldPos};

// ── SearchDirection ───────────────────────────────────────────────────────────

/// Which ways an agent can steer from its current lane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchDirection {
    pub ahead: bool,
    pub left:  bool,
    pub right: bool,
}

impl SearchDirection {
    pub const NONE:  SearchDirection = SearchDirection { ahead: false, left: false, right: false };
    pub const AHEAD: SearchDirection = SearchDirection { ahead: true,  left: false, right: false };
    pub const LEFT:  SearchDirection = SearchDirection { ahead: false, left: true,  right: false };
    pub const RIGHT: SearchDirection = SearchDirection { ahead: false, left: false, right: true };
    pub const ALL:   SearchDirection = SearchDirection { ahead: true,  left: true,  right: true };

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl BitOr for SearchDirection {
    type Output = SearchDirection;

    fn bitor(self, rhs: SearchDirection) -> SearchDirection {
        SearchDirection {
            ahead: self.ahead || rhs.ahead,
            left:  self.left || rhs.left,
            right: self.right || rhs.right,
        }
    }
}

/// Steering options from the lane the agent occupies.
///
/// Only drivable lanes count.  A middle lane can only go ahead; a lone lane,
/// or one side of a plain two-way road, can go anywhere; an outer lane of a
/// wider road can turn towards its own side.
pub fn immediate_search_direction(lane: Option<&LanePosition>) -> SearchDirection {
    let Some(lp) = lane else {
        return SearchDirection::NONE;
    };

    let mut count = 0;
    let mut leftmost: Option<usize> = None;
    let mut rightmost: Option<usize> = None;
    for (i, l) in lp.lanes.iter().enumerate().filter(|(_, l)| l.drivable) {
        count += 1;
        if leftmost.is_none_or(|j| l.offset < lp.lanes[j].offset) {
            leftmost = Some(i);
        }
        if rightmost.is_none_or(|j| l.offset > lp.lanes[j].offset) {
            rightmost = Some(i);
        }
    }
    let (Some(left), Some(right)) = (leftmost, rightmost) else {
        return SearchDirection::NONE;
    };

    if lp.current != left && lp.current != right {
        SearchDirection::AHEAD
    } else if left == right {
        SearchDirection::ALL
    } else if count == 2 && lp.lanes[left].direction != lp.lanes[right].direction {
        SearchDirection::ALL
    } else if lp.current == left {
        SearchDirection::AHEAD | SearchDirection::LEFT
    } else {
        SearchDirection::AHEAD | SearchDirection::RIGHT
    }
}

// ── Immediacy ─────────────────────────────────────────────────────────────────

/// 0, 1 or 2: how directly a candidate at squared distance `dist_sq` and
/// `angle` off the heading can be reached given the steering options.
pub fn immediacy(dist_sq: f32, angle: f64, dir: SearchDirection, tuning: &Tuning) -> u8 {
    if dist_sq < tuning.close_range_sq {
        let lo = if dir.left { -FRAC_PI_2 } else { 0.0 };
        let hi = if dir.right { FRAC_PI_2 } else { 0.0 };
        if (lo..=hi).contains(&angle) {
            return 2;
        }
    } else if dist_sq < tuning.medium_range_sq && dir.ahead {
        let lo = if dir.left { -FRAC_PI_2 } else { -FRAC_PI_3 };
        let hi = if dir.right { FRAC_PI_2 } else { FRAC_PI_3 };
        if (lo..=hi).contains(&angle) {
            return 1;
        }
    }
    0
}

/// A far candidate in the forward half-plane.
#[inline]
pub fn along_the_way(dist_sq: f32, angle: f64, tuning: &Tuning) -> bool {
    dist_sq >= tuning.medium_range_sq && (-FRAC_PI_2..=FRAC_PI_2).contains(&angle)
}

// ── Scoring ───────────────────────────────────────────────────────────────────

/// Where a candidate sits relative to the searching agent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CandidateScore {
    pub site:     SiteId,
    pub priority: Priority,
    pub dist_sq:  f32,
    /// Absolute bearing from the agent to the site.
    pub bearing:  f64,
    /// Bearing relative to the agent's heading, in `[-π, π]`.
    pub angle:    f64,
    pub tier:     u8,
}

pub fn score(
    site:     SiteId,
    site_pos: WorldPos,
    priority: Priority,
    agent:    WorldPos,
    heading:  f64,
    dir:      SearchDirection,
    tuning:   &Tuning,
) -> CandidateScore {
    let dist_sq = agent.dist_sq(site_pos);
    let bearing = agent.bearing_to(site_pos);
    let angle = angle_difference(heading, bearing);
    CandidateScore { site, priority, dist_sq, bearing, angle, tier: immediacy(dist_sq, angle, dir, tuning) }
}

// ── Incumbent ─────────────────────────────────────────────────────────────────

/// How a candidate's existing claim stands.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Contest {
    /// No valid claim on the candidate.
    Open,
    /// Valid claim by someone at the given squared distance.
    Challengeable { holder_dist: f32 },
}

/// The best target found so far in one search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Incumbent {
    pub site:      Option<SiteId>,
    pub priority:  Priority,
    /// Distance to the agent's target at the start of the search.
    pub cur_dist:  f32,
    /// Distance to the best candidate so far.
    pub best_dist: f32,
    /// Bearing to the agent's target at the start of the search.
    pub bearing:   Option<f64>,
}

impl Incumbent {
    pub fn empty() -> Self {
        Self {
            site:      None,
            priority:  Priority::None,
            cur_dist:  f32::INFINITY,
            best_dist: f32::INFINITY,
            bearing:   None,
        }
    }

    /// Start from the agent's current target.
    pub fn current(site: SiteId, priority: Priority, dist_sq: f32, bearing: f64) -> Self {
        Self { site: Some(site), priority, cur_dist: dist_sq, best_dist: dist_sq, bearing: Some(bearing) }
    }

    /// `true` if `c` should replace the incumbent.
    ///
    /// `already_tried` is whether `c` is in the agent's old-targets set.
    pub fn prefers(
        &self,
        c:              &CandidateScore,
        contest:        Contest,
        immediate_only: bool,
        already_tried:  bool,
        tuning:         &Tuning,
    ) -> bool {
        let buffer = tuning.distance_buffer;
        if already_tried || self.priority > c.priority {
            return false;
        }
        match contest {
            Contest::Challengeable { holder_dist } => {
                c.dist_sq <= self.cur_dist * buffer
                    && c.dist_sq <= self.best_dist
                    && c.dist_sq <= holder_dist * buffer
                    && c.tier > 0
            }
            Contest::Open => {
                if immediate_only && c.tier == 0 {
                    return false;
                }
                if self.priority < c.priority {
                    return true;
                }
                if c.dist_sq > self.cur_dist * buffer || c.dist_sq > self.best_dist {
                    return false;
                }
                // Out of reach and off both the heading and the line to the
                // current target.
                let detour = c.tier == 0
                    && !along_the_way(c.dist_sq, c.angle, tuning)
                    && self.bearing.is_some_and(|b| {
                        !along_the_way(c.dist_sq, angle_difference(b, c.bearing), tuning)
                    });
                !detour
            }
        }
    }

    pub fn replace(&mut self, c: &CandidateScore) {
        self.site = Some(c.site);
        self.priority = c.priority;
        self.best_dist = c.dist_sq;
    }
}
