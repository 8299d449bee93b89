//! Simulation time model.
//!
//! # Design
//!
//! Three clocks advance together and are owned by the host:
//!
//! - `current_tick`: a plain counter, bumped once per host frame.  Claim
//!   distances are memoized against it, so "same tick" is an integer
//!   comparison rather than a floating-point clock equality.
//! - `game_secs`: simulated time.  Drives the swarm timeout, the periodic
//!   full scan, the retarget cooldown and the low-cargo recall.
//! - `real_secs`: wall-clock time.  Drives the scan interval and the
//!   target-change history window, which must not speed up with the game.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self` (saturating).
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

pub const SECS_PER_DAY: f64 = 86_400.0;

/// The host's view of time for one frame.  Cheap to copy.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SimClock {
    pub current_tick: Tick,
    /// Simulated seconds since the start of the run.
    pub game_secs: f64,
    /// Wall-clock seconds since the start of the run.
    pub real_secs: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one tick, adding the given game and wall-clock deltas.
    #[inline]
    pub fn advance(&mut self, game_dt_secs: f64, real_dt_secs: f64) {
        self.current_tick = self.current_tick.offset(1);
        self.game_secs += game_dt_secs;
        self.real_secs += real_dt_secs;
    }

    /// Simulated days since the start of the run.
    #[inline]
    pub fn game_days(&self) -> f64 {
        self.game_secs / SECS_PER_DAY
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (day {:.2}, real {:.1}s)", self.current_tick, self.game_days(), self.real_secs)
    }
}
