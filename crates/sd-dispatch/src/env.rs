//! Per-call environment threaded through every dispatch operation.

use sd_core::{DispatchConfig, PolicyParams, RegionId, SimClock, SiteId, Tick, Tuning};
use sd_world::{PathService, World};

/// Mutable access to the host mirror and path service, plus the read-only
/// configuration and the clock of the current frame.
pub struct DispatchEnv<'a> {
    pub world:  &'a mut World,
    pub paths:  &'a mut dyn PathService,
    pub config: &'a DispatchConfig,
    pub clock:  SimClock,
}

impl<'a> DispatchEnv<'a> {
    pub fn new(
        world:  &'a mut World,
        paths:  &'a mut dyn PathService,
        config: &'a DispatchConfig,
        clock:  SimClock,
    ) -> Self {
        Self { world, paths, config, clock }
    }

    #[inline]
    pub fn policy(&self) -> &PolicyParams {
        &self.config.policy
    }

    #[inline]
    pub fn tuning(&self) -> &Tuning {
        &self.config.tuning
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.clock.current_tick
    }

    /// `true` if `site` currently counts as a demand site.
    #[inline]
    pub fn qualifies(&self, site: SiteId) -> bool {
        self.world.qualifies(site, self.config.policy.load_threshold)
    }

    /// `true` if region policy lets a facility in `home_region` serve `site`.
    ///
    /// Always `true` when the restriction is off or the facility belongs to
    /// no region.
    pub fn region_allows(&self, home_region: Option<RegionId>, site: SiteId) -> bool {
        if !self.config.policy.region_restricted {
            return true;
        }
        match home_region {
            None => true,
            Some(r) => self.world.site(site).is_some_and(|s| s.region == Some(r)),
        }
    }
}
