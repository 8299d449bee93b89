//! Path-service seam.

use sd_core::{PathHandle, WorldPos};
use sd_spatial::ApproachPoint;

use crate::PathError;

/// A movement-plan request between approach points on the path network.
#[derive(Clone, Debug, PartialEq)]
pub struct PathRequest {
    /// One or two candidate start points, nearest first.
    pub start:    Vec<ApproachPoint>,
    /// One or two candidate end points, nearest first.
    pub end:      Vec<ApproachPoint>,
    pub max_cost: u32,
}

/// Polled state of an issued movement plan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathStatus {
    Pending,
    Ready,
    Failed,
}

/// The host's movement planner.
///
/// `create_path` only rejects malformed requests; an unreachable destination
/// surfaces later as [`PathStatus::Failed`].
pub trait PathService {
    /// Up to two road positions within `radius` of `pos`, nearest first.
    fn find_approach_positions(&self, pos: WorldPos, radius: f32) -> Vec<ApproachPoint>;

    fn create_path(&mut self, request: PathRequest) -> Result<PathHandle, PathError>;

    fn release_path(&mut self, handle: PathHandle);

    fn path_status(&self, handle: PathHandle) -> PathStatus;
}
