//! Deterministic in-memory path service.
//!
//! Every request is accepted (unless told to reject it) and resolves to a
//! fixed outcome, or to whatever the caller sets per handle.  Used by tests
//! and by hosts that have no planner of their own.

use rustc_hash::FxHashMap;

use sd_core::{NodeId, PathHandle, WorldPos};
use sd_spatial::ApproachPoint;

use crate::{PathError, PathRequest, PathService, PathStatus};

pub struct ScriptedPathService {
    statuses:    FxHashMap<PathHandle, PathStatus>,
    requests:    Vec<PathRequest>,
    released:    Vec<PathHandle>,
    next:        u32,
    reject_next: usize,
    /// `false` makes every position unreachable from the road.
    pub reachable: bool,
    /// Status a new request starts in.
    pub outcome:   PathStatus,
}

impl Default for ScriptedPathService {
    fn default() -> Self {
        Self::new(PathStatus::Ready)
    }
}

impl ScriptedPathService {
    pub fn new(outcome: PathStatus) -> Self {
        Self {
            statuses:    FxHashMap::default(),
            requests:    Vec::new(),
            released:    Vec::new(),
            next:        1,
            reject_next: 0,
            reachable:   true,
            outcome,
        }
    }

    /// Reject the next `n` requests with [`PathError::EmptyRequest`].
    pub fn reject_next(&mut self, n: usize) {
        self.reject_next = n;
    }

    pub fn set_status(&mut self, handle: PathHandle, status: PathStatus) {
        self.statuses.insert(handle, status);
    }

    /// Accepted requests, oldest first.
    pub fn requests(&self) -> &[PathRequest] {
        &self.requests
    }

    pub fn released(&self) -> &[PathHandle] {
        &self.released
    }

    pub fn live_paths(&self) -> usize {
        self.statuses.len()
    }
}

impl PathService for ScriptedPathService {
    fn find_approach_positions(&self, _pos: WorldPos, _radius: f32) -> Vec<ApproachPoint> {
        if self.reachable {
            vec![ApproachPoint { node: NodeId(0), distance: 1.0 }]
        } else {
            Vec::new()
        }
    }

    fn create_path(&mut self, request: PathRequest) -> Result<PathHandle, PathError> {
        if self.reject_next > 0 {
            self.reject_next -= 1;
            return Err(PathError::EmptyRequest);
        }
        let handle = PathHandle(self.next);
        self.next += 1;
        self.statuses.insert(handle, self.outcome);
        self.requests.push(request);
        Ok(handle)
    }

    fn release_path(&mut self, handle: PathHandle) {
        self.statuses.remove(&handle);
        self.released.push(handle);
    }

    fn path_status(&self, handle: PathHandle) -> PathStatus {
        self.statuses.get(&handle).copied().unwrap_or(PathStatus::Failed)
    }
}
