//! Path service backed by an `sd-spatial` road network.
//!
//! Requests are queued by `create_path` and resolved in one batch by
//! [`NetworkPathService::process_queue`], which the host calls once per frame.
//! Between the two, `path_status` reports `Pending`, matching the
//! asynchronous planner the dispatch core is written against.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use sd_core::{NodeId, PathHandle, WorldPos};
use sd_spatial::{ApproachPoint, RoadNetwork, Route, Router, SpatialError};

use crate::{PathError, PathRequest, PathService, PathStatus};

enum Slot {
    Queued(PathRequest),
    Ready(Route),
    Failed(SpatialError),
}

pub struct NetworkPathService<R: Router> {
    network: RoadNetwork,
    router:  R,
    slots:   FxHashMap<PathHandle, Slot>,
    queue:   VecDeque<PathHandle>,
    next:    u32,
}

impl<R: Router> NetworkPathService<R> {
    pub fn new(network: RoadNetwork, router: R) -> Self {
        Self {
            network,
            router,
            slots: FxHashMap::default(),
            queue: VecDeque::new(),
            next:  1,
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Resolve every queued request.  Returns how many were processed.
    pub fn process_queue(&mut self) -> usize {
        let mut processed = 0;
        while let Some(handle) = self.queue.pop_front() {
            let Some(Slot::Queued(request)) = self.slots.get(&handle) else {
                // Released before it was planned.
                continue;
            };
            let from: Vec<NodeId> = request.start.iter().map(|p| p.node).collect();
            let to:   Vec<NodeId> = request.end.iter().map(|p| p.node).collect();
            let slot = match self.router.route(&self.network, &from, &to, request.max_cost) {
                Ok(route) => Slot::Ready(route),
                Err(e) => {
                    tracing::trace!(path = %handle, error = %e, "path request failed");
                    Slot::Failed(e)
                }
            };
            self.slots.insert(handle, slot);
            processed += 1;
        }
        processed
    }

    /// The planned route, once `path_status` reports `Ready`.
    pub fn route(&self, handle: PathHandle) -> Option<&Route> {
        match self.slots.get(&handle) {
            Some(Slot::Ready(route)) => Some(route),
            _ => None,
        }
    }

    /// Why a failed request failed.
    pub fn failure(&self, handle: PathHandle) -> Option<&SpatialError> {
        match self.slots.get(&handle) {
            Some(Slot::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// Number of live (unreleased) path handles.
    pub fn live_paths(&self) -> usize {
        self.slots.len()
    }
}

impl<R: Router> PathService for NetworkPathService<R> {
    fn find_approach_positions(&self, pos: WorldPos, radius: f32) -> Vec<ApproachPoint> {
        self.network.approach_points(pos, radius, 2)
    }

    fn create_path(&mut self, request: PathRequest) -> Result<PathHandle, PathError> {
        if request.start.is_empty() || request.end.is_empty() {
            return Err(PathError::EmptyRequest);
        }
        let handle = PathHandle(self.next);
        self.next = self.next.wrapping_add(1).max(1);
        self.slots.insert(handle, Slot::Queued(request));
        self.queue.push_back(handle);
        Ok(handle)
    }

    fn release_path(&mut self, handle: PathHandle) {
        self.slots.remove(&handle);
    }

    fn path_status(&self, handle: PathHandle) -> PathStatus {
        match self.slots.get(&handle) {
            Some(Slot::Queued(_)) => PathStatus::Pending,
            Some(Slot::Ready(_))  => PathStatus::Ready,
            Some(Slot::Failed(_)) | None => PathStatus::Failed,
        }
    }
}
