//! Routing trait and default Dijkstra implementation.
//!
//! # Pluggability
//!
//! The path service calls routing via the [`Router`] trait, so embedders can
//! swap in their own search without touching the dispatch core.
//!
//! # Multi-endpoint search
//!
//! A path request carries up to two candidate start nodes and two candidate
//! end nodes (the nearest approach points on each side).  Every start is
//! seeded into the heap at cost zero and the search stops at the first end
//! node popped, so the cheapest combination wins.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use sd_core::{EdgeId, NodeId};

use crate::network::RoadNetwork;
use crate::SpatialError;

// ── Route ─────────────────────────────────────────────────────────────────────

/// The result of a routing query: an ordered list of `EdgeId`s and the total
/// cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub start: NodeId,
    pub end:   NodeId,
    /// Edges to traverse in order, from `start` to `end`.
    pub edges: Vec<EdgeId>,
    pub total_cost: u32,
}

impl Route {
    /// `true` if the source and destination are the same node.
    pub fn is_trivial(&self) -> bool {
        self.edges.is_empty()
    }
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing engine.
pub trait Router {
    /// Cheapest route from any of `from` to any of `to`, refusing routes that
    /// cost more than `max_cost`.
    fn route(
        &self,
        network:  &RoadNetwork,
        from:     &[NodeId],
        to:       &[NodeId],
        max_cost: u32,
    ) -> Result<Route, SpatialError>;
}

// ── DijkstraRouter ────────────────────────────────────────────────────────────

/// Standard Dijkstra's algorithm over the CSR road graph using `edge_cost`.
pub struct DijkstraRouter;

impl Router for DijkstraRouter {
    fn route(
        &self,
        network:  &RoadNetwork,
        from:     &[NodeId],
        to:       &[NodeId],
        max_cost: u32,
    ) -> Result<Route, SpatialError> {
        dijkstra(network, from, to, max_cost)
    }
}

// ── Dijkstra internals ────────────────────────────────────────────────────────

fn dijkstra(
    network:  &RoadNetwork,
    from:     &[NodeId],
    to:       &[NodeId],
    max_cost: u32,
) -> Result<Route, SpatialError> {
    let n = network.node_count();
    for &node in from.iter().chain(to) {
        if node.index() >= n {
            return Err(SpatialError::NodeNotFound(node));
        }
    }
    if from.is_empty() || to.is_empty() {
        return Err(SpatialError::NoRoute);
    }

    let mut dist      = vec![u32::MAX; n];
    let mut prev_edge: Vec<Option<EdgeId>> = vec![None; n];
    let mut is_target = vec![false; n];
    for &t in to {
        is_target[t.index()] = true;
    }

    // Min-heap: (cost, node).  NodeId breaks ties deterministically.
    let mut heap: BinaryHeap<Reverse<(u32, NodeId)>> = BinaryHeap::new();
    for &s in from {
        dist[s.index()] = 0;
        heap.push(Reverse((0, s)));
    }

    // Set when some expansion was cut off by the limit.
    let mut pruned = false;

    while let Some(Reverse((cost, node))) = heap.pop() {
        if cost > dist[node.index()] {
            continue;
        }
        if is_target[node.index()] {
            return Ok(reconstruct(network, &prev_edge, node, cost));
        }

        for edge in network.out_edges(node) {
            let neighbor = network.edge_to[edge.index()];
            let new_cost = cost.saturating_add(network.edge_cost[edge.index()]);
            if new_cost > max_cost {
                pruned = true;
                continue;
            }
            if new_cost < dist[neighbor.index()] {
                dist[neighbor.index()] = new_cost;
                prev_edge[neighbor.index()] = Some(edge);
                heap.push(Reverse((new_cost, neighbor)));
            }
        }
    }

    if pruned {
        Err(SpatialError::CostLimitExceeded { limit: max_cost })
    } else {
        Err(SpatialError::NoRoute)
    }
}

fn reconstruct(
    network:   &RoadNetwork,
    prev_edge: &[Option<EdgeId>],
    end:       NodeId,
    total_cost: u32,
) -> Route {
    let mut edges = Vec::new();
    let mut cur = end;
    while let Some(e) = prev_edge[cur.index()] {
        edges.push(e);
        cur = network.edge_from[e.index()];
    }
    edges.reverse();
    Route { start: cur, end, edges, total_cost }
}
