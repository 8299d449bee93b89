//! Road network representation and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing edges.
//! Given a `NodeId n`, its outgoing edges occupy the slice:
//!
//! ```text
//! edge_from[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! Edge arrays are sorted by source node and indexed by `EdgeId`, so a
//! node's outgoing edges are a contiguous scan in Dijkstra's inner loop.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) over node positions answers "which road nodes are
//! within `r` of this world position", the approach-point query used before
//! every path request.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use sd_core::{EdgeId, Lane, LaneDirection, LanePosition, NodeId, WorldPos};

use crate::{SpatialError, SpatialResult};

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f32; 2], // [x, z]
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.point[0] - point[0];
        let dz = self.point[1] - point[1];
        dx * dx + dz * dz
    }
}

// ── ApproachPoint ─────────────────────────────────────────────────────────────

/// A road node near a world position, with its straight-line distance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ApproachPoint {
    pub node:     NodeId,
    pub distance: f32,
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed road graph in CSR format plus a spatial index for node snapping.
///
/// Do not construct directly; use [`RoadNetworkBuilder`].
pub struct RoadNetwork {
    /// World position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<WorldPos>,

    /// CSR row pointer.  Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    pub edge_from:   Vec<NodeId>,
    pub edge_to:     Vec<NodeId>,
    pub edge_length: Vec<f32>,
    /// Routing cost of each edge, in path-service cost units.
    pub edge_cost:   Vec<u32>,
    /// Drivable lanes per direction on each edge's segment.
    pub edge_lanes:  Vec<u8>,

    spatial_idx: RTree<NodeEntry>,
}

impl RoadNetwork {
    /// Construct an empty network with no nodes or edges.
    pub fn empty() -> Self {
        RoadNetworkBuilder::new().build()
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Iterator over the `EdgeId`s of all outgoing edges from `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start..end).map(|i| EdgeId(i as u32))
    }

    pub fn node_position(&self, node: NodeId) -> SpatialResult<WorldPos> {
        self.node_pos.get(node.index()).copied().ok_or(SpatialError::NodeNotFound(node))
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Up to `limit` road nodes within `radius` of `pos`, nearest first.
    pub fn approach_points(&self, pos: WorldPos, radius: f32, limit: usize) -> Vec<ApproachPoint> {
        let radius_sq = radius * radius;
        self.spatial_idx
            .nearest_neighbor_iter_with_distance_2(&[pos.x, pos.z])
            .take_while(|(_, d2)| *d2 <= radius_sq)
            .take(limit)
            .map(|(e, d2)| ApproachPoint { node: e.id, distance: d2.sqrt() })
            .collect()
    }

    /// Lane layout of `edge` as seen by a vehicle travelling along it.
    ///
    /// Lanes of the opposite direction sit at negative offsets (left); the
    /// vehicle is placed on lane `lane_from_left` of its own direction,
    /// clamped to the available lanes.
    pub fn lane_position(&self, edge: EdgeId, lane_from_left: usize) -> LanePosition {
        let per_dir = self.edge_lanes.get(edge.index()).copied().unwrap_or(1).max(1) as usize;
        let mut lanes = Vec::with_capacity(per_dir * 2);
        for i in 0..per_dir {
            lanes.push(Lane::drivable(-(2.0 + 4.0 * (per_dir - 1 - i) as f32), LaneDirection::Backward));
        }
        for i in 0..per_dir {
            lanes.push(Lane::drivable(2.0 + 4.0 * i as f32, LaneDirection::Forward));
        }
        LanePosition { lanes, current: per_dir + lane_from_left.min(per_dir - 1) }
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use sd_core::WorldPos;
/// use sd_spatial::RoadNetworkBuilder;
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node(WorldPos::new(0.0, 0.0));
/// let c = b.add_node(WorldPos::new(120.0, 0.0));
/// b.add_road(a, c, 120.0, 120);
/// let net = b.build();
/// assert_eq!(net.node_count(), 2);
/// assert_eq!(net.edge_count(), 2); // bidirectional
/// ```
pub struct RoadNetworkBuilder {
    nodes:     Vec<WorldPos>,
    raw_edges: Vec<RawEdge>,
}

struct RawEdge {
    from:   NodeId,
    to:     NodeId,
    length: f32,
    cost:   u32,
    lanes:  u8,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), raw_edges: Vec::new() }
    }

    /// Add a road node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: WorldPos) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        id
    }

    /// Add a **directed** edge from `from` to `to`.
    pub fn add_directed_edge(&mut self, from: NodeId, to: NodeId, length: f32, cost: u32, lanes: u8) {
        self.raw_edges.push(RawEdge { from, to, length, cost, lanes });
    }

    /// Add a two-way road with one lane per direction.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, length: f32, cost: u32) {
        self.add_road_with_lanes(a, b, length, cost, 1);
    }

    /// Add a two-way road with `lanes` lanes per direction.
    pub fn add_road_with_lanes(&mut self, a: NodeId, b: NodeId, length: f32, cost: u32, lanes: u8) {
        self.add_directed_edge(a, b, length, cost, lanes);
        self.add_directed_edge(b, a, length, cost, lanes);
    }

    pub fn node_pos(&self, id: NodeId) -> WorldPos {
        self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.raw_edges.len() }

    /// Consume the builder and produce a [`RoadNetwork`].
    pub fn build(self) -> RoadNetwork {
        let node_count = self.nodes.len();
        let edge_count = self.raw_edges.len();

        let mut raw = self.raw_edges;
        raw.sort_by_key(|e| e.from.0);

        let edge_from:   Vec<NodeId> = raw.iter().map(|e| e.from).collect();
        let edge_to:     Vec<NodeId> = raw.iter().map(|e| e.to).collect();
        let edge_length: Vec<f32>    = raw.iter().map(|e| e.length).collect();
        let edge_cost:   Vec<u32>    = raw.iter().map(|e| e.cost).collect();
        let edge_lanes:  Vec<u8>     = raw.iter().map(|e| e.lanes).collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        for e in &raw {
            node_out_start[e.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edge_count);

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, &pos)| NodeEntry { point: [pos.x, pos.z], id: NodeId(i as u32) })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        RoadNetwork {
            node_pos: self.nodes,
            node_out_start,
            edge_from,
            edge_to,
            edge_length,
            edge_cost,
            edge_lanes,
            spatial_idx,
        }
    }
}

impl Default for RoadNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
