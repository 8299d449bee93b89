//! Synthetic street grid for the demo.
//!
//! A `COLS × ROWS` grid centred on the origin plus one unconnected node,
//! the "island", which nothing can route to.

use sd_core::{NodeId, WorldPos};
use sd_spatial::{RoadNetwork, RoadNetworkBuilder};

pub const COLS:    i32 = 9;
pub const ROWS:    i32 = 5;
pub const SPACING: f32 = 200.0;

/// World position of the island node.
pub const ISLAND: WorldPos = WorldPos { x: 0.0, z: 1_000.0 };

/// World position of grid cell `(col, row)`.
pub fn cell_pos(col: i32, row: i32) -> WorldPos {
    WorldPos::new((col - COLS / 2) as f32 * SPACING, (row - ROWS / 2) as f32 * SPACING)
}

/// Build the grid.  Returns `(network, island_node)`.
pub fn build_network() -> (RoadNetwork, NodeId) {
    let mut b = RoadNetworkBuilder::new();

    let mut nodes = Vec::with_capacity((COLS * ROWS) as usize);
    for row in 0..ROWS {
        for col in 0..COLS {
            nodes.push(b.add_node(cell_pos(col, row)));
        }
    }
    let at = |col: i32, row: i32| nodes[(row * COLS + col) as usize];

    // Two-way streets; cost 1 per world unit.
    for row in 0..ROWS {
        for col in 0..COLS {
            if col + 1 < COLS {
                b.add_road(at(col, row), at(col + 1, row), SPACING, SPACING as u32);
            }
            if row + 1 < ROWS {
                b.add_road(at(col, row), at(col, row + 1), SPACING, SPACING as u32);
            }
        }
    }

    let island = b.add_node(ISLAND);
    (b.build(), island)
}
