//! Shared planner predicates: bounds, traversability and 8-connected costs.

use crate::core::GridCoord;
use crate::map::Grid;

/// Square root of two, the diagonal step length on a unit grid.
pub const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Neighbor offsets for the 8-connected grid.
pub const NEIGHBOR_OFFSETS: [GridCoord; 8] = [
    GridCoord { x: 1, y: 0 },
    GridCoord { x: -1, y: 0 },
    GridCoord { x: 0, y: 1 },
    GridCoord { x: 0, y: -1 },
    GridCoord { x: 1, y: 1 },
    GridCoord { x: 1, y: -1 },
    GridCoord { x: -1, y: 1 },
    GridCoord { x: -1, y: -1 },
];

/// Whether the cell lies inside the grid.
#[inline]
pub fn is_within_bounds(grid: &Grid, cell: GridCoord) -> bool {
    grid.metadata().contains(cell)
}

/// Whether the cell can be entered: in bounds, not missing, value below 1.
pub fn is_traversable_cell(grid: &Grid, cell: GridCoord) -> bool {
    match grid.get(cell) {
        Some(value) => value != Grid::MISSING_DATA && value < 1.0,
        None => false,
    }
}

/// Cost of stepping into `cell`.
///
/// The per-cell weight scales the base step length: `base * (1 + weight)`
/// with negative values clamped to zero, so free cells cost exactly one step.
pub fn traversal_cost(grid: &Grid, cell: GridCoord, diagonal: bool) -> f32 {
    let value = grid.get(cell).unwrap_or(0.0);
    let weight = value.max(0.0);
    let base = if diagonal { SQRT_2 } else { 1.0 };
    base * (1.0 + weight)
}

/// Octile distance: admissible heuristic for 8-connected grids.
#[inline]
pub fn octile_distance(a: GridCoord, b: GridCoord) -> f32 {
    let dx = (b.x - a.x).abs();
    let dy = (b.y - a.y).abs();
    let min_delta = dx.min(dy);
    let max_delta = dx.max(dy);
    (max_delta - min_delta) as f32 + SQRT_2 * min_delta as f32
}

/// Whether a diagonal step from `cell` by `offset` squeezes through blocked
/// corners. Both cardinal cells adjacent to the diagonal must be in bounds
/// and traversable.
fn diagonal_allowed(grid: &Grid, cell: GridCoord, offset: GridCoord) -> bool {
    let adj_a = GridCoord::new(cell.x + offset.x, cell.y);
    let adj_b = GridCoord::new(cell.x, cell.y + offset.y);
    is_within_bounds(grid, adj_a)
        && is_within_bounds(grid, adj_b)
        && is_traversable_cell(grid, adj_a)
        && is_traversable_cell(grid, adj_b)
}

/// The 8-connected neighbors of `cell` that can actually be entered,
/// applying the diagonal corner rule.
pub fn neighbors8(grid: &Grid, cell: GridCoord) -> Vec<GridCoord> {
    let mut neighbors = Vec::with_capacity(8);

    for offset in NEIGHBOR_OFFSETS {
        let candidate = cell + offset;
        if !is_within_bounds(grid, candidate) {
            continue;
        }

        let diagonal = offset.x != 0 && offset.y != 0;
        if diagonal && !diagonal_allowed(grid, cell, offset) {
            continue;
        }

        if !is_traversable_cell(grid, candidate) {
            continue;
        }

        neighbors.push(candidate);
    }

    neighbors
}

/// Cost of the edge `from -> to`, or infinity when the move is illegal
/// (out of bounds, blocked target, or a forbidden corner cut).
pub fn edge_cost(grid: &Grid, from: GridCoord, to: GridCoord) -> f32 {
    if !is_within_bounds(grid, to) {
        return f32::INFINITY;
    }

    let diagonal = from.x != to.x && from.y != to.y;
    if diagonal {
        let offset = GridCoord::new(to.x - from.x, to.y - from.y);
        if !diagonal_allowed(grid, from, offset) {
            return f32::INFINITY;
        }
    }

    if !is_traversable_cell(grid, to) {
        return f32::INFINITY;
    }

    traversal_cost(grid, to, diagonal)
}

/// Scan the grid for the first traversable cell, from the `(0, 0)` corner
/// forward or from the far corner backward. Used for endpoint auto-selection.
pub fn find_traversable_from_corner(grid: &Grid, reverse: bool) -> Option<GridCoord> {
    let metadata = grid.metadata();
    let width = metadata.width as i32;
    let height = metadata.height as i32;

    let ys: Box<dyn Iterator<Item = i32>> = if reverse {
        Box::new((0..height).rev())
    } else {
        Box::new(0..height)
    };

    for y in ys {
        let xs: Box<dyn Iterator<Item = i32>> = if reverse {
            Box::new((0..width).rev())
        } else {
            Box::new(0..width)
        };
        for x in xs {
            let cell = GridCoord::new(x, y);
            if is_traversable_cell(grid, cell) {
                return Some(cell);
            }
        }
    }

    None
}
