//! One-shot A* planner on 8-connected weighted grids.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::core::GridCoord;
use crate::error::{MargaError, Result};
use crate::map::Grid;
use crate::planning::common::{
    is_traversable_cell, is_within_bounds, neighbors8, octile_distance, traversal_cost,
};
use crate::planning::{PlannedPath, PlannerPosition};

/// Node in the open set.
#[derive(Clone, Copy, Debug)]
struct SearchNode {
    cell: GridCoord,
    g: f32,
    f: f32,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f = higher priority)
        other.f.partial_cmp(&self.f).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One-shot A* path planner.
///
/// Plans from scratch on every [`AStarPlanner::compute_path`] call; no state
/// survives between invocations beyond the configured map, start and goal.
#[derive(Default)]
pub struct AStarPlanner {
    map: Option<Grid>,
    start: Option<GridCoord>,
    goal: Option<GridCoord>,
}

impl AStarPlanner {
    /// Create an unconfigured planner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working grid.
    pub fn set_map(&mut self, grid: Grid) {
        self.map = Some(grid);
    }

    /// Set the start cell.
    pub fn set_start(&mut self, position: PlannerPosition) -> Result<()> {
        let cell = position.as_cell().ok_or_else(|| {
            MargaError::Usage("A* planner supports only cell-based starts".to_string())
        })?;
        self.start = Some(cell);
        Ok(())
    }

    /// Set the goal cell.
    pub fn set_goal(&mut self, position: PlannerPosition) -> Result<()> {
        let cell = position.as_cell().ok_or_else(|| {
            MargaError::Usage("A* planner supports only cell-based goals".to_string())
        })?;
        self.goal = Some(cell);
        Ok(())
    }

    /// Compute a path with the configured map, start and goal.
    ///
    /// Fails with a usage error when the planner is not fully configured.
    /// Unreachable or invalid endpoints produce an unsuccessful path, not an
    /// error.
    pub fn compute_path(&mut self) -> Result<PlannedPath> {
        let grid = self
            .map
            .as_ref()
            .ok_or_else(|| MargaError::Usage("Path planner map is not set".to_string()))?;
        let start = self
            .start
            .ok_or_else(|| MargaError::Usage("Path planner start position is not set".to_string()))?;
        let goal = self
            .goal
            .ok_or_else(|| MargaError::Usage("Path planner goal position is not set".to_string()))?;

        let mut path = PlannedPath::failure();

        if !is_within_bounds(grid, start) || !is_within_bounds(grid, goal) {
            return Ok(path);
        }
        if !is_traversable_cell(grid, start) || !is_traversable_cell(grid, goal) {
            return Ok(path);
        }

        if start == goal {
            path.explored_cells = vec![start];
            path.waypoints = vec![start.center()];
            path.success = true;
            return Ok(path);
        }

        let mut open_set = BinaryHeap::new();
        open_set.push(SearchNode {
            cell: start,
            g: 0.0,
            f: octile_distance(start, goal),
        });

        let mut came_from: HashMap<GridCoord, GridCoord> = HashMap::new();
        let mut g_score: HashMap<GridCoord, f32> = HashMap::new();
        g_score.insert(start, 0.0);

        let mut closed_set: HashSet<GridCoord> = HashSet::new();

        while let Some(current) = open_set.pop() {
            if !closed_set.insert(current.cell) {
                continue;
            }
            path.explored_cells.push(current.cell);

            if current.cell == goal {
                let cells = reconstruct_path(&came_from, current.cell);
                path.waypoints = cells.iter().map(|cell| cell.center()).collect();
                path.success = true;
                return Ok(path);
            }

            for neighbor in neighbors8(grid, current.cell) {
                if closed_set.contains(&neighbor) {
                    continue;
                }

                let diagonal = neighbor.x != current.cell.x && neighbor.y != current.cell.y;
                let tentative_g = current.g + traversal_cost(grid, neighbor, diagonal);

                let better = match g_score.get(&neighbor) {
                    Some(&existing) => tentative_g < existing,
                    None => true,
                };

                if better {
                    came_from.insert(neighbor, current.cell);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(SearchNode {
                        cell: neighbor,
                        g: tentative_g,
                        f: tentative_g + octile_distance(neighbor, goal),
                    });
                }
            }
        }

        // Open set exhausted without reaching the goal; explored cells still
        // capture every visited node.
        Ok(path)
    }
}

fn reconstruct_path(came_from: &HashMap<GridCoord, GridCoord>, goal: GridCoord) -> Vec<GridCoord> {
    let mut cells = vec![goal];
    let mut current = goal;

    while let Some(&parent) = came_from.get(&current) {
        current = parent;
        cells.push(current);
    }

    cells.reverse();
    cells
}
