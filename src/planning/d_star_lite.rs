//! Incremental D* Lite planner.
//!
//! Maintains cost-to-goal estimates (`g`/`rhs`) across replans, so a moving
//! start and locally changed edge costs only re-touch the affected part of
//! the search instead of planning from scratch.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::core::GridCoord;
use crate::error::{MargaError, Result};
use crate::map::Grid;
use crate::planning::common::{
    edge_cost, is_traversable_cell, is_within_bounds, neighbors8, octile_distance,
};
use crate::planning::{PlannedPath, PlannerPosition};

/// Per-cell search state. Cells not present in the table are implicitly at
/// infinity for both components.
#[derive(Clone, Copy, Debug)]
struct NodeData {
    g: f32,
    rhs: f32,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            g: f32::INFINITY,
            rhs: f32::INFINITY,
        }
    }
}

/// Two-component priority key, ordered lexicographically.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Key {
    k1: f32,
    k2: f32,
}

impl Key {
    fn less(&self, other: &Key) -> bool {
        if self.k1 < other.k1 {
            return true;
        }
        if self.k1 > other.k1 {
            return false;
        }
        self.k2 < other.k2
    }
}

/// Open-list entry. Entries are never updated in place; stale ones are
/// skipped on pop by comparing against the authoritative `open_table` key.
#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    cell: GridCoord,
    key: Key,
    sequence: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap: the smallest key is popped first,
        // oldest entry winning ties.
        if self.key.less(&other.key) {
            return Ordering::Greater;
        }
        if other.key.less(&self.key) {
            return Ordering::Less;
        }
        other.sequence.cmp(&self.sequence)
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Incremental D* Lite path planner.
///
/// Search state (`g`, `rhs`, the open list and the key modifier) persists
/// across [`DStarLitePlanner::compute_path`] calls until the goal or the map
/// dimensions change. Map updates delivered through
/// [`DStarLitePlanner::set_map`] are diffed into a pending set and consumed
/// at the start of the next `compute_path`.
#[derive(Default)]
pub struct DStarLitePlanner {
    map: Option<Grid>,
    start_cell: Option<GridCoord>,
    goal_cell: Option<GridCoord>,
    last_start: GridCoord,
    initialized: bool,

    key_modifier: f32,
    queue_sequence: u64,

    open_list: BinaryHeap<QueueEntry>,
    node_info: HashMap<GridCoord, NodeData>,
    open_table: HashMap<GridCoord, Key>,
    pending_updates: HashSet<GridCoord>,
    expanded_nodes: Vec<GridCoord>,
}

impl DStarLitePlanner {
    /// Create an unconfigured planner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working grid.
    ///
    /// Cells whose blocked state flipped relative to the previous grid are
    /// queued as pending updates for the next `compute_path`. A dimension
    /// change discards all search state.
    pub fn set_map(&mut self, grid: Grid) {
        let old = match self.map.take() {
            Some(old) => old,
            None => {
                self.map = Some(grid);
                self.reset_planner_state();
                self.pending_updates.clear();
                return;
            }
        };

        let old_meta = *old.metadata();
        let new_meta = *grid.metadata();
        if old_meta.width != new_meta.width || old_meta.height != new_meta.height {
            tracing::debug!(
                "Map dimensions changed ({} -> {}); discarding search state",
                old_meta.summary(),
                new_meta.summary()
            );
            self.map = Some(grid);
            self.pending_updates.clear();
            self.reset_planner_state();
            return;
        }

        let old_cells = old.cells();
        let new_cells = grid.cells();
        for (idx, (&old_value, &new_value)) in old_cells.iter().zip(new_cells).enumerate() {
            let old_blocked = old_value >= 1.0 || old_value == Grid::MISSING_DATA;
            let new_blocked = new_value >= 1.0 || new_value == Grid::MISSING_DATA;
            if old_blocked != new_blocked {
                let x = (idx % new_meta.width) as i32;
                let y = (idx / new_meta.width) as i32;
                self.pending_updates.insert(GridCoord::new(x, y));
            }
        }

        self.map = Some(grid);
    }

    /// Set the start cell.
    ///
    /// When a start was already configured, the heuristic distance from the
    /// previous start is folded into the key modifier so that keys already in
    /// the open list remain valid lower bounds.
    pub fn set_start(&mut self, position: PlannerPosition) -> Result<()> {
        let cell = position.as_cell().ok_or_else(|| {
            MargaError::Usage("D* Lite planner supports only cell-based starts".to_string())
        })?;

        if self.map.is_none() {
            self.start_cell = Some(cell);
            self.last_start = cell;
            return Ok(());
        }

        if self.start_cell.is_some() {
            self.key_modifier += octile_distance(self.last_start, cell);
        }

        self.start_cell = Some(cell);
        if !self.initialized {
            self.last_start = cell;
        }
        Ok(())
    }

    /// Set the goal cell. Changing the goal forces re-initialization on the
    /// next `compute_path`.
    pub fn set_goal(&mut self, position: PlannerPosition) -> Result<()> {
        let cell = position.as_cell().ok_or_else(|| {
            MargaError::Usage("D* Lite planner supports only cell-based goals".to_string())
        })?;
        self.goal_cell = Some(cell);
        self.initialized = false;
        Ok(())
    }

    /// Current key modifier. Monotonically non-decreasing for the lifetime of
    /// the search state; exposed for diagnostics.
    pub fn key_modifier(&self) -> f32 {
        self.key_modifier
    }

    /// Compute a path with the current map, start and goal.
    ///
    /// An unconfigured planner or invalid endpoints produce an unsuccessful
    /// path rather than an error.
    pub fn compute_path(&mut self) -> PlannedPath {
        if !self.is_valid_start_goal() {
            return PlannedPath::failure();
        }

        let start = self.start_cell.expect("validated above");
        let goal = self.goal_cell.expect("validated above");

        if !self.initialized {
            self.initialize_planner(start, goal);
        }

        if self.last_start != start {
            self.key_modifier += octile_distance(self.last_start, start);
            self.last_start = start;
        }

        self.apply_pending_updates(start, goal);
        self.update_vertex(start, start, goal);
        self.compute_shortest_path(start, goal);

        let mut path = PlannedPath {
            explored_cells: self.expanded_nodes.clone(),
            ..PlannedPath::failure()
        };

        if !self.rhs(start).is_finite() {
            return path;
        }

        let grid = self.map.as_ref().expect("validated above");
        let limit = grid.metadata().cell_count() + 1;

        let mut cells = Vec::new();
        cells.push(start);

        // Greedy descent over g: from the start, repeatedly step to the
        // neighbor with the cheapest edge-plus-cost-to-goal.
        let mut current = start;
        let mut steps = 0;
        while current != goal && steps < limit {
            let mut best_score = f32::INFINITY;
            let mut best_cell = current;

            for neighbor in neighbors8(grid, current) {
                let cost = edge_cost(grid, current, neighbor);
                if !cost.is_finite() {
                    continue;
                }
                let score = cost + self.g(neighbor);
                if score < best_score {
                    best_score = score;
                    best_cell = neighbor;
                }
            }

            if best_cell == current || !best_score.is_finite() {
                path.explored_cells.clear();
                return path;
            }

            current = best_cell;
            cells.push(current);
            steps += 1;
        }

        if *cells.last().expect("non-empty") != goal {
            path.explored_cells.clear();
            return path;
        }

        path.waypoints = cells.iter().map(|cell| cell.center()).collect();
        path.success = true;
        path
    }

    fn reset_planner_state(&mut self) {
        self.open_list.clear();
        self.node_info.clear();
        self.open_table.clear();
        self.expanded_nodes.clear();
        self.key_modifier = 0.0;
        self.queue_sequence = 0;
        self.initialized = false;
    }

    fn initialize_planner(&mut self, start: GridCoord, goal: GridCoord) {
        self.reset_planner_state();

        self.set_rhs(goal, 0.0);
        let key = self.calculate_key(goal, start);
        self.push_open(goal, key);
        self.last_start = start;
        self.initialized = true;
    }

    fn is_valid_start_goal(&self) -> bool {
        let (grid, start, goal) = match (&self.map, self.start_cell, self.goal_cell) {
            (Some(grid), Some(start), Some(goal)) => (grid, start, goal),
            _ => return false,
        };

        if !is_within_bounds(grid, start) || !is_within_bounds(grid, goal) {
            return false;
        }
        if !is_traversable_cell(grid, goal) {
            return false;
        }
        if start != goal && !is_traversable_cell(grid, start) {
            return false;
        }
        true
    }

    fn g(&self, cell: GridCoord) -> f32 {
        self.node_info
            .get(&cell)
            .map(|data| data.g)
            .unwrap_or(f32::INFINITY)
    }

    fn rhs(&self, cell: GridCoord) -> f32 {
        self.node_info
            .get(&cell)
            .map(|data| data.rhs)
            .unwrap_or(f32::INFINITY)
    }

    fn set_g(&mut self, cell: GridCoord, value: f32) {
        self.node_info.entry(cell).or_default().g = value;
    }

    fn set_rhs(&mut self, cell: GridCoord, value: f32) {
        self.node_info.entry(cell).or_default().rhs = value;
    }

    fn calculate_key(&self, cell: GridCoord, start: GridCoord) -> Key {
        let min_val = self.g(cell).min(self.rhs(cell));
        Key {
            k1: min_val + octile_distance(start, cell) + self.key_modifier,
            k2: min_val,
        }
    }

    fn push_open(&mut self, cell: GridCoord, key: Key) {
        self.open_list.push(QueueEntry {
            cell,
            key,
            sequence: self.queue_sequence,
        });
        self.queue_sequence += 1;
        self.open_table.insert(cell, key);
    }

    fn apply_pending_updates(&mut self, start: GridCoord, goal: GridCoord) {
        if self.pending_updates.is_empty() {
            return;
        }

        let grid = self.map.as_ref().expect("map set");
        let mut to_process: Vec<GridCoord> = Vec::with_capacity(self.pending_updates.len() * 5);
        for &cell in &self.pending_updates {
            to_process.push(cell);
            to_process.extend(neighbors8(grid, cell));
        }
        self.pending_updates.clear();

        for cell in to_process {
            self.update_vertex(cell, start, goal);
        }
    }

    fn update_vertex(&mut self, cell: GridCoord, start: GridCoord, goal: GridCoord) {
        if cell == goal {
            self.set_rhs(cell, 0.0);
        } else {
            let grid = self.map.as_ref().expect("map set");
            let mut min_rhs = f32::INFINITY;
            let neighbors = neighbors8(grid, cell);
            for neighbor in neighbors {
                let cost = edge_cost(grid, cell, neighbor);
                if !cost.is_finite() {
                    continue;
                }
                min_rhs = min_rhs.min(cost + self.g(neighbor));
            }
            self.set_rhs(cell, min_rhs);
        }

        // Exact float comparison is intentional: both sides derive from the
        // same arithmetic over the same cell values, so a consistent node
        // compares equal without an epsilon.
        if self.g(cell) != self.rhs(cell) {
            let key = self.calculate_key(cell, start);
            self.push_open(cell, key);
        } else {
            self.open_table.remove(&cell);
        }
    }

    fn compute_shortest_path(&mut self, start: GridCoord, goal: GridCoord) {
        self.expanded_nodes.clear();
        let mut expanded_set: HashSet<GridCoord> = HashSet::new();

        while let Some(&top) = self.open_list.peek() {
            // Lazy invalidation: only the entry matching the authoritative
            // key is live, everything else is a stale duplicate.
            match self.open_table.get(&top.cell) {
                Some(key) if key.k1 == top.key.k1 && key.k2 == top.key.k2 => {}
                _ => {
                    self.open_list.pop();
                    continue;
                }
            }

            let start_key = self.calculate_key(start, start);
            if !top.key.less(&start_key) && self.rhs(start) == self.g(start) {
                break;
            }

            self.open_list.pop();
            self.open_table.remove(&top.cell);

            if expanded_set.insert(top.cell) {
                self.expanded_nodes.push(top.cell);
            }

            let g_old = self.g(top.cell);
            let rhs_val = self.rhs(top.cell);

            let grid = self.map.as_ref().expect("map set");
            let predecessors = neighbors8(grid, top.cell);

            if g_old > rhs_val {
                self.set_g(top.cell, rhs_val);
                for pred in predecessors {
                    self.update_vertex(pred, start, goal);
                }
            } else {
                self.set_g(top.cell, f32::INFINITY);
                self.update_vertex(top.cell, start, goal);
                for pred in predecessors {
                    self.update_vertex(pred, start, goal);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MapPoint;
    use crate::map::Metadata;
    use crate::planning::common::SQRT_2;
    use approx::assert_relative_eq;

    fn open_grid(size: usize) -> Grid {
        Grid::new(
            Metadata::new(size, size, 1.0).unwrap(),
            vec![0.0; size * size],
        )
        .unwrap()
    }

    fn grid_with_blocked(size: usize, blocked: &[(i32, i32)]) -> Grid {
        let mut cells = vec![0.0; size * size];
        for &(x, y) in blocked {
            cells[y as usize * size + x as usize] = 1.0;
        }
        Grid::new(Metadata::new(size, size, 1.0).unwrap(), cells).unwrap()
    }

    fn configured(grid: Grid, start: GridCoord, goal: GridCoord) -> DStarLitePlanner {
        let mut planner = DStarLitePlanner::new();
        planner.set_map(grid);
        planner.set_start(PlannerPosition::Cell(start)).unwrap();
        planner.set_goal(PlannerPosition::Cell(goal)).unwrap();
        planner
    }

    #[test]
    fn test_point_positions_rejected() {
        let mut planner = DStarLitePlanner::new();
        assert!(planner
            .set_start(PlannerPosition::Point(MapPoint::ZERO))
            .is_err());
        assert!(planner
            .set_goal(PlannerPosition::Point(MapPoint::ZERO))
            .is_err());
    }

    #[test]
    fn test_unconfigured_planner_fails_without_error() {
        let mut planner = DStarLitePlanner::new();
        let path = planner.compute_path();
        assert!(!path.success);
        assert!(path.waypoints.is_empty());
    }

    #[test]
    fn test_diagonal_path_on_open_grid() {
        let mut planner = configured(open_grid(5), GridCoord::new(0, 0), GridCoord::new(4, 4));

        let path = planner.compute_path();
        assert!(path.success);
        assert_eq!(path.waypoints.len(), 5);
        assert_relative_eq!(path.length(), 4.0 * SQRT_2, epsilon = 1e-5);
    }

    #[test]
    fn test_blocked_goal_fails() {
        let grid = grid_with_blocked(3, &[(2, 2)]);
        let mut planner = configured(grid, GridCoord::new(0, 0), GridCoord::new(2, 2));

        let path = planner.compute_path();
        assert!(!path.success);
        assert!(path.waypoints.is_empty());
    }

    #[test]
    fn test_unreachable_goal_fails() {
        // Vertical wall splits the grid.
        let grid = grid_with_blocked(3, &[(1, 0), (1, 1), (1, 2)]);
        let mut planner = configured(grid, GridCoord::new(0, 1), GridCoord::new(2, 1));

        let path = planner.compute_path();
        assert!(!path.success);
        assert!(path.waypoints.is_empty());
    }

    #[test]
    fn test_replan_after_obstacle_reuses_state() {
        let mut planner = configured(open_grid(10), GridCoord::new(0, 0), GridCoord::new(9, 9));

        let first = planner.compute_path();
        assert!(first.success);
        assert_relative_eq!(first.length(), 9.0 * SQRT_2, epsilon = 1e-4);

        planner.set_map(grid_with_blocked(10, &[(5, 5)]));
        let second = planner.compute_path();
        assert!(second.success);

        // The incremental run only touches cells affected by the change.
        assert!(second.explored_cells.len() < 100);
    }

    #[test]
    fn test_key_modifier_monotone_across_moving_start() {
        let mut planner = configured(open_grid(10), GridCoord::new(0, 0), GridCoord::new(9, 9));
        assert!(planner.compute_path().success);

        let mut previous = planner.key_modifier();
        for step in 1..=4 {
            planner
                .set_start(PlannerPosition::Cell(GridCoord::new(step, step)))
                .unwrap();
            assert!(planner.compute_path().success);
            let current = planner.key_modifier();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_goal_change_resets_search_state() {
        let mut planner = configured(open_grid(8), GridCoord::new(0, 0), GridCoord::new(7, 7));
        assert!(planner.compute_path().success);
        planner
            .set_start(PlannerPosition::Cell(GridCoord::new(2, 2)))
            .unwrap();
        assert!(planner.compute_path().success);
        assert!(planner.key_modifier() > 0.0);

        planner
            .set_goal(PlannerPosition::Cell(GridCoord::new(0, 7)))
            .unwrap();
        let path = planner.compute_path();
        assert!(path.success);
        // Re-initialization started a fresh search.
        assert_relative_eq!(planner.key_modifier(), 0.0);
    }

    #[test]
    fn test_consistent_vertex_leaves_open_table() {
        let mut planner = configured(open_grid(5), GridCoord::new(0, 0), GridCoord::new(4, 4));
        assert!(planner.compute_path().success);

        // After convergence, every live open entry is inconsistent.
        for (&cell, _) in planner.open_table.iter() {
            assert!(planner.g(cell) != planner.rhs(cell));
        }
    }

    #[test]
    fn test_dimension_change_resets() {
        let mut planner = configured(open_grid(5), GridCoord::new(0, 0), GridCoord::new(4, 4));
        assert!(planner.compute_path().success);

        planner.set_map(open_grid(7));
        planner
            .set_goal(PlannerPosition::Cell(GridCoord::new(6, 6)))
            .unwrap();
        let path = planner.compute_path();
        assert!(path.success);
        assert_relative_eq!(path.length(), 6.0 * SQRT_2, epsilon = 1e-4);
    }
}
