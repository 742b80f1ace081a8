//! Discovery and replanning controller.
//!
//! Owns the runtime cost grid, the costmap layer, the active planner and the
//! agent. User-placed obstacles start out hidden; the agent's observation
//! disk reveals them as it moves, and the controller decides when a reveal
//! requires a replan.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::config::NavConfig;
use crate::core::{GridCoord, MapPoint};
use crate::error::Result;
use crate::map::{CostmapLayer, Grid};
use crate::planning::{Algorithm, PathPlanner, PlannedPath, PlannerPosition};

const HISTORY_POINT_EPSILON: f32 = 1e-3;
const HALF_CELL: f32 = 0.5;

/// Controller lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Start and goal not both selected yet.
    Idle,
    /// Both endpoints selected, no active path.
    Ready,
    /// A path is active and the agent is following it.
    Tracking,
    /// The last planning attempt found no path.
    Blocked,
}

/// Interactive planning controller.
pub struct Controller {
    config: NavConfig,
    algorithm: Algorithm,

    base_map: Grid,
    runtime_cells: Vec<f32>,
    costmap: CostmapLayer,
    planner: PathPlanner,
    agent: Agent,

    start_cell: Option<GridCoord>,
    goal_cell: Option<GridCoord>,
    visible_obstacles: HashSet<GridCoord>,
    hidden_obstacles: HashSet<GridCoord>,

    latest_path: Option<PlannedPath>,
    travel_history: Vec<MapPoint>,
    state: ControllerState,
}

impl Controller {
    /// Build a controller around a loaded map.
    pub fn new(map: Grid, config: NavConfig) -> Result<Self> {
        let algorithm = config.planner.algorithm;
        let metadata = *map.metadata();

        let mut agent = Agent::new(config.agent.speed_cells_per_second);
        agent.configure_physical_size(config.agent.diameter_meters, metadata.resolution);
        agent.set_observation_range(config.agent.observation_range_meters);

        let mut costmap = CostmapLayer::new();
        costmap.initialize(metadata);

        let mut controller = Self {
            config,
            algorithm,
            runtime_cells: map.cells().to_vec(),
            base_map: map,
            costmap,
            planner: PathPlanner::new(algorithm),
            agent,
            start_cell: None,
            goal_cell: None,
            visible_obstacles: HashSet::new(),
            hidden_obstacles: HashSet::new(),
            latest_path: None,
            travel_history: Vec::new(),
            state: ControllerState::Idle,
        };

        controller.update_planner_map()?;
        Ok(controller)
    }

    /// Active algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The most recently computed path, if any.
    pub fn latest_path(&self) -> Option<&PlannedPath> {
        self.latest_path.as_ref()
    }

    /// Cells expanded by the most recent planner run.
    pub fn explored_cells(&self) -> &[GridCoord] {
        self.latest_path
            .as_ref()
            .map(|path| path.explored_cells.as_slice())
            .unwrap_or(&[])
    }

    /// Centers of cells blocked by inflation, for display.
    pub fn inflation_centers(&self) -> &[MapPoint] {
        self.costmap.inflation_centers()
    }

    /// Polyline travelled across all replans.
    pub fn travel_history(&self) -> &[MapPoint] {
        &self.travel_history
    }

    /// The agent being driven along the active path.
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Selected start cell.
    pub fn start_cell(&self) -> Option<GridCoord> {
        self.start_cell
    }

    /// Selected goal cell.
    pub fn goal_cell(&self) -> Option<GridCoord> {
        self.goal_cell
    }

    /// Runtime cost cells (base map plus discovered obstacles).
    pub fn runtime_cells(&self) -> &[f32] {
        &self.runtime_cells
    }

    /// Obstacles already revealed to the planner.
    pub fn visible_obstacles(&self) -> &HashSet<GridCoord> {
        &self.visible_obstacles
    }

    /// Obstacles placed but not yet discovered.
    pub fn hidden_obstacles(&self) -> &HashSet<GridCoord> {
        &self.hidden_obstacles
    }

    /// Select the start cell. Returns false when the cell is not selectable
    /// (blocked in the inflated grid or covered by a dynamic obstacle).
    pub fn select_start(&mut self, cell: GridCoord) -> Result<bool> {
        if !self.is_traversable_for_selection(cell) {
            info!("Cell ({}, {}) is not traversable", cell.x, cell.y);
            return Ok(false);
        }

        let start_changed = self.start_cell != Some(cell);

        // Start reselection is a user reset for the incremental planner, not
        // a continuation of the current traversal.
        if start_changed && self.algorithm == Algorithm::DStarLite {
            self.clear_path();
        }

        self.start_cell = Some(cell);
        info!("Start cell set to ({}, {})", cell.x, cell.y);
        self.run_planner()?;
        Ok(true)
    }

    /// Select the goal cell. Returns false when the cell is not selectable.
    pub fn select_goal(&mut self, cell: GridCoord) -> Result<bool> {
        if !self.is_traversable_for_selection(cell) {
            info!("Cell ({}, {}) is not traversable", cell.x, cell.y);
            return Ok(false);
        }

        self.goal_cell = Some(cell);
        info!("Goal cell set to ({}, {})", cell.x, cell.y);
        self.run_planner()?;
        Ok(true)
    }

    /// Pick a start near the origin corner and a goal near the far corner of
    /// the inflated grid, then plan if both were found.
    pub fn auto_select_endpoints(&mut self) -> Result<(Option<GridCoord>, Option<GridCoord>)> {
        let inflated = self.inflated_grid()?;

        let start = crate::planning::common::find_traversable_from_corner(&inflated, false);
        let mut goal = crate::planning::common::find_traversable_from_corner(&inflated, true);

        if start.is_some() && start == goal {
            goal = None;
        }

        if goal.is_none() {
            if let Some(start_cell) = start {
                goal = self.find_distinct_goal(&inflated, start_cell);
                if goal.is_none() {
                    goal = start;
                }
            }
        }

        self.start_cell = start;
        self.goal_cell = goal;

        if start.is_none() {
            warn!("Unable to auto-select a start cell");
        }
        if goal.is_none() {
            warn!("Unable to auto-select a goal cell");
        }

        self.run_planner()?;
        Ok((start, goal))
    }

    /// Place an obstacle as hidden: the planner is unaffected until the agent
    /// discovers it. Returns false when the cell cannot take an obstacle.
    pub fn add_hidden_obstacle(&mut self, cell: GridCoord) -> bool {
        if !self.base_map.metadata().contains(cell) {
            return false;
        }
        if Some(cell) == self.start_cell || Some(cell) == self.goal_cell {
            return false;
        }
        if self.visible_obstacles.contains(&cell) || self.hidden_obstacles.contains(&cell) {
            return false;
        }

        self.hidden_obstacles.insert(cell);
        info!("Dynamic obstacle placed (hidden) at ({}, {})", cell.x, cell.y);
        true
    }

    /// Remove a dynamic obstacle. A hidden obstacle is simply dropped; a
    /// visible one restores the base cell value and triggers a replan.
    pub fn remove_obstacle(&mut self, cell: GridCoord) -> Result<bool> {
        let was_visible = self.visible_obstacles.contains(&cell);
        let removed = self.visible_obstacles.remove(&cell) || self.hidden_obstacles.remove(&cell);
        if !removed {
            return Ok(false);
        }

        if !was_visible {
            info!("Hidden dynamic obstacle removed at ({}, {})", cell.x, cell.y);
            return Ok(true);
        }

        if self.reset_runtime_cell(cell) {
            self.update_planner_map()?;
        }

        info!(
            "Discovered dynamic obstacle removed at ({}, {})",
            cell.x, cell.y
        );
        self.run_planner()?;
        Ok(true)
    }

    /// Drop every dynamic obstacle, restore the base map and replan.
    pub fn clear_obstacles(&mut self) -> Result<()> {
        if self.visible_obstacles.is_empty() && self.hidden_obstacles.is_empty() {
            return Ok(());
        }

        self.visible_obstacles.clear();
        self.hidden_obstacles.clear();
        self.runtime_cells.clear();
        self.runtime_cells.extend_from_slice(self.base_map.cells());

        info!("Dynamic obstacles cleared");
        self.update_planner_map()?;
        self.run_planner()
    }

    /// Advance one tick: move the agent, sweep its observation disk over the
    /// hidden obstacles, and replan when a discovery calls for it.
    pub fn tick(&mut self, delta_seconds: f32) -> Result<()> {
        self.agent.update(delta_seconds);

        if !self.agent.has_path() {
            return Ok(());
        }
        let center = self.agent.current_position();
        let radius = self.agent.observation_radius_cells();

        let newly_discovered = self.reveal_obstacles_within_radius(center, radius);
        if newly_discovered.is_empty() {
            return Ok(());
        }

        info!(
            "Discovered {} dynamic obstacle{} within observation radius",
            newly_discovered.len(),
            if newly_discovered.len() == 1 { "" } else { "s" }
        );

        let mut runtime_updated = false;
        let mut requires_replan = false;

        for &cell in &newly_discovered {
            runtime_updated = self.block_runtime_cell(cell) || runtime_updated;
            if self.obstacle_blocks_current_path(cell) {
                requires_replan = true;
            }
        }

        if runtime_updated {
            self.update_planner_map()?;
            if !requires_replan && self.current_path_blocked_by_costmap() {
                requires_replan = true;
            }
        }

        // The incremental planner consumes the change immediately even when
        // the current path is untouched.
        let incremental_replan = runtime_updated && self.algorithm == Algorithm::DStarLite;

        if requires_replan || incremental_replan {
            if requires_replan {
                info!("Newly discovered obstacle blocks current path; replanning");
            } else {
                debug!("Map updated with newly discovered obstacle; refreshing plan");
            }
            self.run_planner()?;
        }

        Ok(())
    }

    /// Inflation radius in cells for the current agent footprint.
    fn inflation_radius(&self) -> f32 {
        let agent_radius = self.agent.footprint_radius_cells();
        if agent_radius <= 0.0 {
            return self.config.costmap.minimum_inflation_radius_cells;
        }
        (agent_radius * self.config.costmap.inflation_multiplier)
            .max(self.config.costmap.minimum_inflation_radius_cells)
    }

    /// Rebuild the costmap from the runtime cells and push the inflated grid
    /// into the planner.
    fn update_planner_map(&mut self) -> Result<()> {
        let radius = self.inflation_radius();
        self.costmap.update(&self.runtime_cells, radius)?;
        let inflated = self.inflated_grid()?;
        self.planner.set_map(inflated);
        Ok(())
    }

    fn inflated_grid(&self) -> Result<Grid> {
        Grid::new(*self.base_map.metadata(), self.costmap.cells().to_vec())
    }

    fn is_traversable_for_selection(&self, cell: GridCoord) -> bool {
        self.costmap.is_traversable_cell(cell) && !self.is_dynamic_obstacle(cell)
    }

    fn is_dynamic_obstacle(&self, cell: GridCoord) -> bool {
        self.visible_obstacles.contains(&cell) || self.hidden_obstacles.contains(&cell)
    }

    fn block_runtime_cell(&mut self, cell: GridCoord) -> bool {
        let metadata = self.base_map.metadata();
        if !metadata.contains(cell) {
            return false;
        }

        let idx = metadata.index(cell);
        if self.runtime_cells[idx] >= 1.0 {
            return false;
        }

        self.runtime_cells[idx] = 1.0;
        true
    }

    fn reset_runtime_cell(&mut self, cell: GridCoord) -> bool {
        let metadata = self.base_map.metadata();
        if !metadata.contains(cell) {
            return false;
        }

        let idx = metadata.index(cell);
        let base_value = self.base_map.cells()[idx];
        if (self.runtime_cells[idx] - base_value).abs() < 1e-6 {
            return false;
        }

        self.runtime_cells[idx] = base_value;
        true
    }

    fn reveal_obstacles_within_radius(
        &mut self,
        center: MapPoint,
        radius: f32,
    ) -> Vec<GridCoord> {
        if self.hidden_obstacles.is_empty() || radius <= 0.0 {
            return Vec::new();
        }

        let radius_squared = radius * radius;
        let to_reveal: Vec<GridCoord> = self
            .hidden_obstacles
            .iter()
            .copied()
            .filter(|&cell| circle_touches_cell(center, radius_squared, cell))
            .collect();

        let mut discovered = Vec::with_capacity(to_reveal.len());
        for cell in to_reveal {
            if self.hidden_obstacles.remove(&cell) {
                self.visible_obstacles.insert(cell);
                discovered.push(cell);
            }
        }

        discovered
    }

    fn agent_current_cell(&self) -> Option<GridCoord> {
        if !self.agent.has_path() {
            return None;
        }
        let cell = self.agent.current_position().cell();
        if !self.base_map.metadata().contains(cell) {
            return None;
        }
        Some(cell)
    }

    fn obstacle_blocks_current_path(&self, cell: GridCoord) -> bool {
        if self.agent_current_cell() == Some(cell) {
            return true;
        }

        let path = match &self.latest_path {
            Some(path) if path.success && path.waypoints.len() >= 2 => path,
            _ => return false,
        };

        if path.waypoints.iter().any(|w| w.cell() == cell) {
            return true;
        }

        let cell_center = cell.center();
        let max_distance_sq = (HALF_CELL + 1e-3) * (HALF_CELL + 1e-3);

        path.waypoints.windows(2).any(|pair| {
            distance_squared_to_segment(cell_center, pair[0], pair[1]) <= max_distance_sq
        })
    }

    fn current_path_blocked_by_costmap(&self) -> bool {
        let path = match &self.latest_path {
            Some(path) if path.success => path,
            _ => return false,
        };

        let metadata = self.base_map.metadata();
        let cost_cells = self.costmap.cells();
        if cost_cells.len() != metadata.cell_count() {
            return false;
        }

        path.waypoints.iter().any(|waypoint| {
            let cell = waypoint.cell();
            metadata.contains(cell) && cost_cells[metadata.index(cell)] >= 1.0
        })
    }

    fn run_planner(&mut self) -> Result<()> {
        let mut planner_start = self.start_cell;
        if self.algorithm == Algorithm::DStarLite {
            // Replans continue from wherever the agent currently is, keeping
            // the key modifier accumulation consistent.
            if let Some(agent_cell) = self.agent_current_cell() {
                planner_start = Some(agent_cell);
            }
        }

        let (start, goal) = match (planner_start, self.goal_cell) {
            (Some(start), Some(goal)) => (start, goal),
            _ => {
                self.clear_path();
                self.state = if self.start_cell.is_some() && self.goal_cell.is_some() {
                    ControllerState::Ready
                } else {
                    ControllerState::Idle
                };
                return Ok(());
            }
        };

        self.update_planner_map()?;
        self.planner.set_start(PlannerPosition::Cell(start))?;
        self.planner.set_goal(PlannerPosition::Cell(goal))?;

        let planning_started = Instant::now();
        let path = self.planner.compute_path()?;
        debug!(
            "Planner start=({}, {}) goal=({}, {}) took {:.3} ms",
            start.x,
            start.y,
            goal.x,
            goal.y,
            planning_started.elapsed().as_secs_f64() * 1000.0
        );

        if path.success {
            let mut history = Vec::new();
            if self.algorithm == Algorithm::DStarLite {
                history = self.agent.travelled_polyline();
                if let (Some(&last), Some(&new_start)) =
                    (history.last(), path.waypoints.first())
                {
                    if last.distance(&new_start) > HISTORY_POINT_EPSILON {
                        history.push(new_start);
                    }
                }
            }

            info!("Path updated with {} waypoints", path.waypoints.len());
            self.set_path(path, history);
            self.state = ControllerState::Tracking;
        } else {
            self.clear_path();
            info!("No path found for current start/goal");
            self.state = ControllerState::Blocked;
        }

        Ok(())
    }

    fn set_path(&mut self, path: PlannedPath, history: Vec<MapPoint>) {
        if !history.is_empty() {
            self.append_travel_history(&history);
        } else if !self.travel_history.is_empty() {
            if let Some(&new_start) = path.waypoints.first() {
                let tail = *self.travel_history.last().expect("non-empty");
                if !points_approximately_equal(tail, new_start) {
                    self.travel_history.clear();
                }
            }
        }

        if !path.success || path.waypoints.len() < 2 {
            self.agent.reset();
            self.latest_path = Some(path);
            return;
        }

        self.agent.on_new_path(&path);
        self.latest_path = Some(path);
    }

    fn clear_path(&mut self) {
        self.latest_path = None;
        self.travel_history.clear();
        self.agent.reset();
    }

    fn append_travel_history(&mut self, polyline: &[MapPoint]) {
        if polyline.is_empty() {
            return;
        }

        if self.travel_history.is_empty() {
            for &point in polyline {
                push_if_new(&mut self.travel_history, point);
            }
            return;
        }

        let last_stored = *self.travel_history.last().expect("non-empty");
        let overlap = polyline
            .iter()
            .position(|&point| points_approximately_equal(point, last_stored));

        match overlap {
            Some(index) => {
                for &point in &polyline[index + 1..] {
                    push_if_new(&mut self.travel_history, point);
                }
            }
            None => {
                // No continuity with the stored history; restart from the
                // new polyline.
                self.travel_history.clear();
                for &point in polyline {
                    push_if_new(&mut self.travel_history, point);
                }
            }
        }
    }

    fn find_distinct_goal(&self, inflated: &Grid, start: GridCoord) -> Option<GridCoord> {
        let metadata = inflated.metadata();
        for y in 0..metadata.height as i32 {
            for x in 0..metadata.width as i32 {
                let candidate = GridCoord::new(x, y);
                if candidate == start {
                    continue;
                }
                if crate::planning::common::is_traversable_cell(inflated, candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

fn push_if_new(history: &mut Vec<MapPoint>, point: MapPoint) {
    let is_new = history
        .last()
        .map(|&last| !points_approximately_equal(last, point))
        .unwrap_or(true);
    if is_new {
        history.push(point);
    }
}

fn points_approximately_equal(a: MapPoint, b: MapPoint) -> bool {
    a.distance(&b) <= HISTORY_POINT_EPSILON
}

fn distance_squared_to_segment(point: MapPoint, a: MapPoint, b: MapPoint) -> f32 {
    let ab = b - a;
    let ab_len_sq = ab.dot(&ab);
    if ab_len_sq <= 1e-6 {
        return point.distance_squared(&a);
    }

    let t = ((point - a).dot(&ab) / ab_len_sq).clamp(0.0, 1.0);
    let projection = a + ab * t;
    point.distance_squared(&projection)
}

/// Whether the observation disk touches the unit cell: the center lies inside
/// the cell, or one of its corners is within the radius.
fn circle_touches_cell(center: MapPoint, radius_squared: f32, cell: GridCoord) -> bool {
    let left = cell.x as f32;
    let bottom = cell.y as f32;
    let right = left + 1.0;
    let top = bottom + 1.0;

    if center.x >= left && center.x <= right && center.y >= bottom && center.y <= top {
        return true;
    }

    let corners = [
        MapPoint::new(left, bottom),
        MapPoint::new(right, bottom),
        MapPoint::new(left, top),
        MapPoint::new(right, top),
    ];

    corners
        .iter()
        .any(|corner| corner.distance_squared(&center) <= radius_squared)
}
