//! Path planners and their shared types.
//!
//! Two planners are provided: a one-shot [`AStarPlanner`] and an incremental
//! [`DStarLitePlanner`] that reuses search state across replans. Both operate
//! on 8-connected weighted grids with the diagonal corner rule and produce
//! polylines of cell-center waypoints.

pub mod common;

mod a_star;
mod d_star_lite;

pub use a_star::AStarPlanner;
pub use d_star_lite::DStarLitePlanner;

use serde::Deserialize;

use crate::core::{GridCoord, MapPoint};
use crate::error::Result;
use crate::map::Grid;

/// Path serialization style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PathStyle {
    /// Straight segments between waypoints.
    #[default]
    Polyline,
}

/// A planner start or goal position: either a discrete grid cell or a
/// continuous map point. The grid planners accept only the cell variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlannerPosition {
    /// Integer grid coordinate.
    Cell(GridCoord),
    /// Continuous map coordinate.
    Point(MapPoint),
}

impl PlannerPosition {
    /// The cell, if this position is the cell variant.
    pub fn as_cell(&self) -> Option<GridCoord> {
        match self {
            PlannerPosition::Cell(cell) => Some(*cell),
            PlannerPosition::Point(_) => None,
        }
    }
}

/// Outcome of a planner invocation.
#[derive(Clone, Debug, Default)]
pub struct PlannedPath {
    /// Representation format of the generated path.
    pub style: PathStyle,
    /// Ordered waypoints at cell centers, in map coordinates.
    pub waypoints: Vec<MapPoint>,
    /// Cells expanded during planning, in expansion order. Debug aid.
    pub explored_cells: Vec<GridCoord>,
    /// Whether a valid path was found.
    pub success: bool,
}

impl PlannedPath {
    /// An empty, unsuccessful path.
    pub fn failure() -> Self {
        Self::default()
    }

    /// Total length of the polyline, in cell units.
    pub fn length(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

/// Which search core drives planning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// One-shot A*.
    #[default]
    AStar,
    /// Incremental D* Lite.
    DStarLite,
}

/// Planner dispatch over the closed algorithm set.
pub enum PathPlanner {
    /// One-shot A* planner.
    AStar(AStarPlanner),
    /// Incremental D* Lite planner.
    DStarLite(DStarLitePlanner),
}

impl PathPlanner {
    /// Create a planner for the selected algorithm.
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::AStar => PathPlanner::AStar(AStarPlanner::new()),
            Algorithm::DStarLite => PathPlanner::DStarLite(DStarLitePlanner::new()),
        }
    }

    /// Replace the working grid.
    pub fn set_map(&mut self, grid: Grid) {
        match self {
            PathPlanner::AStar(planner) => planner.set_map(grid),
            PathPlanner::DStarLite(planner) => planner.set_map(grid),
        }
    }

    /// Set the start position. Only the `Cell` variant is accepted.
    pub fn set_start(&mut self, position: PlannerPosition) -> Result<()> {
        match self {
            PathPlanner::AStar(planner) => planner.set_start(position),
            PathPlanner::DStarLite(planner) => planner.set_start(position),
        }
    }

    /// Set the goal position. Only the `Cell` variant is accepted.
    pub fn set_goal(&mut self, position: PlannerPosition) -> Result<()> {
        match self {
            PathPlanner::AStar(planner) => planner.set_goal(position),
            PathPlanner::DStarLite(planner) => planner.set_goal(position),
        }
    }

    /// Run the planner with the current map, start and goal.
    pub fn compute_path(&mut self) -> Result<PlannedPath> {
        match self {
            PathPlanner::AStar(planner) => planner.compute_path(),
            PathPlanner::DStarLite(planner) => Ok(planner.compute_path()),
        }
    }
}
