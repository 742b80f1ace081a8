//! # marga-nav
//!
//! Interactive grid path-planning engine for circular agents on occupancy
//! maps with partially hidden obstacles.
//!
//! ## Overview
//!
//! The engine plans over 8-connected, cost-weighted grids and is built from
//! four cooperating layers:
//!
//! - **Costmap inflation**: blocked cells are grown by the agent footprint so
//!   a point planner produces paths a disk-shaped agent can follow
//! - **A\***: one-shot planning with the octile heuristic
//! - **D\* Lite**: incremental planning that reuses search state across a
//!   moving start and discovered obstacles
//! - **Controller**: owns the runtime grid, reveals hidden obstacles through
//!   the agent's observation disk and decides when to replan
//!
//! ## Quick Start
//!
//! ```rust
//! use marga_nav::{Controller, GridCoord, NavConfig};
//!
//! // 10x10 free map at 1 m/cell; see `map::loader` for the file format.
//! let map = marga_nav::map::loader::parse(
//!     &format!("10 10 1.0\n{}", "0 ".repeat(100)),
//! )?;
//!
//! let mut controller = Controller::new(map, NavConfig::default())?;
//! controller.select_start(GridCoord::new(0, 0))?;
//! controller.select_goal(GridCoord::new(9, 9))?;
//!
//! // Drive the simulation forward; discovery and replanning happen inside.
//! controller.tick(0.1)?;
//! # Ok::<(), marga_nav::MargaError>(())
//! ```
//!
//! ## Coordinate System
//!
//! Grid cells are addressed by integer [`GridCoord`] columns/rows; continuous
//! positions ([`MapPoint`]) are measured in cell units with each waypoint at
//! a cell center (`x + 0.5`, `y + 0.5`).

#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod map;
pub mod planning;

// Re-export commonly used types
pub use agent::Agent;
pub use config::{AgentConfig, CostmapConfig, NavConfig, PlannerConfig};
pub use controller::{Controller, ControllerState};
pub use core::{GridCoord, MapPoint};
pub use error::{MargaError, Result};
pub use map::{CostmapLayer, Grid, Metadata};
pub use planning::{
    AStarPlanner, Algorithm, DStarLitePlanner, PathPlanner, PathStyle, PlannedPath,
    PlannerPosition,
};
