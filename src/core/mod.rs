//! Core coordinate types shared by the map, planners and controller.

mod point;

pub use point::{GridCoord, MapPoint};
