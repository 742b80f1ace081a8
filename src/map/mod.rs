//! Map data: cost grids, the ASCII map loader and the inflation layer.

mod costmap;
mod grid;
pub mod loader;

pub use costmap::CostmapLayer;
pub use grid::{Grid, Metadata};
