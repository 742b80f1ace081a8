//! Costmap layer with obstacle inflation.
//!
//! Inflates every blocked cell of a base grid by the agent footprint radius
//! so a point-based planner produces paths that a disk-shaped agent can
//! actually follow.

use crate::core::{GridCoord, MapPoint};
use crate::error::{MargaError, Result};
use crate::map::{Grid, Metadata};

const OBSTACLE_THRESHOLD: f32 = 1.0;

/// Obstacle-inflating cost layer over a base grid.
///
/// Each [`CostmapLayer::update`] is a fresh recomputation: the inflated cells,
/// the inflation mask and the list of inflation centers depend only on the
/// base cells and the radius passed in, so identical inputs always reproduce
/// identical outputs.
#[derive(Clone, Debug, Default)]
pub struct CostmapLayer {
    metadata: Option<Metadata>,
    cells: Vec<f32>,
    inflation_mask: Vec<bool>,
    inflation_centers: Vec<MapPoint>,
}

impl CostmapLayer {
    /// Create an uninitialized layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare buffers for a grid of the given shape.
    pub fn initialize(&mut self, metadata: Metadata) {
        let count = metadata.cell_count();
        self.metadata = Some(metadata);
        self.cells = vec![0.0; count];
        self.inflation_mask = vec![false; count];
        self.inflation_centers.clear();
    }

    /// Whether [`CostmapLayer::initialize`] has been called.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.metadata.is_some()
    }

    /// Rebuild the inflated grid from base cells.
    ///
    /// Every base obstacle (value `>= 1.0`) stamps a Euclidean disk of
    /// `radius_cells` around itself. Cells inside a disk that are strictly
    /// traversable in the base grid become obstacles in the inflated grid and
    /// are recorded in the inflation mask; base obstacles and missing cells
    /// are left untouched. A non-positive radius copies the base grid through
    /// unchanged.
    pub fn update(&mut self, base_cells: &[f32], radius_cells: f32) -> Result<()> {
        let metadata = self.metadata.ok_or_else(|| {
            MargaError::Usage("CostmapLayer must be initialized before update".to_string())
        })?;

        if base_cells.len() != metadata.cell_count() {
            return Err(MargaError::Usage(format!(
                "CostmapLayer update size mismatch: {} cells for {}",
                base_cells.len(),
                metadata.summary()
            )));
        }

        self.cells.clear();
        self.cells.extend_from_slice(base_cells);
        self.inflation_mask.iter_mut().for_each(|m| *m = false);
        self.inflation_centers.clear();

        let radius = radius_cells.max(0.0);
        if radius <= 0.0 {
            return Ok(());
        }

        let radius_squared = radius * radius;
        let radius_ceil = (radius.ceil() as i32).max(1);
        let width = metadata.width as i32;
        let height = metadata.height as i32;

        for (idx, &base) in base_cells.iter().enumerate() {
            if base < OBSTACLE_THRESHOLD {
                continue;
            }

            let base_x = (idx % metadata.width) as i32;
            let base_y = (idx / metadata.width) as i32;

            for dy in -radius_ceil..=radius_ceil {
                let ny = base_y + dy;
                if ny < 0 || ny >= height {
                    continue;
                }

                for dx in -radius_ceil..=radius_ceil {
                    let nx = base_x + dx;
                    if nx < 0 || nx >= width {
                        continue;
                    }

                    let dist_squared = (dx * dx + dy * dy) as f32;
                    if dist_squared > radius_squared {
                        continue;
                    }

                    let n_idx = ny as usize * metadata.width + nx as usize;
                    let base_value = base_cells[n_idx];

                    // Base obstacles and missing cells are never re-marked.
                    if base_value >= OBSTACLE_THRESHOLD || base_value <= Grid::MISSING_DATA {
                        continue;
                    }

                    self.cells[n_idx] = OBSTACLE_THRESHOLD;
                    if !self.inflation_mask[n_idx] {
                        self.inflation_mask[n_idx] = true;
                        self.inflation_centers
                            .push(GridCoord::new(nx, ny).center());
                    }
                }
            }
        }

        Ok(())
    }

    /// Whether the cell is traversable in the inflated grid.
    pub fn is_traversable_cell(&self, cell: GridCoord) -> bool {
        let metadata = match self.metadata {
            Some(m) => m,
            None => return false,
        };

        if !metadata.contains(cell) {
            return false;
        }

        let value = self.cells[metadata.index(cell)];
        if value <= Grid::MISSING_DATA {
            return false;
        }

        value < OBSTACLE_THRESHOLD
    }

    /// Inflated cell values (same shape as the base grid).
    #[inline]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Per-cell flag: was this cell blocked by inflation?
    #[inline]
    pub fn inflation_mask(&self) -> &[bool] {
        &self.inflation_mask
    }

    /// Cell centers of inflated cells, in first-encounter order.
    #[inline]
    pub fn inflation_centers(&self) -> &[MapPoint] {
        &self.inflation_centers
    }
}
