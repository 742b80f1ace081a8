//! Immutable row-major cost grid with map metadata.

use crate::core::GridCoord;
use crate::error::{MargaError, Result};

/// Grid dimensions and resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metadata {
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    /// Meters per cell
    pub resolution: f32,
}

impl Metadata {
    /// Create metadata, validating dimensions and resolution.
    pub fn new(width: usize, height: usize, resolution: f32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MargaError::Usage(
                "Map dimensions must be positive".to_string(),
            ));
        }
        if resolution <= 0.0 {
            return Err(MargaError::Usage(
                "Map resolution must be positive".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            resolution,
        })
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Whether the coordinate lies inside the grid.
    #[inline]
    pub fn contains(&self, cell: GridCoord) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as usize) < self.width
            && (cell.y as usize) < self.height
    }

    /// Row-major flat index for an in-bounds coordinate.
    #[inline]
    pub fn index(&self, cell: GridCoord) -> usize {
        cell.y as usize * self.width + cell.x as usize
    }

    /// Short human-readable description, e.g. `100x100 @ 1m`.
    pub fn summary(&self) -> String {
        format!("{}x{} @ {}m", self.width, self.height, self.resolution)
    }
}

/// Immutable cost grid.
///
/// Cell values live in `[0, 1]`: `0` is free, `1` is blocked, values in
/// between are weighted-traversable. [`Grid::MISSING_DATA`] marks cells with
/// no data; they are treated as non-traversable.
#[derive(Clone, Debug)]
pub struct Grid {
    metadata: Metadata,
    cells: Vec<f32>,
}

impl Grid {
    /// Sentinel for unknown/missing cells.
    pub const MISSING_DATA: f32 = -1.0;

    /// Build a grid from metadata and row-major cell values.
    pub fn new(metadata: Metadata, cells: Vec<f32>) -> Result<Self> {
        if cells.len() != metadata.cell_count() {
            return Err(MargaError::Usage(format!(
                "Cell count {} does not match {} dimensions",
                cells.len(),
                metadata.summary()
            )));
        }
        Ok(Self { metadata, cells })
    }

    /// Grid metadata.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Row-major cell values.
    #[inline]
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Value at `(x, y)`, or an out-of-bounds error.
    pub fn at(&self, x: usize, y: usize) -> Result<f32> {
        if x >= self.metadata.width || y >= self.metadata.height {
            return Err(MargaError::OutOfBounds { x, y });
        }
        Ok(self.cells[y * self.metadata.width + x])
    }

    /// Value at a grid coordinate, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, cell: GridCoord) -> Option<f32> {
        if !self.metadata.contains(cell) {
            return None;
        }
        Some(self.cells[self.metadata.index(cell)])
    }

    /// Whether the cell carries the missing-data sentinel.
    pub fn is_missing(&self, x: usize, y: usize) -> Result<bool> {
        Ok(self.at(x, y)? == Self::MISSING_DATA)
    }
}
