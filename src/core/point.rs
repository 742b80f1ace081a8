//! Coordinate types for the planning grid.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Grid coordinates (integer cell indices)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// X coordinate (column index)
    pub x: i32,
    /// Y coordinate (row index)
    pub y: i32,
}

impl GridCoord {
    /// Create a new grid coordinate
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (max of x and y distance) - used for 8-connected grids
    #[inline]
    pub fn chebyshev_distance(&self, other: &GridCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Center of this cell in continuous map coordinates
    #[inline]
    pub fn center(&self) -> MapPoint {
        MapPoint::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }
}

impl Add for GridCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        GridCoord::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for GridCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        GridCoord::new(self.x - other.x, self.y - other.y)
    }
}

/// Continuous position in map coordinates (cell units, f32)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct MapPoint {
    /// X coordinate in cell units
    pub x: f32,
    /// Y coordinate in cell units
    pub y: f32,
}

impl MapPoint {
    /// Create a new map point
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero point (origin)
    pub const ZERO: MapPoint = MapPoint { x: 0.0, y: 0.0 };

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &MapPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Squared distance (faster, avoids sqrt)
    #[inline]
    pub fn distance_squared(&self, other: &MapPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Dot product with another point (as vectors)
    #[inline]
    pub fn dot(&self, other: &MapPoint) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// The cell this point falls in (floor truncation)
    #[inline]
    pub fn cell(&self) -> GridCoord {
        GridCoord::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

impl Add for MapPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        MapPoint::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for MapPoint {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        MapPoint::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for MapPoint {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        MapPoint::new(self.x * scalar, self.y * scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chebyshev_distance() {
        let a = GridCoord::new(2, 3);
        let b = GridCoord::new(5, 1);
        assert_eq!(a.chebyshev_distance(&b), 3);
        assert_eq!(b.chebyshev_distance(&a), 3);
    }

    #[test]
    fn test_cell_center_round_trip() {
        let cell = GridCoord::new(7, -2);
        let center = cell.center();
        assert!((center.x - 7.5).abs() < 1e-6);
        assert!((center.y - (-1.5)).abs() < 1e-6);
        assert_eq!(center.cell(), cell);
    }

    #[test]
    fn test_map_point_distance() {
        let a = MapPoint::new(0.0, 0.0);
        let b = MapPoint::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }
}
