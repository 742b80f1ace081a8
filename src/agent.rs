//! Path-following agent.
//!
//! Plays a planned polyline back at constant speed and exposes the state the
//! controller needs for discovery: current position, observation radius and
//! the polyline travelled so far.

use crate::core::MapPoint;
use crate::planning::PlannedPath;

/// Default agent diameter in meters.
pub const DEFAULT_AGENT_DIAMETER_METERS: f32 = 2.0;
/// Default observation range in meters.
pub const DEFAULT_OBSERVATION_RANGE_METERS: f32 = 5.0;
/// Default playback speed in cells per second.
pub const DEFAULT_AGENT_SPEED_CELLS_PER_SEC: f32 = 4.0;

const MIN_RESOLUTION: f32 = 1e-3;

/// Circular agent that follows planned paths at constant speed.
pub struct Agent {
    waypoints: Vec<MapPoint>,
    segment_lengths: Vec<f32>,
    total_length: f32,
    distance_travelled: f32,
    speed: f32,
    path_available: bool,
    playing: bool,
    current_position: MapPoint,

    diameter_meters: f32,
    resolution_meters_per_cell: f32,
    observation_range_meters: f32,
    footprint_radius_cells: f32,
    observation_radius_cells: f32,
}

impl Agent {
    /// Create an agent with the given playback speed in cells per second.
    pub fn new(speed_cells_per_second: f32) -> Self {
        let mut agent = Self {
            waypoints: Vec::new(),
            segment_lengths: Vec::new(),
            total_length: 0.0,
            distance_travelled: 0.0,
            speed: speed_cells_per_second,
            path_available: false,
            playing: false,
            current_position: MapPoint::ZERO,
            diameter_meters: DEFAULT_AGENT_DIAMETER_METERS,
            resolution_meters_per_cell: 1.0,
            observation_range_meters: DEFAULT_OBSERVATION_RANGE_METERS,
            footprint_radius_cells: 0.5,
            observation_radius_cells: 0.5,
        };
        agent.recalculate_radii();
        agent
    }

    /// Configure the physical footprint from agent diameter and map
    /// resolution.
    pub fn configure_physical_size(&mut self, diameter_meters: f32, resolution_meters_per_cell: f32) {
        self.diameter_meters = diameter_meters.max(0.0);
        self.resolution_meters_per_cell = resolution_meters_per_cell.max(MIN_RESOLUTION);
        self.recalculate_radii();
    }

    /// Set the observation range in meters.
    pub fn set_observation_range(&mut self, range_meters: f32) {
        self.observation_range_meters = range_meters.max(0.0);
        self.recalculate_radii();
    }

    /// Accept a freshly planned path, resetting traversal state. Paths
    /// without at least two waypoints clear the agent instead.
    pub fn on_new_path(&mut self, path: &PlannedPath) {
        if !path.success || path.waypoints.len() < 2 {
            tracing::debug!("Agent received unusable path; resetting");
            self.reset();
            return;
        }

        self.waypoints = path.waypoints.clone();
        self.recompute_segments();
        tracing::debug!(
            "Agent following {} waypoints, {:.2} cells total",
            self.waypoints.len(),
            self.total_length
        );
        self.current_position = self.waypoints[0];
        self.distance_travelled = 0.0;
        self.path_available = true;
        self.start();
    }

    /// Start playback from the beginning of the current path.
    pub fn start(&mut self) {
        if !self.path_available || self.segment_lengths.is_empty() {
            return;
        }
        self.distance_travelled = 0.0;
        self.current_position = self.waypoints[0];
        self.playing = true;
    }

    /// Clear the current path and traversal state.
    pub fn reset(&mut self) {
        self.waypoints.clear();
        self.segment_lengths.clear();
        self.total_length = 0.0;
        self.distance_travelled = 0.0;
        self.path_available = false;
        self.playing = false;
    }

    /// Whether a path is loaded.
    pub fn has_path(&self) -> bool {
        self.path_available
    }

    /// Whether playback is running.
    pub fn is_active(&self) -> bool {
        self.playing
    }

    /// Advance playback by `delta_seconds`. Playback stops at the end of the
    /// path with the position held at the goal.
    pub fn update(&mut self, delta_seconds: f32) {
        if !self.playing {
            return;
        }

        if self.segment_lengths.is_empty() || self.total_length <= 0.0 {
            self.playing = false;
            return;
        }

        self.distance_travelled =
            (self.distance_travelled + self.speed * delta_seconds).min(self.total_length);
        self.update_current_position();

        if self.distance_travelled >= self.total_length {
            self.playing = false;
        }
    }

    /// Current position in map coordinates.
    pub fn current_position(&self) -> MapPoint {
        self.current_position
    }

    /// Observation radius in cells.
    pub fn observation_radius_cells(&self) -> f32 {
        self.observation_radius_cells
    }

    /// Footprint radius in cells.
    pub fn footprint_radius_cells(&self) -> f32 {
        self.footprint_radius_cells
    }

    /// Fraction of the path travelled, in `[0, 1]`.
    pub fn traversal_ratio(&self) -> f32 {
        if !self.path_available || self.total_length <= 1e-6 {
            return 0.0;
        }
        (self.distance_travelled / self.total_length.max(1e-6)).clamp(0.0, 1.0)
    }

    /// The prefix of the path covered so far, ending at the current
    /// interpolated position.
    pub fn travelled_polyline(&self) -> Vec<MapPoint> {
        let mut history = Vec::new();
        if !self.path_available || self.waypoints.is_empty() {
            return history;
        }

        history.push(self.waypoints[0]);

        if self.segment_lengths.is_empty() || self.distance_travelled <= 0.0 {
            history.push(self.current_position);
            return history;
        }

        let mut remaining = self.distance_travelled.clamp(0.0, self.total_length);

        for (i, &segment_length) in self.segment_lengths.iter().enumerate() {
            if segment_length <= 1e-6 {
                history.push(self.waypoints[i + 1]);
                continue;
            }

            if remaining >= segment_length {
                history.push(self.waypoints[i + 1]);
                remaining -= segment_length;
                continue;
            }

            let t = (remaining / segment_length).clamp(0.0, 1.0);
            let interpolated =
                self.waypoints[i] + (self.waypoints[i + 1] - self.waypoints[i]) * t;
            history.push(interpolated);
            remaining = 0.0;
            break;
        }

        if remaining > 0.0 && self.waypoints.len() >= 2 {
            history.push(*self.waypoints.last().expect("non-empty"));
        }

        if history.last() != Some(&self.current_position) {
            history.push(self.current_position);
        }

        history
    }

    fn recompute_segments(&mut self) {
        self.segment_lengths.clear();
        self.total_length = 0.0;

        for pair in self.waypoints.windows(2) {
            let length = pair[0].distance(&pair[1]);
            self.segment_lengths.push(length);
            self.total_length += length;
        }
    }

    fn update_current_position(&mut self) {
        if self.segment_lengths.is_empty() {
            self.current_position = self.waypoints.last().copied().unwrap_or(MapPoint::ZERO);
            return;
        }

        let mut remaining = self.distance_travelled;

        for (i, &segment_length) in self.segment_lengths.iter().enumerate() {
            if segment_length <= 0.0 {
                continue;
            }

            if remaining > segment_length {
                remaining -= segment_length;
                continue;
            }

            let t = (remaining / segment_length).clamp(0.0, 1.0);
            self.current_position =
                self.waypoints[i] + (self.waypoints[i + 1] - self.waypoints[i]) * t;
            return;
        }

        self.current_position = *self.waypoints.last().expect("non-empty");
    }

    fn recalculate_radii(&mut self) {
        let radius_meters = self.diameter_meters * 0.5;
        let radius_cells = radius_meters / self.resolution_meters_per_cell.max(MIN_RESOLUTION);
        self.footprint_radius_cells = radius_cells.max(0.0);

        // Observation never shrinks below the footprint itself.
        let observation_meters = self.observation_range_meters.max(radius_meters);
        self.observation_radius_cells = (observation_meters
            / self.resolution_meters_per_cell.max(MIN_RESOLUTION))
        .max(self.footprint_radius_cells);
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_SPEED_CELLS_PER_SEC)
    }
}
