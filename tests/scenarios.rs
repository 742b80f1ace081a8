//! End-to-end planning scenarios.
//!
//! Exercises both planners and the discovery controller on small literal
//! grids, checking path costs against a brute-force shortest-path reference.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use approx::assert_relative_eq;

use marga_nav::planning::common::{edge_cost, neighbors8, SQRT_2};
use marga_nav::{
    AStarPlanner, Controller, ControllerState, DStarLitePlanner, Grid, GridCoord, Metadata,
    NavConfig, PlannedPath, PlannerPosition,
};

// ============================================================================
// Helpers
// ============================================================================

fn grid_from_rows(rows: &[&[f32]], resolution: f32) -> Grid {
    let height = rows.len();
    let width = rows[0].len();
    let cells: Vec<f32> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    Grid::new(Metadata::new(width, height, resolution).unwrap(), cells).unwrap()
}

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

fn a_star(grid: &Grid, start: GridCoord, goal: GridCoord) -> PlannedPath {
    let mut planner = AStarPlanner::new();
    planner.set_map(grid.clone());
    planner.set_start(PlannerPosition::Cell(start)).unwrap();
    planner.set_goal(PlannerPosition::Cell(goal)).unwrap();
    planner.compute_path().unwrap()
}

/// Edge-cost sum of a returned path, walking its waypoints as cells.
fn path_cost(grid: &Grid, path: &PlannedPath) -> f32 {
    let cells: Vec<GridCoord> = path.waypoints.iter().map(|w| w.cell()).collect();
    cells
        .windows(2)
        .map(|pair| edge_cost(grid, pair[0], pair[1]))
        .sum()
}

#[derive(Clone, Copy)]
struct QueueNode {
    cell: GridCoord,
    cost: f32,
}

impl PartialEq for QueueNode {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for QueueNode {}

impl Ord for QueueNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for QueueNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Brute-force Dijkstra over the same 8-connected weighted graph, used as the
/// reference optimum.
fn reference_optimum(grid: &Grid, start: GridCoord, goal: GridCoord) -> Option<f32> {
    let mut best: HashMap<GridCoord, f32> = HashMap::new();
    let mut queue = BinaryHeap::new();

    best.insert(start, 0.0);
    queue.push(QueueNode {
        cell: start,
        cost: 0.0,
    });

    while let Some(node) = queue.pop() {
        if node.cost > *best.get(&node.cell).unwrap_or(&f32::INFINITY) {
            continue;
        }
        if node.cell == goal {
            return Some(node.cost);
        }

        for neighbor in neighbors8(grid, node.cell) {
            let step = edge_cost(grid, node.cell, neighbor);
            if !step.is_finite() {
                continue;
            }
            let candidate = node.cost + step;
            if candidate < *best.get(&neighbor).unwrap_or(&f32::INFINITY) {
                best.insert(neighbor, candidate);
                queue.push(QueueNode {
                    cell: neighbor,
                    cost: candidate,
                });
            }
        }
    }

    None
}

fn assert_waypoints_eight_connected(path: &PlannedPath) {
    let cells: Vec<GridCoord> = path.waypoints.iter().map(|w| w.cell()).collect();
    for pair in cells.windows(2) {
        assert_eq!(
            pair[0].chebyshev_distance(&pair[1]),
            1,
            "waypoints {:?} -> {:?} are not 8-connected neighbors",
            pair[0],
            pair[1]
        );
    }
}

// ============================================================================
// S1 - trivial diagonal
// ============================================================================

#[test]
fn s1_trivial_diagonal() {
    let grid = open_grid(5);
    let path = a_star(&grid, GridCoord::new(0, 0), GridCoord::new(4, 4));

    assert!(path.success);
    assert_eq!(path.waypoints.len(), 5);
    assert_eq!(path.waypoints[0].cell(), GridCoord::new(0, 0));
    assert_eq!(path.waypoints[4].cell(), GridCoord::new(4, 4));
    assert_waypoints_eight_connected(&path);
    assert_relative_eq!(path_cost(&grid, &path), 4.0 * SQRT_2, epsilon = 1e-5);
}

// ============================================================================
// S2 - wall detour
// ============================================================================

#[test]
fn s2_wall_detour_is_optimal() {
    let grid = grid_from_rows(
        &[
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[1.0, 1.0, 1.0, 1.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
        1.0,
    );

    let start = GridCoord::new(0, 0);
    let goal = GridCoord::new(0, 4);
    let path = a_star(&grid, start, goal);

    assert!(path.success);
    assert_eq!(path.waypoints.first().unwrap().cell(), start);
    assert_eq!(path.waypoints.last().unwrap().cell(), goal);
    assert_waypoints_eight_connected(&path);

    let optimum = reference_optimum(&grid, start, goal).expect("detour exists");
    assert_relative_eq!(path_cost(&grid, &path), optimum, epsilon = 1e-4);

    // The detour must pass through the single gap at x=4.
    assert!(path.waypoints.iter().any(|w| w.cell() == GridCoord::new(4, 2)));
}

// ============================================================================
// S3 - unreachable goal
// ============================================================================

#[test]
fn s3_unreachable_goal() {
    let grid = grid_from_rows(
        &[
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[1.0, 1.0, 1.0, 1.0, 1.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
        1.0,
    );

    let path = a_star(&grid, GridCoord::new(0, 0), GridCoord::new(0, 4));

    assert!(!path.success);
    assert!(path.waypoints.is_empty());
    assert!(!path.explored_cells.is_empty());
}

// ============================================================================
// S4 - corner cut forbidden
// ============================================================================

#[test]
fn s4_corner_cut_forbidden() {
    let grid = grid_from_rows(
        &[
            &[0.0, 1.0, 0.0, 0.0, 0.0],
            &[1.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
        1.0,
    );

    // The only 8-connected move out of (0,0) squeezes between two blocked
    // cells and is therefore forbidden.
    let path = a_star(&grid, GridCoord::new(0, 0), GridCoord::new(1, 1));
    assert!(!path.success);
    assert!(path.waypoints.is_empty());
}

#[test]
fn paths_never_cut_corners() {
    // Deterministic scattered obstacles.
    let size = 15usize;
    let mut cells = vec![0.0; size * size];
    let mut seed = 0x2545f491u32;
    for cell in cells.iter_mut() {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        if seed % 5 == 0 {
            *cell = 1.0;
        }
    }
    cells[0] = 0.0;
    cells[size * size - 1] = 0.0;
    let grid = Grid::new(Metadata::new(size, size, 1.0).unwrap(), cells).unwrap();

    let start = GridCoord::new(0, 0);
    let goal = GridCoord::new(size as i32 - 1, size as i32 - 1);
    let path = a_star(&grid, start, goal);

    if !path.success {
        return;
    }

    let route: Vec<GridCoord> = path.waypoints.iter().map(|w| w.cell()).collect();
    for pair in route.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if from.x != to.x && from.y != to.y {
            // Diagonal step: both squeeze cells must be traversable.
            for squeeze in [GridCoord::new(from.x, to.y), GridCoord::new(to.x, from.y)] {
                let value = grid.get(squeeze).expect("squeeze cell in bounds");
                assert!(
                    value < 1.0 && value != Grid::MISSING_DATA,
                    "path cut a corner through {squeeze:?}"
                );
            }
        }
    }
}

// ============================================================================
// S5 - D* Lite incremental replan
// ============================================================================

#[test]
fn s5_d_star_lite_incremental() {
    let mut planner = DStarLitePlanner::new();
    planner.set_map(open_grid(10));
    planner
        .set_start(PlannerPosition::Cell(GridCoord::new(0, 0)))
        .unwrap();
    planner
        .set_goal(PlannerPosition::Cell(GridCoord::new(9, 9)))
        .unwrap();

    let grid = open_grid(10);
    let first = planner.compute_path();
    assert!(first.success);
    assert_relative_eq!(path_cost(&grid, &first), 9.0 * SQRT_2, epsilon = 1e-4);

    // Report a new obstacle through the map update path.
    let updated = grid_with_blocked(10, &[(5, 5)]);
    planner.set_map(updated.clone());
    let second = planner.compute_path();
    assert!(second.success);

    let fresh = a_star(&updated, GridCoord::new(0, 0), GridCoord::new(9, 9));
    assert!(fresh.success);
    assert_relative_eq!(
        path_cost(&updated, &second),
        path_cost(&updated, &fresh),
        epsilon = 1e-4
    );

    // Evidence of reuse: far fewer expansions than the whole grid.
    assert!(
        second.explored_cells.len() < 100,
        "expected incremental replan, got {} expansions",
        second.explored_cells.len()
    );
}

// ============================================================================
// S6 - discovery and replanning through the controller
// ============================================================================

#[test]
fn s6_discovery_triggers_replan() {
    let mut config = NavConfig::default();
    // Point-like footprint: the straight row stays selectable after reveal.
    config.agent.diameter_meters = 0.1;

    let mut controller = Controller::new(open_grid(10), config).unwrap();
    controller.select_start(GridCoord::new(0, 0)).unwrap();
    controller.select_goal(GridCoord::new(9, 0)).unwrap();

    let initial = controller.latest_path().unwrap();
    assert!(initial.success);
    assert_eq!(initial.waypoints.len(), 10);

    assert!(controller.add_hidden_obstacle(GridCoord::new(5, 0)));

    let mut discovered = false;
    for _ in 0..400 {
        controller.tick(0.05).unwrap();
        if controller
            .visible_obstacles()
            .contains(&GridCoord::new(5, 0))
        {
            discovered = true;
            break;
        }
    }

    assert!(discovered, "hidden obstacle never entered the observation disk");
    assert!(controller.hidden_obstacles().is_empty());
    assert_eq!(controller.runtime_cells()[5], 1.0);

    // The reveal forced a replan around the obstacle.
    assert_eq!(controller.state(), ControllerState::Tracking);
    let replanned = controller.latest_path().unwrap();
    assert!(replanned.success);
    assert!(replanned
        .waypoints
        .iter()
        .all(|w| w.cell() != GridCoord::new(5, 0)));
}

// ============================================================================
// Cross-planner equivalence
// ============================================================================

#[test]
fn d_star_lite_matches_a_star_on_static_grids() {
    let grids = [
        open_grid(8),
        grid_with_blocked(8, &[(3, 3), (3, 4), (4, 3), (2, 6), (6, 2)]),
        grid_from_rows(
            &[
                &[0.0, 0.5, 0.0, 0.0],
                &[0.0, 0.5, 0.0, 0.0],
                &[0.0, 0.5, 0.5, 0.0],
                &[0.0, 0.0, 0.0, 0.0],
            ],
            1.0,
        ),
    ];

    for grid in grids {
        let width = grid.metadata().width as i32;
        let height = grid.metadata().height as i32;
        let start = GridCoord::new(0, 0);
        let goal = GridCoord::new(width - 1, height - 1);

        let reference = a_star(&grid, start, goal);

        let mut incremental = DStarLitePlanner::new();
        incremental.set_map(grid.clone());
        incremental.set_start(PlannerPosition::Cell(start)).unwrap();
        incremental.set_goal(PlannerPosition::Cell(goal)).unwrap();
        let path = incremental.compute_path();

        assert_eq!(path.success, reference.success);
        if reference.success {
            assert_relative_eq!(
                path_cost(&grid, &path),
                path_cost(&grid, &reference),
                epsilon = 1e-4
            );
        }
    }
}

#[test]
fn d_star_lite_tracks_a_star_across_updates_and_moving_start() {
    let size = 12;
    let goal = GridCoord::new(11, 11);

    let mut planner = DStarLitePlanner::new();
    planner.set_map(open_grid(size));
    planner
        .set_start(PlannerPosition::Cell(GridCoord::new(0, 0)))
        .unwrap();
    planner.set_goal(PlannerPosition::Cell(goal)).unwrap();
    assert!(planner.compute_path().success);

    // Obstacles appear in waves while the start advances along the path.
    let waves: [&[(i32, i32)]; 3] = [
        &[(5, 5), (5, 6), (6, 5)],
        &[(5, 5), (5, 6), (6, 5), (8, 8), (8, 9)],
        &[(5, 5), (5, 6), (6, 5), (8, 8), (8, 9), (3, 2)],
    ];
    let starts = [
        GridCoord::new(1, 1),
        GridCoord::new(2, 2),
        GridCoord::new(2, 3),
    ];

    for (blocked, start) in waves.iter().zip(starts) {
        let grid = grid_with_blocked(size, blocked);
        planner.set_map(grid.clone());
        planner.set_start(PlannerPosition::Cell(start)).unwrap();

        let incremental = planner.compute_path();
        let fresh = a_star(&grid, start, goal);

        assert_eq!(incremental.success, fresh.success);
        assert!(fresh.success);
        assert_relative_eq!(
            path_cost(&grid, &incremental),
            path_cost(&grid, &fresh),
            epsilon = 1e-4
        );
    }
}

#[test]
fn a_star_cost_matches_reference_optimum_on_weighted_grid() {
    let grid = grid_from_rows(
        &[
            &[0.0, 0.9, 0.9, 0.9, 0.0],
            &[0.0, 0.2, 1.0, 0.2, 0.0],
            &[0.0, 0.2, 1.0, 0.2, 0.0],
            &[0.0, 0.2, 1.0, 0.2, 0.0],
            &[0.0, 0.0, 0.0, 0.0, 0.0],
        ],
        1.0,
    );

    let start = GridCoord::new(0, 0);
    let goal = GridCoord::new(4, 0);
    let path = a_star(&grid, start, goal);
    assert!(path.success);

    let optimum = reference_optimum(&grid, start, goal).unwrap();
    assert_relative_eq!(path_cost(&grid, &path), optimum, epsilon = 1e-4);
}

// ============================================================================
// Costmap inflation property
// ============================================================================

#[test]
fn costmap_blocks_every_cell_within_radius() {
    use marga_nav::CostmapLayer;

    let size = 11usize;
    let metadata = Metadata::new(size, size, 1.0).unwrap();
    let mut base = vec![0.0; size * size];
    base[5 * size + 5] = 1.0;
    base[2 * size + 8] = Grid::MISSING_DATA;

    let radius = 2.5f32;
    let mut layer = CostmapLayer::new();
    layer.initialize(metadata);
    layer.update(&base, radius).unwrap();

    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let idx = y as usize * size + x as usize;
            let dx = (x - 5) as f32;
            let dy = (y - 5) as f32;
            let within = dx * dx + dy * dy <= radius * radius;

            if base[idx] >= 1.0 || base[idx] == Grid::MISSING_DATA {
                // Obstacles and missing cells pass through untouched.
                assert_eq!(layer.cells()[idx], base[idx]);
                assert!(!layer.inflation_mask()[idx]);
            } else if within {
                assert_eq!(layer.cells()[idx], 1.0, "cell ({x}, {y}) not inflated");
                assert!(layer.inflation_mask()[idx]);
            } else {
                assert_eq!(layer.cells()[idx], base[idx], "cell ({x}, {y}) changed");
                assert!(!layer.inflation_mask()[idx]);
            }
        }
    }
}
