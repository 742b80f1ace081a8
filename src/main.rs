//! marga-nav - headless demo driver
//!
//! Loads an ASCII map, builds the planning controller, optionally seeds
//! hidden obstacles, and runs the discovery/replanning loop at a fixed step
//! until the agent reaches the goal or planning fails.
//!
//! Usage:
//!
//! ```text
//! marga-nav <map-file> [--planner a-star|d-star-lite] [--obstacle X,Y]...
//! ```
//!
//! When a `marga.toml` exists in the working directory it provides agent and
//! costmap parameters; command-line flags override the planner selection.

use std::path::Path;

use tracing::{info, warn};

use marga_nav::{
    Algorithm, Controller, ControllerState, GridCoord, MargaError, NavConfig, Result,
};

const TICK_SECONDS: f32 = 0.05;
const MAX_SIM_SECONDS: f32 = 600.0;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga_nav=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // The map file is the first positional argument; flags follow it.
    let map_path = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .ok_or_else(|| {
            MargaError::Usage(format!(
                "Usage: {} <map-file> [--planner a-star|d-star-lite] [--obstacle X,Y]...",
                args.first().map(String::as_str).unwrap_or("marga-nav")
            ))
        })?;

    let mut config = if Path::new("marga.toml").exists() {
        info!("Loading configuration from marga.toml");
        NavConfig::load(Path::new("marga.toml"))?
    } else {
        NavConfig::default()
    };

    if let Some(planner) = flag_value(&args, "--planner") {
        config.planner.algorithm = match planner.as_str() {
            "a-star" => Algorithm::AStar,
            "d-star-lite" => Algorithm::DStarLite,
            other => {
                return Err(MargaError::Usage(format!(
                    "Unknown planner {other:?}; expected a-star or d-star-lite"
                )))
            }
        };
    }

    info!("marga-nav v{}", env!("CARGO_PKG_VERSION"));

    let map = marga_nav::map::loader::load(Path::new(&map_path))?;
    info!("Loaded map: {} -> {}", map_path, map.metadata().summary());

    let algorithm = config.planner.algorithm;
    info!("Planner: {:?}", algorithm);

    let mut controller = Controller::new(map, config)?;

    let (start, goal) = controller.auto_select_endpoints()?;
    match (start, goal) {
        (Some(start), Some(goal)) => {
            info!(
                "Endpoints: start ({}, {}) goal ({}, {})",
                start.x, start.y, goal.x, goal.y
            );
        }
        _ => {
            return Err(MargaError::Usage(
                "Map has no traversable endpoints".to_string(),
            ));
        }
    }

    for obstacle in obstacle_flags(&args)? {
        if !controller.add_hidden_obstacle(obstacle) {
            warn!(
                "Ignored hidden obstacle at ({}, {})",
                obstacle.x, obstacle.y
            );
        }
    }

    run_simulation(&mut controller)
}

fn run_simulation(controller: &mut Controller) -> Result<()> {
    let mut elapsed = 0.0f32;

    while elapsed < MAX_SIM_SECONDS {
        controller.tick(TICK_SECONDS)?;
        elapsed += TICK_SECONDS;

        match controller.state() {
            ControllerState::Blocked => {
                warn!("Planning blocked after {:.1}s of simulation", elapsed);
                break;
            }
            ControllerState::Tracking => {
                if !controller.agent().is_active() {
                    info!("Agent reached the goal after {:.1}s", elapsed);
                    break;
                }
            }
            _ => break,
        }
    }

    let travelled = controller.travel_history().len();
    let discovered = controller.visible_obstacles().len();
    let pending = controller.hidden_obstacles().len();
    info!(
        "Simulation finished: state {:?}, {} discovered obstacle(s), {} still hidden, {} history point(s)",
        controller.state(),
        discovered,
        pending,
        travelled
    );

    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn obstacle_flags(args: &[String]) -> Result<Vec<GridCoord>> {
    let mut obstacles = Vec::new();

    for (i, arg) in args.iter().enumerate() {
        if arg != "--obstacle" {
            continue;
        }
        let value = args.get(i + 1).ok_or_else(|| {
            MargaError::Usage("--obstacle requires a X,Y argument".to_string())
        })?;
        let (x, y) = value.split_once(',').ok_or_else(|| {
            MargaError::Usage(format!("Malformed obstacle {value:?}; expected X,Y"))
        })?;
        let x: i32 = x.trim().parse().map_err(|_| {
            MargaError::Usage(format!("Malformed obstacle {value:?}; expected X,Y"))
        })?;
        let y: i32 = y.trim().parse().map_err(|_| {
            MargaError::Usage(format!("Malformed obstacle {value:?}; expected X,Y"))
        })?;
        obstacles.push(GridCoord::new(x, y));
    }

    Ok(obstacles)
}
