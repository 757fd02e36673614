//! ArcNav demo: drive the simulated agent across a small route graph.
//!
//! Usage: `arcnav [config.toml] [--graph routes.toml]`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use arcnav::navigator::{Destination, MoveOptions, Navigator};
use arcnav::sim::SimActuator;
use arcnav::{FlatTerrain, NavConfig, NavHooks, PathFinder, Point, Result, RouteGraph};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config = if args.len() > 1 && !args[1].starts_with("--") {
        NavConfig::load(Path::new(&args[1]))?
    } else if Path::new("arcnav.toml").exists() {
        NavConfig::load(Path::new("arcnav.toml"))?
    } else {
        NavConfig::default()
    };

    let default_level = if config.debug_logging {
        "arcnav=debug"
    } else {
        "arcnav=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().expect("valid log directive")),
        )
        .init();

    info!("ArcNav v{}", env!("CARGO_PKG_VERSION"));

    let graph_path = args
        .iter()
        .position(|a| a == "--graph")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let graph = match graph_path {
        Some(path) => {
            info!("Loading route graph from {path}");
            RouteGraph::load_file(Path::new(&path))?
        }
        None => demo_graph(),
    };
    info!(
        "Route graph: {} nodes, {} arcs",
        graph.node_count(),
        graph.arc_count()
    );

    let actuator = Arc::new(SimActuator::new(Point::new(0.0, 0.0, 0.0)));
    let hooks = NavHooks {
        on_maintenance: Some(Box::new(|remaining| {
            info!("remaining distance: {remaining:.1}");
        })),
        ..Default::default()
    };
    let nav = Navigator::new(graph, Box::new(FlatTerrain), actuator.clone(), hooks, config)?;

    // Integrate the simulated body while the engine drives it.
    let sim = actuator.clone();
    let stepper = std::thread::Builder::new()
        .name("sim".into())
        .spawn(move || {
            loop {
                sim.step(0.05);
                std::thread::sleep(Duration::from_millis(50));
            }
        })
        .expect("Failed to spawn sim thread");

    let arrived = nav.move_to_blocking(Destination::Named("depot".into()), MoveOptions::default());
    match (arrived, nav.last_error()) {
        (true, None) => info!("arrived at depot"),
        (true, Some(err)) => info!("arrived (best effort, {err})"),
        (false, err) => info!("route abandoned: {err:?}"),
    }

    drop(nav);
    drop(stepper);
    Ok(())
}

/// A small loop of named waypoints around the origin.
fn demo_graph() -> RouteGraph {
    let mut g = RouteGraph::default();
    let gate = g.add_node(Point::named(5.0, 0.0, 0.0, "gate"));
    let corner = g.add_node(Point::named(40.0, 5.0, 0.0, "corner"));
    let bridge = g.add_node(Point::named(60.0, 30.0, 0.0, "bridge"));
    let depot = g.add_node(Point::named(90.0, 35.0, 0.0, "depot"));
    g.add_two_way(gate, corner, 1.0);
    g.add_two_way(corner, bridge, 1.0);
    g.add_two_way(bridge, depot, 1.0);
    // One-way shortcut back to the gate.
    let _ = g.add_arc(depot, gate, 2.0);
    g
}
