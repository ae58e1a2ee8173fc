//! # engine_app demo runner
//!
//! Builds a scene with the demo systems, populates it from a template and
//! runs the fixed-timestep tick loop.
//!
//! Configuration comes from `ENGINE_TICK_RATE` / `ENGINE_MAX_TICKS`, with
//! command-line flags taking precedence.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_app::demo;
use engine_app::{Engine, Scene, TickConfig};

#[derive(Debug, Parser)]
#[command(name = "engine_app", about = "Run the ECS demo scene")]
struct Args {
    /// Target ticks per second.
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Stop after this many ticks (0 = run forever).
    #[arg(long)]
    ticks: Option<u64>,

    /// Number of entities to spawn from the demo template.
    #[arg(long, default_value_t = 16)]
    entities: usize,
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = TickConfig::from_env();
    if let Some(rate) = args.tick_rate {
        anyhow::ensure!(
            TickConfig::period(rate).is_some(),
            "--tick-rate must be positive with a representable period, got {rate}"
        );
        config.tick_rate = rate;
    }
    if let Some(ticks) = args.ticks {
        config.max_ticks = ticks;
    }

    info!(?config, entities = args.entities, "engine starting");

    demo::register_components();
    let mut scene = Scene::new();
    demo::install_systems(&mut scene)?;
    demo::populate(&mut scene, args.entities)?;

    let mut engine = Engine::with_scene(config, scene);
    engine.run();

    info!(
        ticks = engine.tick_id(),
        remaining = engine.scene().entity_count(),
        "engine shut down"
    );
    Ok(())
}
