//! # engine_app
//!
//! Runs a demo scene with the built-in systems on a fixed-timestep tick loop.
//!
//! ## Startup Sequence
//!
//! 1. Parse CLI flags and load the optional JSON config file.
//! 2. Build the [`World`] and populate the demo scene.
//! 3. Register the built-in motion, collision and render systems.
//! 4. Enter the tick loop.

mod config;
mod scene;
mod tick;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_defaults::{Colliding, RecordingTarget};
use engine_ecs::{Signature, World};

use config::AppConfig;
use tick::TickLoop;

#[derive(Parser)]
#[command(name = "engine_app", about = "Runs an ECS demo scene on a fixed-timestep loop")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run (0 = unlimited); overrides the config file
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Ticks per second; overrides the config file
    #[arg(long)]
    tick_rate: Option<f64>,

    /// Number of demo bodies to spawn
    #[arg(short, long, default_value_t = 16)]
    entities: usize,
}

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(ticks) = args.ticks {
        config.tick.max_ticks = ticks;
    }
    if let Some(rate) = args.tick_rate {
        config.tick.tick_rate = rate;
    }
    info!(
        tick_rate = config.tick.tick_rate,
        max_ticks = config.tick.max_ticks,
        duplicate_policy = ?config.world.duplicate_policy,
        init_retry_limit = config.world.init_retry_limit,
        closing_hook = ?config.world.closing_hook,
        "engine starting"
    );

    let mut world = World::with_config(config.world);
    let bodies = scene::populate(&mut world, args.entities)?;
    let target = RecordingTarget::new().retain_last_frame();
    engine_defaults::install(&mut world, target.clone());
    let colliding = world.query(Signature::new().with::<Colliding>())?;
    info!(bodies = bodies.len(), systems = world.system_count(), "scene ready");

    let mut tick_loop = TickLoop::new(config.tick, world);
    tick_loop.run();

    let world = tick_loop.world();
    info!(
        frames = world.frame(),
        entities = world.entity_count(),
        colliding = world.matches(colliding)?.len(),
        draw_commands = target.commands().len(),
        "engine shut down"
    );
    Ok(())
}
