use spheresim::config::ScenarioConfig;

use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Run an event-driven sphere collision scenario")]
struct Args {
    /// YAML scenario file.
    scenario: PathBuf,

    /// Override the run duration from the scenario (seconds).
    #[arg(short, long)]
    duration: Option<f64>,

    /// Print every particle position at each sampled frame.
    #[arg(long)]
    frames: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = ScenarioConfig::from_path(&args.scenario)
        .with_context(|| format!("failed to load scenario {}", args.scenario.display()))?;
    let mut sim = cfg.build().context("invalid scenario")?;
    let duration = args.duration.unwrap_or(cfg.engine.duration);
    let frame = cfg.engine.frame_interval();

    // Host loop: fixed-cadence sampling; collisions are resolved exactly in between.
    sim.start(duration)?;
    let mut running = true;
    while running {
        running = sim.tick(frame)?;
        if args.frames {
            let positions: Vec<String> = sim
                .bodies()
                .map(|b| {
                    let [x, y, z] = b.position;
                    format!("({x:.3}, {y:.3}, {z:.3})")
                })
                .collect();
            println!("t={:.4} {}", sim.time(), positions.join(" "));
        }
    }

    let stats = sim.stats();
    println!(
        "t={:.4} particles={} pair_collisions={} wall_collisions={} stale_events={} \
         kinetic_energy={:.6}",
        sim.time(),
        sim.num_particles(),
        stats.pair_collisions,
        stats.wall_collisions,
        stats.stale_events,
        sim.kinetic_energy()
    );
    Ok(())
}
