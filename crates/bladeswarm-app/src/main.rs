use anyhow::Result;
use bladeswarm_core::{BladeswarmConfig, Platform, SimObserver, TickSummary, Vec2, World};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "bladeswarm",
    version,
    about = "Run the bladeswarm simulation headless and log tick summaries"
)]
struct Cli {
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Number of agents seeded into the swarm.
    #[arg(long, default_value_t = 24)]
    agents: usize,

    /// RNG seed; omit for a fresh world every run.
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks between summary flushes; 0 disables summaries.
    #[arg(long, default_value_t = 30)]
    summary_interval: u32,

    /// Emit flushed summaries as JSON lines on stdout.
    #[arg(long)]
    summary_json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut world = bootstrap_world(&cli)?;
    info!(
        ticks = cli.ticks,
        agents = cli.agents,
        "Starting bladeswarm headless run"
    );

    let bounds = Vec2::new(world.config().world_width, world.config().world_height);
    let center = bounds * 0.5;
    let sweep = Vec2::new(bounds.x * 0.3, bounds.y * 0.3);
    for step in 0..cli.ticks {
        // Sweep the cursor along an ellipse so the swarm keeps crossing
        // platforms and hazard territory.
        let phase = step as f32 * 0.01;
        world.update_cursor_target(
            center.x + sweep.x * phase.cos(),
            center.y + sweep.y * (phase * 0.7).sin(),
        );
        let events = world.update();
        if events.hazards_slain > 0 {
            info!(
                tick = events.tick.0,
                slain = events.hazards_slain,
                "Swarm destroyed hazards"
            );
        }
    }

    if let Some(summary) = world.history().last() {
        info!(
            tick = summary.tick.0,
            agents = summary.agent_count,
            hazards = summary.hazard_count,
            center_x = summary.swarm_center.x,
            center_y = summary.swarm_center.y,
            "Finished run with final summary",
        );
    } else {
        warn!("Run completed without flushed summaries");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Forwards flushed summaries to the log, or to stdout as JSON lines.
struct LogObserver {
    json: bool,
}

impl SimObserver for LogObserver {
    fn on_summary(&mut self, summary: &TickSummary) {
        if self.json {
            match serde_json::to_string(summary) {
                Ok(line) => println!("{line}"),
                Err(error) => warn!(%error, "Failed to encode summary"),
            }
        } else {
            info!(
                tick = summary.tick.0,
                agents = summary.agent_count,
                hazards = summary.hazard_count,
                slain = summary.hazards_slain,
                damage = summary.damage_dealt,
                "Tick summary",
            );
        }
    }
}

fn bootstrap_world(cli: &Cli) -> Result<World> {
    let config = BladeswarmConfig {
        rng_seed: cli.seed,
        summary_interval: cli.summary_interval,
        ..BladeswarmConfig::default()
    };
    let observer = LogObserver {
        json: cli.summary_json,
    };
    let mut world = World::with_observer(config, Box::new(observer))?;

    let spacing = 40.0;
    for index in 0..cli.agents {
        let row = index / 6;
        let col = index % 6;
        world.spawn_agent(Vec2::new(
            col as f32 * spacing + 200.0,
            row as f32 * spacing + 400.0,
        ));
    }

    world.add_platform(Platform::new(300.0, 900.0, 700.0, 40.0));
    world.add_platform(Platform::new(1_400.0, 700.0, 600.0, 40.0));

    Ok(world)
}
