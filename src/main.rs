use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use zombie_outbreak::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Zombie outbreak stock-and-flow runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/default_outbreak.yaml")]
    scenario: PathBuf,

    /// Override step count (uses scenario default when omitted)
    #[arg(long)]
    steps: Option<u64>,

    /// Drive the clock with frames of this many seconds instead of whole steps
    #[arg(long)]
    frame_dt: Option<f64>,

    /// Override snapshot interval in steps
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Stop as soon as the outbreak is won or lost
    #[arg(long)]
    stop_on_outcome: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&scenario.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut model = scenario.build_model()?;
    let steps = scenario.steps(cli.steps);
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_steps: cli
            .snapshot_interval
            .unwrap_or(scenario.snapshot_interval_steps),
        snapshot_dir: cli
            .snapshot_dir
            .unwrap_or_else(|| PathBuf::from("snapshots")),
        stop_on_outcome: cli.stop_on_outcome,
    };
    let mut engine = EngineBuilder::new(settings).build(&model)?;

    let summary = match cli.frame_dt {
        Some(frame_dt) if frame_dt > 0.0 => {
            let step_duration = model.params().step_duration;
            // one spare frame per step covers rounding in the accumulator
            let frames_per_step = (step_duration / frame_dt).ceil() as u64 + 1;
            let frames = steps.saturating_mul(frames_per_step);
            engine.run_frames(&mut model, frame_dt, frames, steps, |_| {})?
        }
        Some(frame_dt) => anyhow::bail!("--frame-dt must be positive, got {frame_dt}"),
        None => engine.run(&mut model, steps)?,
    };

    println!(
        "Scenario '{}' finished after {} steps ({:?}). Susceptible: {:.0}, bitten: {:.0}, zombies: {:.1}",
        scenario.name,
        summary.steps,
        summary.outcome,
        summary.stocks.susceptible,
        summary.stocks.bitten,
        summary.stocks.zombies
    );
    Ok(())
}
