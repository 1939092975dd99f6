use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    clock::SimulationClock,
    model::{EpidemicModel, OutcomeState, StepReport, Stocks},
    snapshot::SnapshotWriter,
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub snapshot_interval_steps: u64,
    pub snapshot_dir: PathBuf,
    /// Halt the run on the step that decides the outcome.
    pub stop_on_outcome: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scenario_name: "outbreak".into(),
            snapshot_interval_steps: 0,
            snapshot_dir: PathBuf::from("snapshots"),
            stop_on_outcome: false,
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn stop_on_outcome(mut self, stop: bool) -> Self {
        self.settings.stop_on_outcome = stop;
        self
    }

    pub fn build(self, model: &EpidemicModel) -> Result<Engine> {
        let clock = SimulationClock::for_model(model).context("Failed to build simulation clock")?;
        Ok(Engine {
            clock,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_steps,
            ),
            settings: self.settings,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps: u64,
    pub stocks: Stocks,
    pub outcome: OutcomeState,
    pub snapshots: Vec<PathBuf>,
}

pub struct Engine {
    clock: SimulationClock,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn run(&mut self, model: &mut EpidemicModel, steps: u64) -> Result<RunSummary> {
        self.run_with_hook(model, steps, |_| {})
    }

    pub fn run_with_hook<F>(
        &mut self,
        model: &mut EpidemicModel,
        steps: u64,
        mut hook: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&StepReport),
    {
        info!(scenario = %self.settings.scenario_name, steps, "starting step-driven run");
        let mut snapshots = Vec::new();
        for _ in 0..steps {
            let report = self
                .clock
                .step_once(model)
                .with_context(|| format!("Step {} failed", model.steps_completed() + 1))?;
            let decided = report.outcome.is_some();
            self.after_step(model, &report, &mut snapshots, &mut hook)?;
            if decided && self.settings.stop_on_outcome {
                break;
            }
        }
        Ok(self.summary(model, snapshots))
    }

    /// Feeds `frames` frames of `frame_dt` wall time through the clock,
    /// stopping early once `max_steps` steps have fired.
    pub fn run_frames<F>(
        &mut self,
        model: &mut EpidemicModel,
        frame_dt: f64,
        frames: u64,
        max_steps: u64,
        mut hook: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&StepReport),
    {
        info!(
            scenario = %self.settings.scenario_name,
            frame_dt,
            frames,
            "starting frame-driven run"
        );
        let mut snapshots = Vec::new();
        'frames: for frame in 0..frames {
            let remaining = max_steps.saturating_sub(self.clock.steps_completed());
            if remaining == 0 {
                break;
            }
            let reports = self
                .clock
                .advance_within(frame_dt, model, remaining)
                .with_context(|| format!("Frame {frame} failed"))?;
            for report in &reports {
                self.after_step(model, report, &mut snapshots, &mut hook)?;
                if report.outcome.is_some() && self.settings.stop_on_outcome {
                    break 'frames;
                }
            }
        }
        Ok(self.summary(model, snapshots))
    }

    fn after_step<F>(
        &self,
        model: &EpidemicModel,
        report: &StepReport,
        snapshots: &mut Vec<PathBuf>,
        hook: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&StepReport),
    {
        hook(report);
        if let Some(path) = self
            .snapshot_writer
            .maybe_write(model, &self.settings.scenario_name)?
        {
            snapshots.push(path);
        }
        Ok(())
    }

    fn summary(&self, model: &EpidemicModel, snapshots: Vec<PathBuf>) -> RunSummary {
        let summary = RunSummary {
            steps: model.steps_completed(),
            stocks: model.stocks(),
            outcome: model.outcome_state(),
            snapshots,
        };
        info!(
            steps = summary.steps,
            susceptible = summary.stocks.susceptible,
            bitten = summary.stocks.bitten,
            zombies = summary.stocks.zombies,
            outcome = ?summary.outcome,
            "run finished"
        );
        summary
    }
}
