//! Fixed-quantum driver that turns frame time into model steps.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::{
    config::{ClockPolicy, ConfigError},
    model::{EpidemicModel, ModelError, StepReport},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    #[error("frame delta must be finite and non-negative, got {0}")]
    InvalidDelta(f64),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Timing for a single fired step
#[derive(Debug, Clone)]
pub struct StepStats {
    pub step: u64,
    pub duration: Duration,
}

pub struct SimulationClock {
    step_duration: f64,
    policy: ClockPolicy,
    accumulated: f64,
    steps_completed: u64,
    stats_history: Vec<StepStats>,
    max_stats_history: usize,
}

impl SimulationClock {
    pub fn new(step_duration: f64, policy: ClockPolicy) -> Result<Self, ConfigError> {
        if !step_duration.is_finite() {
            return Err(ConfigError::NonFinite {
                name: "step_duration",
                value: step_duration,
            });
        }
        if step_duration <= 0.0 {
            return Err(ConfigError::NotPositive {
                name: "step_duration",
                value: step_duration,
            });
        }
        Ok(Self {
            step_duration,
            policy,
            accumulated: 0.0,
            steps_completed: 0,
            stats_history: Vec::new(),
            max_stats_history: 100,
        })
    }

    /// Clock matching the model's configured step duration and policy.
    pub fn for_model(model: &EpidemicModel) -> Result<Self, ConfigError> {
        let params = model.params();
        Self::new(params.step_duration, params.clock_policy)
    }

    /// Wall time per step
    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// How leftover frame time is treated
    pub fn policy(&self) -> ClockPolicy {
        self.policy
    }

    /// Frame time not yet turned into a step
    pub fn accumulated_time(&self) -> f64 {
        self.accumulated
    }

    /// Steps fired by this clock
    pub fn steps_completed(&self) -> u64 {
        self.steps_completed
    }

    /// Adds frame time and fires every step that has come due.
    ///
    /// Under [`ClockPolicy::DropExcess`] at most one step fires and any
    /// leftover time is discarded. If a step fails, its quantum stays in
    /// the accumulator and steps fired earlier in the call remain applied.
    pub fn advance(
        &mut self,
        delta_time: f64,
        model: &mut EpidemicModel,
    ) -> Result<Vec<StepReport>, ClockError> {
        self.advance_within(delta_time, model, u64::MAX)
    }

    /// Like [`advance`](Self::advance), but fires at most `budget` steps.
    /// Quanta left unfired under [`ClockPolicy::CatchUp`] stay in the
    /// accumulator for the next call.
    pub fn advance_within(
        &mut self,
        delta_time: f64,
        model: &mut EpidemicModel,
        budget: u64,
    ) -> Result<Vec<StepReport>, ClockError> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            tracing::warn!(delta_time, "rejected frame delta");
            return Err(ClockError::InvalidDelta(delta_time));
        }
        self.accumulated += delta_time;

        let mut reports = Vec::new();
        match self.policy {
            ClockPolicy::CatchUp => {
                while (reports.len() as u64) < budget && self.accumulated >= self.step_duration {
                    self.accumulated -= self.step_duration;
                    match self.step_once(model) {
                        Ok(report) => reports.push(report),
                        Err(err) => {
                            self.accumulated += self.step_duration;
                            return Err(err.into());
                        }
                    }
                }
            }
            ClockPolicy::DropExcess => {
                if budget > 0 && self.accumulated >= self.step_duration {
                    let carried = self.accumulated;
                    self.accumulated = 0.0;
                    match self.step_once(model) {
                        Ok(report) => reports.push(report),
                        Err(err) => {
                            self.accumulated = carried;
                            return Err(err.into());
                        }
                    }
                }
            }
        }
        Ok(reports)
    }

    /// Fires one step regardless of accumulated time.
    pub fn step_once(&mut self, model: &mut EpidemicModel) -> Result<StepReport, ModelError> {
        let start = Instant::now();
        let report = model.step()?;
        self.steps_completed += 1;

        self.stats_history.push(StepStats {
            step: self.steps_completed,
            duration: start.elapsed(),
        });
        if self.stats_history.len() > self.max_stats_history {
            self.stats_history.remove(0);
        }
        Ok(report)
    }

    /// Timings of the last hundred fired steps, oldest first
    pub fn recent_stats(&self) -> &[StepStats] {
        &self.stats_history
    }

    /// Mean duration over the kept step timings, `None` before the first step
    pub fn average_step_time(&self) -> Option<Duration> {
        if self.stats_history.is_empty() {
            return None;
        }

        let total: Duration = self.stats_history.iter().map(|s| s.duration).sum();
        Some(total / self.stats_history.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimulationParameters,
        curve::DensityEffectCurve,
        model::InitialStocks,
    };

    fn model() -> EpidemicModel {
        EpidemicModel::new(
            SimulationParameters::default(),
            DensityEffectCurve::flat(1.0).unwrap(),
            InitialStocks::default(),
        )
        .unwrap()
    }

    #[test]
    fn fires_once_per_quantum() {
        let mut model = model();
        let mut clock = SimulationClock::new(1.0, ClockPolicy::CatchUp).unwrap();

        assert!(clock.advance(0.4, &mut model).unwrap().is_empty());
        assert!(clock.advance(0.4, &mut model).unwrap().is_empty());
        assert_eq!(clock.steps_completed(), 0);

        let reports = clock.advance(0.4, &mut model).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(clock.steps_completed(), 1);
        assert_eq!(model.steps_completed(), 1);
        assert!((clock.accumulated_time() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn catch_up_runs_every_elapsed_step() {
        let mut model = model();
        let mut clock = SimulationClock::new(0.5, ClockPolicy::CatchUp).unwrap();

        let reports = clock.advance(1.75, &mut model).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports.last().map(|r| r.step), Some(3));
        assert_eq!(clock.accumulated_time(), 0.25);
        assert_eq!(model.steps_completed(), 3);
    }

    #[test]
    fn drop_excess_fires_at_most_once_and_resets() {
        let mut model = model();
        let mut clock = SimulationClock::new(0.5, ClockPolicy::DropExcess).unwrap();

        let reports = clock.advance(1.75, &mut model).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(clock.accumulated_time(), 0.0);
        assert_eq!(clock.steps_completed(), 1);
    }

    #[test]
    fn budget_caps_steps_and_keeps_the_rest() {
        let mut model = model();
        let mut clock = SimulationClock::new(1.0, ClockPolicy::CatchUp).unwrap();

        let reports = clock.advance_within(10.0, &mut model, 4).unwrap();
        assert_eq!(reports.len(), 4);
        assert_eq!(model.steps_completed(), 4);
        assert_eq!(clock.accumulated_time(), 6.0);

        assert!(clock.advance_within(0.0, &mut model, 0).unwrap().is_empty());
        assert_eq!(clock.advance(0.0, &mut model).unwrap().len(), 6);
        assert_eq!(clock.steps_completed(), 10);
    }

    #[test]
    fn drop_excess_with_empty_budget_fires_nothing() {
        let mut model = model();
        let mut clock = SimulationClock::new(1.0, ClockPolicy::DropExcess).unwrap();
        assert!(clock.advance_within(3.0, &mut model, 0).unwrap().is_empty());
        assert_eq!(clock.accumulated_time(), 3.0);
        assert_eq!(model.steps_completed(), 0);
    }

    #[test]
    fn rejects_bad_deltas_and_durations() {
        let mut model = model();
        let mut clock = SimulationClock::new(1.0, ClockPolicy::CatchUp).unwrap();
        assert_eq!(
            clock.advance(-0.1, &mut model).unwrap_err(),
            ClockError::InvalidDelta(-0.1)
        );
        assert!(clock.advance(f64::NAN, &mut model).is_err());
        assert_eq!(clock.accumulated_time(), 0.0);

        assert!(SimulationClock::new(0.0, ClockPolicy::CatchUp).is_err());
        assert!(SimulationClock::new(f64::INFINITY, ClockPolicy::DropExcess).is_err());
    }

    #[test]
    fn keeps_step_stats() {
        let mut model = model();
        let mut clock = SimulationClock::for_model(&model).unwrap();
        clock.step_once(&mut model).unwrap();
        clock.step_once(&mut model).unwrap();

        let stats = clock.recent_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].step, 2);
        assert!(clock.average_step_time().is_some());
    }
}
