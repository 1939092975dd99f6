//! Susceptible → Bitten → Zombie stock-and-flow model.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigError, SimulationParameters},
    conveyor::{ConveyorError, IncubationConveyor},
    curve::{CurveError, DensityEffectCurve},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationType {
    Susceptible,
    Bitten,
    Zombie,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stocks {
    pub susceptible: f64,
    pub bitten: f64,
    pub zombies: f64,
}

impl Stocks {
    /// Everyone, alive or not
    pub fn total(&self) -> f64 {
        self.susceptible + self.bitten + self.zombies
    }

    /// Stock for a single population type.
    pub fn get(&self, population_type: PopulationType) -> f64 {
        match population_type {
            PopulationType::Susceptible => self.susceptible,
            PopulationType::Bitten => self.bitten,
            PopulationType::Zombie => self.zombies,
        }
    }

    fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        [
            ("susceptible", self.susceptible),
            ("bitten", self.bitten),
            ("zombies", self.zombies),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite())
    }
}

/// Starting stocks. Bitten always starts at zero with an empty conveyor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialStocks {
    #[serde(default = "default_initial_susceptible")]
    pub susceptible: f64,
    #[serde(default = "default_initial_zombies")]
    pub zombies: f64,
}

fn default_initial_susceptible() -> f64 {
    100.0
}

fn default_initial_zombies() -> f64 {
    1.0
}

impl Default for InitialStocks {
    fn default() -> Self {
        Self {
            susceptible: default_initial_susceptible(),
            zombies: default_initial_zombies(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Lose,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeState {
    #[default]
    Running,
    Won,
    Lost,
}

impl OutcomeState {
    /// Won or lost.
    pub fn is_terminal(self) -> bool {
        self != OutcomeState::Running
    }
}

/// Flows and resulting stocks of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// Steps completed including this one.
    pub step: u64,
    pub density_effect: f64,
    pub total_bites: f64,
    pub newly_bitten: f64,
    pub admitted: f64,
    pub expired: f64,
    pub new_zombies: f64,
    pub stocks: Stocks,
    pub lose_condition: bool,
    pub win_condition: bool,
    /// Set only on the step that ends the run.
    pub outcome: Option<Outcome>,
}

/// Host-side subscriber for the end of the run. Each callback fires at
/// most once per model.
pub trait OutcomeListener {
    fn on_win(&mut self, report: &StepReport);
    fn on_lose(&mut self, report: &StepReport);
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Conveyor(#[from] ConveyorError),
    #[error("initial stock `{name}` must be finite and non-negative, got {value}")]
    InvalidStock { name: &'static str, value: f64 },
    #[error("individual bitten at step {bitten_at} cannot be removed at earlier step {current_step}")]
    BittenInFuture { bitten_at: u64, current_step: u64 },
    #[error("step would leave `{stock}` non-finite ({value}); state left unchanged")]
    NonFiniteState { stock: &'static str, value: f64 },
}

pub struct EpidemicModel {
    params: SimulationParameters,
    curve: DensityEffectCurve,
    conveyor: IncubationConveyor,
    stocks: Stocks,
    steps_completed: u64,
    outcome_state: OutcomeState,
    listeners: Vec<Box<dyn OutcomeListener>>,
}

impl EpidemicModel {
    /// Validates the parameters and initial stocks. Nobody starts bitten.
    pub fn new(
        params: SimulationParameters,
        curve: DensityEffectCurve,
        initial: InitialStocks,
    ) -> Result<Self, ModelError> {
        params.validate()?;
        for (name, value) in [
            ("susceptible", initial.susceptible),
            ("zombies", initial.zombies),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidStock { name, value });
            }
        }
        if curve.is_neutral() {
            warn!("density curve is empty; bite rate will not respond to density");
        }
        Ok(Self {
            params,
            curve,
            conveyor: IncubationConveyor::new(),
            stocks: Stocks {
                susceptible: initial.susceptible,
                bitten: 0.0,
                zombies: initial.zombies,
            },
            steps_completed: 0,
            outcome_state: OutcomeState::Running,
            listeners: Vec::new(),
        })
    }

    /// Registers a listener for the one-shot win and lose notifications.
    pub fn subscribe(&mut self, listener: impl OutcomeListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Current susceptible stock
    pub fn susceptible(&self) -> f64 {
        self.stocks.susceptible
    }

    /// Current bitten stock, equal to the conveyor content after a step
    pub fn bitten(&self) -> f64 {
        self.stocks.bitten
    }

    /// Current zombie stock
    pub fn zombies(&self) -> f64 {
        self.stocks.zombies
    }

    /// All three stocks at once.
    pub fn stocks(&self) -> Stocks {
        self.stocks
    }

    /// Steps applied so far
    pub fn steps_completed(&self) -> u64 {
        self.steps_completed
    }

    /// Running until the first win or loss, then fixed.
    pub fn outcome_state(&self) -> OutcomeState {
        self.outcome_state
    }

    pub fn conveyor(&self) -> &IncubationConveyor {
        &self.conveyor
    }

    pub fn curve(&self) -> &DensityEffectCurve {
        &self.curve
    }

    /// Validated parameters the model was built with
    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Advances the model by one simulated day.
    ///
    /// Everything is computed on copies and committed at the end, so an
    /// error leaves the previous state untouched.
    pub fn step(&mut self) -> Result<StepReport, ModelError> {
        let p = &self.params;
        let susceptible = self.stocks.susceptible;
        let zombies = self.stocks.zombies;
        let bitten = self.conveyor.content();

        let non_zombie_population = bitten + susceptible;
        let population_density = non_zombie_population / p.land_area;
        let density_effect = self
            .curve
            .lookup(population_density / p.normal_population_density);
        let bites_per_zombie_per_day = p.baseline_bite_rate * density_effect;
        let total_bites = (zombies * bites_per_zombie_per_day).round();

        let denom = non_zombie_population.max(1.0);
        let bites_on_susceptible = ((susceptible / denom) * total_bites).round();
        let newly_bitten = bites_on_susceptible.min(susceptible.floor()).max(0.0);

        let mut conveyor = self.conveyor.clone();
        let expired = conveyor.advance_one_day();
        let free_capacity = (p.bitten_capacity - conveyor.content()).max(0.0);
        let admitted = newly_bitten.min(free_capacity).max(0.0);
        if admitted > 0.0 {
            conveyor.admit(admitted, p.incubation_days)?;
        }
        let new_zombies = expired * p.conversion_ratio;

        let next = Stocks {
            susceptible: (susceptible - newly_bitten).max(0.0),
            bitten: conveyor.content(),
            zombies: (zombies + new_zombies).max(0.0),
        };
        if let Some((stock, value)) = next.first_non_finite() {
            warn!(stock, value, step = self.steps_completed + 1, "rejected step");
            return Err(ModelError::NonFiniteState { stock, value });
        }

        // the step counter still excludes this step, as when the clock
        // increments it after the step returns
        let lose_condition = next.susceptible <= p.lose_threshold;
        let win_condition = next.zombies <= 0.0 || self.steps_completed > p.max_steps;

        self.stocks = next;
        self.conveyor = conveyor;
        self.steps_completed += 1;

        let outcome = self.resolve_outcome(lose_condition, win_condition);
        let report = StepReport {
            step: self.steps_completed,
            density_effect,
            total_bites,
            newly_bitten,
            admitted,
            expired,
            new_zombies,
            stocks: next,
            lose_condition,
            win_condition,
            outcome,
        };
        debug!(
            step = report.step,
            susceptible = next.susceptible,
            bitten = next.bitten,
            zombies = next.zombies,
            density_effect,
            newly_bitten,
            admitted,
            expired,
            "simulation step"
        );
        if let Some(outcome) = outcome {
            self.notify(outcome, &report);
        }
        Ok(report)
    }

    fn resolve_outcome(&mut self, lose_condition: bool, win_condition: bool) -> Option<Outcome> {
        if self.outcome_state.is_terminal() {
            return None;
        }
        if lose_condition {
            self.outcome_state = OutcomeState::Lost;
            Some(Outcome::Lose)
        } else if win_condition {
            self.outcome_state = OutcomeState::Won;
            Some(Outcome::Win)
        } else {
            None
        }
    }

    fn notify(&mut self, outcome: Outcome, report: &StepReport) {
        info!(?outcome, step = report.step, "simulation outcome decided");
        for listener in &mut self.listeners {
            match outcome {
                Outcome::Win => listener.on_win(report),
                Outcome::Lose => listener.on_lose(report),
            }
        }
    }

    /// One susceptible individual was bitten outside the aggregate flow.
    /// Eligibility is the caller's responsibility.
    pub fn register_individual_bite(&mut self, current_step: u64) -> Result<(), ModelError> {
        if let Err(err) = self.conveyor.admit(1.0, self.params.incubation_days) {
            warn!(current_step, %err, "rejected individual bite");
            return Err(err.into());
        }
        self.stocks.susceptible = (self.stocks.susceptible - 1.0).max(0.0);
        self.stocks.bitten = self.conveyor.content();
        debug!(current_step, bitten = self.stocks.bitten, "registered individual bite");
        Ok(())
    }

    /// One tracked individual left the simulation. This removes population
    /// outright; nothing is added to any other stock.
    ///
    /// `bitten_at` is only read for [`PopulationType::Bitten`].
    pub fn register_individual_death(
        &mut self,
        population_type: PopulationType,
        bitten_at: u64,
        current_step: u64,
    ) -> Result<(), ModelError> {
        match population_type {
            PopulationType::Zombie => {
                self.stocks.zombies = (self.stocks.zombies - 1.0).max(0.0);
            }
            PopulationType::Susceptible => {
                self.stocks.susceptible = (self.stocks.susceptible - 1.0).max(0.0);
            }
            PopulationType::Bitten => {
                if bitten_at > current_step {
                    warn!(bitten_at, current_step, "rejected individual death");
                    return Err(ModelError::BittenInFuture {
                        bitten_at,
                        current_step,
                    });
                }
                let days_since_bite = (current_step - bitten_at) as f64;
                let days_left = (self.params.incubation_days - days_since_bite).trunc() as i64;
                self.conveyor
                    .remove_from_cohort_with_remaining_days(days_left, 1.0)?;
                self.stocks.bitten = (self.stocks.bitten - 1.0).max(0.0);
            }
        }
        debug!(?population_type, current_step, "registered individual death");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn flat_model(params: SimulationParameters, susceptible: f64, zombies: f64) -> EpidemicModel {
        EpidemicModel::new(
            params,
            DensityEffectCurve::flat(1.0).unwrap(),
            InitialStocks {
                susceptible,
                zombies,
            },
        )
        .unwrap()
    }

    fn idle_params() -> SimulationParameters {
        SimulationParameters {
            baseline_bite_rate: 0.0,
            ..SimulationParameters::default()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Outcome>>>);

    impl OutcomeListener for Recorder {
        fn on_win(&mut self, _report: &StepReport) {
            self.0.borrow_mut().push(Outcome::Win);
        }

        fn on_lose(&mut self, _report: &StepReport) {
            self.0.borrow_mut().push(Outcome::Lose);
        }
    }

    #[test]
    fn first_step_bites_one_susceptible() {
        let mut model = flat_model(SimulationParameters::default(), 100.0, 1.0);
        let report = model.step().unwrap();

        assert_eq!(report.total_bites, 1.0);
        assert_eq!(report.newly_bitten, 1.0);
        assert_eq!(report.admitted, 1.0);
        assert_eq!(model.susceptible(), 99.0);
        assert_eq!(model.bitten(), 1.0);
        assert_eq!(model.zombies(), 1.0);
        assert_eq!(model.steps_completed(), 1);
        assert_eq!(model.conveyor().cohorts().len(), 1);
        assert_eq!(model.conveyor().cohorts()[0].amount_of_people, 1.0);
        assert_eq!(model.conveyor().cohorts()[0].remaining_days, 15.0);
    }

    #[test]
    fn bitten_convert_after_incubation() {
        let params = SimulationParameters {
            conversion_ratio: 0.5,
            ..SimulationParameters::default()
        };
        let mut model = flat_model(params, 100.0, 1.0);
        for _ in 0..15 {
            model.step().unwrap();
        }
        assert_eq!(model.zombies(), 1.0);
        assert_eq!(model.bitten(), 15.0);

        let report = model.step().unwrap();
        assert_eq!(report.expired, 1.0);
        assert_eq!(report.new_zombies, 0.5);
        assert_eq!(model.zombies(), 1.5);
    }

    #[test]
    fn admission_is_capped_and_excess_dropped() {
        let params = SimulationParameters {
            bitten_capacity: 10.0,
            ..SimulationParameters::default()
        };
        let mut model = flat_model(params, 108.0, 5.0);
        for _ in 0..8 {
            model.register_individual_bite(0).unwrap();
        }
        assert_eq!(model.susceptible(), 100.0);
        assert_eq!(model.bitten(), 8.0);

        let report = model.step().unwrap();
        assert_eq!(report.newly_bitten, 5.0);
        assert_eq!(report.admitted, 2.0);
        assert_eq!(model.bitten(), 10.0);
        assert_eq!(model.susceptible(), 95.0);

        let report = model.step().unwrap();
        assert_eq!(report.admitted, 0.0);
        assert_eq!(model.bitten(), 10.0);
        assert_eq!(model.susceptible(), 90.0);
    }

    #[test]
    fn bitten_matches_conveyor_and_stocks_stay_non_negative() {
        let mut model = EpidemicModel::new(
            SimulationParameters::default(),
            DensityEffectCurve::standard(),
            InitialStocks::default(),
        )
        .unwrap();
        for _ in 0..120 {
            let report = model.step().unwrap();
            assert_eq!(model.bitten(), model.conveyor().content());
            assert_eq!(report.stocks, model.stocks());
            assert!(model.susceptible() >= 0.0);
            assert!(model.bitten() >= 0.0);
            assert!(model.zombies() >= 0.0);
        }
    }

    #[test]
    fn lose_triggers_at_threshold() {
        let mut model = flat_model(idle_params(), 45.0, 1.0);
        let report = model.step().unwrap();
        assert!(report.lose_condition);
        assert_eq!(report.outcome, Some(Outcome::Lose));
        assert_eq!(model.outcome_state(), OutcomeState::Lost);

        let mut model = flat_model(idle_params(), 46.0, 1.0);
        let report = model.step().unwrap();
        assert!(!report.lose_condition);
        assert_eq!(report.outcome, None);
        assert_eq!(model.outcome_state(), OutcomeState::Running);
    }

    #[test]
    fn win_triggers_when_zombies_are_gone() {
        let mut model = flat_model(idle_params(), 100.0, 0.0);
        let report = model.step().unwrap();
        assert!(report.win_condition);
        assert_eq!(report.outcome, Some(Outcome::Win));
        assert_eq!(model.outcome_state(), OutcomeState::Won);
    }

    #[test]
    fn lose_takes_precedence_over_win() {
        let mut model = flat_model(idle_params(), 10.0, 0.0);
        let report = model.step().unwrap();
        assert!(report.lose_condition && report.win_condition);
        assert_eq!(model.outcome_state(), OutcomeState::Lost);
    }

    #[test]
    fn win_triggers_once_step_limit_is_exceeded() {
        let mut model = flat_model(idle_params(), 100.0, 1.0);
        for _ in 0..180 {
            assert!(!model.step().unwrap().win_condition);
        }
        assert_eq!(model.steps_completed(), 180);
        let report = model.step().unwrap();
        assert!(!report.win_condition, "180 completed steps is not over the limit");
        assert_eq!(model.steps_completed(), 181);

        let report = model.step().unwrap();
        assert!(report.win_condition);
        assert_eq!(report.outcome, Some(Outcome::Win));
    }

    #[test]
    fn listeners_fire_once() {
        let recorder = Recorder::default();
        let mut model = flat_model(idle_params(), 40.0, 1.0);
        model.subscribe(recorder.clone());
        for _ in 0..5 {
            let report = model.step().unwrap();
            assert!(report.lose_condition);
        }
        assert_eq!(*recorder.0.borrow(), vec![Outcome::Lose]);
    }

    #[test]
    fn individual_bite_keeps_bitten_in_sync() {
        let mut model = flat_model(idle_params(), 0.5, 1.0);
        model.register_individual_bite(3).unwrap();
        assert_eq!(model.susceptible(), 0.0);
        assert_eq!(model.bitten(), 1.0);
        assert_eq!(model.bitten(), model.conveyor().content());
    }

    #[test]
    fn individual_deaths_remove_population() {
        let mut model = flat_model(idle_params(), 10.0, 2.0);
        model
            .register_individual_death(PopulationType::Zombie, 0, 0)
            .unwrap();
        model
            .register_individual_death(PopulationType::Susceptible, 0, 0)
            .unwrap();
        assert_eq!(model.zombies(), 1.0);
        assert_eq!(model.susceptible(), 9.0);

        model.register_individual_bite(0).unwrap();
        for _ in 0..4 {
            model.step().unwrap();
        }
        let before = model.stocks().total();
        model
            .register_individual_death(PopulationType::Bitten, 0, model.steps_completed())
            .unwrap();
        assert_eq!(model.bitten(), 0.0);
        assert_eq!(model.conveyor().content(), 0.0);
        assert_eq!(model.stocks().total(), before - 1.0);
    }

    #[test]
    fn deaths_floor_stocks_at_zero() {
        let mut model = flat_model(idle_params(), 0.0, 0.0);
        model
            .register_individual_death(PopulationType::Zombie, 0, 0)
            .unwrap();
        model
            .register_individual_death(PopulationType::Susceptible, 0, 0)
            .unwrap();
        model
            .register_individual_death(PopulationType::Bitten, 0, 0)
            .unwrap();
        assert_eq!(model.stocks(), Stocks::default());
    }

    #[test]
    fn bite_after_death_step_is_rejected() {
        let mut model = flat_model(idle_params(), 10.0, 1.0);
        let err = model
            .register_individual_death(PopulationType::Bitten, 5, 2)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::BittenInFuture {
                bitten_at: 5,
                current_step: 2
            }
        );
    }

    #[test]
    fn failed_step_leaves_state_intact() {
        let mut model = flat_model(SimulationParameters::default(), 100.0, 1.0);
        model.step().unwrap();
        model.stocks.zombies = f64::INFINITY;
        let before_conveyor = model.conveyor().clone();

        let err = model.step().unwrap_err();
        assert!(matches!(
            err,
            ModelError::NonFiniteState {
                stock: "zombies",
                ..
            }
        ));
        assert_eq!(model.steps_completed(), 1);
        assert_eq!(model.susceptible(), 99.0);
        assert_eq!(model.conveyor(), &before_conveyor);
    }

    #[test]
    fn rejects_invalid_construction() {
        let err = EpidemicModel::new(
            SimulationParameters::default(),
            DensityEffectCurve::standard(),
            InitialStocks {
                susceptible: -1.0,
                zombies: 1.0,
            },
        )
        .err();
        assert!(matches!(
            err,
            Some(ModelError::InvalidStock {
                name: "susceptible",
                ..
            })
        ));

        let params = SimulationParameters {
            land_area: -5.0,
            ..SimulationParameters::default()
        };
        let err = EpidemicModel::new(params, DensityEffectCurve::standard(), InitialStocks::default())
            .err();
        assert!(matches!(err, Some(ModelError::Config(_))));
    }
}
