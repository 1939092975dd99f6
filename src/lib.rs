pub mod clock;
pub mod config;
pub mod conveyor;
pub mod curve;
pub mod engine;
pub mod individuals;
pub mod model;
pub mod scenario;
pub mod snapshot;

pub use clock::SimulationClock;
pub use config::{ClockPolicy, SimulationParameters};
pub use conveyor::{Cohort, IncubationConveyor};
pub use curve::DensityEffectCurve;
pub use engine::{Engine, EngineBuilder, EngineSettings, RunSummary};
pub use model::{EpidemicModel, Outcome, OutcomeListener, OutcomeState, PopulationType, StepReport};
pub use scenario::{Scenario, ScenarioLoader};
