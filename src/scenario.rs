use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    config::{LoggingConfig, SimulationParameters},
    curve::{CurvePoint, DensityEffectCurve},
    model::{EpidemicModel, InitialStocks},
};

fn default_snapshot_interval_steps() -> u64 {
    0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: SimulationParameters,
    #[serde(default)]
    pub initial: InitialStocks,
    /// Falls back to the standard curve when omitted.
    #[serde(default)]
    pub density_curve: Option<Vec<CurvePoint>>,
    #[serde(default)]
    pub steps: Option<u64>,
    #[serde(default = "default_snapshot_interval_steps")]
    pub snapshot_interval_steps: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Scenario::from_yaml(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        scenario
            .parameters
            .validate()
            .with_context(|| format!("Invalid parameters in scenario '{}'", scenario.name))?;
        Ok(scenario)
    }

    pub fn density_curve(&self) -> Result<DensityEffectCurve> {
        match &self.density_curve {
            Some(points) => DensityEffectCurve::load(points.iter().copied())
                .with_context(|| format!("Invalid density curve in scenario '{}'", self.name)),
            None => Ok(DensityEffectCurve::standard()),
        }
    }

    pub fn build_model(&self) -> Result<EpidemicModel> {
        let curve = self.density_curve()?;
        let model = EpidemicModel::new(self.parameters.clone(), curve, self.initial)
            .with_context(|| format!("Failed to build model for scenario '{}'", self.name))?;
        Ok(model)
    }

    pub fn steps(&self, override_steps: Option<u64>) -> u64 {
        override_steps
            .or(self.steps)
            .unwrap_or(self.parameters.max_steps + 1)
    }
}
