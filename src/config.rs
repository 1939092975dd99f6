//! Simulation parameters and logging configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_step_duration() -> f64 {
    1.0
}

fn default_incubation_days() -> f64 {
    15.0
}

fn default_bitten_capacity() -> f64 {
    100.0
}

fn default_baseline_bite_rate() -> f64 {
    1.0
}

fn default_conversion_ratio() -> f64 {
    1.0
}

fn default_land_area() -> f64 {
    1000.0
}

fn default_normal_population_density() -> f64 {
    0.1
}

fn default_lose_threshold() -> f64 {
    45.0
}

fn default_max_steps() -> u64 {
    180
}

/// How the clock treats elapsed time beyond one step duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockPolicy {
    /// Carry the remainder and fire one step per elapsed duration.
    #[default]
    CatchUp,
    /// Fire at most one step per advance and reset the accumulator to zero.
    DropExcess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Wall-time seconds per simulated day.
    #[serde(default = "default_step_duration")]
    pub step_duration: f64,
    #[serde(default = "default_incubation_days")]
    pub incubation_days: f64,
    /// Most people the conveyor may hold after a step's admission.
    #[serde(default = "default_bitten_capacity")]
    pub bitten_capacity: f64,
    /// Bites per zombie per day at normal density.
    #[serde(default = "default_baseline_bite_rate")]
    pub baseline_bite_rate: f64,
    /// New zombies per person leaving incubation.
    #[serde(default = "default_conversion_ratio")]
    pub conversion_ratio: f64,
    #[serde(default = "default_land_area")]
    pub land_area: f64,
    #[serde(default = "default_normal_population_density")]
    pub normal_population_density: f64,
    #[serde(default = "default_lose_threshold")]
    pub lose_threshold: f64,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    #[serde(default)]
    pub clock_policy: ClockPolicy,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            step_duration: default_step_duration(),
            incubation_days: default_incubation_days(),
            bitten_capacity: default_bitten_capacity(),
            baseline_bite_rate: default_baseline_bite_rate(),
            conversion_ratio: default_conversion_ratio(),
            land_area: default_land_area(),
            normal_population_density: default_normal_population_density(),
            lose_threshold: default_lose_threshold(),
            max_steps: default_max_steps(),
            clock_policy: ClockPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("parameter `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("parameter `{name}` must be greater than zero, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("parameter `{name}` must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("step_duration", self.step_duration),
            ("land_area", self.land_area),
            ("normal_population_density", self.normal_population_density),
        ];
        let non_negative = [
            ("incubation_days", self.incubation_days),
            ("bitten_capacity", self.bitten_capacity),
            ("baseline_bite_rate", self.baseline_bite_rate),
            ("conversion_ratio", self.conversion_ratio),
            ("lose_threshold", self.lose_threshold),
        ];

        for &(name, value) in positive.iter().chain(non_negative.iter()) {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
