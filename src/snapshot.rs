use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::conveyor::Cohort;
use crate::model::{EpidemicModel, OutcomeState, Stocks};

#[derive(Debug, Serialize)]
pub struct ModelSnapshot<'a> {
    pub scenario: &'a str,
    pub step: u64,
    pub written_at: String,
    pub stocks: Stocks,
    pub cohorts: &'a [Cohort],
    pub outcome: OutcomeState,
}

impl<'a> ModelSnapshot<'a> {
    pub fn capture(scenario: &'a str, model: &'a EpidemicModel) -> Self {
        Self {
            scenario,
            step: model.steps_completed(),
            written_at: chrono::Local::now().to_rfc3339(),
            stocks: model.stocks(),
            cohorts: model.conveyor().cohorts(),
            outcome: model.outcome_state(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_steps: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_steps: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_steps,
        }
    }

    pub fn interval_steps(&self) -> u64 {
        self.interval_steps
    }

    pub fn maybe_write(
        &self,
        model: &EpidemicModel,
        scenario_name: &str,
    ) -> Result<Option<PathBuf>, SnapshotError> {
        let step = model.steps_completed();
        if self.interval_steps == 0 || step == 0 || step % self.interval_steps != 0 {
            return Ok(None);
        }

        let dir = self.output_dir.join(scenario_name);
        fs::create_dir_all(&dir)?;
        let file_path = dir.join(format!("step_{step:06}.json"));
        let json = serde_json::to_string_pretty(&ModelSnapshot::capture(scenario_name, model))?;
        fs::write(&file_path, json)?;
        tracing::debug!(step, path = %file_path.display(), "wrote snapshot");
        Ok(Some(file_path))
    }
}
