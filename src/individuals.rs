//! Per-individual bookkeeping for hosts that track single actors next to
//! the aggregate stocks. The model is passed in on every call; nothing here
//! holds on to it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{EpidemicModel, ModelError, PopulationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: ActorId,
    pub population_type: PopulationType,
    pub bitten_at: Option<u64>,
}

impl Individual {
    pub fn new(id: ActorId, population_type: PopulationType) -> Self {
        Self {
            id,
            population_type,
            bitten_at: None,
        }
    }

    pub fn can_be_bitten(&self) -> bool {
        self.population_type == PopulationType::Susceptible && self.bitten_at.is_none()
    }

    /// Returns false when the individual was not eligible.
    pub fn bite(&mut self, step: u64) -> bool {
        if !self.can_be_bitten() {
            return false;
        }
        self.population_type = PopulationType::Bitten;
        self.bitten_at = Some(step);
        true
    }

    /// True once a bitten individual has incubated for `transformation_days`.
    pub fn should_transform(&self, step: u64, transformation_days: u64) -> bool {
        match (self.population_type, self.bitten_at) {
            (PopulationType::Bitten, Some(bitten_at)) => {
                step.saturating_sub(bitten_at) >= transformation_days
            }
            _ => false,
        }
    }

    pub fn transform_to_zombie(&mut self) {
        self.population_type = PopulationType::Zombie;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiteRecord {
    pub actor: ActorId,
    pub bite_step: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BiteRegistry {
    active: Vec<BiteRecord>,
}

impl BiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the actor already has an active bite.
    pub fn register(&mut self, actor: ActorId, bite_step: u64) -> bool {
        if self.active.iter().any(|record| record.actor == actor) {
            tracing::warn!(actor = actor.raw(), "actor already registered as bitten");
            return false;
        }
        self.active.push(BiteRecord { actor, bite_step });
        true
    }

    pub fn forget(&mut self, actor: ActorId) -> bool {
        let before = self.active.len();
        self.active.retain(|record| record.actor != actor);
        self.active.len() != before
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn records(&self) -> &[BiteRecord] {
        &self.active
    }

    /// Removes and returns the actors whose incubation has run its course,
    /// oldest bite first.
    pub fn take_due(&mut self, step: u64, transformation_days: u64) -> Vec<BiteRecord> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|record| step.saturating_sub(record.bite_step) >= transformation_days);
        self.active = pending;
        due.sort_by_key(|record| (record.bite_step, record.actor));
        due
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PopulationError {
    #[error("unknown actor {0:?}")]
    UnknownActor(ActorId),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Tracked individuals plus their bite records.
#[derive(Debug, Default)]
pub struct Population {
    individuals: HashMap<ActorId, Individual>,
    bites: BiteRegistry,
    next_id: u64,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, population_type: PopulationType) -> ActorId {
        let id = ActorId(self.next_id);
        self.next_id += 1;
        self.individuals
            .insert(id, Individual::new(id, population_type));
        id
    }

    pub fn get(&self, id: ActorId) -> Option<&Individual> {
        self.individuals.get(&id)
    }

    pub fn ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.individuals.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn count(&self, population_type: PopulationType) -> usize {
        self.individuals
            .values()
            .filter(|individual| individual.population_type == population_type)
            .count()
    }

    pub fn bites(&self) -> &BiteRegistry {
        &self.bites
    }

    /// Bites an eligible individual and folds it into the model.
    /// Returns false, leaving the model untouched, if it was not eligible.
    pub fn bite(&mut self, model: &mut EpidemicModel, id: ActorId) -> Result<bool, PopulationError> {
        let step = model.steps_completed();
        let individual = self
            .individuals
            .get_mut(&id)
            .ok_or(PopulationError::UnknownActor(id))?;
        if !individual.can_be_bitten() {
            return Ok(false);
        }
        model.register_individual_bite(step)?;
        individual.bite(step);
        self.bites.register(id, step);
        Ok(true)
    }

    /// Removes the individual from both the host and the model.
    pub fn kill(&mut self, model: &mut EpidemicModel, id: ActorId) -> Result<(), PopulationError> {
        let individual = self
            .individuals
            .get(&id)
            .ok_or(PopulationError::UnknownActor(id))?;
        let step = model.steps_completed();
        model.register_individual_death(
            individual.population_type,
            individual.bitten_at.unwrap_or(step),
            step,
        )?;
        self.individuals.remove(&id);
        self.bites.forget(id);
        Ok(())
    }

    /// Turns every due bitten individual into a zombie and returns them.
    /// Due records whose individual is no longer bitten are dropped.
    pub fn transform_due(&mut self, step: u64, transformation_days: u64) -> Vec<ActorId> {
        let mut transformed = Vec::new();
        for record in self.bites.take_due(step, transformation_days) {
            match self.individuals.get_mut(&record.actor) {
                Some(individual) if individual.should_transform(step, transformation_days) => {
                    individual.transform_to_zombie();
                    transformed.push(record.actor);
                }
                _ => tracing::debug!(actor = record.actor.raw(), "dropped stale bite record"),
            }
        }
        if !transformed.is_empty() {
            tracing::debug!(step, count = transformed.len(), "individuals transformed");
        }
        transformed
    }
}
