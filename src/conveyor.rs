//! Incubation delay pipeline for bitten people.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// People bitten in the same step, sharing one incubation countdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub amount_of_people: f64,
    pub remaining_days: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConveyorError {
    #[error("invalid argument `{name}`: {value} (must be finite and non-negative)")]
    InvalidArgument { name: &'static str, value: f64 },
}

fn check_non_negative(name: &'static str, value: f64) -> Result<f64, ConveyorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConveyorError::InvalidArgument { name, value })
    }
}

/// All active cohorts. Every cohort ages by one day per [`advance_one_day`],
/// so their order carries no meaning.
///
/// Capacity is the caller's business; `admit` takes whatever it is given.
///
/// [`advance_one_day`]: IncubationConveyor::advance_one_day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncubationConveyor {
    cohorts: Vec<Cohort>,
}

impl IncubationConveyor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cohorts in admission order
    pub fn cohorts(&self) -> &[Cohort] {
        &self.cohorts
    }

    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    /// Total people across all cohorts.
    pub fn content(&self) -> f64 {
        self.cohorts.iter().map(|c| c.amount_of_people).sum()
    }

    /// Ages every cohort by one day and returns the people whose
    /// incubation has elapsed.
    pub fn advance_one_day(&mut self) -> f64 {
        let mut expired = 0.0;
        self.cohorts.retain_mut(|cohort| {
            cohort.remaining_days -= 1.0;
            if cohort.remaining_days <= 0.0 {
                expired += cohort.amount_of_people;
                false
            } else {
                true
            }
        });
        expired
    }

    /// Appends a cohort that expires after `delay_days` days. Rejects
    /// negative or non-finite arguments.
    pub fn admit(&mut self, amount: f64, delay_days: f64) -> Result<(), ConveyorError> {
        let amount_of_people = check_non_negative("amount", amount)?;
        let remaining_days = check_non_negative("delay_days", delay_days)?;
        self.cohorts.push(Cohort {
            amount_of_people,
            remaining_days,
        });
        Ok(())
    }

    /// Takes `amount` people out of the cohort whose remaining days truncate
    /// to `days`. Returns how many were actually removed; a missing cohort
    /// removes nothing.
    pub fn remove_from_cohort_with_remaining_days(
        &mut self,
        days: i64,
        amount: f64,
    ) -> Result<f64, ConveyorError> {
        let amount = check_non_negative("amount", amount)?;
        let Some(cohort) = self
            .cohorts
            .iter_mut()
            .find(|c| c.remaining_days.trunc() as i64 == days)
        else {
            return Ok(0.0);
        };
        let removed = amount.min(cohort.amount_of_people);
        cohort.amount_of_people -= removed;
        Ok(removed)
    }
}
