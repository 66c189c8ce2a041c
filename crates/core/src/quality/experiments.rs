//! A/B test registry: validation, lifecycle, weighted variant selection and result tracking.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::experiment::{
    AbTestConfiguration, AbTestId, AbTestStatus, AbTestVariant, LeadProfile, ResponseStrategy,
    Segmentation, VariantAssignment, VariantOutcome, VariantPerformance,
};

pub const TOTAL_WEIGHT: u32 = 100;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExperimentError {
    #[error("A/B test name must not be empty")]
    EmptyName,
    #[error("an A/B test needs at least {min} variants, got {actual}")]
    TooFewVariants { min: usize, actual: usize },
    #[error("variant weights must sum to exactly 100, got {total}")]
    WeightsDoNotSumTo100 { total: u32 },
    #[error("variant `{variant_id}` has zero traffic weight")]
    ZeroWeight { variant_id: String },
    #[error("variant id `{0}` is used more than once")]
    DuplicateVariant(String),
    #[error("required sample size {actual} is below the minimum of {min}")]
    SampleSizeTooSmall { min: u64, actual: u64 },
    #[error("A/B test `{0}` was not found")]
    TestNotFound(String),
    #[error("variant `{variant_id}` is not part of A/B test `{test_id}`")]
    VariantNotFound { test_id: String, variant_id: String },
    #[error("A/B test `{test_id}` cannot move from {from:?} to {to:?}")]
    InvalidTransition { test_id: String, from: AbTestStatus, to: AbTestStatus },
    #[error("A/B test `{test_id}` is {status:?} and does not accept outcomes")]
    NotActive { test_id: String, status: AbTestStatus },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariant {
    pub id: String,
    pub name: String,
    pub weight: u8,
    pub strategy: ResponseStrategy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAbTest {
    pub name: String,
    pub segmentation: Segmentation,
    pub variants: Vec<NewVariant>,
    pub required_sample_size: u64,
}

/// State of a test after one outcome was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsUpdate {
    pub status: AbTestStatus,
    pub total_impressions: u64,
    pub winner_variant_id: Option<String>,
}

#[derive(Debug)]
pub struct ExperimentRegistry {
    min_sample_size: u64,
    min_variants: usize,
    tests: Mutex<Vec<AbTestConfiguration>>,
}

impl ExperimentRegistry {
    pub fn new(min_sample_size: u64, min_variants: usize) -> Self {
        Self { min_sample_size, min_variants, tests: Mutex::new(Vec::new()) }
    }

    pub fn validate(&self, new_test: &NewAbTest) -> Result<(), ExperimentError> {
        if new_test.name.trim().is_empty() {
            return Err(ExperimentError::EmptyName);
        }

        if new_test.variants.len() < self.min_variants {
            return Err(ExperimentError::TooFewVariants {
                min: self.min_variants,
                actual: new_test.variants.len(),
            });
        }

        let mut seen = HashSet::new();
        for variant in &new_test.variants {
            if !seen.insert(variant.id.as_str()) {
                return Err(ExperimentError::DuplicateVariant(variant.id.clone()));
            }
            if variant.weight == 0 {
                return Err(ExperimentError::ZeroWeight { variant_id: variant.id.clone() });
            }
        }

        let total: u32 = new_test.variants.iter().map(|variant| u32::from(variant.weight)).sum();
        if total != TOTAL_WEIGHT {
            return Err(ExperimentError::WeightsDoNotSumTo100 { total });
        }

        if new_test.required_sample_size < self.min_sample_size {
            return Err(ExperimentError::SampleSizeTooSmall {
                min: self.min_sample_size,
                actual: new_test.required_sample_size,
            });
        }

        Ok(())
    }

    /// Validates and stores a new test in draft.
    pub fn create(&self, new_test: NewAbTest, now: DateTime<Utc>) -> Result<AbTestId, ExperimentError> {
        self.validate(&new_test)?;

        let id = AbTestId(Uuid::new_v4().to_string());
        let variants = new_test
            .variants
            .into_iter()
            .map(|variant| AbTestVariant {
                id: variant.id,
                name: variant.name,
                weight: variant.weight,
                strategy: variant.strategy,
                performance: VariantPerformance::default(),
            })
            .collect();

        let test = AbTestConfiguration {
            id: id.clone(),
            name: new_test.name,
            status: AbTestStatus::Draft,
            segmentation: new_test.segmentation,
            variants,
            required_sample_size: new_test.required_sample_size,
            created_at: now,
            started_at: None,
            completed_at: None,
            winner_variant_id: None,
        };

        info!(
            event_name = "experiment.created",
            test_id = %id,
            variants = test.variants.len(),
            required_sample_size = test.required_sample_size,
            "A/B test created"
        );
        self.lock().push(test);
        Ok(id)
    }

    /// Draft or paused to active. The first start stamps `started_at`.
    pub fn start(&self, test_id: &AbTestId, now: DateTime<Utc>) -> Result<(), ExperimentError> {
        let mut tests = self.lock();
        let test = find_mut(&mut tests, test_id)?;

        match test.status {
            AbTestStatus::Draft | AbTestStatus::Paused => {
                test.status = AbTestStatus::Active;
                if test.started_at.is_none() {
                    test.started_at = Some(now);
                }
                info!(event_name = "experiment.started", test_id = %test_id, "A/B test started");
                Ok(())
            }
            from => Err(ExperimentError::InvalidTransition {
                test_id: test_id.0.clone(),
                from,
                to: AbTestStatus::Active,
            }),
        }
    }

    pub fn pause(&self, test_id: &AbTestId) -> Result<(), ExperimentError> {
        let mut tests = self.lock();
        let test = find_mut(&mut tests, test_id)?;

        if test.status != AbTestStatus::Active {
            return Err(ExperimentError::InvalidTransition {
                test_id: test_id.0.clone(),
                from: test.status,
                to: AbTestStatus::Paused,
            });
        }
        test.status = AbTestStatus::Paused;
        info!(event_name = "experiment.paused", test_id = %test_id, "A/B test paused");
        Ok(())
    }

    /// Applies one outcome to a variant of an active test and concludes the test once the
    /// required sample size is reached.
    pub fn update_results(
        &self,
        test_id: &AbTestId,
        variant_id: &str,
        outcome: VariantOutcome,
        now: DateTime<Utc>,
    ) -> Result<ResultsUpdate, ExperimentError> {
        let mut tests = self.lock();
        let test = find_mut(&mut tests, test_id)?;

        if test.status != AbTestStatus::Active {
            return Err(ExperimentError::NotActive { test_id: test_id.0.clone(), status: test.status });
        }

        let variant = test.variants.iter_mut().find(|variant| variant.id == variant_id).ok_or_else(
            || ExperimentError::VariantNotFound {
                test_id: test_id.0.clone(),
                variant_id: variant_id.to_string(),
            },
        )?;
        apply_outcome(&mut variant.performance, &outcome);

        let total_impressions = test.total_impressions();
        if total_impressions >= test.required_sample_size {
            conclude(test, now);
        }

        Ok(ResultsUpdate {
            status: test.status,
            total_impressions,
            winner_variant_id: test.winner_variant_id.clone(),
        })
    }

    /// Concludes an active or paused test ahead of its sample size.
    pub fn complete(
        &self,
        test_id: &AbTestId,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ExperimentError> {
        let mut tests = self.lock();
        let test = find_mut(&mut tests, test_id)?;

        if !matches!(test.status, AbTestStatus::Active | AbTestStatus::Paused) {
            return Err(ExperimentError::InvalidTransition {
                test_id: test_id.0.clone(),
                from: test.status,
                to: AbTestStatus::Completed,
            });
        }
        conclude(test, now);
        Ok(test.winner_variant_id.clone())
    }

    pub fn get(&self, test_id: &AbTestId) -> Option<AbTestConfiguration> {
        self.lock().iter().find(|test| &test.id == test_id).cloned()
    }

    pub fn list(&self) -> Vec<AbTestConfiguration> {
        self.lock().clone()
    }

    /// Picks a variant from the first active test whose segmentation matches the lead.
    pub fn select_variant_with<R: Rng + ?Sized>(
        &self,
        lead: &LeadProfile,
        rng: &mut R,
    ) -> Option<VariantAssignment> {
        let tests = self.lock();
        let test = tests
            .iter()
            .find(|test| test.status == AbTestStatus::Active && test.segmentation.matches(lead))?;

        let draw: u8 = rng.gen_range(0..100);
        let variant = pick_variant(&test.variants, draw)?;
        Some(VariantAssignment {
            test_id: test.id.clone(),
            variant_id: variant.id.clone(),
            strategy: variant.strategy.clone(),
        })
    }

    pub fn select_variant(&self, lead: &LeadProfile) -> Option<VariantAssignment> {
        self.select_variant_with(lead, &mut rand::thread_rng())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AbTestConfiguration>> {
        match self.tests.lock() {
            Ok(tests) => tests,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Cumulative-weight scan: the first variant whose running weight exceeds `draw` wins.
pub fn pick_variant(variants: &[AbTestVariant], draw: u8) -> Option<&AbTestVariant> {
    let mut cumulative = 0u32;
    for variant in variants {
        cumulative += u32::from(variant.weight);
        if u32::from(draw) < cumulative {
            return Some(variant);
        }
    }
    variants.last()
}

/// Highest response rate; ties go to more conversions, then to declaration order.
pub fn winner(variants: &[AbTestVariant]) -> Option<&AbTestVariant> {
    let mut best: Option<&AbTestVariant> = None;
    for variant in variants {
        let better = match best {
            None => true,
            Some(current) => {
                let rate = variant.performance.response_rate();
                let current_rate = current.performance.response_rate();
                rate > current_rate
                    || (rate == current_rate
                        && variant.performance.conversions > current.performance.conversions)
            }
        };
        if better {
            best = Some(variant);
        }
    }
    best
}

fn apply_outcome(performance: &mut VariantPerformance, outcome: &VariantOutcome) {
    if outcome.impression {
        performance.impressions += 1;
    }
    if outcome.responded {
        performance.responses += 1;
    }
    if outcome.converted {
        performance.conversions += 1;
    }
    if outcome.escalated {
        performance.escalations += 1;
    }
    if let Some(response_time_ms) = outcome.response_time_ms {
        performance.total_response_time_ms += response_time_ms;
        performance.timed_responses += 1;
    }
}

fn conclude(test: &mut AbTestConfiguration, now: DateTime<Utc>) {
    test.status = AbTestStatus::Completed;
    test.completed_at = Some(now);
    test.winner_variant_id = winner(&test.variants).map(|variant| variant.id.clone());

    info!(
        event_name = "experiment.concluded",
        test_id = %test.id,
        total_impressions = test.total_impressions(),
        winner = test.winner_variant_id.as_deref().unwrap_or(""),
        "A/B test concluded"
    );
}

fn find_mut<'a>(
    tests: &'a mut [AbTestConfiguration],
    test_id: &AbTestId,
) -> Result<&'a mut AbTestConfiguration, ExperimentError> {
    tests
        .iter_mut()
        .find(|test| &test.id == test_id)
        .ok_or_else(|| ExperimentError::TestNotFound(test_id.0.clone()))
}
