//! Weight allocation rules for evaluation criteria.
//!
//! The weights of all criteria of one class add up to at most
//! [`MAX_TOTAL_WEIGHT`]. Everything here works on a snapshot of criteria and
//! never touches the database; [`super::criteria::CriterionService`] pairs it
//! with a guarded write.

use db::models::criterion::Criterion;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub const MAX_TOTAL_WEIGHT: f64 = 100.0;

/// Slack for binary floating point, so 33.3 + 33.3 + 33.4 still fits.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("Weight must be between 0 and 100")]
    OutOfRange { proposed: f64 },
    #[error(
        "The sum of weights cannot exceed 100%. Current sum: {}%. Available: {}%",
        rounded(.current_sum),
        rounded(.available)
    )]
    Exceeded { current_sum: f64, available: f64 },
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct WeightAllocation {
    pub current_sum: f64,
    pub available: f64,
    pub total_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct WeightSummary {
    pub total: f64,
    pub available: f64,
}

impl WeightSummary {
    pub fn of(snapshot: &[Criterion], class_id: Uuid) -> Self {
        let total = sum_weights(snapshot, class_id, None);
        Self {
            total,
            available: MAX_TOTAL_WEIGHT - total,
        }
    }
}

fn sum_weights(snapshot: &[Criterion], class_id: Uuid, excluding: Option<Uuid>) -> f64 {
    snapshot
        .iter()
        .filter(|c| c.class_id == class_id && Some(c.id) != excluding)
        .map(|c| c.weight)
        .sum()
}

/// Weight still free in `class_id`, ignoring the criterion `excluding`.
pub fn compute_available(snapshot: &[Criterion], class_id: Uuid, excluding: Option<Uuid>) -> f64 {
    MAX_TOTAL_WEIGHT - sum_weights(snapshot, class_id, excluding)
}

pub fn validate_new_weight(
    snapshot: &[Criterion],
    class_id: Uuid,
    proposed: f64,
    excluding: Option<Uuid>,
) -> Result<WeightAllocation, WeightError> {
    if !proposed.is_finite() || !(0.0..=MAX_TOTAL_WEIGHT).contains(&proposed) {
        return Err(WeightError::OutOfRange { proposed });
    }

    let current_sum = sum_weights(snapshot, class_id, excluding);
    let available = MAX_TOTAL_WEIGHT - current_sum;
    if current_sum + proposed > MAX_TOTAL_WEIGHT + WEIGHT_TOLERANCE {
        return Err(WeightError::Exceeded {
            current_sum,
            available,
        });
    }

    Ok(WeightAllocation {
        current_sum,
        available,
        total_after: current_sum + proposed,
    })
}

/// Two-decimal rounding for messages only.
pub fn round_weight(weight: f64) -> f64 {
    (weight * 100.0).round() / 100.0
}

fn rounded(weight: &f64) -> f64 {
    round_weight(*weight)
}
