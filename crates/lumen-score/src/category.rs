//! Weighted category aggregation.
//!
//! A category's score is the weighted mean of its scorable members.
//! Weights need not sum to 1 -- normalization happens here, at aggregation
//! time. Members that were skipped (`NotApplicable`) or carry zero weight
//! are still reported but contribute nothing to the mean, and a category
//! with no scorable members at all reports `Unscored` instead of a number.

use serde::Serialize;

use crate::check::CheckOutcome;

/// A member's contribution to its category, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct MemberScore {
    pub check: String,
    pub weight: f64,
    /// Normalized score when the member was scorable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A category's aggregate state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CategoryScore {
    Scored { score: f64 },
    /// No member produced a usable score. A valid terminal state, not an
    /// error.
    Unscored,
}

/// The reported result of one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryResult {
    pub score: CategoryScore,
    pub members: Vec<MemberScore>,
}

/// Aggregate `(weight, outcome)` members into a category result.
pub fn aggregate(members: &[(String, f64, &CheckOutcome)]) -> CategoryResult {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut reported = Vec::with_capacity(members.len());

    for (check, weight, outcome) in members {
        let score = match outcome {
            CheckOutcome::Scored { score, .. } => Some(*score),
            CheckOutcome::NotApplicable { .. } => None,
        };

        if let Some(score) = score {
            if *weight > 0.0 {
                weighted_sum += score * weight;
                total_weight += weight;
            }
        }

        reported.push(MemberScore {
            check: check.clone(),
            weight: *weight,
            score,
        });
    }

    let score = if total_weight > 0.0 {
        CategoryScore::Scored {
            score: weighted_sum / total_weight,
        }
    } else {
        CategoryScore::Unscored
    };

    CategoryResult {
        score,
        members: reported,
    }
}
