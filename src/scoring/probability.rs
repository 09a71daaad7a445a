//! Response probability under the three multidimensional interaction models.

use serde::{Deserialize, Serialize};

use super::qmatrix::{composite_difficulty, WeightedTarget};
use crate::types::UserThetaProfile;

pub const GUESS_RATE: f64 = 0.2;
pub const SLIP_RATE: f64 = 0.1;

/// How component abilities combine to produce a correct response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionModel {
    /// Strength in one component offsets weakness in another.
    Compensatory,
    /// Every component must clear its target's difficulty.
    Conjunctive,
    /// Any single component clearing its difficulty suffices.
    Disjunctive,
}

impl InteractionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compensatory => "compensatory",
            Self::Conjunctive => "conjunctive",
            Self::Disjunctive => "disjunctive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compensatory" => Some(Self::Compensatory),
            "conjunctive" => Some(Self::Conjunctive),
            "disjunctive" => Some(Self::Disjunctive),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Probability of a correct response. An empty target list is uninformative (0.5).
pub fn expected_probability(
    theta: &UserThetaProfile,
    targets: &[WeightedTarget],
    model: InteractionModel,
) -> f64 {
    if targets.is_empty() {
        return 0.5;
    }
    match model {
        InteractionModel::Compensatory => {
            let ability: f64 = targets
                .iter()
                .map(|t| t.discrimination * t.weight * theta.get(t.component))
                .sum();
            logistic(ability - composite_difficulty(targets))
        }
        InteractionModel::Conjunctive => {
            if targets.iter().all(|t| clears(theta, t)) {
                1.0 - SLIP_RATE
            } else {
                GUESS_RATE
            }
        }
        InteractionModel::Disjunctive => {
            if targets.iter().any(|t| clears(theta, t)) {
                1.0 - SLIP_RATE
            } else {
                GUESS_RATE
            }
        }
    }
}

/// Thresholds use the raw item difficulty; process offsets only shift the compensatory composite.
fn clears(theta: &UserThetaProfile, target: &WeightedTarget) -> bool {
    theta.get(target.component) >= target.difficulty
}
