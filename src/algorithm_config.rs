use serde::{Deserialize, Serialize};

use crate::scoring::probability::InteractionModel;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionOptimizationConfig {
    pub max_cognitive_load: f64,
    pub synergy_weight: f64,
    pub urgency_weight: f64,
    pub exposure_balance_weight: f64,
    pub min_learning_value: f64,
}

impl Default for CompositionOptimizationConfig {
    fn default() -> Self {
        Self {
            max_cognitive_load: 5.0,
            synergy_weight: 0.3,
            urgency_weight: 0.2,
            exposure_balance_weight: 0.1,
            min_learning_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Lenient,
    #[default]
    Normal,
    Strict,
}

impl Strictness {
    /// (high, medium) similarity thresholds.
    pub fn thresholds(&self) -> (f64, f64) {
        match self {
            Self::Lenient => (0.85, 0.60),
            Self::Normal => (0.90, 0.70),
            Self::Strict => (0.95, 0.80),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Some(Self::Lenient),
            "normal" => Some(Self::Normal),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiObjectScoringConfig {
    pub strictness: Strictness,
    pub partial_credit_enabled: bool,
    pub learning_rate: f64,
    /// Overrides the Q-matrix interaction model when set.
    pub interaction_model: Option<InteractionModel>,
}

impl Default for MultiObjectScoringConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Normal,
            partial_credit_enabled: true,
            learning_rate: 0.1,
            interaction_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepresentativeSamplingStrategy {
    pub goal_weight: f64,
    pub diversity_weight: f64,
    pub transfer_weight: f64,
    pub min_samples_for_generalization: usize,
}

impl Default for RepresentativeSamplingStrategy {
    fn default() -> Self {
        Self {
            goal_weight: 0.4,
            diversity_weight: 0.3,
            transfer_weight: 0.3,
            min_samples_for_generalization: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationConfig {
    pub composition: CompositionOptimizationConfig,
    pub scoring: MultiObjectScoringConfig,
    pub sampling: RepresentativeSamplingStrategy,
}
