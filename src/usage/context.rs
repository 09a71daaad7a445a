use serde::{Deserialize, Serialize};

use crate::types::UsageContext;

const FEATURES: usize = 4;

fn features(context: &UsageContext) -> [(&'static str, &str); FEATURES] {
    [
        ("domain", context.domain.as_str()),
        ("register", context.register.as_str()),
        ("modality", context.modality.as_str()),
        ("genre", context.genre.as_str()),
    ]
}

/// Jaccard overlap of the two contexts' (feature, value) sets.
pub fn context_similarity(a: &UsageContext, b: &UsageContext) -> f64 {
    let shared = features(a)
        .iter()
        .zip(features(b).iter())
        .filter(|(x, y)| x.1 == y.1)
        .count();
    shared as f64 / (2 * FEATURES - shared) as f64
}

pub fn context_distance(a: &UsageContext, b: &UsageContext) -> f64 {
    1.0 - context_similarity(a, b)
}

/// Exposure history of one object in one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRecord {
    pub context: UsageContext,
    pub exposure_count: u32,
    /// Running mean of observed scores.
    pub success_rate: f64,
    pub last_exposure: i64,
}

impl ContextRecord {
    pub fn new(context: UsageContext) -> Self {
        Self {
            context,
            exposure_count: 0,
            success_rate: 0.0,
            last_exposure: 0,
        }
    }

    pub fn observe(&mut self, score: f64, timestamp: i64) {
        let n = self.exposure_count as f64;
        self.success_rate = (self.success_rate * n + score.clamp(0.0, 1.0)) / (n + 1.0);
        self.exposure_count = self.exposure_count.saturating_add(1);
        self.last_exposure = self.last_exposure.max(timestamp);
    }
}
