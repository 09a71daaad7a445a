//! Economic value of practicing an object now.
//!
//! Converts an object and its mastery record into a learning value, a cognitive cost, per-role
//! affinities and the urgency / exposure signals the composer trades off.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constraints::ConstraintGraph;
use crate::types::{LanguageObject, MasteryRecord, SlotRole, SynergyMap, MAX_STAGE};

const MS_PER_DAY: f64 = 86_400_000.0;
const NEW_OBJECT_URGENCY: f64 = 0.3;
const EXPOSURE_SATURATION: f64 = 5.0;
const READINESS_BOOST: f64 = 0.2;

/// Remaining learning gain per mastery stage.
const STAGE_GAIN: [f64; 7] = [1.0, 0.95, 0.85, 0.7, 0.5, 0.3, 0.15];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAffinity {
    pub assessment: f64,
    pub practice: f64,
    pub reinforcement: f64,
    pub incidental: f64,
}

impl Default for RoleAffinity {
    fn default() -> Self {
        Self {
            assessment: 1.0,
            practice: 1.0,
            reinforcement: 1.0,
            incidental: 1.0,
        }
    }
}

impl RoleAffinity {
    pub fn get(&self, role: SlotRole) -> f64 {
        match role {
            SlotRole::Assessment => self.assessment,
            SlotRole::Practice => self.practice,
            SlotRole::Reinforcement => self.reinforcement,
            SlotRole::Incidental => self.incidental,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicValue {
    pub learning_value: f64,
    pub cognitive_cost: f64,
    #[serde(default)]
    pub synergy_map: SynergyMap,
    #[serde(default)]
    pub role_affinity: RoleAffinity,
    #[serde(default)]
    pub urgency: f64,
    #[serde(default)]
    pub exposure_balance: f64,
}

impl EconomicValue {
    pub fn synergy_with(&self, object_id: &str) -> f64 {
        self.synergy_map.get(object_id).copied().unwrap_or(0.0)
    }
}

/// Task-scoped join of an object, its mastery record and its economic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectCandidate {
    pub object: LanguageObject,
    #[serde(default)]
    pub mastery: MasteryRecord,
    pub value: EconomicValue,
}

impl ObjectCandidate {
    pub fn id(&self) -> &str {
        &self.object.id
    }
}

pub struct EconomicValueCalculator;

impl EconomicValueCalculator {
    pub fn learning_value(object: &LanguageObject, mastery: &MasteryRecord) -> f64 {
        let intrinsic = 0.35 * unit(object.priority)
            + 0.25 * unit(object.frequency)
            + 0.2 * unit(object.relational_density)
            + 0.2 * unit(object.contextual_contribution);
        let stage = mastery.stage.min(MAX_STAGE) as usize;
        (intrinsic * STAGE_GAIN[stage]).clamp(0.0, 1.0)
    }

    /// Harder objects cost more; automatized ones cost up to half as much.
    pub fn cognitive_cost(object: &LanguageObject, mastery: &MasteryRecord) -> f64 {
        let difficulty = logistic(object.irt_difficulty);
        let base = 0.2 + 0.6 * difficulty;
        (base * (1.0 - 0.5 * mastery.automaticity())).clamp(0.05, 1.0)
    }

    pub fn role_affinity(mastery: &MasteryRecord) -> RoleAffinity {
        let stage = mastery.stage.min(MAX_STAGE) as f64;
        RoleAffinity {
            // peaks mid-way through acquisition
            assessment: bell(stage, 3.0, 1.5),
            practice: bell(stage, 2.0, 1.5),
            reinforcement: bell(stage, 5.0, 1.5),
            incidental: 0.3 + 0.7 * mastery.automaticity(),
        }
    }

    pub fn urgency(mastery: &MasteryRecord, now_ms: i64) -> f64 {
        match mastery.next_review {
            None => NEW_OBJECT_URGENCY,
            Some(due) if due > now_ms => 0.0,
            Some(due) => {
                let overdue_days = (now_ms - due) as f64 / MS_PER_DAY;
                let horizon = mastery.stability.max(1.0);
                (0.5 + 0.5 * (1.0 - (-overdue_days / horizon).exp())).clamp(0.0, 1.0)
            }
        }
    }

    pub fn exposure_balance(mastery: &MasteryRecord) -> f64 {
        1.0 / (1.0 + mastery.exposure_count as f64 / EXPOSURE_SATURATION)
    }

    pub fn value(
        object: &LanguageObject,
        mastery: &MasteryRecord,
        synergy_map: SynergyMap,
        now_ms: i64,
    ) -> EconomicValue {
        EconomicValue {
            learning_value: Self::learning_value(object, mastery),
            cognitive_cost: Self::cognitive_cost(object, mastery),
            synergy_map,
            role_affinity: Self::role_affinity(mastery),
            urgency: Self::urgency(mastery, now_ms),
            exposure_balance: Self::exposure_balance(mastery),
        }
    }

    /// Builds the candidate pool in object order. Objects without a mastery record start fresh.
    pub fn candidates(
        objects: &[LanguageObject],
        mastery: &HashMap<String, MasteryRecord>,
        graph: Option<&ConstraintGraph>,
        now_ms: i64,
    ) -> Vec<ObjectCandidate> {
        objects
            .iter()
            .map(|object| {
                let record = mastery.get(&object.id).cloned().unwrap_or_default();
                let synergy = graph
                    .map(|g| g.synergy_map(&object.id))
                    .unwrap_or_default();
                let value = Self::value(object, &record, synergy, now_ms);
                ObjectCandidate {
                    object: object.clone(),
                    mastery: record,
                    value,
                }
            })
            .collect()
    }

    /// Raises learning value for objects whose next usage context is ready to practice.
    pub fn apply_readiness(candidates: &mut [ObjectCandidate], readiness: &HashMap<String, f64>) {
        for candidate in candidates.iter_mut() {
            if let Some(r) = readiness.get(candidate.id()) {
                let boost = 1.0 + READINESS_BOOST * r.clamp(0.0, 1.0);
                candidate.value.learning_value =
                    (candidate.value.learning_value * boost).clamp(0.0, 1.0);
            }
        }
    }
}

fn unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn bell(x: f64, center: f64, width: f64) -> f64 {
    (-(x - center).powi(2) / (2.0 * width.powi(2))).exp()
}
