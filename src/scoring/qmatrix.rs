//! Q-matrix: which components a task type exercises, and how much.

use serde::{Deserialize, Serialize};

use super::probability::InteractionModel;
use crate::composition::FilledSlot;
use crate::types::{
    CognitiveProcess, ComponentType, SlotRole, TaskType, MAX_THETA, MIN_THETA,
};

const PRIMARY_BONUS: f64 = 1.5;
const PRIMARY_FLOOR: f64 = 0.5;
/// Keeps every target visible even when its component is off-profile for the task type.
const MIN_Q_WEIGHT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QMatrixRow {
    pub task_type: TaskType,
    /// Indexed by `ComponentType::index`.
    pub weights: [f64; 5],
    pub interaction_model: InteractionModel,
}

impl QMatrixRow {
    pub fn weight(&self, component: ComponentType) -> f64 {
        self.weights[component.index()]
    }

    pub fn for_task(task_type: TaskType) -> Self {
        use InteractionModel::*;
        //                                         PHON  MORPH LEX   SYNT  PRAG
        let (weights, interaction_model) = match task_type {
            TaskType::Pronunciation => ([0.70, 0.10, 0.20, 0.00, 0.00], Compensatory),
            TaskType::WordFormation => ([0.05, 0.60, 0.30, 0.05, 0.00], Conjunctive),
            TaskType::Vocabulary => ([0.05, 0.15, 0.70, 0.05, 0.05], Compensatory),
            TaskType::Collocation => ([0.00, 0.10, 0.50, 0.30, 0.10], Conjunctive),
            TaskType::SentenceCompletion => ([0.00, 0.15, 0.35, 0.40, 0.10], Compensatory),
            TaskType::ErrorCorrection => ([0.00, 0.30, 0.20, 0.50, 0.00], Conjunctive),
            TaskType::Translation => ([0.00, 0.15, 0.40, 0.30, 0.15], Compensatory),
            TaskType::DialogueCompletion => ([0.05, 0.00, 0.25, 0.20, 0.50], Disjunctive),
            TaskType::RegisterShift => ([0.00, 0.05, 0.30, 0.15, 0.50], Compensatory),
        };
        Self {
            task_type,
            weights,
            interaction_model,
        }
    }
}

/// One object to be scored, before weights are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationTarget {
    pub object_id: String,
    pub component: ComponentType,
    pub difficulty: f64,
    pub discrimination: f64,
    pub process: CognitiveProcess,
    pub role: SlotRole,
    pub primary: bool,
}

impl From<&FilledSlot> for CalibrationTarget {
    fn from(slot: &FilledSlot) -> Self {
        Self {
            object_id: slot.object_id.clone(),
            component: slot.component,
            difficulty: slot.difficulty,
            discrimination: slot.discrimination,
            process: slot.process,
            role: slot.role,
            primary: slot.role == SlotRole::Assessment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedTarget {
    pub object_id: String,
    pub component: ComponentType,
    pub weight: f64,
    pub difficulty: f64,
    pub discrimination: f64,
    pub process: CognitiveProcess,
    pub role: SlotRole,
    pub primary: bool,
}

impl WeightedTarget {
    pub fn adjusted_difficulty(&self) -> f64 {
        self.difficulty + self.process.difficulty_offset()
    }
}

pub fn allocate_weights(targets: &[CalibrationTarget], task_type: TaskType) -> Vec<WeightedTarget> {
    if targets.is_empty() {
        return Vec::new();
    }
    let row = QMatrixRow::for_task(task_type);

    let raw: Vec<f64> = targets
        .iter()
        .map(|t| {
            let bonus = if t.primary { PRIMARY_BONUS } else { 1.0 };
            row.weight(t.component).max(MIN_Q_WEIGHT) * bonus / t.process.multiplier()
        })
        .collect();
    let total: f64 = raw.iter().sum();
    let mut weights: Vec<f64> = if total > f64::EPSILON {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / targets.len() as f64; targets.len()]
    };

    let primary_share: f64 = weights
        .iter()
        .zip(targets)
        .filter(|(_, t)| t.primary)
        .map(|(w, _)| *w)
        .sum();
    let secondary_share = 1.0 - primary_share;
    if primary_share > 0.0 && primary_share < PRIMARY_FLOOR && secondary_share > f64::EPSILON {
        let primary_scale = PRIMARY_FLOOR / primary_share;
        let secondary_scale = (1.0 - PRIMARY_FLOOR) / secondary_share;
        for (w, t) in weights.iter_mut().zip(targets) {
            *w *= if t.primary {
                primary_scale
            } else {
                secondary_scale
            };
        }
    }

    targets
        .iter()
        .zip(weights)
        .map(|(t, weight)| WeightedTarget {
            object_id: t.object_id.clone(),
            component: t.component,
            weight,
            difficulty: t.difficulty,
            discrimination: t.discrimination,
            process: t.process,
            role: t.role,
            primary: t.primary,
        })
        .collect()
}

/// Weight-and-process adjusted mean difficulty, clamped to the theta scale.
pub fn composite_difficulty(targets: &[WeightedTarget]) -> f64 {
    let total: f64 = targets.iter().map(|t| t.weight).sum();
    if total <= f64::EPSILON {
        return 0.0;
    }
    let weighted: f64 = targets
        .iter()
        .map(|t| t.weight * t.adjusted_difficulty())
        .sum();
    (weighted / total).clamp(MIN_THETA, MAX_THETA)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str, component: ComponentType, primary: bool) -> CalibrationTarget {
        CalibrationTarget {
            object_id: id.into(),
            component,
            difficulty: 0.0,
            discrimination: 1.0,
            process: CognitiveProcess::Recall,
            role: if primary {
                SlotRole::Assessment
            } else {
                SlotRole::Practice
            },
            primary,
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let targets = [
            target("a", ComponentType::Lex, true),
            target("b", ComponentType::Synt, false),
            target("c", ComponentType::Morph, false),
        ];
        let weighted = allocate_weights(&targets, TaskType::SentenceCompletion);
        let sum: f64 = weighted.iter().map(|t| t.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_primary_floor_applied() {
        // a PHON primary in a vocabulary task would otherwise hold a tiny share
        let targets = [
            target("p", ComponentType::Phon, true),
            target("l1", ComponentType::Lex, false),
            target("l2", ComponentType::Lex, false),
        ];
        let weighted = allocate_weights(&targets, TaskType::Vocabulary);
        assert!((weighted[0].weight - 0.5).abs() < 1e-9);
        assert!((weighted[1].weight - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_process_lowers_weight() {
        let mut hard = target("b", ComponentType::Lex, false);
        hard.process = CognitiveProcess::Transformation;
        let weighted = allocate_weights(
            &[target("a", ComponentType::Lex, false), hard],
            TaskType::Vocabulary,
        );
        assert!(weighted[0].weight > weighted[1].weight);
    }

    #[test]
    fn test_composite_difficulty_uses_offsets() {
        let mut t = target("a", ComponentType::Lex, true);
        t.difficulty = 1.0;
        t.process = CognitiveProcess::Recognition;
        let weighted = allocate_weights(&[t], TaskType::Vocabulary);
        assert!((composite_difficulty(&weighted) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_every_task_type_has_a_row() {
        for task_type in [
            TaskType::Pronunciation,
            TaskType::WordFormation,
            TaskType::Vocabulary,
            TaskType::Collocation,
            TaskType::SentenceCompletion,
            TaskType::ErrorCorrection,
            TaskType::Translation,
            TaskType::DialogueCompletion,
            TaskType::RegisterShift,
        ] {
            let row = QMatrixRow::for_task(task_type);
            assert!((row.weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
