use serde::{Deserialize, Serialize};

use crate::types::{
    CognitiveProcess, ComponentType, Modality, SlotRole, TaskFormat, TaskType, MAX_THETA, MIN_THETA,
};

/// Regex awarding fixed partial credit when the response matches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialCreditPattern {
    pub pattern: String,
    pub credit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAnswer {
    pub object_id: String,
    pub answer: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub partial_patterns: Vec<PartialCreditPattern>,
}

impl ExpectedAnswer {
    pub fn new(object_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            answer: answer.into(),
            alternatives: Vec::new(),
            partial_patterns: Vec::new(),
        }
    }

    pub fn accepted(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.answer.as_str()).chain(self.alternatives.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledSlot {
    pub slot_id: String,
    pub object_id: String,
    pub component: ComponentType,
    pub content: String,
    pub role: SlotRole,
    pub process: CognitiveProcess,
    pub weight: f64,
    pub difficulty: f64,
    pub discrimination: f64,
    pub mastery_stage: u8,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub slot_id: String,
    pub object_id: String,
    pub weight: f64,
    /// Whether this criterion moves ability estimates.
    pub scored: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rubric {
    pub criteria: Vec<RubricCriterion>,
    pub passing_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedTask {
    pub id: String,
    pub template_id: String,
    pub task_type: TaskType,
    pub format: TaskFormat,
    pub modality: Modality,
    pub slots: Vec<FilledSlot>,
    pub composite_difficulty: f64,
    /// Prompt text supplied by the content collaborator.
    #[serde(default)]
    pub content: Option<String>,
    pub expected_answers: Vec<ExpectedAnswer>,
    pub rubric: Rubric,
}

impl ComposedTask {
    pub fn object_ids(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.object_id.clone()).collect()
    }
}

/// Weight-normalized mean difficulty, clamped to the theta scale.
pub fn composite_difficulty(slots: &[FilledSlot]) -> f64 {
    if slots.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = slots.iter().map(|s| s.weight).sum();
    let mean = if total_weight > f64::EPSILON {
        slots.iter().map(|s| s.weight * s.difficulty).sum::<f64>() / total_weight
    } else {
        slots.iter().map(|s| s.difficulty).sum::<f64>() / slots.len() as f64
    };
    mean.clamp(MIN_THETA, MAX_THETA)
}

pub fn build_rubric(slots: &[FilledSlot]) -> Rubric {
    let total_weight: f64 = slots.iter().map(|s| s.weight).sum();
    let criteria = slots
        .iter()
        .map(|s| RubricCriterion {
            slot_id: s.slot_id.clone(),
            object_id: s.object_id.clone(),
            weight: if total_weight > f64::EPSILON {
                s.weight / total_weight
            } else {
                1.0 / slots.len() as f64
            },
            scored: s.role.theta_multiplier() > 0.0,
            description: format!("{} {} ({})", s.role.as_str(), s.component, s.content),
        })
        .collect();
    Rubric {
        criteria,
        passing_score: 0.6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(weight: f64, difficulty: f64) -> FilledSlot {
        FilledSlot {
            slot_id: "s".into(),
            object_id: "o".into(),
            component: ComponentType::Lex,
            content: "o".into(),
            role: SlotRole::Assessment,
            process: CognitiveProcess::Recall,
            weight,
            difficulty,
            discrimination: 1.0,
            mastery_stage: 0,
            required: true,
        }
    }

    #[test]
    fn test_composite_difficulty_weighted() {
        let d = composite_difficulty(&[slot(3.0, 1.0), slot(1.0, -1.0)]);
        assert!((d - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_composite_difficulty_clamped() {
        assert_eq!(composite_difficulty(&[slot(1.0, 7.0)]), MAX_THETA);
        assert_eq!(composite_difficulty(&[]), 0.0);
    }

    #[test]
    fn test_rubric_weights_normalized() {
        let mut incidental = slot(1.0, 0.0);
        incidental.role = SlotRole::Incidental;
        let rubric = build_rubric(&[slot(3.0, 0.0), incidental]);
        assert!((rubric.criteria[0].weight - 0.75).abs() < 1e-9);
        assert!(rubric.criteria[0].scored);
        assert!(!rubric.criteria[1].scored);
    }
}
