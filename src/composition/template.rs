use serde::{Deserialize, Serialize};

use crate::types::{CognitiveProcess, ComponentType, Modality, SlotRole, TaskFormat, TaskType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynergyRequirement {
    pub slot_id: String,
    #[serde(default)]
    pub min_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_automaticity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_synergy_with: Option<SynergyRequirement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSlot {
    pub id: String,
    pub accepted_components: Vec<ComponentType>,
    pub role: SlotRole,
    pub weight: f64,
    pub process: CognitiveProcess,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub constraints: SlotConstraints,
}

fn default_required() -> bool {
    true
}

impl ObjectSlot {
    pub fn new(id: impl Into<String>, components: &[ComponentType], role: SlotRole) -> Self {
        Self {
            id: id.into(),
            accepted_components: components.to_vec(),
            role,
            weight: 1.0,
            process: CognitiveProcess::Recall,
            required: true,
            constraints: SlotConstraints::default(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_process(mut self, process: CognitiveProcess) -> Self {
        self.process = process;
        self
    }

    pub fn with_constraints(mut self, constraints: SlotConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn accepts(&self, component: ComponentType) -> bool {
        self.accepted_components.contains(&component)
    }

    /// Negative or non-finite weights are treated as zero.
    pub fn effective_weight(&self) -> f64 {
        if self.weight.is_finite() {
            self.weight.max(0.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub format: TaskFormat,
    #[serde(default)]
    pub modality: Modality,
    pub slots: Vec<ObjectSlot>,
}

impl TaskTemplate {
    pub fn new(id: impl Into<String>, task_type: TaskType, slots: Vec<ObjectSlot>) -> Self {
        Self {
            id: id.into(),
            task_type,
            format: TaskFormat::default(),
            modality: Modality::default(),
            slots,
        }
    }

    pub fn slot(&self, slot_id: &str) -> Option<&ObjectSlot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    pub fn required_weight(&self) -> f64 {
        self.slots
            .iter()
            .filter(|s| s.required)
            .map(ObjectSlot::effective_weight)
            .sum()
    }
}
