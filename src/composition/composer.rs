//! Economic slot-filling optimizer.
//!
//! Required slots are filled first, in declared order, each with the best-scoring eligible
//! candidate. Optional slots follow while the cognitive-load budget allows. Ties keep the
//! candidate seen first, so identical inputs always produce the same task.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::economics::ObjectCandidate;
use super::task::{build_rubric, composite_difficulty, ComposedTask, ExpectedAnswer, FilledSlot};
use super::template::{ObjectSlot, TaskTemplate};
use crate::algorithm_config::CompositionOptimizationConfig;
use crate::constraints::{
    propagate, validate_assignments, ConstraintGraph, ConstraintKind, PropagationTrigger,
    SlotRestriction,
};

const COST_PENALTY: f64 = 0.5;
const REQUIRED_BONUS: f64 = 1.0;
const BUDGET_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum CompositionError {
    #[error("template {0} has no slots")]
    EmptyTemplate(String),
    #[error("cognitive load budget must be finite and non-negative, got {0}")]
    InvalidBudget(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    CognitiveOverload,
    ConstraintExcluded,
    BelowMinValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedObject {
    pub object_id: String,
    pub slot_id: Option<String>,
    pub reason: ExclusionReason,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResult {
    pub task: ComposedTask,
    pub total_value: f64,
    pub total_cost: f64,
    pub efficiency: f64,
    pub synergy_bonus: f64,
    pub excluded_objects: Vec<ExcludedObject>,
    /// Unsatisfied hard edges among the assigned objects.
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionFailure {
    pub template_id: String,
    pub slot_id: String,
    pub reason: String,
    pub excluded_objects: Vec<ExcludedObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompositionOutcome {
    Composed(CompositionResult),
    Infeasible(CompositionFailure),
}

impl CompositionOutcome {
    pub fn composed(&self) -> Option<&CompositionResult> {
        match self {
            Self::Composed(result) => Some(result),
            Self::Infeasible(_) => None,
        }
    }

    pub fn into_result(self) -> Result<CompositionResult, CompositionFailure> {
        match self {
            Self::Composed(result) => Ok(result),
            Self::Infeasible(failure) => Err(failure),
        }
    }
}

struct Assignment {
    slot_index: usize,
    candidate_index: usize,
    value: f64,
    cost: f64,
}

#[derive(Default)]
struct ComposeState {
    used: HashSet<usize>,
    assignments: Vec<Assignment>,
    assigned_by_slot: HashMap<String, String>,
    constraint_excluded: HashSet<String>,
    required_by_constraint: HashSet<String>,
    preferences: HashMap<String, f64>,
    restrictions: Vec<SlotRestriction>,
    excluded: Vec<ExcludedObject>,
    total_cost: f64,
}

struct Ranked {
    candidate_index: usize,
    score: f64,
    value: f64,
    cost: f64,
}

pub struct TaskComposer<'g> {
    config: CompositionOptimizationConfig,
    graph: Option<&'g ConstraintGraph>,
}

impl<'g> TaskComposer<'g> {
    pub fn new(config: CompositionOptimizationConfig) -> Self {
        Self {
            config,
            graph: None,
        }
    }

    pub fn with_constraints(mut self, graph: &'g ConstraintGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn config(&self) -> &CompositionOptimizationConfig {
        &self.config
    }

    pub fn compose(
        &self,
        template: &TaskTemplate,
        candidates: &[ObjectCandidate],
        cognitive_load_budget: f64,
    ) -> Result<CompositionOutcome, CompositionError> {
        if template.slots.is_empty() {
            return Err(CompositionError::EmptyTemplate(template.id.clone()));
        }
        if !cognitive_load_budget.is_finite() || cognitive_load_budget < 0.0 {
            return Err(CompositionError::InvalidBudget(cognitive_load_budget));
        }
        let budget = cognitive_load_budget.min(self.config.max_cognitive_load);

        let mut state = ComposeState::default();
        for candidate in candidates {
            if candidate.value.learning_value < self.config.min_learning_value {
                state.excluded.push(ExcludedObject {
                    object_id: candidate.id().to_string(),
                    slot_id: None,
                    reason: ExclusionReason::BelowMinValue,
                    detail: format!(
                        "learning value {:.3} below minimum {:.3}",
                        candidate.value.learning_value, self.config.min_learning_value
                    ),
                });
            }
        }

        let required = template.slots.iter().enumerate().filter(|(_, s)| s.required);
        for (slot_index, slot) in required {
            let ranked = self.rank(slot, candidates, &state);
            let Some(best) = ranked.into_iter().next() else {
                warn!(
                    template_id = %template.id,
                    slot_id = %slot.id,
                    "no eligible candidate for required slot"
                );
                return Ok(CompositionOutcome::Infeasible(CompositionFailure {
                    template_id: template.id.clone(),
                    slot_id: slot.id.clone(),
                    reason: format!(
                        "no candidate satisfies required slot {} ({} candidates considered)",
                        slot.id,
                        candidates.len()
                    ),
                    excluded_objects: state.excluded,
                }));
            };
            self.assign(template, slot_index, best, candidates, &mut state);
        }

        let optional = template.slots.iter().enumerate().filter(|(_, s)| !s.required);
        for (slot_index, slot) in optional {
            let ranked = self.rank(slot, candidates, &state);
            let mut chosen = None;
            for entry in ranked {
                if state.total_cost + entry.cost <= budget + BUDGET_EPSILON {
                    chosen = Some(entry);
                    break;
                }
                debug!(
                    slot_id = %slot.id,
                    object_id = %candidates[entry.candidate_index].id(),
                    cost = entry.cost,
                    "candidate rejected: cognitive overload"
                );
                state.excluded.push(ExcludedObject {
                    object_id: candidates[entry.candidate_index].id().to_string(),
                    slot_id: Some(slot.id.clone()),
                    reason: ExclusionReason::CognitiveOverload,
                    detail: format!(
                        "cost {:.3} exceeds remaining budget {:.3}",
                        entry.cost,
                        (budget - state.total_cost).max(0.0)
                    ),
                });
            }
            if let Some(entry) = chosen {
                self.assign(template, slot_index, entry, candidates, &mut state);
            }
        }

        Ok(CompositionOutcome::Composed(
            self.finish(template, candidates, state),
        ))
    }

    fn rank(
        &self,
        slot: &ObjectSlot,
        candidates: &[ObjectCandidate],
        state: &ComposeState,
    ) -> Vec<Ranked> {
        let weight = slot.effective_weight();
        let mut ranked: Vec<Ranked> = candidates
            .iter()
            .enumerate()
            .filter(|(i, c)| self.is_eligible(*i, c, slot, candidates, state))
            .map(|(i, c)| {
                let value = c.value.learning_value
                    * weight
                    * slot.role.theta_multiplier()
                    * c.value.role_affinity.get(slot.role);
                let cost = c.value.cognitive_cost * slot.process.multiplier() * weight;
                let synergy: f64 = state
                    .assignments
                    .iter()
                    .map(|a| c.value.synergy_with(candidates[a.candidate_index].id()))
                    .sum();
                let mut score = value
                    + synergy * self.config.synergy_weight
                    + c.value.urgency * self.config.urgency_weight
                    + c.value.exposure_balance * self.config.exposure_balance_weight
                    - COST_PENALTY * cost;
                score += state.preferences.get(c.id()).copied().unwrap_or(0.0);
                if state.required_by_constraint.contains(c.id()) {
                    score += REQUIRED_BONUS;
                }
                Ranked {
                    candidate_index: i,
                    score,
                    value,
                    cost,
                }
            })
            .collect();

        // stable: equal scores keep candidate order
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }

    fn is_eligible(
        &self,
        index: usize,
        candidate: &ObjectCandidate,
        slot: &ObjectSlot,
        candidates: &[ObjectCandidate],
        state: &ComposeState,
    ) -> bool {
        if state.used.contains(&index) || !slot.accepts(candidate.object.component) {
            return false;
        }
        if candidate.value.learning_value < self.config.min_learning_value {
            return false;
        }
        if state.constraint_excluded.contains(candidate.id()) {
            return false;
        }

        let c = &slot.constraints;
        let stage = candidate.mastery.stage;
        if c.min_stage.is_some_and(|min| stage < min) || c.max_stage.is_some_and(|max| stage > max) {
            return false;
        }
        if c
            .min_automaticity
            .is_some_and(|min| candidate.mastery.automaticity() < min)
        {
            return false;
        }
        if c.min_priority.is_some_and(|min| candidate.object.priority < min) {
            return false;
        }
        if let Some(req) = &c.requires_synergy_with {
            if let Some(partner_id) = state.assigned_by_slot.get(&req.slot_id) {
                let forward = candidate.value.synergy_with(partner_id);
                let backward = candidates
                    .iter()
                    .find(|p| p.id() == partner_id)
                    .map(|p| p.value.synergy_with(candidate.id()))
                    .unwrap_or(0.0);
                let synergy = forward.max(backward);
                if synergy <= 0.0 || synergy < req.min_score {
                    return false;
                }
            }
        }

        if !state
            .restrictions
            .iter()
            .filter(|r| r.slot_id == slot.id)
            .all(|r| r.permits(&candidate.object))
        {
            return false;
        }

        // a candidate that excludes something already assigned would break a hard edge
        if let Some(graph) = self.graph {
            let conflicts = graph.edges_from(candidate.id()).iter().any(|e| {
                e.kind == ConstraintKind::Excludes
                    && state.assigned_by_slot.values().any(|id| *id == e.target)
            });
            if conflicts {
                return false;
            }
        }

        true
    }

    fn assign(
        &self,
        template: &TaskTemplate,
        slot_index: usize,
        entry: Ranked,
        candidates: &[ObjectCandidate],
        state: &mut ComposeState,
    ) {
        let slot = &template.slots[slot_index];
        let candidate = &candidates[entry.candidate_index];
        debug!(
            slot_id = %slot.id,
            object_id = %candidate.id(),
            score = entry.score,
            "slot assigned"
        );

        state.used.insert(entry.candidate_index);
        state.total_cost += entry.cost;
        state
            .assigned_by_slot
            .insert(slot.id.clone(), candidate.id().to_string());
        state.assignments.push(Assignment {
            slot_index,
            candidate_index: entry.candidate_index,
            value: entry.value,
            cost: entry.cost,
        });

        let Some(graph) = self.graph else {
            return;
        };
        let trigger = PropagationTrigger::new(&slot.id, candidate.id());
        let outcome = propagate(
            &trigger,
            graph,
            candidates,
            &state.assigned_by_slot,
            &template.slots,
        );

        for exclusion in outcome.excluded {
            if state.constraint_excluded.insert(exclusion.object_id.clone()) {
                state.excluded.push(ExcludedObject {
                    object_id: exclusion.object_id,
                    slot_id: None,
                    reason: ExclusionReason::ConstraintExcluded,
                    detail: exclusion.reason,
                });
            }
        }
        for required in outcome.required {
            state.required_by_constraint.insert(required.object_id);
        }
        for pref in outcome.preferences {
            *state.preferences.entry(pref.object_id).or_insert(0.0) += pref.adjustment;
        }
        state.restrictions.extend(outcome.restrictions);
    }

    fn finish(
        &self,
        template: &TaskTemplate,
        candidates: &[ObjectCandidate],
        state: ComposeState,
    ) -> CompositionResult {
        let mut ordered: Vec<&Assignment> = state.assignments.iter().collect();
        ordered.sort_by_key(|a| a.slot_index);

        let synergy_bonus = self.synergy_bonus(&ordered, candidates);
        let base_value: f64 = ordered.iter().map(|a| a.value).sum();
        let total_value = base_value + synergy_bonus;
        let total_cost = state.total_cost;
        let efficiency = if total_cost > f64::EPSILON {
            total_value / total_cost
        } else {
            total_value
        };

        let slots: Vec<FilledSlot> = ordered
            .iter()
            .map(|a| {
                let slot = &template.slots[a.slot_index];
                let candidate = &candidates[a.candidate_index];
                FilledSlot {
                    slot_id: slot.id.clone(),
                    object_id: candidate.object.id.clone(),
                    component: candidate.object.component,
                    content: candidate.object.content.clone(),
                    role: slot.role,
                    process: slot.process,
                    weight: slot.effective_weight(),
                    difficulty: candidate.object.irt_difficulty,
                    discrimination: candidate.object.irt_discrimination,
                    mastery_stage: candidate.mastery.stage,
                    required: slot.required,
                }
            })
            .collect();

        let violations = match self.graph {
            Some(graph) => {
                let ids: Vec<String> = slots.iter().map(|s| s.object_id.clone()).collect();
                validate_assignments(&ids, graph)
            }
            None => Vec::new(),
        };

        let expected_answers = slots
            .iter()
            .map(|s| ExpectedAnswer::new(&s.object_id, &s.content))
            .collect();

        let task = ComposedTask {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            task_type: template.task_type,
            format: template.format,
            modality: template.modality,
            composite_difficulty: composite_difficulty(&slots),
            rubric: build_rubric(&slots),
            slots,
            content: None,
            expected_answers,
        };

        debug!(
            task_id = %task.id,
            slots = task.slots.len(),
            total_value,
            total_cost,
            "task composed"
        );

        CompositionResult {
            task,
            total_value,
            total_cost,
            efficiency,
            synergy_bonus,
            excluded_objects: state.excluded,
            violations,
        }
    }

    fn synergy_bonus(&self, assigned: &[&Assignment], candidates: &[ObjectCandidate]) -> f64 {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, a) in assigned.iter().enumerate() {
            for b in &assigned[i + 1..] {
                let ca = &candidates[a.candidate_index];
                let cb = &candidates[b.candidate_index];
                total += (ca.value.synergy_with(cb.id()) + cb.value.synergy_with(ca.id())) / 2.0;
                pairs += 1;
            }
        }
        if pairs == 0 {
            0.0
        } else {
            total / pairs as f64 * self.config.synergy_weight
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::economics::{EconomicValue, RoleAffinity};
    use crate::composition::template::SlotConstraints;
    use crate::types::{ComponentType, LanguageObject, MasteryRecord, SlotRole, TaskType};

    fn candidate(id: &str, component: ComponentType, value: f64, cost: f64) -> ObjectCandidate {
        ObjectCandidate {
            object: LanguageObject::new(id, component, id),
            mastery: MasteryRecord::default(),
            value: EconomicValue {
                learning_value: value,
                cognitive_cost: cost,
                synergy_map: HashMap::new(),
                role_affinity: RoleAffinity::default(),
                urgency: 0.0,
                exposure_balance: 0.0,
            },
        }
    }

    fn lex_template(slots: Vec<ObjectSlot>) -> TaskTemplate {
        TaskTemplate::new("t", TaskType::Vocabulary, slots)
    }

    #[test]
    fn test_empty_template_is_error() {
        let composer = TaskComposer::new(CompositionOptimizationConfig::default());
        let err = composer
            .compose(&lex_template(vec![]), &[], 1.0)
            .unwrap_err();
        assert_eq!(err, CompositionError::EmptyTemplate("t".into()));
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let composer = TaskComposer::new(CompositionOptimizationConfig::default());
        let template = lex_template(vec![ObjectSlot::new(
            "s1",
            &[ComponentType::Lex],
            SlotRole::Assessment,
        )]);
        let pool = [
            candidate("first", ComponentType::Lex, 0.5, 0.2),
            candidate("second", ComponentType::Lex, 0.5, 0.2),
        ];
        let result = composer.compose(&template, &pool, 1.0).unwrap();
        let result = result.composed().unwrap();
        assert_eq!(result.task.slots[0].object_id, "first");
    }

    #[test]
    fn test_stage_bounds_filter() {
        let composer = TaskComposer::new(CompositionOptimizationConfig::default());
        let slot = ObjectSlot::new("s1", &[ComponentType::Lex], SlotRole::Reinforcement)
            .with_constraints(SlotConstraints {
                min_stage: Some(3),
                ..Default::default()
            });
        let mut advanced = candidate("adv", ComponentType::Lex, 0.1, 0.2);
        advanced.mastery.stage = 4;
        let pool = [candidate("new", ComponentType::Lex, 0.9, 0.2), advanced];
        let outcome = composer.compose(&lex_template(vec![slot]), &pool, 1.0).unwrap();
        assert_eq!(outcome.composed().unwrap().task.slots[0].object_id, "adv");
    }

    #[test]
    fn test_synergy_requirement() {
        let composer = TaskComposer::new(CompositionOptimizationConfig::default());
        let head = ObjectSlot::new("head", &[ComponentType::Lex], SlotRole::Assessment);
        let partner = ObjectSlot::new("partner", &[ComponentType::Lex], SlotRole::Practice)
            .with_constraints(SlotConstraints {
                requires_synergy_with: Some(super::super::template::SynergyRequirement {
                    slot_id: "head".into(),
                    min_score: 0.5,
                }),
                ..Default::default()
            });
        let mut make = candidate("make", ComponentType::Lex, 0.9, 0.1);
        make.value.synergy_map.insert("decision".into(), 0.8);
        let pool = [
            make,
            candidate("banana", ComponentType::Lex, 0.8, 0.1),
            candidate("decision", ComponentType::Lex, 0.3, 0.1),
        ];
        let outcome = composer
            .compose(&lex_template(vec![head, partner]), &pool, 2.0)
            .unwrap();
        let task = &outcome.composed().unwrap().task;
        assert_eq!(task.slots[0].object_id, "make");
        assert_eq!(task.slots[1].object_id, "decision");
    }
}
