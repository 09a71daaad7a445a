use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::graph::{ConstraintGraph, ConstraintKind};
use super::rules::LinguisticPredicate;
use crate::composition::{ObjectCandidate, ObjectSlot};
use crate::types::{ComponentType, LanguageObject};

const PREFERS_FACTOR: f64 = 0.5;
const ENABLES_FACTOR: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationTrigger {
    pub slot_id: String,
    pub object_id: String,
}

impl PropagationTrigger {
    pub fn new(slot_id: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            slot_id: slot_id.into(),
            object_id: object_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredObject {
    pub object_id: String,
    pub source_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintExclusion {
    pub object_id: String,
    pub source_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "predicate", rename_all = "snake_case")]
pub enum RestrictionOrigin {
    Rule(LinguisticPredicate),
    RestrictsTo,
}

/// Narrows one unfilled slot: candidates of `component` must be in `allowed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRestriction {
    pub slot_id: String,
    pub source_id: String,
    pub component: ComponentType,
    pub origin: RestrictionOrigin,
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
    pub reason: String,
}

impl SlotRestriction {
    pub fn permits(&self, object: &LanguageObject) -> bool {
        object.component != self.component || self.allowed.iter().any(|id| *id == object.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceAdjustment {
    pub object_id: String,
    pub source_id: String,
    pub adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyModification {
    pub object_id: String,
    pub source_id: String,
    pub property: Option<String>,
    pub value: Option<String>,
    pub strength: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationResult {
    pub required: Vec<RequiredObject>,
    pub excluded: Vec<ConstraintExclusion>,
    pub restrictions: Vec<SlotRestriction>,
    pub preferences: Vec<PreferenceAdjustment>,
    pub modifications: Vec<PropertyModification>,
}

impl PropagationResult {
    pub fn is_excluded(&self, object_id: &str) -> bool {
        self.excluded.iter().any(|e| e.object_id == object_id)
    }

    pub fn is_required(&self, object_id: &str) -> bool {
        self.required.iter().any(|r| r.object_id == object_id)
    }

    pub fn preference_for(&self, object_id: &str) -> f64 {
        self.preferences
            .iter()
            .filter(|p| p.object_id == object_id)
            .map(|p| p.adjustment)
            .sum()
    }
}

/// Propagates the consequences of assigning `trigger` to the rest of the template.
///
/// Walks `requires` edges breadth-first from the trigger. Every object is expanded at most once,
/// so cyclic graphs terminate.
pub fn propagate(
    trigger: &PropagationTrigger,
    graph: &ConstraintGraph,
    candidate_pool: &[ObjectCandidate],
    current_assignments: &HashMap<String, String>,
    slots: &[ObjectSlot],
) -> PropagationResult {
    let index: HashMap<&str, &LanguageObject> = candidate_pool
        .iter()
        .map(|c| (c.object.id.as_str(), &c.object))
        .collect();
    let unfilled: Vec<&ObjectSlot> = slots
        .iter()
        .filter(|s| s.id != trigger.slot_id && !current_assignments.contains_key(&s.id))
        .collect();

    let mut result = PropagationResult::default();
    let mut processed: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([trigger.object_id.clone()]);

    while let Some(source_id) = queue.pop_front() {
        if !processed.insert(source_id.clone()) {
            continue;
        }

        let mut restricts_to: Vec<&str> = Vec::new();
        for edge in graph.edges_from(&source_id) {
            match edge.kind {
                ConstraintKind::Requires => {
                    if edge.target != trigger.object_id && !result.is_required(&edge.target) {
                        result.required.push(RequiredObject {
                            object_id: edge.target.clone(),
                            source_id: source_id.clone(),
                            reason: format!(
                                "{} requires {} (strength {:.2})",
                                source_id, edge.target, edge.strength
                            ),
                        });
                    }
                    if !processed.contains(&edge.target) {
                        queue.push_back(edge.target.clone());
                    }
                }
                ConstraintKind::Excludes => {
                    if !result.is_excluded(&edge.target) {
                        result.excluded.push(ConstraintExclusion {
                            object_id: edge.target.clone(),
                            source_id: source_id.clone(),
                            reason: format!("{} excludes {}", source_id, edge.target),
                        });
                    }
                }
                ConstraintKind::Prefers => result.preferences.push(PreferenceAdjustment {
                    object_id: edge.target.clone(),
                    source_id: source_id.clone(),
                    adjustment: edge.strength * PREFERS_FACTOR,
                }),
                ConstraintKind::Enables => result.preferences.push(PreferenceAdjustment {
                    object_id: edge.target.clone(),
                    source_id: source_id.clone(),
                    adjustment: edge.strength * ENABLES_FACTOR,
                }),
                ConstraintKind::Modifies => result.modifications.push(PropertyModification {
                    object_id: edge.target.clone(),
                    source_id: source_id.clone(),
                    property: edge.modification.as_ref().map(|m| m.property.clone()),
                    value: edge.modification.as_ref().map(|m| m.value.clone()),
                    strength: edge.strength,
                }),
                ConstraintKind::RestrictsTo => restricts_to.push(edge.target.as_str()),
            }
        }

        if !restricts_to.is_empty() {
            apply_restricts_to(&source_id, &restricts_to, &index, &unfilled, &mut result);
        }

        if let Some(source) = index.get(source_id.as_str()) {
            apply_linguistic_rules(source, graph, candidate_pool, &unfilled, &mut result);
        }
    }

    result
}

fn apply_restricts_to(
    source_id: &str,
    targets: &[&str],
    index: &HashMap<&str, &LanguageObject>,
    unfilled: &[&ObjectSlot],
    result: &mut PropagationResult,
) {
    let mut by_component: Vec<(ComponentType, Vec<String>)> = Vec::new();
    for target in targets {
        let Some(object) = index.get(target) else {
            continue;
        };
        match by_component.iter_mut().find(|(c, _)| *c == object.component) {
            Some((_, ids)) => ids.push(object.id.clone()),
            None => by_component.push((object.component, vec![object.id.clone()])),
        }
    }

    for (component, allowed) in by_component {
        let mut blocked: Vec<String> = index
            .values()
            .filter(|o| o.component == component && !allowed.contains(&o.id))
            .map(|o| o.id.clone())
            .collect();
        blocked.sort();
        for slot in unfilled.iter().filter(|s| s.accepts(component)) {
            result.restrictions.push(SlotRestriction {
                slot_id: slot.id.clone(),
                source_id: source_id.to_string(),
                component,
                origin: RestrictionOrigin::RestrictsTo,
                allowed: allowed.clone(),
                blocked: blocked.clone(),
                reason: format!("{source_id} restricts {component} choices"),
            });
        }
    }
}

fn apply_linguistic_rules(
    source: &LanguageObject,
    graph: &ConstraintGraph,
    candidate_pool: &[ObjectCandidate],
    unfilled: &[&ObjectSlot],
    result: &mut PropagationResult,
) {
    for (target_component, rule) in graph.rules().rules_from(source.component) {
        for restriction in rule.predicate.restrictions_for(source) {
            let (allowed, blocked): (Vec<&LanguageObject>, Vec<&LanguageObject>) = candidate_pool
                .iter()
                .map(|c| &c.object)
                .filter(|o| o.component == target_component && o.id != source.id)
                .partition(|o| restriction.allows(o));

            for slot in unfilled.iter().filter(|s| s.accepts(target_component)) {
                result.restrictions.push(SlotRestriction {
                    slot_id: slot.id.clone(),
                    source_id: source.id.clone(),
                    component: target_component,
                    origin: RestrictionOrigin::Rule(rule.predicate),
                    allowed: allowed.iter().map(|o| o.id.clone()).collect(),
                    blocked: blocked.iter().map(|o| o.id.clone()).collect(),
                    reason: format!("{}: {}", rule.predicate.as_str(), restriction.describe()),
                });
            }
        }
    }
}

/// Reports every hard edge the assignment set breaks.
pub fn validate_assignments(assigned: &[String], graph: &ConstraintGraph) -> Vec<String> {
    let present: HashSet<&str> = assigned.iter().map(String::as_str).collect();
    let mut violations = Vec::new();

    for object_id in assigned {
        for edge in graph.edges_from(object_id) {
            match edge.kind {
                ConstraintKind::Requires if !present.contains(edge.target.as_str()) => {
                    violations.push(format!(
                        "{} requires {}, which is not assigned",
                        object_id, edge.target
                    ));
                }
                ConstraintKind::Excludes if present.contains(edge.target.as_str()) => {
                    violations.push(format!(
                        "{} excludes {}, but both are assigned",
                        object_id, edge.target
                    ));
                }
                _ => {}
            }
        }
    }

    violations
}
