//! Per-object usage space: where an object has been used successfully, where it has only been
//! attempted, and which target contexts to expand into next.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::{context_similarity, ContextRecord};
use crate::types::{ComponentType, LanguageObject, UsageContext};

pub const SUCCESS_THRESHOLD: f64 = 0.6;
const ATTEMPT_BOOST: f64 = 0.2;
const ATTEMPT_BOOST_MIN_RATE: f64 = 0.4;
const PREREQUISITE_SIMILARITY: f64 = 0.5;
const PRIORITY_COVERAGE_GAIN: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub object_id: String,
    pub context: UsageContext,
    pub score: f64,
    pub timestamp: i64,
}

impl UsageEvent {
    pub fn is_success(&self) -> bool {
        self.score >= SUCCESS_THRESHOLD
    }
}

/// First success of an object in a context it had never succeeded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionEvent {
    pub object_id: String,
    pub context: UsageContext,
    pub previous_coverage: f64,
    pub new_coverage: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecordResult {
    pub expansion_event: Option<ExpansionEvent>,
    pub new_coverage_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionCandidate {
    pub context: UsageContext,
    pub readiness: f64,
    pub prerequisites: Vec<UsageContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUsageSpace {
    pub object_id: String,
    pub component: ComponentType,
    pub successful_contexts: Vec<ContextRecord>,
    pub attempted_contexts: Vec<ContextRecord>,
    pub target_contexts: Vec<UsageContext>,
    pub coverage_ratio: f64,
    pub expansion_candidates: Vec<ExpansionCandidate>,
}

impl ObjectUsageSpace {
    pub fn new(
        object_id: impl Into<String>,
        component: ComponentType,
        target_contexts: Vec<UsageContext>,
    ) -> Self {
        let mut space = Self {
            object_id: object_id.into(),
            component,
            successful_contexts: Vec::new(),
            attempted_contexts: Vec::new(),
            target_contexts: Vec::new(),
            coverage_ratio: 1.0,
            expansion_candidates: Vec::new(),
        };
        space.set_target_contexts(target_contexts);
        space
    }

    /// Replaces the goal's target contexts, dropping duplicates.
    pub fn set_target_contexts(&mut self, mut targets: Vec<UsageContext>) {
        targets.sort();
        targets.dedup();
        self.target_contexts = targets;
        self.refresh();
    }

    pub fn is_successful(&self, context: &UsageContext) -> bool {
        self.successful_contexts.iter().any(|r| &r.context == context)
    }

    pub fn attempted(&self, context: &UsageContext) -> Option<&ContextRecord> {
        self.attempted_contexts.iter().find(|r| &r.context == context)
    }

    pub fn record_usage(&mut self, event: &UsageEvent) -> UsageRecordResult {
        let previous_coverage = self.coverage_ratio;
        let mut expansion_event = None;

        if event.is_success() {
            match self
                .successful_contexts
                .iter_mut()
                .find(|r| r.context == event.context)
            {
                Some(record) => record.observe(event.score, event.timestamp),
                None => {
                    let mut record = match self
                        .attempted_contexts
                        .iter()
                        .position(|r| r.context == event.context)
                    {
                        Some(i) => self.attempted_contexts.remove(i),
                        None => ContextRecord::new(event.context.clone()),
                    };
                    record.observe(event.score, event.timestamp);
                    self.successful_contexts.push(record);
                    self.refresh();
                    expansion_event = Some(ExpansionEvent {
                        object_id: self.object_id.clone(),
                        context: event.context.clone(),
                        previous_coverage,
                        new_coverage: self.coverage_ratio,
                        timestamp: event.timestamp,
                    });
                    info!(
                        object_id = %self.object_id,
                        context = %event.context.key(),
                        previous_coverage,
                        new_coverage = self.coverage_ratio,
                        "usage space expanded"
                    );
                }
            }
        } else if !self.is_successful(&event.context) {
            match self
                .attempted_contexts
                .iter_mut()
                .find(|r| r.context == event.context)
            {
                Some(record) => record.observe(event.score, event.timestamp),
                None => {
                    let mut record = ContextRecord::new(event.context.clone());
                    record.observe(event.score, event.timestamp);
                    self.attempted_contexts.push(record);
                }
            }
        }

        self.refresh();
        UsageRecordResult {
            expansion_event,
            new_coverage_ratio: self.coverage_ratio,
        }
    }

    fn refresh(&mut self) {
        self.coverage_ratio = self.compute_coverage();
        self.expansion_candidates = self.compute_expansion_candidates();
    }

    fn compute_coverage(&self) -> f64 {
        if self.target_contexts.is_empty() {
            return 1.0;
        }
        let covered = self
            .target_contexts
            .iter()
            .filter(|t| self.is_successful(t))
            .count();
        covered as f64 / self.target_contexts.len() as f64
    }

    fn compute_expansion_candidates(&self) -> Vec<ExpansionCandidate> {
        let mut candidates: Vec<ExpansionCandidate> = self
            .target_contexts
            .iter()
            .filter(|t| !self.is_successful(t))
            .map(|target| {
                let mut readiness = 0.0_f64;
                let mut prerequisites = Vec::new();
                for record in &self.successful_contexts {
                    let s = context_similarity(&record.context, target);
                    readiness = readiness.max(s);
                    if s >= PREREQUISITE_SIMILARITY {
                        prerequisites.push(record.context.clone());
                    }
                }
                if self
                    .attempted(target)
                    .is_some_and(|r| r.success_rate >= ATTEMPT_BOOST_MIN_RATE)
                {
                    readiness += ATTEMPT_BOOST;
                }
                prerequisites.sort();
                ExpansionCandidate {
                    context: target.clone(),
                    readiness: readiness.min(1.0),
                    prerequisites,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.readiness
                .partial_cmp(&a.readiness)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.context.cmp(&b.context))
        });
        candidates
    }

    /// Readiness per target context key.
    pub fn readiness_map(&self) -> HashMap<String, f64> {
        self.expansion_candidates
            .iter()
            .map(|c| (c.context.key(), c.readiness))
            .collect()
    }

    pub fn best_readiness(&self) -> f64 {
        self.expansion_candidates
            .first()
            .map(|c| c.readiness)
            .unwrap_or(0.0)
    }
}

/// Readiness of each object's most practicable next context, for composer feedback.
pub fn object_readiness(spaces: &[ObjectUsageSpace]) -> HashMap<String, f64> {
    spaces
        .iter()
        .map(|s| (s.object_id.clone(), s.best_readiness()))
        .collect()
}

/// Raises priority for objects whose usage space is poorly covered.
pub fn revise_priority(object: &LanguageObject, space: &ObjectUsageSpace) -> f64 {
    let coverage = space.coverage_ratio.clamp(0.0, 1.0);
    (object.priority * (1.0 + PRIORITY_COVERAGE_GAIN * (1.0 - coverage))).clamp(0.0, 1.0)
}
