//! Orchestration over the store: composes tasks from stored goals and commits calibration
//! results, serializing every read-modify-write per (learner, object).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::algorithm_config::CalibrationConfig;
use crate::composition::{
    ComposedTask, CompositionError, CompositionOutcome, EconomicValueCalculator, TaskComposer,
    TaskTemplate,
};
use crate::constraints::ConstraintGraphBuilder;
use crate::db::operations::{self, MasteryPatch};
use crate::db::{CalibrationStore, StoreError};
use crate::scoring::{calibrate_task, update_mastery, CalibrationResult, MasteryOutcome, SchedulerParams, TaskResponse};
use crate::types::{now_ms, MasteryRecord, UsageContext};
use crate::usage::{
    object_readiness, revise_priority, GeneralizationEstimate, GeneralizationEstimator,
    ObjectUsageSpace, UsageEvent, UsageRecordResult,
};

const LOCK_TABLE_PRUNE_AT: usize = 1024;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error("unknown object {0}")]
    UnknownObject(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(StoreError::Sqlx(err))
    }
}

/// One async mutex per key, created on demand.
#[derive(Default)]
pub struct KeyedLocks {
    inner: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock();
            if table.len() >= LOCK_TABLE_PRUNE_AT {
                table.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(table.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Acquires every key in sorted order so overlapping callers cannot deadlock.
    pub async fn acquire_all(&self, keys: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.acquire(key).await);
        }
        guards
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryChange {
    pub object_id: String,
    pub before: MasteryRecord,
    pub after: MasteryRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectUsageUpdate {
    pub object_id: String,
    pub result: UsageRecordResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub calibration: CalibrationResult,
    /// False when the response was rejected and nothing was written.
    pub committed: bool,
    pub mastery: Vec<MasteryChange>,
    pub usage: Vec<ObjectUsageUpdate>,
}

pub struct CalibrationEngine {
    store: CalibrationStore,
    config: CalibrationConfig,
    scheduler: SchedulerParams,
    locks: KeyedLocks,
}

impl CalibrationEngine {
    pub fn new(store: CalibrationStore, config: CalibrationConfig) -> Self {
        Self {
            store,
            config,
            scheduler: SchedulerParams::default(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerParams) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Builds candidates for a goal from stored objects, mastery, collocations and usage
    /// readiness, then composes `template` against them.
    pub async fn compose_for_goal(
        &self,
        learner_id: &str,
        goal_id: &str,
        template: &TaskTemplate,
        cognitive_load_budget: f64,
    ) -> Result<CompositionOutcome, EngineError> {
        let mut objects = self.store.fetch_objects_for_goal(goal_id).await?;
        let mastery = self.store.fetch_mastery_for_learner(learner_id).await?;
        let spaces = self.store.load_usage_spaces_for_learner(learner_id).await?;
        let collocations = self.store.fetch_collocations(goal_id).await?;

        let by_object: HashMap<&str, &ObjectUsageSpace> =
            spaces.iter().map(|s| (s.object_id.as_str(), s)).collect();
        for object in objects.iter_mut() {
            if let Some(space) = by_object.get(object.id.as_str()) {
                object.priority = revise_priority(object, space);
            }
        }

        let graph = ConstraintGraphBuilder::new()
            .collocations(&collocations)
            .build();
        let mut candidates =
            EconomicValueCalculator::candidates(&objects, &mastery, Some(&graph), now_ms());
        EconomicValueCalculator::apply_readiness(&mut candidates, &object_readiness(&spaces));

        debug!(
            learner_id,
            goal_id,
            candidates = candidates.len(),
            edges = graph.edge_count(),
            "composing task for goal"
        );

        let outcome = TaskComposer::new(self.config.composition.clone())
            .with_constraints(&graph)
            .compose(template, &candidates, cognitive_load_budget)?;
        Ok(outcome)
    }

    /// Scores a response and commits theta, mastery and (when `context` is given) usage
    /// updates in one transaction.
    pub async fn submit_response(
        &self,
        learner_id: &str,
        task: &ComposedTask,
        response: &TaskResponse,
        context: Option<&UsageContext>,
    ) -> Result<SubmissionOutcome, EngineError> {
        let mut keys = vec![learner_id.to_string()];
        keys.extend(task.slots.iter().map(|s| object_key(learner_id, &s.object_id)));
        let _guards = self.locks.acquire_all(&keys).await;

        let mut tx = self.store.pool().begin().await?;
        let theta = operations::fetch_theta_profile(&mut tx, learner_id)
            .await?
            .unwrap_or_default();
        let calibration = calibrate_task(task, response, &theta, &self.config.scoring);

        if calibration.evaluation.rejected.is_some() {
            tx.rollback().await?;
            return Ok(SubmissionOutcome {
                calibration,
                committed: false,
                mastery: Vec::new(),
                usage: Vec::new(),
            });
        }

        operations::upsert_theta_profile(&mut tx, learner_id, &calibration.theta_after).await?;

        let now = now_ms();
        let mut mastery = Vec::with_capacity(task.slots.len());
        let mut usage = Vec::new();
        for slot in &task.slots {
            let credit = calibration.evaluation.credit_for(&slot.object_id);

            let before = operations::fetch_mastery(&mut tx, learner_id, &slot.object_id)
                .await?
                .unwrap_or_default();
            let outcome = MasteryOutcome {
                partial_credit: credit,
                cue_used: response.cue_used,
            };
            let after = update_mastery(&before, outcome, now, &self.scheduler);
            operations::upsert_mastery(
                &mut tx,
                learner_id,
                &slot.object_id,
                &MasteryPatch::from(&after),
            )
            .await?;

            if let Some(context) = context {
                let mut space = operations::load_usage_space(&mut tx, learner_id, &slot.object_id)
                    .await?
                    .unwrap_or_else(|| {
                        ObjectUsageSpace::new(&slot.object_id, slot.component, Vec::new())
                    });
                let result = space.record_usage(&UsageEvent {
                    object_id: slot.object_id.clone(),
                    context: context.clone(),
                    score: credit,
                    timestamp: now,
                });
                operations::save_usage_space(&mut tx, learner_id, &space).await?;
                usage.push(ObjectUsageUpdate {
                    object_id: slot.object_id.clone(),
                    result,
                });
            }

            mastery.push(MasteryChange {
                object_id: slot.object_id.clone(),
                before,
                after,
            });
        }
        tx.commit().await?;

        debug!(
            learner_id,
            task_id = %task.id,
            objects = mastery.len(),
            global_delta = calibration.update.global_delta,
            "response committed"
        );

        Ok(SubmissionOutcome {
            calibration,
            committed: true,
            mastery,
            usage,
        })
    }

    /// Replaces the target contexts of an object's usage space, creating it if needed.
    pub async fn set_target_contexts(
        &self,
        learner_id: &str,
        object_id: &str,
        targets: Vec<UsageContext>,
    ) -> Result<ObjectUsageSpace, EngineError> {
        let _guard = self.locks.acquire(&object_key(learner_id, object_id)).await;

        let mut tx = self.store.pool().begin().await?;
        let mut space = match operations::load_usage_space(&mut tx, learner_id, object_id).await? {
            Some(space) => space,
            None => {
                let object = operations::fetch_object(&mut tx, object_id)
                    .await?
                    .ok_or_else(|| EngineError::UnknownObject(object_id.to_string()))?;
                ObjectUsageSpace::new(object_id, object.component, Vec::new())
            }
        };
        space.set_target_contexts(targets);
        operations::save_usage_space(&mut tx, learner_id, &space).await?;
        tx.commit().await?;
        Ok(space)
    }

    pub async fn estimate_generalization(
        &self,
        learner_id: &str,
        object_id: &str,
        goal_contexts: &[UsageContext],
    ) -> Result<GeneralizationEstimate, EngineError> {
        let space = match self.store.load_usage_space(learner_id, object_id).await? {
            Some(space) => space,
            None => {
                let object = self
                    .store
                    .fetch_object(object_id)
                    .await?
                    .ok_or_else(|| EngineError::UnknownObject(object_id.to_string()))?;
                ObjectUsageSpace::new(object_id, object.component, goal_contexts.to_vec())
            }
        };
        let automation = self
            .store
            .fetch_mastery(learner_id, object_id)
            .await?
            .map(|m| m.automaticity())
            .unwrap_or(0.0);

        Ok(GeneralizationEstimator::new(self.config.sampling.clone())
            .estimate(&space, goal_contexts, automation))
    }
}

fn object_key(learner_id: &str, object_id: &str) -> String {
    format!("{learner_id}:{object_id}")
}
