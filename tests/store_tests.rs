//! SQLite store and engine round-trips on a temporary database.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{context, FIXED_TIMESTAMP};
use danci_calibration::algorithm_config::CalibrationConfig;
use danci_calibration::composition::{ObjectSlot, TaskTemplate};
use danci_calibration::constraints::Collocation;
use danci_calibration::db::operations::MasteryPatch;
use danci_calibration::db::{schema::SCHEMA_VERSION, CalibrationStore};
use danci_calibration::engine::{CalibrationEngine, EngineError};
use danci_calibration::scoring::TaskResponse;
use danci_calibration::types::{ComponentType, LanguageObject, SlotRole, TaskType, UserThetaProfile};
use danci_calibration::usage::{ObjectUsageSpace, UsageEvent};

async fn open_store(dir: &TempDir) -> CalibrationStore {
    CalibrationStore::open(&dir.path().join("calibration.db"))
        .await
        .expect("store opens")
}

async fn seed_goal(store: &CalibrationStore) {
    let objects = [
        LanguageObject::new("negotiate", ComponentType::Lex, "negotiate"),
        LanguageObject::new("contract", ComponentType::Lex, "contract"),
        LanguageObject::new("passive-voice", ComponentType::Synt, "was signed"),
    ];
    for object in &objects {
        store.insert_object(object).await.unwrap();
        store.attach_object_to_goal("business", &object.id).await.unwrap();
    }
    store
        .insert_collocation(
            "business",
            &Collocation {
                object_a: "negotiate".into(),
                object_b: "contract".into(),
                strength: 0.9,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_schema_version_recorded() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    assert_eq!(store.schema_version().await.unwrap().as_deref(), Some(SCHEMA_VERSION));

    // reopening an initialized database is a no-op
    drop(store);
    let store = open_store(&dir).await;
    assert_eq!(store.schema_version().await.unwrap().as_deref(), Some(SCHEMA_VERSION));
}

#[tokio::test]
async fn test_objects_round_trip_in_goal_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    seed_goal(&store).await;

    let objects = store.fetch_objects_for_goal("business").await.unwrap();
    let ids: Vec<&str> = objects.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["negotiate", "contract", "passive-voice"]);
    assert_eq!(objects[2].component, ComponentType::Synt);

    let collocations = store.fetch_collocations("business").await.unwrap();
    assert_eq!(collocations.len(), 1);
    assert!(store.fetch_object("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_mastery_patch_merges_fields() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let first = store
        .upsert_mastery(
            "learner",
            "negotiate",
            &MasteryPatch {
                stage: Some(2),
                cue_free_accuracy: Some(0.7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.stage, 2);

    let merged = store
        .upsert_mastery(
            "learner",
            "negotiate",
            &MasteryPatch {
                exposure_count: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(merged.stage, 2);
    assert_eq!(merged.exposure_count, 5);
    assert!((merged.cue_free_accuracy - 0.7).abs() < 1e-12);

    let all = store.fetch_mastery_for_learner("learner").await.unwrap();
    assert_eq!(all.get("negotiate"), Some(&merged));
}

#[tokio::test]
async fn test_usage_space_and_theta_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let target = context("business", "formal");
    let mut space = ObjectUsageSpace::new("negotiate", ComponentType::Lex, vec![target.clone()]);
    space.record_usage(&UsageEvent {
        object_id: "negotiate".into(),
        context: target,
        score: 0.8,
        timestamp: FIXED_TIMESTAMP,
    });
    store.save_usage_space("learner", &space).await.unwrap();
    let loaded = store
        .load_usage_space("learner", "negotiate")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.target_contexts, space.target_contexts);
    assert_eq!(loaded.successful_contexts.len(), 1);
    assert_eq!(loaded.coverage_ratio, 1.0);
    assert!(store.load_usage_space("other", "negotiate").await.unwrap().is_none());

    let theta = UserThetaProfile::uniform(0.4);
    store.upsert_theta_profile("learner", &theta).await.unwrap();
    assert_eq!(store.fetch_theta_profile("learner").await.unwrap(), Some(theta));
}

fn business_template() -> TaskTemplate {
    TaskTemplate::new(
        "business-collocation",
        TaskType::Collocation,
        vec![
            ObjectSlot::new("verb", &[ComponentType::Lex], SlotRole::Assessment),
            ObjectSlot::new("noun", &[ComponentType::Lex], SlotRole::Practice).optional(),
        ],
    )
}

#[tokio::test]
async fn test_engine_composes_and_commits() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    seed_goal(&store).await;
    let engine = CalibrationEngine::new(store, CalibrationConfig::default());

    let outcome = engine
        .compose_for_goal("learner", "business", &business_template(), 5.0)
        .await
        .unwrap();
    let task = outcome.into_result().unwrap().task;
    assert_eq!(task.slots.len(), 2);

    let mut response = TaskResponse::default();
    for slot in &task.slots {
        response.segments.insert(slot.object_id.clone(), slot.content.clone());
    }
    let usage_context = context("business", "formal");
    let submission = engine
        .submit_response("learner", &task, &response, Some(&usage_context))
        .await
        .unwrap();

    assert!(submission.committed);
    assert_eq!(submission.mastery.len(), 2);
    assert!(submission.mastery.iter().all(|m| m.after.exposure_count == 1));
    assert_eq!(submission.usage.len(), 2);

    let store = engine.store();
    let theta = store.fetch_theta_profile("learner").await.unwrap().unwrap();
    assert_eq!(theta, submission.calibration.theta_after);
    for slot in &task.slots {
        let mastery = store.fetch_mastery("learner", &slot.object_id).await.unwrap();
        assert_eq!(mastery.map(|m| m.exposure_count), Some(1));
        let space = store
            .load_usage_space("learner", &slot.object_id)
            .await
            .unwrap()
            .unwrap();
        assert!(space.is_successful(&usage_context));
    }
}

#[tokio::test]
async fn test_engine_rejected_response_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    seed_goal(&store).await;
    let engine = CalibrationEngine::new(store, CalibrationConfig::default());

    let task = engine
        .compose_for_goal("learner", "business", &business_template(), 5.0)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .task;
    let response = TaskResponse::text("x".repeat(2001));

    let submission = engine
        .submit_response("learner", &task, &response, None)
        .await
        .unwrap();
    assert!(!submission.committed);
    assert!(engine.store().fetch_theta_profile("learner").await.unwrap().is_none());
    assert!(engine
        .store()
        .fetch_mastery_for_learner("learner")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_engine_concurrent_submissions_count_every_exposure() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    seed_goal(&store).await;
    let engine = Arc::new(CalibrationEngine::new(store, CalibrationConfig::default()));

    let task = engine
        .compose_for_goal("learner", "business", &business_template(), 5.0)
        .await
        .unwrap()
        .into_result()
        .unwrap()
        .task;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let task = task.clone();
        handles.push(tokio::spawn(async move {
            engine
                .submit_response("learner", &task, &TaskResponse::text("negotiate"), None)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mastery = engine
        .store()
        .fetch_mastery("learner", &task.slots[0].object_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mastery.exposure_count, 4);
}

#[tokio::test]
async fn test_engine_unknown_object_targets() {
    let dir = TempDir::new().unwrap();
    let engine = CalibrationEngine::new(open_store(&dir).await, CalibrationConfig::default());

    let err = engine
        .set_target_contexts("learner", "ghost", vec![context("business", "formal")])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownObject(id) if id == "ghost"));
}

#[tokio::test]
async fn test_engine_generalization_uses_stored_space() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    seed_goal(&store).await;
    let engine = CalibrationEngine::new(store, CalibrationConfig::default());

    let goals = vec![context("business", "formal"), context("business", "neutral")];
    let space = engine
        .set_target_contexts("learner", "negotiate", goals.clone())
        .await
        .unwrap();
    assert_eq!(space.coverage_ratio, 0.0);

    let estimate = engine
        .estimate_generalization("learner", "negotiate", &goals)
        .await
        .unwrap();
    assert_eq!(estimate.direct_coverage, 0.0);
    assert_eq!(estimate.recommended_next_contexts.len(), 2);
}
