//! Multi-component scoring: expected probability, Q-matrix weights and theta updates.

mod common;

use proptest::prelude::*;

use common::candidate;
use danci_calibration::algorithm_config::{CompositionOptimizationConfig, MultiObjectScoringConfig};
use danci_calibration::composition::{
    ExpectedAnswer, ObjectSlot, PartialCreditPattern, TaskComposer, TaskTemplate,
};
use danci_calibration::scoring::{
    allocate_weights, calibrate_task, expected_probability, update_theta, CalibrationTarget,
    InteractionModel, ObjectEvaluation, ResponseEvaluation, ResponseEvaluator, TaskResponse,
    WeightedTarget, GUESS_RATE, MAX_RESPONSE_LEN, RESPONSE_TOO_LONG,
};
use danci_calibration::types::{
    CognitiveProcess, ComponentType, SlotRole, TaskType, UserThetaProfile,
};

fn weighted(id: &str, component: ComponentType, difficulty: f64, weight: f64) -> WeightedTarget {
    WeightedTarget {
        object_id: id.to_string(),
        component,
        weight,
        difficulty,
        discrimination: 1.0,
        process: CognitiveProcess::Recall,
        role: SlotRole::Assessment,
        primary: true,
    }
}

#[test]
fn compensatory_midpoint_is_half() {
    let theta = UserThetaProfile::default();
    let p = expected_probability(
        &theta,
        &[weighted("w", ComponentType::Lex, 0.0, 1.0)],
        InteractionModel::Compensatory,
    );
    assert!((p - 0.5).abs() < 1e-12);
}

#[test]
fn conjunctive_weak_component_falls_to_guess() {
    let mut theta = UserThetaProfile::default();
    theta.set(ComponentType::Lex, 1.0);
    let targets = [
        weighted("word", ComponentType::Lex, 0.0, 0.5),
        weighted("clause", ComponentType::Synt, 1.0, 0.5),
    ];
    let p = expected_probability(&theta, &targets, InteractionModel::Conjunctive);
    assert_eq!(p, GUESS_RATE);

    let p = expected_probability(&theta, &targets, InteractionModel::Disjunctive);
    assert!(p > GUESS_RATE);
}

#[test]
fn composed_task_calibrates_end_to_end() {
    let template = TaskTemplate::new(
        "sentence",
        TaskType::SentenceCompletion,
        vec![
            ObjectSlot::new("verb", &[ComponentType::Lex], SlotRole::Assessment),
            ObjectSlot::new("frame", &[ComponentType::Synt], SlotRole::Practice)
                .with_process(CognitiveProcess::Production),
        ],
    );
    let pool = [
        candidate("deliver", ComponentType::Lex, 0.8, 0.2),
        candidate("passive", ComponentType::Synt, 0.6, 0.3),
    ];
    let outcome = TaskComposer::new(CompositionOptimizationConfig::default())
        .compose(&template, &pool, 5.0)
        .unwrap();
    let task = outcome.into_result().unwrap().task;

    let mut response = TaskResponse::text("it was deliver by passive");
    response.segments.insert("deliver".into(), "deliver".into());
    response.segments.insert("passive".into(), "nothing".into());

    let config = MultiObjectScoringConfig::default();
    let result = calibrate_task(&task, &response, &UserThetaProfile::default(), &config);

    assert_eq!(result.evaluation.credit_for("deliver"), 1.0);
    assert!(result.evaluation.credit_for("passive") < 0.5);
    assert!(result.evaluation.mean_credit() >= 0.5);
    assert!(result.update.delta_for(ComponentType::Lex) > 0.0);
    assert!(result.update.delta_for(ComponentType::Synt) <= 0.0);
    assert!(result.update.max_abs_delta() <= config.learning_rate + 1e-12);
    assert!(result.theta_after.lex > 0.0);
}

#[test]
fn oversized_response_is_rejected() {
    let evaluator = ResponseEvaluator::new(MultiObjectScoringConfig::default());
    let answers = [ExpectedAnswer::new("w", "house")];
    let response = TaskResponse::text("a".repeat(MAX_RESPONSE_LEN + 1));

    let evaluation = evaluator.evaluate(&response, &answers);
    assert_eq!(evaluation.rejected.as_deref(), Some(RESPONSE_TOO_LONG));
    assert_eq!(evaluation.credit_for("w"), 0.0);
}

#[test]
fn catastrophic_pattern_is_skipped() {
    let evaluator = ResponseEvaluator::new(MultiObjectScoringConfig::default());
    let mut answer = ExpectedAnswer::new("w", "house");
    answer.partial_patterns.push(PartialCreditPattern {
        pattern: "(a+)+$".to_string(),
        credit: 0.5,
        feedback: None,
    });

    let evaluation = evaluator.evaluate(&TaskResponse::text("aaaaaaaaaaaaaaaaaaaaaaaa!"), &[answer]);
    assert!(evaluation.rejected.is_none());
    assert_eq!(evaluation.credit_for("w"), 0.0);
}

fn arb_component() -> impl Strategy<Value = ComponentType> {
    prop_oneof![
        Just(ComponentType::Phon),
        Just(ComponentType::Morph),
        Just(ComponentType::Lex),
        Just(ComponentType::Synt),
        Just(ComponentType::Prag),
    ]
}

fn arb_process() -> impl Strategy<Value = CognitiveProcess> {
    prop_oneof![
        Just(CognitiveProcess::Recognition),
        Just(CognitiveProcess::Recall),
        Just(CognitiveProcess::Production),
        Just(CognitiveProcess::Transformation),
    ]
}

fn arb_target() -> impl Strategy<Value = (CalibrationTarget, f64)> {
    (
        arb_component(),
        arb_process(),
        -3.0f64..3.0,
        0.1f64..3.0,
        any::<bool>(),
        0.0f64..=1.0,
    )
        .prop_map(|(component, process, difficulty, discrimination, primary, credit)| {
            (
                CalibrationTarget {
                    object_id: String::new(),
                    component,
                    difficulty,
                    discrimination,
                    process,
                    role: if primary {
                        SlotRole::Assessment
                    } else {
                        SlotRole::Practice
                    },
                    primary,
                },
                credit,
            )
        })
}

fn arb_task_type() -> impl Strategy<Value = TaskType> {
    prop_oneof![
        Just(TaskType::Vocabulary),
        Just(TaskType::Collocation),
        Just(TaskType::SentenceCompletion),
        Just(TaskType::Translation),
        Just(TaskType::RegisterShift),
    ]
}

proptest! {
    #[test]
    fn theta_deltas_stay_within_learning_rate(
        raw in prop::collection::vec(arb_target(), 1..6),
        thetas in prop::array::uniform5(-3.0f64..3.0),
        lr in 0.01f64..0.5,
        task_type in arb_task_type(),
        model in prop_oneof![
            Just(InteractionModel::Compensatory),
            Just(InteractionModel::Conjunctive),
            Just(InteractionModel::Disjunctive),
        ],
    ) {
        let specs: Vec<CalibrationTarget> = raw
            .iter()
            .enumerate()
            .map(|(i, (t, _))| CalibrationTarget { object_id: format!("o{i}"), ..t.clone() })
            .collect();
        let evaluation = ResponseEvaluation {
            objects: raw
                .iter()
                .enumerate()
                .map(|(i, (_, credit))| ObjectEvaluation {
                    object_id: format!("o{i}"),
                    correct: *credit >= 1.0,
                    partial_credit: *credit,
                    similarity: *credit,
                    error_type: None,
                    feedback: None,
                })
                .collect(),
            rejected: None,
            cue_used: false,
        };
        let mut theta = UserThetaProfile::default();
        for (component, value) in ComponentType::ALL.iter().zip(thetas) {
            theta.set(*component, value);
        }

        let targets = allocate_weights(&specs, task_type);
        let update = update_theta(&theta, &targets, &evaluation, model, lr);
        prop_assert!(update.max_abs_delta() <= lr + 1e-12);
    }

    #[test]
    fn primary_share_is_at_least_half(
        raw in prop::collection::vec(arb_target(), 1..8),
        task_type in arb_task_type(),
    ) {
        let specs: Vec<CalibrationTarget> = raw.into_iter().map(|(t, _)| t).collect();
        let targets = allocate_weights(&specs, task_type);

        let total: f64 = targets.iter().map(|t| t.weight).sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        if targets.iter().any(|t| t.primary) {
            let primary: f64 = targets.iter().filter(|t| t.primary).map(|t| t.weight).sum();
            prop_assert!(primary >= 0.5 - 1e-9);
        }
    }
}
