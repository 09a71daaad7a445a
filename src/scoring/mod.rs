//! Multi-component calibration: Q-matrix weighting, response evaluation and ability updates.

pub mod evaluation;
pub mod mastery;
pub mod pattern;
pub mod probability;
pub mod qmatrix;
pub mod theta;

pub use evaluation::{
    classify_error, levenshtein, normalize, similarity, ErrorType, ObjectEvaluation,
    ResponseEvaluation, ResponseEvaluator, TaskResponse, MAX_RESPONSE_LEN, RESPONSE_TOO_LONG,
};
pub use mastery::{update_mastery, MasteryOutcome, Rating, SchedulerParams};
pub use pattern::{compile_pattern, validate_pattern, PatternError};
pub use probability::{expected_probability, InteractionModel, GUESS_RATE, SLIP_RATE};
pub use qmatrix::{allocate_weights, composite_difficulty, CalibrationTarget, QMatrixRow, WeightedTarget};
pub use theta::{apply_update, update_theta, TargetDelta, ThetaUpdate};

use serde::{Deserialize, Serialize};

use crate::algorithm_config::MultiObjectScoringConfig;
use crate::composition::ComposedTask;
use crate::types::UserThetaProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationResult {
    pub targets: Vec<WeightedTarget>,
    pub evaluation: ResponseEvaluation,
    pub update: ThetaUpdate,
    pub theta_after: UserThetaProfile,
}

/// Scores a composed task end to end: weights, evaluation, probability and theta update.
pub fn calibrate_task(
    task: &ComposedTask,
    response: &TaskResponse,
    theta: &UserThetaProfile,
    config: &MultiObjectScoringConfig,
) -> CalibrationResult {
    let specs: Vec<CalibrationTarget> = task.slots.iter().map(CalibrationTarget::from).collect();
    let targets = allocate_weights(&specs, task.task_type);
    let model = config
        .interaction_model
        .unwrap_or_else(|| QMatrixRow::for_task(task.task_type).interaction_model);

    let evaluation = ResponseEvaluator::new(config.clone()).evaluate(response, &task.expected_answers);
    let update = update_theta(theta, &targets, &evaluation, model, config.learning_rate);
    let theta_after = apply_update(theta, &update);

    tracing::debug!(
        task_id = %task.id,
        model = %model,
        expected_probability = update.expected_probability,
        global_delta = update.global_delta,
        "task calibrated"
    );

    CalibrationResult {
        targets,
        evaluation,
        update,
        theta_after,
    }
}
