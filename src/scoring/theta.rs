//! Per-component ability update from one scored response.

use serde::{Deserialize, Serialize};

use super::evaluation::ResponseEvaluation;
use super::probability::{expected_probability, InteractionModel};
use super::qmatrix::WeightedTarget;
use crate::types::{ComponentType, UserThetaProfile, MAX_THETA, MIN_THETA};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDelta {
    pub object_id: String,
    pub component: ComponentType,
    pub partial_credit: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThetaUpdate {
    pub expected_probability: f64,
    pub interaction_model: InteractionModel,
    /// Summed per component, in `ComponentType::ALL` order.
    pub component_deltas: [f64; 5],
    pub global_delta: f64,
    pub targets: Vec<TargetDelta>,
}

impl ThetaUpdate {
    pub fn delta_for(&self, component: ComponentType) -> f64 {
        self.component_deltas[component.index()]
    }

    pub fn max_abs_delta(&self) -> f64 {
        self.component_deltas
            .iter()
            .chain(std::iter::once(&self.global_delta))
            .fold(0.0_f64, |acc, d| acc.max(d.abs()))
    }
}

/// `lr * w * (credit - P) * (1 - |theta|/3) * a * role`, bounded so no component moves by more
/// than `lr`.
pub fn update_theta(
    theta: &UserThetaProfile,
    targets: &[WeightedTarget],
    evaluation: &ResponseEvaluation,
    model: InteractionModel,
    learning_rate: f64,
) -> ThetaUpdate {
    let lr = if learning_rate.is_finite() {
        learning_rate.max(0.0)
    } else {
        0.0
    };
    let p = expected_probability(theta, targets, model);

    let mut component_deltas = [0.0; 5];
    let mut per_target = Vec::with_capacity(targets.len());
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for target in targets {
        let credit = evaluation.credit_for(&target.object_id).clamp(0.0, 1.0);
        let current = theta.get(target.component);
        let decay = (1.0 - current.abs() / MAX_THETA).clamp(0.0, 1.0);
        let weight = target.weight.clamp(0.0, 1.0);
        // w * a never exceeds 1
        let discrimination = if weight > f64::EPSILON {
            target.discrimination.max(0.0).min(1.0 / weight)
        } else {
            0.0
        };

        let delta = lr
            * weight
            * (credit - p)
            * decay
            * discrimination
            * target.role.theta_multiplier();

        component_deltas[target.component.index()] += delta;
        weighted_sum += weight * delta;
        weight_total += weight;
        per_target.push(TargetDelta {
            object_id: target.object_id.clone(),
            component: target.component,
            partial_credit: credit,
            delta,
        });
    }

    for d in component_deltas.iter_mut() {
        *d = d.clamp(-lr, lr);
    }
    let global_delta = if weight_total > f64::EPSILON {
        (weighted_sum / weight_total).clamp(-lr, lr)
    } else {
        0.0
    };

    ThetaUpdate {
        expected_probability: p,
        interaction_model: model,
        component_deltas,
        global_delta,
        targets: per_target,
    }
}

/// Applies an update, keeping every ability on the theta scale.
pub fn apply_update(theta: &UserThetaProfile, update: &ThetaUpdate) -> UserThetaProfile {
    let mut next = *theta;
    for component in ComponentType::ALL {
        let value = theta.get(component) + update.delta_for(component);
        next.set(component, value.clamp(MIN_THETA, MAX_THETA));
    }
    next.global = (theta.global + update.global_delta).clamp(MIN_THETA, MAX_THETA);
    next
}
