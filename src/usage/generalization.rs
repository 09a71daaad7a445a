//! Transfer estimation from practiced to unpracticed usage contexts.

use serde::{Deserialize, Serialize};

use super::context::{context_distance, context_similarity};
use super::tracker::ObjectUsageSpace;
use crate::algorithm_config::RepresentativeSamplingStrategy;
use crate::types::{ComponentType, UsageContext};

const NEAR_TRANSFER_MAX_DISTANCE: f64 = 0.5;
const DISTANCE_DECAY: f64 = 2.0;
const AUTOMATION_GAIN: f64 = 0.3;
/// Picks that must differ from every earlier pick in domain or register.
const DIVERSE_PICKS: usize = 3;
pub const DEFAULT_MAX_SAMPLES: usize = 3;

/// How readily skill in one component carries over to new contexts.
pub fn component_transfer_rate(component: ComponentType) -> f64 {
    match component {
        ComponentType::Phon => 0.9,
        ComponentType::Morph => 0.8,
        ComponentType::Lex => 0.7,
        ComponentType::Synt => 0.6,
        ComponentType::Prag => 0.45,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Near,
    Far,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEstimate {
    pub source: UsageContext,
    pub target: UsageContext,
    pub distance: f64,
    pub probability: f64,
    pub kind: TransferKind,
}

pub fn transfer_probability(
    source: &UsageContext,
    target: &UsageContext,
    source_automation: f64,
) -> TransferEstimate {
    let distance = context_distance(source, target);
    let probability = ((-DISTANCE_DECAY * distance).exp()
        + AUTOMATION_GAIN * source_automation.clamp(0.0, 1.0))
    .min(1.0);
    TransferEstimate {
        source: source.clone(),
        target: target.clone(),
        distance,
        probability,
        kind: if distance <= NEAR_TRANSFER_MAX_DISTANCE {
            TransferKind::Near
        } else {
            TransferKind::Far
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredCoverage {
    pub context: UsageContext,
    pub probability: f64,
    pub source: Option<UsageContext>,
    pub kind: Option<TransferKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralizationEstimate {
    pub object_id: String,
    pub component: ComponentType,
    pub direct_coverage: f64,
    pub inferred_coverage: Vec<InferredCoverage>,
    pub estimated_total_coverage: f64,
    pub recommended_next_contexts: Vec<UsageContext>,
}

/// Mean estimated coverage per component over many objects' estimates, in
/// `ComponentType::ALL` order. Components with no estimates report `None`.
pub fn component_coverage(estimates: &[GeneralizationEstimate]) -> [Option<f64>; 5] {
    let mut sums = [0.0; 5];
    let mut counts = [0usize; 5];
    for e in estimates {
        sums[e.component.index()] += e.estimated_total_coverage;
        counts[e.component.index()] += 1;
    }
    let mut out = [None; 5];
    for i in 0..5 {
        if counts[i] > 0 {
            out[i] = Some(sums[i] / counts[i] as f64);
        }
    }
    out
}

pub struct GeneralizationEstimator {
    strategy: RepresentativeSamplingStrategy,
    max_samples: usize,
}

impl GeneralizationEstimator {
    pub fn new(strategy: RepresentativeSamplingStrategy) -> Self {
        Self {
            strategy,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// `automation` is the object's cue-free accuracy.
    pub fn estimate(
        &self,
        space: &ObjectUsageSpace,
        goal_contexts: &[UsageContext],
        automation: f64,
    ) -> GeneralizationEstimate {
        let rate = component_transfer_rate(space.component);
        let successful = space.successful_contexts.len();
        let min_samples = self.strategy.min_samples_for_generalization;
        let damping = if min_samples > 0 && successful < min_samples {
            successful as f64 / min_samples as f64
        } else {
            1.0
        };

        let covered = goal_contexts
            .iter()
            .filter(|c| space.is_successful(c))
            .count();
        let direct_coverage = if goal_contexts.is_empty() {
            1.0
        } else {
            covered as f64 / goal_contexts.len() as f64
        };

        let inferred_coverage: Vec<InferredCoverage> = goal_contexts
            .iter()
            .filter(|c| !space.is_successful(c))
            .map(|target| {
                let best = space
                    .successful_contexts
                    .iter()
                    .map(|r| transfer_probability(&r.context, target, automation))
                    .fold(None::<TransferEstimate>, |best, t| match best {
                        Some(b) if b.probability >= t.probability => Some(b),
                        _ => Some(t),
                    });
                match best {
                    Some(t) => InferredCoverage {
                        context: target.clone(),
                        probability: (t.probability * rate * damping).clamp(0.0, 1.0),
                        source: Some(t.source),
                        kind: Some(t.kind),
                    },
                    None => InferredCoverage {
                        context: target.clone(),
                        probability: 0.0,
                        source: None,
                        kind: None,
                    },
                }
            })
            .collect();

        let estimated_total_coverage = if goal_contexts.is_empty() {
            1.0
        } else {
            (covered as f64 + inferred_coverage.iter().map(|i| i.probability).sum::<f64>())
                / goal_contexts.len() as f64
        };

        let uncovered: Vec<UsageContext> =
            inferred_coverage.iter().map(|i| i.context.clone()).collect();
        let recommended_next_contexts =
            self.select_representative(space, &uncovered, goal_contexts, automation);

        GeneralizationEstimate {
            object_id: space.object_id.clone(),
            component: space.component,
            direct_coverage,
            inferred_coverage,
            estimated_total_coverage,
            recommended_next_contexts,
        }
    }

    /// Greedy selection of up to `max_samples` contexts worth practicing next.
    pub fn select_representative(
        &self,
        space: &ObjectUsageSpace,
        candidates: &[UsageContext],
        goal_contexts: &[UsageContext],
        automation: f64,
    ) -> Vec<UsageContext> {
        let mut pool: Vec<&UsageContext> = candidates
            .iter()
            .filter(|c| !space.is_successful(c))
            .collect();
        pool.sort();
        pool.dedup();

        let mut selected: Vec<UsageContext> = Vec::new();
        while selected.len() < self.max_samples && !pool.is_empty() {
            let enforce_diversity = selected.len() < DIVERSE_PICKS;
            let mut best: Option<(usize, f64)> = None;
            let mut fallback: Option<(usize, f64)> = None;

            for (i, context) in pool.iter().enumerate() {
                let score = self.sample_score(space, context, goal_contexts, &selected, automation);
                let distinct = selected
                    .iter()
                    .all(|s| s.domain != context.domain || s.register != context.register);
                if fallback.map_or(true, |(_, f)| score > f) {
                    fallback = Some((i, score));
                }
                if (!enforce_diversity || distinct) && best.map_or(true, |(_, b)| score > b) {
                    best = Some((i, score));
                }
            }

            let Some((index, _)) = best.or(fallback) else {
                break;
            };
            selected.push(pool.remove(index).clone());
        }
        selected
    }

    fn sample_score(
        &self,
        space: &ObjectUsageSpace,
        context: &UsageContext,
        goal_contexts: &[UsageContext],
        selected: &[UsageContext],
        automation: f64,
    ) -> f64 {
        // mean similarity to the rest of the goal set: central contexts stand in for more goals
        let others: Vec<&UsageContext> = goal_contexts.iter().filter(|g| *g != context).collect();
        let goal_alignment = if others.is_empty() {
            1.0
        } else {
            others.iter().map(|g| context_similarity(g, context)).sum::<f64>() / others.len() as f64
        };

        let diversity = 1.0
            - space
                .successful_contexts
                .iter()
                .map(|r| &r.context)
                .chain(selected.iter())
                .map(|other| context_similarity(other, context))
                .fold(0.0, f64::max);

        let transfer_potential = space
            .successful_contexts
            .iter()
            .map(|r| transfer_probability(&r.context, context, automation).probability)
            .fold(0.0, f64::max);

        goal_alignment * self.strategy.goal_weight
            + diversity * self.strategy.diversity_weight
            + transfer_potential * self.strategy.transfer_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::tracker::UsageEvent;

    fn ctx(domain: &str, register: &str, modality: &str, genre: &str) -> UsageContext {
        UsageContext::new(domain, register, modality, genre)
    }

    fn practiced(component: ComponentType, contexts: &[UsageContext], targets: Vec<UsageContext>) -> ObjectUsageSpace {
        let mut space = ObjectUsageSpace::new("w1", component, targets);
        for c in contexts {
            space.record_usage(&UsageEvent {
                object_id: "w1".into(),
                context: c.clone(),
                score: 1.0,
                timestamp: 0,
            });
        }
        space
    }

    #[test]
    fn test_transfer_probability() {
        let a = ctx("business", "formal", "written", "email");
        let same = transfer_probability(&a, &a, 0.0);
        assert_eq!(same.probability, 1.0);
        assert_eq!(same.kind, TransferKind::Near);

        let b = ctx("travel", "casual", "spoken", "chat");
        let far = transfer_probability(&a, &b, 0.5);
        assert!((far.probability - ((-2.0f64).exp() + 0.15)).abs() < 1e-12);
        assert_eq!(far.kind, TransferKind::Far);
    }

    #[test]
    fn test_component_rates_ordered() {
        let rates: Vec<f64> = ComponentType::ALL
            .iter()
            .map(|c| component_transfer_rate(*c))
            .collect();
        assert!(rates.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_estimate_combines_direct_and_inferred() {
        let known = ctx("business", "formal", "written", "email");
        let near = ctx("business", "formal", "written", "report");
        let goals = vec![known.clone(), near.clone()];
        let space = practiced(ComponentType::Lex, &[known.clone()], goals.clone());

        let estimator = GeneralizationEstimator::new(RepresentativeSamplingStrategy {
            min_samples_for_generalization: 1,
            ..Default::default()
        });
        let estimate = estimator.estimate(&space, &goals, 0.0);
        assert_eq!(estimate.direct_coverage, 0.5);
        assert_eq!(estimate.inferred_coverage.len(), 1);

        let expected = (-2.0f64 * 0.4).exp() * 0.7;
        assert!((estimate.inferred_coverage[0].probability - expected).abs() < 1e-9);
        assert!((estimate.estimated_total_coverage - (1.0 + expected) / 2.0).abs() < 1e-9);
        assert_eq!(estimate.recommended_next_contexts, vec![near]);
    }

    #[test]
    fn test_sparse_evidence_is_damped() {
        let known = ctx("business", "formal", "written", "email");
        let near = ctx("business", "formal", "written", "report");
        let goals = vec![known.clone(), near];
        let space = practiced(ComponentType::Lex, &[known], goals.clone());

        let strict = GeneralizationEstimator::new(RepresentativeSamplingStrategy::default());
        let loose = GeneralizationEstimator::new(RepresentativeSamplingStrategy {
            min_samples_for_generalization: 1,
            ..Default::default()
        });
        let damped = strict.estimate(&space, &goals, 0.0).inferred_coverage[0].probability;
        let full = loose.estimate(&space, &goals, 0.0).inferred_coverage[0].probability;
        assert!((damped - full / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_representative_picks_are_diverse() {
        let known = ctx("business", "formal", "written", "email");
        let candidates = vec![
            ctx("business", "formal", "spoken", "email"),
            ctx("business", "formal", "written", "report"),
            ctx("travel", "casual", "spoken", "chat"),
            ctx("academic", "formal", "written", "essay"),
        ];
        let space = practiced(ComponentType::Lex, &[known], candidates.clone());
        let picks = GeneralizationEstimator::new(RepresentativeSamplingStrategy::default())
            .select_representative(&space, &candidates, &candidates, 0.5);

        assert_eq!(picks.len(), 3);
        for (i, a) in picks.iter().enumerate() {
            for b in &picks[i + 1..] {
                assert!(a.domain != b.domain || a.register != b.register);
            }
        }
    }

    #[test]
    fn test_central_goal_context_preferred() {
        let outlier = ctx("academic", "casual", "spoken", "chat");
        let goals = vec![
            outlier.clone(),
            ctx("business", "formal", "written", "email"),
            ctx("business", "neutral", "written", "email"),
        ];
        let space = ObjectUsageSpace::new("w1", ComponentType::Lex, goals.clone());
        let picks = GeneralizationEstimator::new(RepresentativeSamplingStrategy::default())
            .with_max_samples(1)
            .select_representative(&space, &goals, &goals, 0.5);

        assert_eq!(picks.len(), 1);
        assert_ne!(picks[0], outlier);
        assert_eq!(picks[0].domain, "business");
    }

    #[test]
    fn test_empty_goal_contexts() {
        let space = ObjectUsageSpace::new("w1", ComponentType::Prag, Vec::new());
        let estimate =
            GeneralizationEstimator::new(RepresentativeSamplingStrategy::default()).estimate(&space, &[], 1.0);
        assert_eq!(estimate.direct_coverage, 1.0);
        assert_eq!(estimate.estimated_total_coverage, 1.0);
        assert!(estimate.recommended_next_contexts.is_empty());
    }
}
