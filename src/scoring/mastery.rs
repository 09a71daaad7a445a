//! Post-calibration MasteryRecord advancement.
//!
//! Scheduling follows the FSRS memory model: stability in days, difficulty on a 0..1 scale,
//! and a retention target that decides the next review interval.

use serde::{Deserialize, Serialize};

use crate::types::{MasteryRecord, MAX_STAGE};

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;
const MS_PER_DAY: f64 = 86_400_000.0;
const ACCURACY_ALPHA: f64 = 0.2;
const SUCCESS_CREDIT: f64 = 0.6;
const LAPSE_MIN_STAGE: u8 = 2;

/// (minimum cue-free accuracy, minimum stability days) to leave each stage.
const PROMOTION: [(f64, f64); 6] = [
    (0.0, 0.0),
    (0.3, 1.0),
    (0.5, 3.0),
    (0.7, 7.0),
    (0.8, 21.0),
    (0.9, 60.0),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerParams {
    pub w: [f64; 17],
    pub desired_retention: f64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            w: [
                0.4, 0.6, 2.4, 5.8, // initial stability per rating
                4.93, 0.94, 0.86, 0.01, 1.49, // difficulty, recall
                0.14, 0.94, 2.18, 0.05, 0.34, // recall, forget
                1.26, 0.29, 2.61, // forget, hard penalty, easy bonus
            ],
            desired_retention: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    /// Cue use caps a successful response at `Hard`.
    pub fn from_credit(credit: f64, cue_used: bool) -> Self {
        if credit < SUCCESS_CREDIT {
            Self::Again
        } else if cue_used || credit < 0.8 {
            Self::Hard
        } else if credit < 0.95 {
            Self::Good
        } else {
            Self::Easy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryOutcome {
    pub partial_credit: f64,
    pub cue_used: bool,
}

pub fn retrievability(stability: f64, elapsed_days: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (1.0 + FACTOR * elapsed_days.max(0.0) / stability).powf(DECAY)
}

pub fn update_mastery(
    record: &MasteryRecord,
    outcome: MasteryOutcome,
    now_ms: i64,
    params: &SchedulerParams,
) -> MasteryRecord {
    let credit = outcome.partial_credit.clamp(0.0, 1.0);
    let rating = Rating::from_credit(credit, outcome.cue_used);
    let w = &params.w;
    let mut next = record.clone();

    next.exposure_count = record.exposure_count.saturating_add(1);
    if outcome.cue_used {
        next.cue_assisted_accuracy = ema(record.cue_assisted_accuracy, credit);
    } else {
        next.cue_free_accuracy = ema(record.cue_free_accuracy, credit);
    }

    let first_review = record.last_review.is_none() || record.stability <= 0.0;
    if first_review {
        next.stability = w[rating as usize - 1].max(0.1);
        next.difficulty = initial_difficulty(w, rating);
    } else {
        let elapsed_days = record
            .last_review
            .map(|last| (now_ms - last) as f64 / MS_PER_DAY)
            .unwrap_or(0.0);
        let r = retrievability(record.stability, elapsed_days);
        next.difficulty = next_difficulty(w, record.difficulty, rating);
        next.stability = if rating == Rating::Again {
            forget_stability(w, record.difficulty, record.stability, r)
        } else {
            recall_stability(w, record.difficulty, record.stability, r, rating)
        };
    }

    if rating == Rating::Again {
        if record.stage >= LAPSE_MIN_STAGE {
            next.stage = record.stage - 1;
            next.lapses = record.lapses.saturating_add(1);
        }
    } else if let Some(&(min_accuracy, min_stability)) = PROMOTION.get(record.stage as usize) {
        // cued success is enough to leave stage 0, later stages need cue-free recall
        let accuracy = if record.stage == 0 {
            next.cue_free_accuracy.max(next.cue_assisted_accuracy)
        } else {
            next.cue_free_accuracy
        };
        if accuracy >= min_accuracy && next.stability >= min_stability {
            next.stage = (record.stage + 1).min(MAX_STAGE);
        }
    }

    let interval_days = next_interval(next.stability, params.desired_retention);
    next.last_review = Some(now_ms);
    next.next_review = Some(now_ms + (interval_days * MS_PER_DAY) as i64);
    next
}

fn ema(previous: f64, observed: f64) -> f64 {
    ((1.0 - ACCURACY_ALPHA) * previous + ACCURACY_ALPHA * observed).clamp(0.0, 1.0)
}

fn initial_difficulty(w: &[f64; 17], rating: Rating) -> f64 {
    let d = w[4] - (rating as i32 - 3) as f64 * w[5];
    d.clamp(1.0, 10.0) / 10.0
}

fn next_difficulty(w: &[f64; 17], d: f64, rating: Rating) -> f64 {
    let d_new = d * 10.0 - w[6] * (rating as i32 - 3) as f64;
    let reverted = w[7] * (w[4] - 3.0 * w[5]) + (1.0 - w[7]) * d_new;
    reverted.clamp(1.0, 10.0) / 10.0
}

fn recall_stability(w: &[f64; 17], d: f64, s: f64, r: f64, rating: Rating) -> f64 {
    let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };
    let growth = w[8].exp()
        * (11.0 - d * 10.0)
        * s.powf(-w[9])
        * ((1.0 - r) * w[10]).exp_m1()
        * hard_penalty
        * easy_bonus;
    (s * (1.0 + growth)).max(0.1)
}

fn forget_stability(w: &[f64; 17], d: f64, s: f64, r: f64) -> f64 {
    let next =
        w[11] * (d * 10.0).powf(-w[12]) * ((s + 1.0).powf(w[13]) - 1.0) * ((1.0 - r) * w[14]).exp();
    next.clamp(0.1, s.max(0.1))
}

fn next_interval(stability: f64, desired_retention: f64) -> f64 {
    let retention = desired_retention.clamp(0.0001, 0.9999);
    (stability / FACTOR * (retention.powf(1.0 / DECAY) - 1.0)).clamp(1.0, 36500.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn correct() -> MasteryOutcome {
        MasteryOutcome {
            partial_credit: 1.0,
            cue_used: false,
        }
    }

    #[test]
    fn test_rating_from_credit() {
        assert_eq!(Rating::from_credit(0.3, false), Rating::Again);
        assert_eq!(Rating::from_credit(1.0, true), Rating::Hard);
        assert_eq!(Rating::from_credit(0.9, false), Rating::Good);
        assert_eq!(Rating::from_credit(1.0, false), Rating::Easy);
    }

    #[test]
    fn test_first_review_schedules_and_promotes() {
        let next = update_mastery(&MasteryRecord::default(), correct(), NOW, &SchedulerParams::default());
        assert_eq!(next.exposure_count, 1);
        assert_eq!(next.stage, 1);
        assert!((next.cue_free_accuracy - 0.2).abs() < 1e-9);
        assert!((next.stability - 5.8).abs() < 1e-9);
        assert_eq!(next.last_review, Some(NOW));
        assert!(next.next_review.unwrap() > NOW);
    }

    #[test]
    fn test_cue_use_updates_assisted_accuracy() {
        let outcome = MasteryOutcome {
            partial_credit: 1.0,
            cue_used: true,
        };
        let next = update_mastery(&MasteryRecord::default(), outcome, NOW, &SchedulerParams::default());
        assert_eq!(next.cue_free_accuracy, 0.0);
        assert!((next.cue_assisted_accuracy - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_lapse_drops_stage() {
        let record = MasteryRecord {
            stage: 3,
            stability: 10.0,
            difficulty: 0.4,
            exposure_count: 12,
            cue_free_accuracy: 0.8,
            last_review: Some(NOW - 5 * MS_PER_DAY as i64),
            ..Default::default()
        };
        let outcome = MasteryOutcome {
            partial_credit: 0.0,
            cue_used: false,
        };
        let next = update_mastery(&record, outcome, NOW, &SchedulerParams::default());
        assert_eq!(next.stage, 2);
        assert_eq!(next.lapses, 1);
        assert!(next.stability <= record.stability);
    }

    #[test]
    fn test_early_failure_is_not_a_lapse() {
        let record = MasteryRecord {
            stage: 1,
            stability: 2.0,
            last_review: Some(NOW - MS_PER_DAY as i64),
            ..Default::default()
        };
        let outcome = MasteryOutcome {
            partial_credit: 0.1,
            cue_used: false,
        };
        let next = update_mastery(&record, outcome, NOW, &SchedulerParams::default());
        assert_eq!(next.stage, 1);
        assert_eq!(next.lapses, 0);
    }

    #[test]
    fn test_stage_never_exceeds_max() {
        let record = MasteryRecord {
            stage: MAX_STAGE,
            stability: 200.0,
            cue_free_accuracy: 1.0,
            last_review: Some(NOW - 30 * MS_PER_DAY as i64),
            ..Default::default()
        };
        let next = update_mastery(&record, correct(), NOW, &SchedulerParams::default());
        assert_eq!(next.stage, MAX_STAGE);
    }

    #[test]
    fn test_recall_grows_stability() {
        let record = MasteryRecord {
            stage: 2,
            stability: 3.0,
            difficulty: 0.5,
            cue_free_accuracy: 0.5,
            last_review: Some(NOW - 3 * MS_PER_DAY as i64),
            ..Default::default()
        };
        let next = update_mastery(&record, correct(), NOW, &SchedulerParams::default());
        assert!(next.stability > record.stability);
    }
}
