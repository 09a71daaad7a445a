//! Per-object response evaluation with similarity-based partial credit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pattern::compile_pattern;
use crate::algorithm_config::MultiObjectScoringConfig;
use crate::composition::ExpectedAnswer;

pub const MAX_RESPONSE_LEN: usize = 2000;
pub const RESPONSE_TOO_LONG: &str = "Response exceeds maximum length";
const MEDIUM_BAND_CREDIT: f64 = 0.7;
const FORM_PREFIX_RATIO: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Omission,
    Substitution,
    Addition,
    Ordering,
    Form,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Omission => "omission",
            Self::Substitution => "substitution",
            Self::Addition => "addition",
            Self::Ordering => "ordering",
            Self::Form => "form",
        }
    }

    fn feedback(&self) -> &'static str {
        match self {
            Self::Omission => "Part of the expected answer is missing",
            Self::Substitution => "A different word or form was used",
            Self::Addition => "The answer contains extra material",
            Self::Ordering => "The right pieces are in the wrong order",
            Self::Form => "Right word, wrong form",
        }
    }
}

/// Raw learner input. `segments` maps object ids to per-slot answers when the UI collects them
/// separately; otherwise every target is located inside `text`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub text: String,
    #[serde(default)]
    pub segments: HashMap<String, String>,
    #[serde(default)]
    pub cue_used: bool,
}

impl TaskResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn exceeds_limit(&self) -> bool {
        self.text.chars().count() > MAX_RESPONSE_LEN
            || self
                .segments
                .values()
                .any(|s| s.chars().count() > MAX_RESPONSE_LEN)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEvaluation {
    pub object_id: String,
    pub correct: bool,
    pub partial_credit: f64,
    pub similarity: f64,
    pub error_type: Option<ErrorType>,
    pub feedback: Option<String>,
}

impl ObjectEvaluation {
    fn rejected(object_id: &str) -> Self {
        Self {
            object_id: object_id.to_string(),
            correct: false,
            partial_credit: 0.0,
            similarity: 0.0,
            error_type: None,
            feedback: Some(RESPONSE_TOO_LONG.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvaluation {
    pub objects: Vec<ObjectEvaluation>,
    /// Set when the response was refused without being scored.
    pub rejected: Option<String>,
    pub cue_used: bool,
}

impl ResponseEvaluation {
    pub fn for_object(&self, object_id: &str) -> Option<&ObjectEvaluation> {
        self.objects.iter().find(|o| o.object_id == object_id)
    }

    pub fn credit_for(&self, object_id: &str) -> f64 {
        self.for_object(object_id)
            .map(|o| o.partial_credit)
            .unwrap_or(0.0)
    }

    pub fn mean_credit(&self) -> f64 {
        if self.objects.is_empty() {
            return 0.0;
        }
        self.objects.iter().map(|o| o.partial_credit).sum::<f64>() / self.objects.len() as f64
    }
}

pub struct ResponseEvaluator {
    config: MultiObjectScoringConfig,
}

impl ResponseEvaluator {
    pub fn new(config: MultiObjectScoringConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, response: &TaskResponse, answers: &[ExpectedAnswer]) -> ResponseEvaluation {
        if response.exceeds_limit() {
            warn!(
                length = response.text.chars().count(),
                "response rejected: exceeds maximum length"
            );
            return ResponseEvaluation {
                objects: answers
                    .iter()
                    .map(|a| ObjectEvaluation::rejected(&a.object_id))
                    .collect(),
                rejected: Some(RESPONSE_TOO_LONG.to_string()),
                cue_used: response.cue_used,
            };
        }

        let objects = answers
            .iter()
            .map(|answer| {
                let raw = response
                    .segments
                    .get(&answer.object_id)
                    .unwrap_or(&response.text);
                self.evaluate_object(raw, answer)
            })
            .collect();

        ResponseEvaluation {
            objects,
            rejected: None,
            cue_used: response.cue_used,
        }
    }

    /// Evaluates independent (answers, response) pairs in order.
    pub fn evaluate_batch(
        &self,
        items: &[(&[ExpectedAnswer], &TaskResponse)],
    ) -> Vec<ResponseEvaluation> {
        items
            .iter()
            .map(|(answers, response)| self.evaluate(response, answers))
            .collect()
    }

    fn evaluate_object(&self, raw: &str, answer: &ExpectedAnswer) -> ObjectEvaluation {
        let response = normalize(raw);
        let (high, medium) = self.config.strictness.thresholds();
        let partial = self.config.partial_credit_enabled;

        let mut best = Match::default();
        for accepted in answer.accepted() {
            let candidate = best_match(&response, &normalize(accepted));
            if best.expected.is_empty() || candidate.similarity > best.similarity {
                best = candidate;
            }
        }

        let mut eval = ObjectEvaluation {
            object_id: answer.object_id.clone(),
            correct: false,
            partial_credit: 0.0,
            similarity: best.similarity,
            error_type: None,
            feedback: None,
        };

        if best.exact {
            eval.correct = true;
            eval.partial_credit = 1.0;
        } else if best.similarity >= high {
            eval.correct = true;
            eval.partial_credit = if partial { best.similarity } else { 1.0 };
            eval.feedback = Some("Minor variation from the expected answer".to_string());
        } else {
            let error = classify_error(&best.segment, &best.expected);
            eval.error_type = Some(error);
            eval.feedback = Some(error.feedback().to_string());
            if partial && best.similarity >= medium {
                eval.partial_credit = MEDIUM_BAND_CREDIT * best.similarity;
            }
        }

        if partial && eval.partial_credit < 1.0 {
            self.apply_patterns(&response, answer, &mut eval);
        }
        eval
    }

    fn apply_patterns(&self, response: &str, answer: &ExpectedAnswer, eval: &mut ObjectEvaluation) {
        for partial in &answer.partial_patterns {
            let regex = match compile_pattern(&partial.pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(
                        object_id = %answer.object_id,
                        pattern = %partial.pattern,
                        error = %e,
                        "skipping unsafe partial-credit pattern"
                    );
                    continue;
                }
            };
            let credit = partial.credit.clamp(0.0, 1.0);
            if credit > eval.partial_credit && regex.is_match(response) {
                eval.partial_credit = credit;
                if let Some(feedback) = &partial.feedback {
                    eval.feedback = Some(feedback.clone());
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Match {
    exact: bool,
    similarity: f64,
    segment: String,
    expected: String,
}

/// Compares against the whole response and every same-length token window of it.
fn best_match(response: &str, expected: &str) -> Match {
    let whole = similarity(response, expected);
    let mut best = Match {
        exact: response == expected,
        similarity: whole,
        segment: response.to_string(),
        expected: expected.to_string(),
    };
    if best.exact {
        return best;
    }

    let tokens: Vec<&str> = response.split(' ').collect();
    let width = expected.split(' ').count();
    if width == 0 || tokens.len() <= width {
        return best;
    }
    for window in tokens.windows(width) {
        let segment = window.join(" ");
        if segment == expected {
            best.exact = true;
            best.similarity = 1.0;
            best.segment = segment;
            return best;
        }
        let s = similarity(&segment, expected);
        if s > best.similarity {
            best.similarity = s;
            best.segment = segment;
        }
    }
    best
}

/// Trims, lowercases, collapses whitespace and drops trailing punctuation.
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
        .trim_end()
        .to_string()
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 1 - edit distance / longer length. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

pub fn classify_error(response: &str, expected: &str) -> ErrorType {
    if response.is_empty() {
        return ErrorType::Omission;
    }

    let mut r_tokens: Vec<&str> = response.split(' ').collect();
    let mut e_tokens: Vec<&str> = expected.split(' ').collect();
    if r_tokens.len() > 1 && r_tokens.len() == e_tokens.len() {
        r_tokens.sort_unstable();
        e_tokens.sort_unstable();
        if r_tokens == e_tokens {
            return ErrorType::Ordering;
        }
    }

    let r_len = response.chars().count();
    let e_len = expected.chars().count();
    if r_len < e_len && is_subsequence(response, expected) {
        return ErrorType::Omission;
    }
    if r_len > e_len && is_subsequence(expected, response) {
        return ErrorType::Addition;
    }
    if r_len == e_len {
        let mut r_chars: Vec<char> = response.chars().collect();
        let mut e_chars: Vec<char> = expected.chars().collect();
        r_chars.sort_unstable();
        e_chars.sort_unstable();
        if r_chars == e_chars {
            return ErrorType::Ordering;
        }
    }

    let prefix = response
        .chars()
        .zip(expected.chars())
        .take_while(|(a, b)| a == b)
        .count();
    if prefix >= 3 && prefix as f64 >= FORM_PREFIX_RATIO * r_len.min(e_len) as f64 {
        return ErrorType::Form;
    }
    ErrorType::Substitution
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut hay = haystack.chars();
    needle.chars().all(|c| hay.any(|h| h == c))
}
