//! Usage-space tracking and generalization estimates.

pub mod context;
pub mod generalization;
pub mod tracker;

pub use context::{context_distance, context_similarity, ContextRecord};
pub use generalization::{
    component_coverage, component_transfer_rate, transfer_probability, GeneralizationEstimate,
    GeneralizationEstimator, InferredCoverage, TransferEstimate, TransferKind,
};
pub use tracker::{
    object_readiness, revise_priority, ExpansionCandidate, ExpansionEvent, ObjectUsageSpace,
    UsageEvent, UsageRecordResult, SUCCESS_THRESHOLD,
};
