//! Task composition: economic valuation of candidates and slot filling.

pub mod composer;
pub mod economics;
pub mod task;
pub mod template;

pub use composer::{
    CompositionError, CompositionFailure, CompositionOutcome, CompositionResult, ExcludedObject,
    ExclusionReason, TaskComposer,
};
pub use economics::{EconomicValue, EconomicValueCalculator, ObjectCandidate, RoleAffinity};
pub use task::{
    build_rubric, composite_difficulty, ComposedTask, ExpectedAnswer, FilledSlot,
    PartialCreditPattern, Rubric, RubricCriterion,
};
pub use template::{ObjectSlot, SlotConstraints, SynergyRequirement, TaskTemplate};
