//! Linguistic constraint graph and cascading propagation.

pub mod graph;
pub mod propagation;
pub mod rules;

pub use graph::{
    Collocation, ConstraintEdge, ConstraintGraph, ConstraintGraphBuilder, ConstraintKind,
    EdgeModification,
};
pub use propagation::{
    propagate, validate_assignments, ConstraintExclusion, PreferenceAdjustment,
    PropagationResult, PropagationTrigger, PropertyModification, RequiredObject,
    RestrictionOrigin, SlotRestriction,
};
pub use rules::{LinguisticPredicate, LinguisticRule, LinguisticRuleTable, Restriction};
