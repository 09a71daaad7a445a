//! Static cross-component linguistic rules.
//!
//! Each (source component, target component) pair maps to an ordered list of predicates the
//! propagation step applies to unfilled slots accepting the target component.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ComponentType, GrammaticalNumber, LanguageObject, Register, Transitivity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinguisticPredicate {
    SyntacticAgreement,
    PhonologicalCompatibility,
    MorphologicalDerivation,
    RegisterConsistency,
}

impl LinguisticPredicate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntacticAgreement => "syntactic_agreement",
            Self::PhonologicalCompatibility => "phonological_compatibility",
            Self::MorphologicalDerivation => "morphological_derivation",
            Self::RegisterConsistency => "register_consistency",
        }
    }

    /// Every candidate filter this predicate imposes given the trigger. Empty when the trigger
    /// carries nothing the predicate can act on.
    pub fn restrictions_for<'a>(&self, trigger: &'a LanguageObject) -> Vec<Restriction<'a>> {
        match self {
            Self::SyntacticAgreement => syntactic_agreement(trigger),
            Self::PhonologicalCompatibility => trigger
                .properties
                .pattern
                .as_deref()
                .map(Restriction::PhonologicalPattern)
                .into_iter()
                .collect(),
            Self::MorphologicalDerivation => trigger
                .properties
                .root
                .as_deref()
                .map(Restriction::SharedRoot)
                .into_iter()
                .collect(),
            Self::RegisterConsistency => trigger
                .properties
                .register
                .map(Restriction::RegisterNear)
                .into_iter()
                .collect(),
        }
    }
}

fn syntactic_agreement(trigger: &LanguageObject) -> Vec<Restriction<'_>> {
    let mut restrictions = Vec::new();
    if trigger.properties.signals_passive() {
        restrictions.push(Restriction::TransitiveVerb);
    }
    if trigger.properties.signals_plural_subject() {
        restrictions.push(Restriction::PluralVerbForm);
    }
    restrictions
}

/// Concrete candidate filter derived from a trigger object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Restriction<'a> {
    TransitiveVerb,
    PluralVerbForm,
    PhonologicalPattern(&'a str),
    SharedRoot(&'a str),
    RegisterNear(Register),
}

impl Restriction<'_> {
    pub fn allows(&self, candidate: &LanguageObject) -> bool {
        let props = &candidate.properties;
        match self {
            Self::TransitiveVerb => matches!(
                props.transitivity,
                Some(Transitivity::Transitive | Transitivity::Ditransitive)
            ),
            Self::PluralVerbForm => matches!(
                props.number,
                Some(GrammaticalNumber::Plural | GrammaticalNumber::Both)
            ),
            Self::PhonologicalPattern(pattern) => props.pattern.as_deref().is_some_and(|p| {
                let p = p.to_lowercase();
                let trigger = pattern.to_lowercase();
                !p.is_empty() && (p == trigger || trigger.contains(&p))
            }),
            Self::SharedRoot(root) => props
                .root
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(root)),
            // Unmarked candidates sit at the neutral register.
            Self::RegisterNear(register) => props
                .register
                .unwrap_or(Register::Consultative)
                .is_within_one_step(*register),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::TransitiveVerb => "passive voice requires a transitive verb".to_string(),
            Self::PluralVerbForm => "plural subject requires a plural verb form".to_string(),
            Self::PhonologicalPattern(p) => format!("must fit phonological pattern '{p}'"),
            Self::SharedRoot(r) => format!("must share root '{r}'"),
            Self::RegisterNear(r) => format!("register must be within one step of {}", r.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinguisticRule {
    pub predicate: LinguisticPredicate,
    pub default_strength: f64,
}

#[derive(Debug, Clone)]
pub struct LinguisticRuleTable {
    rules: HashMap<(ComponentType, ComponentType), Vec<LinguisticRule>>,
    min_strength: f64,
}

impl Default for LinguisticRuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl LinguisticRuleTable {
    pub const DEFAULT_MIN_STRENGTH: f64 = 0.5;

    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            min_strength: Self::DEFAULT_MIN_STRENGTH,
        }
    }

    pub fn standard() -> Self {
        use ComponentType::*;
        use LinguisticPredicate::*;

        let mut table = Self::empty();
        table.insert(Synt, Lex, SyntacticAgreement, 0.9);
        table.insert(Synt, Lex, RegisterConsistency, 0.6);
        table.insert(Synt, Morph, SyntacticAgreement, 0.8);
        table.insert(Morph, Lex, MorphologicalDerivation, 0.8);
        table.insert(Lex, Morph, MorphologicalDerivation, 0.7);
        table.insert(Phon, Lex, PhonologicalCompatibility, 0.7);
        table.insert(Phon, Morph, PhonologicalCompatibility, 0.6);
        table.insert(Prag, Lex, RegisterConsistency, 0.9);
        table.insert(Prag, Synt, RegisterConsistency, 0.8);
        table.insert(Lex, Lex, RegisterConsistency, 0.5);
        table
    }

    pub fn insert(
        &mut self,
        source: ComponentType,
        target: ComponentType,
        predicate: LinguisticPredicate,
        default_strength: f64,
    ) {
        let rules = self.rules.entry((source, target)).or_default();
        rules.retain(|r| r.predicate != predicate);
        rules.push(LinguisticRule {
            predicate,
            default_strength: default_strength.clamp(0.0, 1.0),
        });
    }

    pub fn with_min_strength(mut self, min_strength: f64) -> Self {
        self.min_strength = min_strength.clamp(0.0, 1.0);
        self
    }

    pub fn min_strength(&self) -> f64 {
        self.min_strength
    }

    pub fn rules(&self, source: ComponentType, target: ComponentType) -> &[LinguisticRule] {
        self.rules
            .get(&(source, target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rules with `source` as their source component, in a stable target order.
    pub fn rules_from(
        &self,
        source: ComponentType,
    ) -> impl Iterator<Item = (ComponentType, &LinguisticRule)> + '_ {
        let min_strength = self.min_strength;
        ComponentType::ALL.into_iter().flat_map(move |target| {
            self.rules(source, target)
                .iter()
                .filter(move |r| r.default_strength >= min_strength)
                .map(move |r| (target, r))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectProperties;

    fn object_with(props: ObjectProperties) -> LanguageObject {
        LanguageObject::new("x", ComponentType::Lex, "x").with_properties(props)
    }

    #[test]
    fn test_passive_requires_transitive() {
        let trigger = object_with(ObjectProperties {
            pattern: Some("passive".into()),
            ..Default::default()
        });
        let restrictions = LinguisticPredicate::SyntacticAgreement.restrictions_for(&trigger);
        assert_eq!(restrictions, vec![Restriction::TransitiveVerb]);
        let restriction = restrictions[0];
        let transitive = object_with(ObjectProperties {
            transitivity: Some(Transitivity::Ditransitive),
            ..Default::default()
        });
        let intransitive = object_with(ObjectProperties {
            transitivity: Some(Transitivity::Intransitive),
            ..Default::default()
        });
        assert!(restriction.allows(&transitive));
        assert!(!restriction.allows(&intransitive));
        assert!(!restriction.allows(&object_with(ObjectProperties::default())));
    }

    #[test]
    fn test_unmarked_trigger_imposes_nothing() {
        let trigger = object_with(ObjectProperties::default());
        for predicate in [
            LinguisticPredicate::SyntacticAgreement,
            LinguisticPredicate::PhonologicalCompatibility,
            LinguisticPredicate::MorphologicalDerivation,
            LinguisticPredicate::RegisterConsistency,
        ] {
            assert!(predicate.restrictions_for(&trigger).is_empty());
        }
    }

    #[test]
    fn test_plural_subject_requires_plural_form() {
        let trigger = object_with(ObjectProperties {
            pattern: Some("plural_subject".into()),
            ..Default::default()
        });
        let restrictions = LinguisticPredicate::SyntacticAgreement.restrictions_for(&trigger);
        assert_eq!(restrictions, vec![Restriction::PluralVerbForm]);

        let form = |number| {
            object_with(ObjectProperties {
                number: Some(number),
                ..Default::default()
            })
        };
        assert!(restrictions[0].allows(&form(GrammaticalNumber::Plural)));
        assert!(restrictions[0].allows(&form(GrammaticalNumber::Both)));
        assert!(!restrictions[0].allows(&form(GrammaticalNumber::Singular)));
    }

    #[test]
    fn test_plural_passive_applies_both_conditions() {
        let trigger = object_with(ObjectProperties {
            pattern: Some("plural_subject_passive".into()),
            ..Default::default()
        });
        let restrictions = LinguisticPredicate::SyntacticAgreement.restrictions_for(&trigger);
        assert_eq!(
            restrictions,
            vec![Restriction::TransitiveVerb, Restriction::PluralVerbForm]
        );

        let singular = object_with(ObjectProperties {
            transitivity: Some(Transitivity::Transitive),
            number: Some(GrammaticalNumber::Singular),
            ..Default::default()
        });
        assert!(!restrictions.iter().all(|r| r.allows(&singular)));
    }

    #[test]
    fn test_phonological_containment() {
        let restriction = Restriction::PhonologicalPattern("CVC-stress1");
        let fits = object_with(ObjectProperties {
            pattern: Some("cvc".into()),
            ..Default::default()
        });
        let clashes = object_with(ObjectProperties {
            pattern: Some("CCV".into()),
            ..Default::default()
        });
        assert!(restriction.allows(&fits));
        assert!(!restriction.allows(&clashes));
    }

    #[test]
    fn test_register_defaults_to_consultative() {
        let restriction = Restriction::RegisterNear(Register::Formal);
        assert!(restriction.allows(&object_with(ObjectProperties::default())));
        let restriction = Restriction::RegisterNear(Register::Frozen);
        assert!(!restriction.allows(&object_with(ObjectProperties::default())));
    }

    #[test]
    fn test_weak_rules_filtered() {
        let table = LinguisticRuleTable::standard().with_min_strength(0.85);
        let synt: Vec<_> = table.rules_from(ComponentType::Synt).collect();
        assert_eq!(synt.len(), 1);
        assert_eq!(synt[0].1.predicate, LinguisticPredicate::SyntacticAgreement);
        assert_eq!(synt[0].0, ComponentType::Lex);
    }
}
