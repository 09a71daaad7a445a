use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_THETA: f64 = -3.0;
pub const MAX_THETA: f64 = 3.0;
pub const MAX_STAGE: u8 = 6;

/// Linguistic subsystem a learnable object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentType {
    Phon,
    Morph,
    Lex,
    Synt,
    Prag,
}

impl ComponentType {
    pub const ALL: [ComponentType; 5] = [
        ComponentType::Phon,
        ComponentType::Morph,
        ComponentType::Lex,
        ComponentType::Synt,
        ComponentType::Prag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phon => "PHON",
            Self::Morph => "MORPH",
            Self::Lex => "LEX",
            Self::Synt => "SYNT",
            Self::Prag => "PRAG",
        }
    }

    /// Accepts either the component code or the object kind name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PHON" => Some(Self::Phon),
            "MORPH" => Some(Self::Morph),
            "LEX" => Some(Self::Lex),
            "SYNT" => Some(Self::Synt),
            "PRAG" => Some(Self::Prag),
            _ => ObjectKind::parse(s).map(Self::from),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        ObjectKind::from(*self)
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Phon => 0,
            Self::Morph => 1,
            Self::Lex => 2,
            Self::Synt => 3,
            Self::Prag => 4,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage-side object kind. The only mapping between kinds and component codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    PhonologicalPattern,
    Morpheme,
    LexicalItem,
    SyntacticPattern,
    PragmaticRoutine,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhonologicalPattern => "phonological_pattern",
            Self::Morpheme => "morpheme",
            Self::LexicalItem => "lexical_item",
            Self::SyntacticPattern => "syntactic_pattern",
            Self::PragmaticRoutine => "pragmatic_routine",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "phonological_pattern" | "phoneme" | "pronunciation" => Some(Self::PhonologicalPattern),
            "morpheme" | "affix" => Some(Self::Morpheme),
            "lexical_item" | "word" | "collocation" => Some(Self::LexicalItem),
            "syntactic_pattern" | "grammar" | "pattern" => Some(Self::SyntacticPattern),
            "pragmatic_routine" | "pragmatic" | "discourse" => Some(Self::PragmaticRoutine),
            _ => None,
        }
    }
}

impl From<ComponentType> for ObjectKind {
    fn from(component: ComponentType) -> Self {
        match component {
            ComponentType::Phon => Self::PhonologicalPattern,
            ComponentType::Morph => Self::Morpheme,
            ComponentType::Lex => Self::LexicalItem,
            ComponentType::Synt => Self::SyntacticPattern,
            ComponentType::Prag => Self::PragmaticRoutine,
        }
    }
}

impl From<ObjectKind> for ComponentType {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::PhonologicalPattern => Self::Phon,
            ObjectKind::Morpheme => Self::Morph,
            ObjectKind::LexicalItem => Self::Lex,
            ObjectKind::SyntacticPattern => Self::Synt,
            ObjectKind::PragmaticRoutine => Self::Prag,
        }
    }
}

/// Formality scale, ordered from most to least formal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Frozen,
    Formal,
    Consultative,
    Casual,
    Intimate,
}

impl Register {
    pub fn level(&self) -> i32 {
        match self {
            Self::Frozen => 4,
            Self::Formal => 3,
            Self::Consultative => 2,
            Self::Casual => 1,
            Self::Intimate => 0,
        }
    }

    pub fn is_within_one_step(&self, other: Register) -> bool {
        (self.level() - other.level()).abs() <= 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frozen => "frozen",
            Self::Formal => "formal",
            Self::Consultative => "consultative",
            Self::Casual => "casual",
            Self::Intimate => "intimate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "frozen" => Some(Self::Frozen),
            "formal" => Some(Self::Formal),
            "consultative" | "neutral" => Some(Self::Consultative),
            "casual" | "informal" => Some(Self::Casual),
            "intimate" => Some(Self::Intimate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transitivity {
    Intransitive,
    Transitive,
    Ditransitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammaticalNumber {
    Singular,
    Plural,
    Both,
}

/// Linguistic markers read by the propagation predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<Register>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitivity: Option<Transitivity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<GrammaticalNumber>,
}

impl ObjectProperties {
    pub fn signals_passive(&self) -> bool {
        self.pattern
            .as_deref()
            .is_some_and(|p| p.to_lowercase().contains("passive"))
    }

    pub fn signals_plural_subject(&self) -> bool {
        self.pattern
            .as_deref()
            .is_some_and(|p| p.to_lowercase().contains("plural"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageObject {
    pub id: String,
    #[serde(rename = "componentType")]
    pub component: ComponentType,
    pub content: String,
    pub irt_difficulty: f64,
    pub irt_discrimination: f64,
    pub priority: f64,
    pub frequency: f64,
    pub relational_density: f64,
    pub contextual_contribution: f64,
    #[serde(default)]
    pub properties: ObjectProperties,
}

impl LanguageObject {
    pub fn new(id: impl Into<String>, component: ComponentType, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component,
            content: content.into(),
            irt_difficulty: 0.0,
            irt_discrimination: 1.0,
            priority: 0.5,
            frequency: 0.5,
            relational_density: 0.5,
            contextual_contribution: 0.5,
            properties: ObjectProperties::default(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: f64, discrimination: f64) -> Self {
        self.irt_difficulty = difficulty;
        self.irt_discrimination = discrimination;
        self
    }

    pub fn with_properties(mut self, properties: ObjectProperties) -> Self {
        self.properties = properties;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRecord {
    pub stage: u8,
    pub stability: f64,
    pub difficulty: f64,
    pub exposure_count: u32,
    pub cue_free_accuracy: f64,
    pub cue_assisted_accuracy: f64,
    #[serde(default)]
    pub lapses: u32,
    pub last_review: Option<i64>,
    pub next_review: Option<i64>,
}

impl Default for MasteryRecord {
    fn default() -> Self {
        Self {
            stage: 0,
            stability: 0.0,
            difficulty: 0.3,
            exposure_count: 0,
            cue_free_accuracy: 0.0,
            cue_assisted_accuracy: 0.0,
            lapses: 0,
            last_review: None,
            next_review: None,
        }
    }
}

impl MasteryRecord {
    pub fn automaticity(&self) -> f64 {
        self.cue_free_accuracy.clamp(0.0, 1.0)
    }
}

/// Slot role. Influence on ability updates decreases in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    Assessment,
    Practice,
    Reinforcement,
    Incidental,
}

impl SlotRole {
    pub fn theta_multiplier(&self) -> f64 {
        match self {
            Self::Assessment => 1.0,
            Self::Practice => 0.6,
            Self::Reinforcement => 0.3,
            Self::Incidental => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assessment => "assessment",
            Self::Practice => "practice",
            Self::Reinforcement => "reinforcement",
            Self::Incidental => "incidental",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveProcess {
    Recognition,
    Recall,
    Production,
    Transformation,
}

impl CognitiveProcess {
    /// Load multiplier relative to plain recall.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Recognition => 0.8,
            Self::Recall => 1.0,
            Self::Production => 1.3,
            Self::Transformation => 1.5,
        }
    }

    pub fn difficulty_offset(&self) -> f64 {
        match self {
            Self::Recognition => -0.5,
            Self::Recall => 0.0,
            Self::Production => 0.3,
            Self::Transformation => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Pronunciation,
    WordFormation,
    Vocabulary,
    Collocation,
    SentenceCompletion,
    ErrorCorrection,
    Translation,
    DialogueCompletion,
    RegisterShift,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pronunciation => "pronunciation",
            Self::WordFormation => "word_formation",
            Self::Vocabulary => "vocabulary",
            Self::Collocation => "collocation",
            Self::SentenceCompletion => "sentence_completion",
            Self::ErrorCorrection => "error_correction",
            Self::Translation => "translation",
            Self::DialogueCompletion => "dialogue_completion",
            Self::RegisterShift => "register_shift",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskFormat {
    MultipleChoice,
    #[default]
    FillBlank,
    FreeResponse,
    Ordering,
    Matching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    #[default]
    Visual,
    Auditory,
    Mixed,
}

/// Per-component ability estimates plus a global scalar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserThetaProfile {
    pub phon: f64,
    pub morph: f64,
    pub lex: f64,
    pub synt: f64,
    pub prag: f64,
    pub global: f64,
}

impl UserThetaProfile {
    pub fn get(&self, component: ComponentType) -> f64 {
        match component {
            ComponentType::Phon => self.phon,
            ComponentType::Morph => self.morph,
            ComponentType::Lex => self.lex,
            ComponentType::Synt => self.synt,
            ComponentType::Prag => self.prag,
        }
    }

    pub fn set(&mut self, component: ComponentType, value: f64) {
        let slot = match component {
            ComponentType::Phon => &mut self.phon,
            ComponentType::Morph => &mut self.morph,
            ComponentType::Lex => &mut self.lex,
            ComponentType::Synt => &mut self.synt,
            ComponentType::Prag => &mut self.prag,
        };
        *slot = value;
    }

    pub fn uniform(theta: f64) -> Self {
        Self {
            phon: theta,
            morph: theta,
            lex: theta,
            synt: theta,
            prag: theta,
            global: theta,
        }
    }
}

/// Situational setting an object may be used in. Feature values are stored trimmed and
/// lowercased, so identity and similarity agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "UsageContextFields")]
pub struct UsageContext {
    pub domain: String,
    pub register: String,
    pub modality: String,
    pub genre: String,
}

impl UsageContext {
    pub fn new(
        domain: impl Into<String>,
        register: impl Into<String>,
        modality: impl Into<String>,
        genre: impl Into<String>,
    ) -> Self {
        Self {
            domain: normalize_feature(domain.into()),
            register: normalize_feature(register.into()),
            modality: normalize_feature(modality.into()),
            genre: normalize_feature(genre.into()),
        }
    }

    pub fn key(&self) -> String {
        format!("{}:{}:{}:{}", self.domain, self.register, self.modality, self.genre)
    }
}

fn normalize_feature(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() && !trimmed.chars().any(char::is_uppercase) {
        value
    } else {
        trimmed.to_lowercase()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageContextFields {
    domain: String,
    register: String,
    modality: String,
    genre: String,
}

impl From<UsageContextFields> for UsageContext {
    fn from(fields: UsageContextFields) -> Self {
        Self::new(fields.domain, fields.register, fields.modality, fields.genre)
    }
}

pub type SynergyMap = HashMap<String, f64>;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_kind_mapping_round_trips() {
        for component in ComponentType::ALL {
            assert_eq!(ComponentType::from(component.kind()), component);
            assert_eq!(ComponentType::parse(component.kind().as_str()), Some(component));
            assert_eq!(ComponentType::parse(component.as_str()), Some(component));
        }
    }

    #[test]
    fn test_register_distance() {
        assert!(Register::Formal.is_within_one_step(Register::Frozen));
        assert!(Register::Formal.is_within_one_step(Register::Consultative));
        assert!(!Register::Formal.is_within_one_step(Register::Casual));
        assert!(!Register::Intimate.is_within_one_step(Register::Frozen));
    }

    #[test]
    fn test_role_multipliers_decrease() {
        let roles = [
            SlotRole::Assessment,
            SlotRole::Practice,
            SlotRole::Reinforcement,
            SlotRole::Incidental,
        ];
        for pair in roles.windows(2) {
            assert!(pair[0].theta_multiplier() > pair[1].theta_multiplier());
        }
        assert_eq!(SlotRole::Incidental.theta_multiplier(), 0.0);
    }

    #[test]
    fn test_object_serializes_camel_case() {
        let object = LanguageObject::new("w1", ComponentType::Lex, "run");
        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["componentType"], "LEX");
        assert!(json.get("irtDifficulty").is_some());
    }

    #[test]
    fn test_pattern_markers() {
        let props = ObjectProperties {
            pattern: Some("Passive_Past".into()),
            ..Default::default()
        };
        assert!(props.signals_passive());
        assert!(!props.signals_plural_subject());
    }
}
