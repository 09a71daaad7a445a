#![allow(dead_code)]

use std::collections::HashMap;

use danci_calibration::composition::{EconomicValue, ObjectCandidate, RoleAffinity};
use danci_calibration::types::{ComponentType, LanguageObject, MasteryRecord, UsageContext};

pub const FIXED_TIMESTAMP: i64 = 1_700_000_000_000;

pub fn candidate(id: &str, component: ComponentType, value: f64, cost: f64) -> ObjectCandidate {
    ObjectCandidate {
        object: LanguageObject::new(id, component, id),
        mastery: MasteryRecord::default(),
        value: EconomicValue {
            learning_value: value,
            cognitive_cost: cost,
            synergy_map: HashMap::new(),
            role_affinity: RoleAffinity::default(),
            urgency: 0.0,
            exposure_balance: 0.0,
        },
    }
}

pub fn context(domain: &str, register: &str) -> UsageContext {
    UsageContext::new(domain, register, "written", "article")
}
