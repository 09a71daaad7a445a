use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::rules::LinguisticRuleTable;

const PREFERS_THRESHOLD: f64 = 0.3;
const ENABLES_THRESHOLD: f64 = 0.8;
const EXCLUDES_THRESHOLD: f64 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Requires,
    Excludes,
    Prefers,
    RestrictsTo,
    Enables,
    Modifies,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::Excludes => "excludes",
            Self::Prefers => "prefers",
            Self::RestrictsTo => "restricts_to",
            Self::Enables => "enables",
            Self::Modifies => "modifies",
        }
    }
}

/// Property override carried by a `modifies` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeModification {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintEdge {
    pub source: String,
    pub target: String,
    pub kind: ConstraintKind,
    pub strength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<EdgeModification>,
}

impl ConstraintEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: ConstraintKind,
        strength: f64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            strength: strength.clamp(0.0, 1.0),
            modification: None,
        }
    }
}

/// Collocation statistic between two objects; strength is a normalized PMI in [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collocation {
    pub object_a: String,
    pub object_b: String,
    pub strength: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    outgoing: HashMap<String, Vec<ConstraintEdge>>,
    rules: LinguisticRuleTable,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: LinguisticRuleTable) -> Self {
        Self {
            outgoing: HashMap::new(),
            rules,
        }
    }

    pub fn add_edge(&mut self, edge: ConstraintEdge) {
        let edges = self.outgoing.entry(edge.source.clone()).or_default();
        if let Some(existing) = edges
            .iter_mut()
            .find(|e| e.target == edge.target && e.kind == edge.kind)
        {
            existing.strength = existing.strength.max(edge.strength);
            if edge.modification.is_some() {
                existing.modification = edge.modification;
            }
            return;
        }
        edges.push(edge);
    }

    pub fn edges_from(&self, object_id: &str) -> &[ConstraintEdge] {
        self.outgoing
            .get(object_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn edges(&self) -> impl Iterator<Item = &ConstraintEdge> {
        self.outgoing.values().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    pub fn rules(&self) -> &LinguisticRuleTable {
        &self.rules
    }

    /// Strongest advisory link from `a` to `b`; hard edges never count as synergy.
    pub fn synergy(&self, a: &str, b: &str) -> f64 {
        self.edges_from(a)
            .iter()
            .filter(|e| e.target == b && matches!(e.kind, ConstraintKind::Prefers | ConstraintKind::Enables))
            .map(|e| e.strength)
            .fold(0.0, f64::max)
    }

    pub fn synergy_map(&self, object_id: &str) -> HashMap<String, f64> {
        let mut map = HashMap::new();
        for edge in self.edges_from(object_id) {
            if matches!(edge.kind, ConstraintKind::Prefers | ConstraintKind::Enables) {
                let entry = map.entry(edge.target.clone()).or_insert(0.0_f64);
                *entry = entry.max(edge.strength);
            }
        }
        map
    }
}

#[derive(Debug)]
pub struct ConstraintGraphBuilder {
    graph: ConstraintGraph,
}

impl Default for ConstraintGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintGraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: ConstraintGraph::with_rules(LinguisticRuleTable::standard()),
        }
    }

    pub fn with_rules(mut self, rules: LinguisticRuleTable) -> Self {
        self.graph.rules = rules;
        self
    }

    pub fn collocations(mut self, collocations: &[Collocation]) -> Self {
        for c in collocations {
            if c.object_a == c.object_b || !c.strength.is_finite() {
                continue;
            }
            if c.strength >= PREFERS_THRESHOLD {
                self.link_both(c, ConstraintKind::Prefers, c.strength);
            }
            if c.strength >= ENABLES_THRESHOLD {
                self.link_both(c, ConstraintKind::Enables, c.strength);
            }
            if c.strength <= EXCLUDES_THRESHOLD {
                self.link_both(c, ConstraintKind::Excludes, -c.strength);
            }
        }
        self
    }

    pub fn edge(mut self, edge: ConstraintEdge) -> Self {
        self.graph.add_edge(edge);
        self
    }

    pub fn build(self) -> ConstraintGraph {
        self.graph
    }

    fn link_both(&mut self, c: &Collocation, kind: ConstraintKind, strength: f64) {
        self.graph
            .add_edge(ConstraintEdge::new(&c.object_a, &c.object_b, kind, strength));
        self.graph
            .add_edge(ConstraintEdge::new(&c.object_b, &c.object_a, kind, strength));
    }
}
