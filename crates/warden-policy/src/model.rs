//! The deployed policy tree: policy sets, policies and rules, plus the
//! obligation/advice expressions and references they carry.
//!
//! Everything here is immutable after load and shared read-only between
//! concurrent evaluations.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use warden_core::{AttributeId, Category, Effect, PolicyId, RuleId};

use crate::expression::{Expression, VariableDefinition};
use crate::target::Target;
use crate::types::{PolicyIdentifier, PolicyKind};
use crate::value::AttributeValue;

fn default_version() -> String {
    "1.0".to_string()
}

// ---------------------------------------------------------------------------
// Obligation and advice expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignmentExpression {
    pub attribute_id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObligationExpression {
    pub obligation_id: String,
    pub fulfill_on: Effect,
    #[serde(default)]
    pub assignments: Vec<AttributeAssignmentExpression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviceExpression {
    pub advice_id: String,
    pub applies_to: Effect,
    #[serde(default)]
    pub assignments: Vec<AttributeAssignmentExpression>,
}

/// Parameter handed to a combining algorithm. `applies_to` names the child
/// (rule or policy id) the parameter is about, when it is not global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinerParameter {
    pub name: String,
    pub value: AttributeValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to: Option<String>,
}

// ---------------------------------------------------------------------------
// Rule, Policy, PolicySet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub obligations: Vec<ObligationExpression>,
    #[serde(default)]
    pub advice: Vec<AdviceExpression>,
}

/// Fields shared by policies and policy sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyHeader {
    pub id: PolicyId,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub obligations: Vec<ObligationExpression>,
    #[serde(default)]
    pub advice: Vec<AdviceExpression>,
    #[serde(default)]
    pub combiner_parameters: Vec<CombinerParameter>,
}

impl PolicyHeader {
    pub fn new(id: impl Into<PolicyId>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            description: None,
            target: Target::default(),
            obligations: Vec::new(),
            advice: Vec::new(),
            combiner_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(flatten)]
    pub header: PolicyHeader,
    pub rule_combining_algorithm: String,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    #[serde(flatten)]
    pub header: PolicyHeader,
    pub policy_combining_algorithm: String,
    #[serde(default)]
    pub children: Vec<PolicyChild>,
}

/// A member of a policy set: an inline node or a reference resolved at
/// evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyChild {
    Policy(Policy),
    PolicySet(PolicySet),
    PolicyReference(IdReference),
    PolicySetReference(IdReference),
}

/// A top-level deployable node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluatableNode {
    Policy(Policy),
    PolicySet(PolicySet),
}

impl EvaluatableNode {
    pub fn header(&self) -> &PolicyHeader {
        match self {
            EvaluatableNode::Policy(p) => &p.header,
            EvaluatableNode::PolicySet(s) => &s.header,
        }
    }

    pub fn id(&self) -> &PolicyId {
        &self.header().id
    }

    pub fn version(&self) -> &str {
        &self.header().version
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            EvaluatableNode::Policy(_) => PolicyKind::Policy,
            EvaluatableNode::PolicySet(_) => PolicyKind::PolicySet,
        }
    }

    pub fn identifier(&self) -> PolicyIdentifier {
        PolicyIdentifier {
            kind: self.kind(),
            id: self.id().clone(),
            version: self.version().to_string(),
        }
    }
}

impl From<Policy> for EvaluatableNode {
    fn from(p: Policy) -> Self {
        EvaluatableNode::Policy(p)
    }
}

impl From<PolicySet> for EvaluatableNode {
    fn from(s: PolicySet) -> Self {
        EvaluatableNode::PolicySet(s)
    }
}

// ---------------------------------------------------------------------------
// IdReference and version matching
// ---------------------------------------------------------------------------

/// Reference to a policy or policy set by id, optionally constrained by
/// version. `version` is a pattern where `*` matches any one component and a
/// trailing `+` matches one or more further components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdReference {
    pub id: PolicyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

impl IdReference {
    pub fn new(id: impl Into<PolicyId>) -> Self {
        Self {
            id: id.into(),
            version: None,
            earliest_version: None,
            latest_version: None,
        }
    }

    pub fn with_version(mut self, pattern: impl Into<String>) -> Self {
        self.version = Some(pattern.into());
        self
    }

    /// Does a node with this id and version satisfy the reference?
    pub fn accepts(&self, id: &PolicyId, version: &str) -> bool {
        if &self.id != id {
            return false;
        }
        if let Some(pattern) = &self.version {
            if !version_matches(pattern, version) {
                return false;
            }
        }
        if let Some(earliest) = &self.earliest_version {
            if !matches!(compare_versions(version, earliest), Some(Ordering::Greater | Ordering::Equal)) {
                return false;
            }
        }
        if let Some(latest) = &self.latest_version {
            if !matches!(compare_versions(version, latest), Some(Ordering::Less | Ordering::Equal)) {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Display for IdReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(v) = &self.version {
            write!(f, " (version {})", v)?;
        }
        Ok(())
    }
}

/// XACML version-match: `1.*.3`, `1.+`, `2.0`.
pub fn version_matches(pattern: &str, version: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let version: Vec<&str> = version.split('.').collect();
    let mut vi = 0usize;
    for (pi, part) in pattern.iter().enumerate() {
        match *part {
            "+" => return pi == pattern.len() - 1 && vi < version.len(),
            "*" => {
                if vi >= version.len() {
                    return false;
                }
            }
            literal => {
                if version.get(vi) != Some(&literal) {
                    return false;
                }
            }
        }
        vi += 1;
    }
    vi == version.len()
}

/// Numeric component-wise comparison; `None` when either side is not a
/// plain dotted version.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    let parse = |v: &str| -> Option<Vec<u64>> { v.split('.').map(|c| c.parse::<u64>().ok()).collect() };
    Some(parse(a)?.cmp(&parse(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_patterns() {
        assert!(version_matches("1.0", "1.0"));
        assert!(!version_matches("1.0", "1.0.1"));
        assert!(version_matches("1.*", "1.7"));
        assert!(!version_matches("1.*", "1.7.2"));
        assert!(version_matches("1.+", "1.7.2"));
        assert!(!version_matches("1.+", "1"));
        assert!(version_matches("*.2", "9.2"));
    }

    #[test]
    fn test_compare_versions_is_numeric() {
        assert_eq!(compare_versions("1.10", "1.9"), Some(Ordering::Greater));
        assert_eq!(compare_versions("1.0", "1.0.1"), Some(Ordering::Less));
        assert_eq!(compare_versions("1.x", "1.0"), None);
    }

    #[test]
    fn test_id_reference_constraints() {
        let id = PolicyId::new("p");
        let plain = IdReference::new("p");
        assert!(plain.accepts(&id, "3.1"));
        assert!(!plain.accepts(&PolicyId::new("q"), "3.1"));

        let mut bounded = IdReference::new("p");
        bounded.earliest_version = Some("1.5".into());
        bounded.latest_version = Some("2.0".into());
        assert!(bounded.accepts(&id, "1.5"));
        assert!(bounded.accepts(&id, "2.0"));
        assert!(!bounded.accepts(&id, "1.4"));
        assert!(!bounded.accepts(&id, "2.1"));

        let pattern = IdReference::new("p").with_version("1.*");
        assert!(pattern.accepts(&id, "1.3"));
        assert!(!pattern.accepts(&id, "2.3"));
    }

    #[test]
    fn test_policy_set_json_shape() {
        let json = r#"{
            "type": "policy_set",
            "id": "root",
            "policy_combining_algorithm": "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-overrides",
            "children": [
                {
                    "type": "policy",
                    "id": "inner",
                    "version": "2.1",
                    "rule_combining_algorithm": "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides",
                    "rules": [ { "id": "r1", "effect": "Permit" } ]
                },
                { "type": "policy_reference", "id": "shared", "version": "1.+" }
            ]
        }"#;
        let node: EvaluatableNode = serde_json::from_str(json).unwrap();
        let set = match &node {
            EvaluatableNode::PolicySet(s) => s,
            other => panic!("expected a policy set, got {:?}", other),
        };
        assert_eq!(node.version(), "1.0");
        assert!(set.header.target.is_empty());
        assert_eq!(set.children.len(), 2);
        match &set.children[0] {
            PolicyChild::Policy(p) => {
                assert_eq!(p.header.version, "2.1");
                assert_eq!(p.rules[0].effect, Effect::Permit);
            }
            other => panic!("expected inline policy, got {:?}", other),
        }
        match &set.children[1] {
            PolicyChild::PolicyReference(r) => assert_eq!(r.version.as_deref(), Some("1.+")),
            other => panic!("expected reference, got {:?}", other),
        }
    }
}
