use serde::{Deserialize, Serialize};
use std::fmt;

use warden_core::{
    AttributeId, Category, DecisionType, Effect, MissingAttributeDetail, PolicyId, StatusCode,
};

use crate::value::AttributeValue;

// ---------------------------------------------------------------------------
// Decision: the internal result of evaluating one node
// ---------------------------------------------------------------------------

/// Which effects an Indeterminate node could have produced had evaluation
/// succeeded. Combining algorithms use the hint for their tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndeterminateKind {
    /// Indeterminate{D}
    Deny,
    /// Indeterminate{P}
    Permit,
    /// Indeterminate{DP}
    DenyPermit,
}

impl IndeterminateKind {
    pub fn for_effect(effect: Effect) -> Self {
        match effect {
            Effect::Permit => IndeterminateKind::Permit,
            Effect::Deny => IndeterminateKind::Deny,
        }
    }

    pub fn may_deny(self) -> bool {
        matches!(self, IndeterminateKind::Deny | IndeterminateKind::DenyPermit)
    }

    pub fn may_permit(self) -> bool {
        matches!(self, IndeterminateKind::Permit | IndeterminateKind::DenyPermit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate(IndeterminateKind),
}

impl Decision {
    pub fn decision_type(self) -> DecisionType {
        match self {
            Decision::Permit => DecisionType::Permit,
            Decision::Deny => DecisionType::Deny,
            Decision::NotApplicable => DecisionType::NotApplicable,
            Decision::Indeterminate(_) => DecisionType::Indeterminate,
        }
    }

    /// The effect of a Permit or Deny decision.
    pub fn effect(self) -> Option<Effect> {
        match self {
            Decision::Permit => Some(Effect::Permit),
            Decision::Deny => Some(Effect::Deny),
            _ => None,
        }
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(self, Decision::Indeterminate(_))
    }
}

impl From<Effect> for Decision {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Decision::Permit,
            Effect::Deny => Decision::Deny,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Indeterminate(IndeterminateKind::Deny) => write!(f, "Indeterminate{{D}}"),
            Decision::Indeterminate(IndeterminateKind::Permit) => write!(f, "Indeterminate{{P}}"),
            Decision::Indeterminate(IndeterminateKind::DenyPermit) => {
                write!(f, "Indeterminate{{DP}}")
            }
            other => write!(f, "{}", other.decision_type()),
        }
    }
}

// ---------------------------------------------------------------------------
// Obligations and advice attached to a decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub attribute_id: AttributeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub obligation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_assignments: Vec<AttributeAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub advice_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_assignments: Vec<AttributeAssignment>,
}

/// Decision of one node together with the obligations and advice that
/// survived combining below it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionResult {
    pub decision: Decision,
    pub obligations: Vec<Obligation>,
    pub advice: Vec<Advice>,
}

impl DecisionResult {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn not_applicable() -> Self {
        Self::new(Decision::NotApplicable)
    }

    pub fn indeterminate(kind: IndeterminateKind) -> Self {
        Self::new(Decision::Indeterminate(kind))
    }

    /// Take over another result's obligations and advice.
    pub fn absorb(&mut self, other: DecisionResult) {
        self.obligations.extend(other.obligations);
        self.advice.extend(other.advice);
    }
}

// ---------------------------------------------------------------------------
// Response returned by the PDP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Policy,
    PolicySet,
}

/// Identifies a policy or policy set that was applicable to the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyIdentifier {
    pub kind: PolicyKind,
    pub id: PolicyId,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_attributes: Vec<MissingAttributeDetail>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
            missing_attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub decision: DecisionType,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Advice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_identifiers: Vec<PolicyIdentifier>,
}
