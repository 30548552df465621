//! XACML 1.0/1.1 deny-overrides and permit-overrides.
//!
//! The legacy algorithms do not distinguish Indeterminate kinds in their
//! result: anything Indeterminate they return is Indeterminate{DP}.

use warden_core::Effect;

use super::{log_combined, CombiningAlgorithm};
use crate::context::EvaluationContext;
use crate::model::CombinerParameter;
use crate::rule::Evaluatable;
use crate::types::{Decision, DecisionResult, IndeterminateKind};

fn opposite(effect: Effect) -> Effect {
    match effect {
        Effect::Permit => Effect::Deny,
        Effect::Deny => Effect::Permit,
    }
}

/// Rule-level legacy overrides. An Indeterminate rule that could have
/// produced the winning effect makes the whole result Indeterminate.
pub struct LegacyRuleOverrides {
    id: String,
    winner: Effect,
}

impl LegacyRuleOverrides {
    pub fn deny(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            winner: Effect::Deny,
        }
    }

    pub fn permit(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            winner: Effect::Permit,
        }
    }
}

impl CombiningAlgorithm for LegacyRuleOverrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Evaluatable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let winner = Decision::from(self.winner);
        let loser = Decision::from(opposite(self.winner));
        let mut losing = DecisionResult::new(loser);
        let mut saw_loser = false;
        let mut potential_winner = false;
        let mut error = false;

        for child in children {
            let result = child.evaluate(ctx);
            match result.decision {
                d if d == winner => {
                    log_combined(&self.id, children.len(), &result);
                    return result;
                }
                d if d == loser => {
                    saw_loser = true;
                    losing.absorb(result);
                }
                Decision::Indeterminate(kind) => {
                    error = true;
                    let could_win = match self.winner {
                        Effect::Deny => kind.may_deny(),
                        Effect::Permit => kind.may_permit(),
                    };
                    potential_winner |= could_win;
                }
                _ => {}
            }
        }

        let result = if potential_winner {
            DecisionResult::indeterminate(IndeterminateKind::DenyPermit)
        } else if saw_loser {
            losing
        } else if error {
            DecisionResult::indeterminate(IndeterminateKind::DenyPermit)
        } else {
            DecisionResult::not_applicable()
        };
        log_combined(&self.id, children.len(), &result);
        result
    }
}

/// Policy-level legacy overrides. Under deny-overrides an Indeterminate
/// child counts as Deny; under permit-overrides it only matters when
/// nothing else applied.
pub struct LegacyPolicyOverrides {
    id: String,
    winner: Effect,
}

impl LegacyPolicyOverrides {
    pub fn deny(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            winner: Effect::Deny,
        }
    }

    pub fn permit(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            winner: Effect::Permit,
        }
    }
}

impl CombiningAlgorithm for LegacyPolicyOverrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Evaluatable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let winner = Decision::from(self.winner);
        let loser = Decision::from(opposite(self.winner));
        let mut losing = DecisionResult::new(loser);
        let mut saw_loser = false;
        let mut error = false;

        for child in children {
            let result = child.evaluate(ctx);
            match result.decision {
                d if d == winner => {
                    log_combined(&self.id, children.len(), &result);
                    return result;
                }
                d if d == loser => {
                    saw_loser = true;
                    losing.absorb(result);
                }
                Decision::Indeterminate(_) if self.winner == Effect::Deny => {
                    let result = DecisionResult::new(Decision::Deny);
                    log_combined(&self.id, children.len(), &result);
                    return result;
                }
                Decision::Indeterminate(_) => error = true,
                _ => {}
            }
        }

        let result = if saw_loser {
            losing
        } else if error {
            DecisionResult::indeterminate(IndeterminateKind::DenyPermit)
        } else {
            DecisionResult::not_applicable()
        };
        log_combined(&self.id, children.len(), &result);
        result
    }
}
