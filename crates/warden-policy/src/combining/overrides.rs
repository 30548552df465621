//! XACML 3.0 deny-overrides and permit-overrides, with their ordered forms.
//!
//! Both are the same reduction with the roles of Permit and Deny swapped.
//! Children are always evaluated in declaration order, so the ordered and
//! unordered URNs share one implementation.

use warden_core::Effect;

use super::{log_combined, CombiningAlgorithm};
use crate::context::EvaluationContext;
use crate::model::CombinerParameter;
use crate::rule::Evaluatable;
use crate::types::{Decision, DecisionResult, IndeterminateKind};

pub struct Overrides {
    id: String,
    winner: Effect,
}

impl Overrides {
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

fn opposite(effect: Effect) -> Effect {
    match effect {
        Effect::Permit => Effect::Deny,
        Effect::Deny => Effect::Permit,
    }
}

impl CombiningAlgorithm for Overrides {
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
        let winner_kind = IndeterminateKind::for_effect(self.winner);
        let loser_kind = IndeterminateKind::for_effect(opposite(self.winner));

        let mut error_winner = false;
        let mut error_loser = false;
        let mut error_both = false;
        // Obligations of every child that decided the losing effect.
        let mut losing = DecisionResult::new(loser);
        let mut saw_loser = false;

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
                Decision::NotApplicable => {}
                Decision::Indeterminate(IndeterminateKind::DenyPermit) => error_both = true,
                Decision::Indeterminate(kind) if kind == winner_kind => error_winner = true,
                Decision::Indeterminate(_) => error_loser = true,
                _ => {}
            }
        }

        let result = if error_both || (error_winner && (error_loser || saw_loser)) {
            DecisionResult::indeterminate(IndeterminateKind::DenyPermit)
        } else if error_winner {
            DecisionResult::indeterminate(winner_kind)
        } else if saw_loser {
            losing
        } else if error_loser {
            DecisionResult::indeterminate(loser_kind)
        } else {
            DecisionResult::not_applicable()
        };
        log_combined(&self.id, children.len(), &result);
        result
    }
}
