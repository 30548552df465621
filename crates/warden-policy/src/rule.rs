//! Rule evaluation and the [`Evaluatable`] seam shared with policies.
//!
//! A rule yields its effect when its target matches and its condition is
//! true. A fault in either makes it Indeterminate with its effect as the
//! hint. Obligations and advice attached to the yielded effect are fulfilled
//! here.

use tracing::{debug, trace};

use warden_core::Effect;

use crate::context::EvaluationContext;
use crate::error::EvaluationFault;
use crate::expression::Scope;
use crate::model::{AdviceExpression, AttributeAssignmentExpression, ObligationExpression, Rule};
use crate::target::MatchResult;
use crate::types::{Advice, AttributeAssignment, DecisionResult, IndeterminateKind, Obligation};
use crate::value::Value;

/// Anything a combining algorithm can combine: rules, policies, policy
/// sets and references to them.
pub trait Evaluatable {
    /// Identifier used in logs and error messages.
    fn id(&self) -> String;

    fn match_target(&self, ctx: &mut EvaluationContext<'_>) -> MatchResult;

    /// Full evaluation, target included. Faults are recorded in the context
    /// and surface as an Indeterminate decision.
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult;
}

/// A rule together with the variable scope of its enclosing policy.
pub struct ScopedRule<'p> {
    pub rule: &'p Rule,
    pub scope: Scope<'p>,
}

impl<'p> ScopedRule<'p> {
    pub fn new(rule: &'p Rule, scope: Scope<'p>) -> Self {
        Self { rule, scope }
    }

    fn indeterminate(&self) -> DecisionResult {
        DecisionResult::indeterminate(IndeterminateKind::for_effect(self.rule.effect))
    }
}

impl Evaluatable for ScopedRule<'_> {
    fn id(&self) -> String {
        self.rule.id.to_string()
    }

    fn match_target(&self, ctx: &mut EvaluationContext<'_>) -> MatchResult {
        let matcher = ctx.matcher();
        matcher.match_target(&self.rule.target, ctx)
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        match self.match_target(ctx) {
            MatchResult::Match => {}
            MatchResult::NoMatch => return DecisionResult::not_applicable(),
            MatchResult::Indeterminate(_) => return self.indeterminate(),
        }

        if let Some(condition) = &self.rule.condition {
            match condition.evaluate(&self.scope, ctx) {
                Ok(value) => match value.as_boolean() {
                    Some(true) => {}
                    Some(false) => {
                        trace!(rule_id = %self.rule.id, "condition false");
                        return DecisionResult::not_applicable();
                    }
                    None => {
                        ctx.record_fault(&EvaluationFault::Processing(format!(
                            "condition of rule '{}' evaluated to {}, expected boolean",
                            self.rule.id,
                            value.describe()
                        )));
                        return self.indeterminate();
                    }
                },
                Err(fault) => {
                    debug!(rule_id = %self.rule.id, error = %fault, "condition indeterminate");
                    ctx.record_fault(&fault);
                    return self.indeterminate();
                }
            }
        }

        let effect = self.rule.effect;
        let mut result = DecisionResult::new(effect.into());
        match fulfil(&self.rule.obligations, &self.rule.advice, effect, &self.scope, ctx) {
            Ok((obligations, advice)) => {
                result.obligations = obligations;
                result.advice = advice;
            }
            Err(fault) => {
                ctx.record_fault(&fault);
                return self.indeterminate();
            }
        }
        debug!(rule_id = %self.rule.id, decision = %result.decision, "rule applied");
        result
    }
}

// ---------------------------------------------------------------------------
// Obligations and advice
// ---------------------------------------------------------------------------

/// Instantiate the obligation and advice expressions that apply to `effect`.
pub fn fulfil(
    obligations: &[ObligationExpression],
    advice: &[AdviceExpression],
    effect: Effect,
    scope: &Scope<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<(Vec<Obligation>, Vec<Advice>), EvaluationFault> {
    let mut out_obligations = Vec::new();
    for expr in obligations.iter().filter(|o| o.fulfill_on == effect) {
        out_obligations.push(Obligation {
            obligation_id: expr.obligation_id.clone(),
            attribute_assignments: assignments(&expr.assignments, scope, ctx)?,
        });
    }
    let mut out_advice = Vec::new();
    for expr in advice.iter().filter(|a| a.applies_to == effect) {
        out_advice.push(Advice {
            advice_id: expr.advice_id.clone(),
            attribute_assignments: assignments(&expr.assignments, scope, ctx)?,
        });
    }
    Ok((out_obligations, out_advice))
}

/// A bag-valued expression yields one assignment per member.
fn assignments(
    exprs: &[AttributeAssignmentExpression],
    scope: &Scope<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Vec<AttributeAssignment>, EvaluationFault> {
    let mut out = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let assign = |value| AttributeAssignment {
            attribute_id: expr.attribute_id.clone(),
            category: expr.category.clone(),
            issuer: expr.issuer.clone(),
            value,
        };
        match expr.expression.evaluate(scope, ctx)? {
            Value::Single(value) => out.push(assign(value)),
            Value::Bag(bag) => out.extend(bag.into_values().into_iter().map(assign)),
            Value::Function(id) => {
                return Err(EvaluationFault::Processing(format!(
                    "assignment {} evaluated to function {}",
                    expr.attribute_id, id
                )))
            }
        }
    }
    Ok(out)
}
