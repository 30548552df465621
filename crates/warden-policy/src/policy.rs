//! Evaluation of policies, policy sets and references.

use tracing::{debug, warn};

use crate::context::EvaluationContext;
use crate::error::EvaluationFault;
use crate::expression::Scope;
use crate::model::{EvaluatableNode, IdReference, Policy, PolicyChild, PolicyHeader, PolicySet};
use crate::rule::{fulfil, Evaluatable, ScopedRule};
use crate::target::MatchResult;
use crate::types::{Decision, DecisionResult, IndeterminateKind, PolicyIdentifier, PolicyKind};

fn match_header(header: &PolicyHeader, ctx: &mut EvaluationContext<'_>) -> MatchResult {
    let matcher = ctx.matcher();
    matcher.match_target(&header.target, ctx)
}

/// Shared tail of policy and policy-set evaluation: apply the target
/// outcome to the combined decision, then attach the node's own
/// obligations and advice.
fn finish(
    header: &PolicyHeader,
    kind: PolicyKind,
    target: MatchResult,
    mut result: DecisionResult,
    scope: &Scope<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> DecisionResult {
    if let MatchResult::Indeterminate(_) = target {
        let decision = match result.decision {
            Decision::Permit => Decision::Indeterminate(IndeterminateKind::Permit),
            Decision::Deny => Decision::Indeterminate(IndeterminateKind::Deny),
            other => other,
        };
        result = DecisionResult::new(decision);
    }

    if let Some(effect) = result.decision.effect() {
        match fulfil(&header.obligations, &header.advice, effect, scope, ctx) {
            Ok((obligations, advice)) => {
                result.obligations.extend(obligations);
                result.advice.extend(advice);
            }
            Err(fault) => {
                warn!(policy_id = %header.id, error = %fault, "obligation could not be fulfilled");
                ctx.record_fault(&fault);
                result = DecisionResult::indeterminate(IndeterminateKind::for_effect(effect));
            }
        }
    }

    if result.decision != Decision::NotApplicable {
        ctx.note_applicable(PolicyIdentifier {
            kind,
            id: header.id.clone(),
            version: header.version.clone(),
        });
    }
    debug!(policy_id = %header.id, decision = %result.decision, "policy evaluated");
    result
}

fn unknown_algorithm(header: &PolicyHeader, algorithm: &str, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
    ctx.record_fault(&EvaluationFault::Processing(format!(
        "'{}' uses unknown combining algorithm {}",
        header.id, algorithm
    )));
    DecisionResult::indeterminate(IndeterminateKind::DenyPermit)
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

impl Evaluatable for Policy {
    fn id(&self) -> String {
        self.header.id.to_string()
    }

    fn match_target(&self, ctx: &mut EvaluationContext<'_>) -> MatchResult {
        match_header(&self.header, ctx)
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let target = self.match_target(ctx);
        if target == MatchResult::NoMatch {
            return DecisionResult::not_applicable();
        }
        let algorithm = match ctx.algorithms().rule_algorithm(&self.rule_combining_algorithm) {
            Some(algorithm) => algorithm,
            None => return unknown_algorithm(&self.header, &self.rule_combining_algorithm, ctx),
        };
        let scope = Scope::new(self.header.id.as_str(), &self.variables);
        let rules: Vec<ScopedRule<'_>> = self.rules.iter().map(|r| ScopedRule::new(r, scope)).collect();
        let children: Vec<&dyn Evaluatable> = rules.iter().map(|r| r as &dyn Evaluatable).collect();
        let combined = algorithm.combine(&children, &self.header.combiner_parameters, ctx);
        finish(&self.header, PolicyKind::Policy, target, combined, &scope, ctx)
    }
}

// ---------------------------------------------------------------------------
// PolicySet
// ---------------------------------------------------------------------------

impl Evaluatable for PolicySet {
    fn id(&self) -> String {
        self.header.id.to_string()
    }

    fn match_target(&self, ctx: &mut EvaluationContext<'_>) -> MatchResult {
        match_header(&self.header, ctx)
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        let target = self.match_target(ctx);
        if target == MatchResult::NoMatch {
            return DecisionResult::not_applicable();
        }
        let algorithm = match ctx.algorithms().policy_algorithm(&self.policy_combining_algorithm) {
            Some(algorithm) => algorithm,
            None => return unknown_algorithm(&self.header, &self.policy_combining_algorithm, ctx),
        };
        let children: Vec<&dyn Evaluatable> = self.children.iter().map(|c| c as &dyn Evaluatable).collect();
        let combined = algorithm.combine(&children, &self.header.combiner_parameters, ctx);
        let scope = Scope::empty(self.header.id.as_str());
        finish(&self.header, PolicyKind::PolicySet, target, combined, &scope, ctx)
    }
}

// ---------------------------------------------------------------------------
// Nodes and references
// ---------------------------------------------------------------------------

impl Evaluatable for EvaluatableNode {
    fn id(&self) -> String {
        self.header().id.to_string()
    }

    fn match_target(&self, ctx: &mut EvaluationContext<'_>) -> MatchResult {
        match self {
            EvaluatableNode::Policy(p) => p.match_target(ctx),
            EvaluatableNode::PolicySet(s) => s.match_target(ctx),
        }
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        match self {
            EvaluatableNode::Policy(p) => p.evaluate(ctx),
            EvaluatableNode::PolicySet(s) => s.evaluate(ctx),
        }
    }
}

fn match_reference(reference: &IdReference, kind: PolicyKind, ctx: &mut EvaluationContext<'_>) -> MatchResult {
    match ctx.resolve_reference(reference, kind) {
        Ok(node) => node.match_target(ctx),
        Err(fault) => {
            ctx.record_fault(&fault);
            MatchResult::Indeterminate(fault)
        }
    }
}

/// A reference that cannot be resolved, or that would loop, is
/// Indeterminate{DP}: nothing is known about what it would have decided.
fn evaluate_reference(reference: &IdReference, kind: PolicyKind, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
    let node = match ctx.resolve_reference(reference, kind) {
        Ok(node) => node,
        Err(fault) => {
            ctx.record_fault(&fault);
            return DecisionResult::indeterminate(IndeterminateKind::DenyPermit);
        }
    };
    if let Err(fault) = ctx.enter_reference(node.id()) {
        warn!(reference = %reference, error = %fault, "reference rejected");
        ctx.record_fault(&fault);
        return DecisionResult::indeterminate(IndeterminateKind::DenyPermit);
    }
    let result = node.evaluate(ctx);
    ctx.exit_reference();
    result
}

impl Evaluatable for PolicyChild {
    fn id(&self) -> String {
        match self {
            PolicyChild::Policy(p) => p.header.id.to_string(),
            PolicyChild::PolicySet(s) => s.header.id.to_string(),
            PolicyChild::PolicyReference(r) | PolicyChild::PolicySetReference(r) => r.to_string(),
        }
    }

    fn match_target(&self, ctx: &mut EvaluationContext<'_>) -> MatchResult {
        match self {
            PolicyChild::Policy(p) => p.match_target(ctx),
            PolicyChild::PolicySet(s) => s.match_target(ctx),
            PolicyChild::PolicyReference(r) => match_reference(r, PolicyKind::Policy, ctx),
            PolicyChild::PolicySetReference(r) => match_reference(r, PolicyKind::PolicySet, ctx),
        }
    }

    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> DecisionResult {
        match self {
            PolicyChild::Policy(p) => p.evaluate(ctx),
            PolicyChild::PolicySet(s) => s.evaluate(ctx),
            PolicyChild::PolicyReference(r) => evaluate_reference(r, PolicyKind::Policy, ctx),
            PolicyChild::PolicySetReference(r) => evaluate_reference(r, PolicyKind::PolicySet, ctx),
        }
    }
}
