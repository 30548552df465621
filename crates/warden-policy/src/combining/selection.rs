//! Algorithms that select a child rather than weigh effects:
//! first-applicable, only-one-applicable, deny-unless-permit and
//! permit-unless-deny.

use tracing::warn;
use warden_core::Effect;

use super::{log_combined, CombiningAlgorithm};
use crate::context::EvaluationContext;
use crate::error::EvaluationFault;
use crate::model::CombinerParameter;
use crate::rule::Evaluatable;
use crate::target::MatchResult;
use crate::types::{Decision, DecisionResult, IndeterminateKind};

// ---------------------------------------------------------------------------
// first-applicable
// ---------------------------------------------------------------------------

/// The first child that is not NotApplicable decides, Indeterminate included.
pub struct FirstApplicable {
    id: String,
}

impl FirstApplicable {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for FirstApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Evaluatable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        for child in children {
            let result = child.evaluate(ctx);
            if result.decision != Decision::NotApplicable {
                log_combined(&self.id, children.len(), &result);
                return result;
            }
        }
        DecisionResult::not_applicable()
    }
}

// ---------------------------------------------------------------------------
// only-one-applicable
// ---------------------------------------------------------------------------

/// Exactly one child's target may match. Targets are checked first; the
/// chosen child is evaluated afterwards.
pub struct OnlyOneApplicable {
    id: String,
}

impl OnlyOneApplicable {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for OnlyOneApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Evaluatable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let mut selected: Option<&dyn Evaluatable> = None;
        for child in children {
            match child.match_target(ctx) {
                MatchResult::NoMatch => {}
                MatchResult::Indeterminate(_) => {
                    return DecisionResult::indeterminate(IndeterminateKind::DenyPermit);
                }
                MatchResult::Match => {
                    if let Some(first) = selected {
                        warn!(first = %first.id(), second = %child.id(), "more than one applicable policy");
                        ctx.record_fault(&EvaluationFault::Processing(format!(
                            "both '{}' and '{}' are applicable",
                            first.id(),
                            child.id()
                        )));
                        return DecisionResult::indeterminate(IndeterminateKind::DenyPermit);
                    }
                    selected = Some(*child);
                }
            }
        }
        let result = match selected {
            Some(child) => child.evaluate(ctx),
            None => DecisionResult::not_applicable(),
        };
        log_combined(&self.id, children.len(), &result);
        result
    }
}

// ---------------------------------------------------------------------------
// deny-unless-permit / permit-unless-deny
// ---------------------------------------------------------------------------

/// Never NotApplicable or Indeterminate: the preferred effect wins as soon
/// as a child yields it, otherwise the default effect is returned.
pub struct Unless {
    id: String,
    preferred: Effect,
}

impl Unless {
    pub fn deny_unless_permit(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            preferred: Effect::Permit,
        }
    }

    pub fn permit_unless_deny(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            preferred: Effect::Deny,
        }
    }
}

impl CombiningAlgorithm for Unless {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        children: &[&dyn Evaluatable],
        _parameters: &[CombinerParameter],
        ctx: &mut EvaluationContext<'_>,
    ) -> DecisionResult {
        let preferred = Decision::from(self.preferred);
        let fallback = match self.preferred {
            Effect::Permit => Decision::Deny,
            Effect::Deny => Decision::Permit,
        };
        let mut result = DecisionResult::new(fallback);
        for child in children {
            let child_result = child.evaluate(ctx);
            if child_result.decision == preferred {
                log_combined(&self.id, children.len(), &child_result);
                return child_result;
            }
            if child_result.decision == fallback {
                result.absorb(child_result);
            }
        }
        log_combined(&self.id, children.len(), &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::test_support::{obligation_ids, Fixed};
    use crate::context::test_support::TestServices;
    use crate::request::Request;
    use warden_core::StatusCode;

    fn run(algorithm: &dyn CombiningAlgorithm, children: &[Fixed]) -> (DecisionResult, StatusCode) {
        let services = TestServices::new();
        let request = Request::new();
        let mut ctx = services.context(&request);
        let refs: Vec<&dyn Evaluatable> = children.iter().map(|c| c as &dyn Evaluatable).collect();
        let result = algorithm.combine(&refs, &[], &mut ctx);
        (result, ctx.status())
    }

    #[test]
    fn test_first_applicable_takes_first_decision() {
        let algorithm = FirstApplicable::new("first");
        let children = [
            Fixed::not_applicable("n"),
            Fixed::indeterminate("x", IndeterminateKind::Deny),
            Fixed::permit("p"),
        ];
        let (result, _) = run(&algorithm, &children);
        assert_eq!(result.decision, Decision::Indeterminate(IndeterminateKind::Deny));
        assert_eq!(children[2].evaluated.get(), 0);

        let children = [Fixed::not_applicable("n"), Fixed::deny("d"), Fixed::permit("p")];
        let (result, _) = run(&algorithm, &children);
        assert_eq!(obligation_ids(&result), vec!["d"]);
    }

    #[test]
    fn test_only_one_applicable_selects_single_match() {
        let algorithm = OnlyOneApplicable::new("only-one");
        let children = [Fixed::not_applicable("a"), Fixed::permit("b"), Fixed::not_applicable("c")];
        let (result, status) = run(&algorithm, &children);
        assert_eq!(result.decision, Decision::Permit);
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(children[0].evaluated.get(), 0);
    }

    #[test]
    fn test_only_one_applicable_rejects_two_matches() {
        let algorithm = OnlyOneApplicable::new("only-one");
        let children = [Fixed::permit("a"), Fixed::deny("b")];
        let (result, status) = run(&algorithm, &children);
        assert_eq!(result.decision, Decision::Indeterminate(IndeterminateKind::DenyPermit));
        assert_eq!(status, StatusCode::ProcessingError);
        assert_eq!(children[0].evaluated.get(), 0);
    }

    #[test]
    fn test_only_one_applicable_target_fault() {
        let algorithm = OnlyOneApplicable::new("only-one");
        let children = [Fixed::permit("a").with_target_fault()];
        let (result, _) = run(&algorithm, &children);
        assert_eq!(result.decision, Decision::Indeterminate(IndeterminateKind::DenyPermit));
        let (result, _) = run(&algorithm, &[]);
        assert_eq!(result.decision, Decision::NotApplicable);
    }

    #[test]
    fn test_deny_unless_permit() {
        let algorithm = Unless::deny_unless_permit("dup");
        let (result, _) = run(&algorithm, &[]);
        assert_eq!(result.decision, Decision::Deny);
        let children = [
            Fixed::deny("d"),
            Fixed::indeterminate("x", IndeterminateKind::DenyPermit),
            Fixed::permit("p"),
        ];
        let (result, _) = run(&algorithm, &children);
        assert_eq!(result.decision, Decision::Permit);
        assert_eq!(obligation_ids(&result), vec!["p"]);
    }

    #[test]
    fn test_permit_unless_deny_collects_permit_obligations() {
        let algorithm = Unless::permit_unless_deny("pud");
        let children = [
            Fixed::permit("a"),
            Fixed::indeterminate("x", IndeterminateKind::Deny),
            Fixed::permit("b"),
        ];
        let (result, _) = run(&algorithm, &children);
        assert_eq!(result.decision, Decision::Permit);
        assert_eq!(obligation_ids(&result), vec!["a", "b"]);
    }
}
