//! Targets and the three-valued target matcher.
//!
//! A target is a conjunction of `AnyOf` groups; each `AnyOf` is a disjunction
//! of `AllOf` groups; each `AllOf` is a conjunction of `Match` clauses. The
//! empty target matches every request.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::context::EvaluationContext;
use crate::error::EvaluationFault;
use crate::expression::{AttributeDesignator, AttributeSelector};
use crate::value::{AttributeValue, Bag, Value};

// ---------------------------------------------------------------------------
// Target structure
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target {
    pub any_of: Vec<AnyOf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnyOf {
    pub all_of: Vec<AllOf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllOf {
    pub matches: Vec<Match>,
}

/// `match_id(value, attribute)` applied to every value the source yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub value: AttributeValue,
    #[serde(flatten)]
    pub source: MatchSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
}

impl MatchSource {
    fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Bag, EvaluationFault> {
        match self {
            MatchSource::Designator(d) => d.evaluate(ctx),
            MatchSource::Selector(s) => s.evaluate(ctx),
        }
    }
}

impl Target {
    pub fn new(any_of: Vec<AnyOf>) -> Self {
        Self { any_of }
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }

    /// Target with a single `AnyOf` holding a single `AllOf`.
    pub fn all(matches: Vec<Match>) -> Self {
        Self::new(vec![AnyOf {
            all_of: vec![AllOf { matches }],
        }])
    }

    /// Every match clause, in declaration order.
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.any_of
            .iter()
            .flat_map(|a| a.all_of.iter())
            .flat_map(|a| a.matches.iter())
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    NoMatch,
    Indeterminate(EvaluationFault),
}

pub trait TargetMatcher: Send + Sync {
    fn match_target(&self, target: &Target, ctx: &mut EvaluationContext<'_>) -> MatchResult;
}

/// XACML 3.0 matching. Every fault encountered is recorded in the context,
/// including faults whose clause is later outweighed by a definite result.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTargetMatcher;

impl TargetMatcher for StandardTargetMatcher {
    fn match_target(&self, target: &Target, ctx: &mut EvaluationContext<'_>) -> MatchResult {
        let mut indeterminate = None;
        for any_of in &target.any_of {
            match match_any_of(any_of, ctx) {
                MatchResult::Match => {}
                MatchResult::NoMatch => return MatchResult::NoMatch,
                MatchResult::Indeterminate(fault) => {
                    indeterminate.get_or_insert(fault);
                }
            }
        }
        indeterminate.map_or(MatchResult::Match, MatchResult::Indeterminate)
    }
}

fn match_any_of(any_of: &AnyOf, ctx: &mut EvaluationContext<'_>) -> MatchResult {
    let mut indeterminate = None;
    for all_of in &any_of.all_of {
        match match_all_of(all_of, ctx) {
            MatchResult::Match => return MatchResult::Match,
            MatchResult::NoMatch => {}
            MatchResult::Indeterminate(fault) => {
                indeterminate.get_or_insert(fault);
            }
        }
    }
    indeterminate.map_or(MatchResult::NoMatch, MatchResult::Indeterminate)
}

fn match_all_of(all_of: &AllOf, ctx: &mut EvaluationContext<'_>) -> MatchResult {
    let mut indeterminate = None;
    for clause in &all_of.matches {
        match evaluate_match(clause, ctx) {
            MatchResult::Match => {}
            MatchResult::NoMatch => return MatchResult::NoMatch,
            MatchResult::Indeterminate(fault) => {
                indeterminate.get_or_insert(fault);
            }
        }
    }
    indeterminate.map_or(MatchResult::Match, MatchResult::Indeterminate)
}

/// True as soon as one value satisfies the function; Indeterminate when none
/// does and at least one application failed.
pub fn evaluate_match(clause: &Match, ctx: &mut EvaluationContext<'_>) -> MatchResult {
    let function = match ctx.functions().get(&clause.match_id) {
        Some(f) => f,
        None => {
            let fault = EvaluationFault::Processing(format!("unknown match function {}", clause.match_id));
            ctx.record_fault(&fault);
            return MatchResult::Indeterminate(fault);
        }
    };
    let bag = match clause.source.evaluate(ctx) {
        Ok(bag) => bag,
        Err(fault) => {
            ctx.record_fault(&fault);
            return MatchResult::Indeterminate(fault);
        }
    };
    let env = ctx.function_env();
    let policy_value = Value::Single(clause.value.clone());
    let mut fault = None;
    for candidate in bag.iter() {
        let outcome = function.call(&[policy_value.clone(), Value::Single(candidate.clone())], &env);
        match outcome {
            Ok(Value::Single(AttributeValue::Boolean(true))) => {
                trace!(match_id = %clause.match_id, value = %candidate, "match");
                return MatchResult::Match;
            }
            Ok(Value::Single(AttributeValue::Boolean(false))) => {}
            Ok(other) => {
                fault.get_or_insert(EvaluationFault::Processing(format!(
                    "{} returned {}, expected boolean",
                    clause.match_id,
                    other.describe()
                )));
            }
            Err(e) => {
                fault.get_or_insert(EvaluationFault::from(e));
            }
        }
    }
    match fault {
        Some(fault) => {
            ctx.record_fault(&fault);
            MatchResult::Indeterminate(fault)
        }
        None => MatchResult::NoMatch,
    }
}
