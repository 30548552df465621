//! Warden Policy Engine
//!
//! An XACML 3.0 policy decision point. Requests are matched against the
//! targets of deployed policies and policy sets, rules are evaluated, and the
//! results are combined into one of Permit, Deny, NotApplicable or
//! Indeterminate, together with obligations, advice and a status code.
//!
//! Key features:
//! - Target matching over AnyOf/AllOf/Match with bag semantics
//! - The XACML 1.0, 1.1 and 3.0 rule- and policy-combining algorithms,
//!   using extended Indeterminate internally
//! - A typed function library injected as a registry
//! - Attribute designators, JSON selectors, memoised variables and an
//!   optional attribute finder
//! - Faults carried as values; the context keeps the worst status and the
//!   missing-attribute set
//! - Snapshot-isolated repositories and bounded policy references

pub mod combining;
pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod finder;
pub mod function;
pub mod model;
pub mod policy;
pub mod repository;
pub mod request;
pub mod resolver;
pub mod rule;
pub mod target;
pub mod types;
pub mod validate;
pub mod value;

// Re-export primary types for convenience
pub use combining::{CombiningAlgorithm, CombiningAlgorithmRegistry};
pub use context::EvaluationContext;
pub use engine::{EngineOptions, Pdp, PdpBuilder};
pub use error::{EvaluationFault, FunctionError, PolicyError, PolicyResult, ValueError};
pub use expression::{Apply, AttributeDesignator, AttributeSelector, Expression, VariableDefinition};
pub use finder::{AttributeFinder, AttributeQuery, InMemoryAttributeFinder};
pub use function::{Function, FunctionRegistry};
pub use model::{
    AdviceExpression, AttributeAssignmentExpression, CombinerParameter, EvaluatableNode, IdReference,
    ObligationExpression, Policy, PolicyChild, PolicyHeader, PolicySet, Rule,
};
pub use repository::{OrderedPolicyRepository, PolicyRepository, UnorderedPolicyRepository};
pub use request::Request;
pub use resolver::{EvaluatableResolver, InMemoryResolver, ResolveError, TimeoutResolver};
pub use rule::Evaluatable;
pub use target::{AllOf, AnyOf, Match, MatchResult, MatchSource, StandardTargetMatcher, Target, TargetMatcher};
pub use types::{Advice, AttributeAssignment, Decision, DecisionResult, IndeterminateKind, Obligation, Response};
pub use value::{AttributeValue, Bag, RawValue, Value};
