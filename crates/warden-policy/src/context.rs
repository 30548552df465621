//! Per-request evaluation state.
//!
//! One [`EvaluationContext`] is created for every decision request and is
//! threaded by `&mut` through the whole recursive evaluation. It accumulates
//! the worst status seen, the missing-attribute descriptors, memoised
//! variables, attribute-finder results and resolved references. It is never
//! shared between requests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{debug, warn};

use warden_core::{MissingAttributeDetail, PolicyId, StatusCode, StatusCodeComparator};

use crate::combining::CombiningAlgorithmRegistry;
use crate::error::EvaluationFault;
use crate::expression::VariableDefinition;
use crate::finder::{AttributeFinder, AttributeQuery};
use crate::function::{FunctionEnv, FunctionRegistry};
use crate::model::{EvaluatableNode, IdReference};
use crate::request::Request;
use crate::resolver::EvaluatableResolver;
use crate::target::TargetMatcher;
use crate::types::{DecisionResult, PolicyIdentifier, PolicyKind, Response, Status};
use crate::value::Value;

/// Shared, read-only collaborators of an evaluation.
#[derive(Clone, Copy)]
pub struct EvaluationServices<'a> {
    pub functions: &'a FunctionRegistry,
    pub algorithms: &'a CombiningAlgorithmRegistry,
    pub matcher: &'a dyn TargetMatcher,
    pub comparator: &'a dyn StatusCodeComparator,
    pub finder: Option<&'a dyn AttributeFinder>,
    pub resolver: &'a dyn EvaluatableResolver,
    pub implicit_offset: FixedOffset,
    pub max_reference_depth: usize,
}

#[derive(Debug, Clone)]
pub enum VariableSlot {
    InProgress,
    Done(Result<Value, EvaluationFault>),
}

/// Identity of one variable definition. Definitions are borrowed from nodes
/// kept alive for the whole request (the snapshot and the reference cache),
/// so the address is stable and unique while the context exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableKey(usize);

impl VariableKey {
    pub fn of(definition: &VariableDefinition) -> Self {
        Self(definition as *const VariableDefinition as usize)
    }
}

type ResolvedReference = Result<Arc<EvaluatableNode>, EvaluationFault>;

pub struct EvaluationContext<'a> {
    request: &'a Request,
    services: EvaluationServices<'a>,
    status: StatusCode,
    message: Option<String>,
    missing: BTreeSet<MissingAttributeDetail>,
    variables: HashMap<VariableKey, VariableSlot>,
    attributes: HashMap<AttributeQuery, Result<Vec<String>, EvaluationFault>>,
    references: HashMap<(PolicyKind, IdReference), ResolvedReference>,
    reference_stack: Vec<PolicyId>,
    applicable: Vec<PolicyIdentifier>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(request: &'a Request, services: EvaluationServices<'a>) -> Self {
        Self {
            request,
            services,
            status: StatusCode::Ok,
            message: None,
            missing: BTreeSet::new(),
            variables: HashMap::new(),
            attributes: HashMap::new(),
            references: HashMap::new(),
            reference_stack: Vec::new(),
            applicable: Vec::new(),
        }
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn functions(&self) -> &'a FunctionRegistry {
        self.services.functions
    }

    pub fn algorithms(&self) -> &'a CombiningAlgorithmRegistry {
        self.services.algorithms
    }

    pub fn matcher(&self) -> &'a dyn TargetMatcher {
        self.services.matcher
    }

    pub fn function_env(&self) -> FunctionEnv<'a> {
        FunctionEnv {
            registry: self.services.functions,
            implicit_offset: self.services.implicit_offset,
        }
    }

    // -----------------------------------------------------------------------
    // Status bookkeeping
    // -----------------------------------------------------------------------

    /// Fold a fault into the status. The status only ever gets worse; the
    /// message belongs to the first fault of the worst kind.
    pub fn record_fault(&mut self, fault: &EvaluationFault) {
        if let EvaluationFault::MissingAttribute(detail) = fault {
            self.missing.insert(detail.clone());
        }
        let code = fault.status_code();
        let worst = self.services.comparator.worst(self.status, code);
        if worst != self.status {
            debug!(from = %self.status, to = %worst, "status escalated");
            self.status = worst;
            self.message = Some(fault.to_string());
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn missing_attributes(&self) -> &BTreeSet<MissingAttributeDetail> {
        &self.missing
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    pub fn variable_slot(&self, definition: &VariableDefinition) -> Option<&VariableSlot> {
        self.variables.get(&VariableKey::of(definition))
    }

    pub fn set_variable_slot(&mut self, definition: &VariableDefinition, slot: VariableSlot) {
        self.variables.insert(VariableKey::of(definition), slot);
    }

    // -----------------------------------------------------------------------
    // Attribute finder
    // -----------------------------------------------------------------------

    /// Ask the attribute finder, at most once per distinct query.
    pub fn find_attribute(&mut self, query: &AttributeQuery) -> Result<Vec<String>, EvaluationFault> {
        let finder = match self.services.finder {
            Some(finder) => finder,
            None => return Ok(Vec::new()),
        };
        if let Some(cached) = self.attributes.get(query) {
            return cached.clone();
        }
        let result = finder.fetch(self.request, query);
        if let Err(ref fault) = result {
            warn!(attribute = %query.attribute_id, error = %fault, "attribute finder failed");
        }
        self.attributes.insert(query.clone(), result.clone());
        result
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Resolve a reference, caching the outcome for the rest of the request.
    pub fn resolve_reference(&mut self, reference: &IdReference, kind: PolicyKind) -> ResolvedReference {
        let key = (kind, reference.clone());
        if let Some(cached) = self.references.get(&key) {
            return cached.clone();
        }
        let result = self
            .services
            .resolver
            .resolve(reference, kind)
            .map_err(EvaluationFault::from);
        if let Err(ref fault) = result {
            warn!(reference = %reference, error = %fault, "reference could not be resolved");
        }
        self.references.insert(key, result.clone());
        result
    }

    /// Push a referenced node onto the evaluation path. Fails on a cycle or
    /// when the configured depth is exceeded.
    pub fn enter_reference(&mut self, id: &PolicyId) -> Result<(), EvaluationFault> {
        if self.reference_stack.contains(id) {
            return Err(EvaluationFault::Processing(format!("reference cycle through '{}'", id)));
        }
        if self.reference_stack.len() >= self.services.max_reference_depth {
            return Err(EvaluationFault::Processing(format!(
                "reference depth {} exceeded at '{}'",
                self.services.max_reference_depth, id
            )));
        }
        self.reference_stack.push(id.clone());
        Ok(())
    }

    pub fn exit_reference(&mut self) {
        self.reference_stack.pop();
    }

    // -----------------------------------------------------------------------
    // Result
    // -----------------------------------------------------------------------

    pub fn note_applicable(&mut self, identifier: PolicyIdentifier) {
        if !self.applicable.contains(&identifier) {
            self.applicable.push(identifier);
        }
    }

    pub fn applicable(&self) -> &[PolicyIdentifier] {
        &self.applicable
    }

    /// Build the public response. The status is the worst one recorded; an
    /// Indeterminate decision never goes out with an OK status.
    pub fn into_response(self, result: DecisionResult, include_policy_ids: bool) -> Response {
        let mut code = self.status;
        let mut message = self.message;
        if result.decision.is_indeterminate() && code.is_ok() {
            code = StatusCode::ProcessingError;
            message.get_or_insert_with(|| "evaluation was indeterminate".to_string());
        }
        Response {
            decision: result.decision.decision_type(),
            status: Status {
                code,
                message,
                missing_attributes: self.missing.into_iter().collect(),
            },
            obligations: result.obligations,
            advice: result.advice,
            policy_identifiers: if include_policy_ids { self.applicable } else { Vec::new() },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::finder::InMemoryAttributeFinder;
    use crate::resolver::SnapshotResolver;
    use crate::target::StandardTargetMatcher;
    use crate::value::temporal::utc;
    use warden_core::StatusCodePriority;

    /// Owns everything an [`EvaluationContext`] borrows, for unit tests.
    pub struct TestServices {
        pub functions: FunctionRegistry,
        pub algorithms: CombiningAlgorithmRegistry,
        pub matcher: StandardTargetMatcher,
        pub comparator: StatusCodePriority,
        pub finder: Option<InMemoryAttributeFinder>,
        pub resolver: SnapshotResolver<'static>,
        pub implicit_offset: FixedOffset,
        pub max_reference_depth: usize,
    }

    impl TestServices {
        pub fn new() -> Self {
            Self {
                functions: FunctionRegistry::standard(),
                algorithms: CombiningAlgorithmRegistry::standard(),
                matcher: StandardTargetMatcher,
                comparator: StatusCodePriority,
                finder: None,
                resolver: SnapshotResolver::new(&[], None),
                implicit_offset: utc(),
                max_reference_depth: 8,
            }
        }

        pub fn with_finder(mut self, finder: InMemoryAttributeFinder) -> Self {
            self.finder = Some(finder);
            self
        }

        pub fn finder_calls(&self) -> usize {
            self.finder.as_ref().map_or(0, |f| f.calls())
        }

        pub fn services(&self) -> EvaluationServices<'_> {
            EvaluationServices {
                functions: &self.functions,
                algorithms: &self.algorithms,
                matcher: &self.matcher,
                comparator: &self.comparator,
                finder: self.finder.as_ref().map(|f| f as &dyn AttributeFinder),
                resolver: &self.resolver,
                implicit_offset: self.implicit_offset,
                max_reference_depth: self.max_reference_depth,
            }
        }

        pub fn context<'a>(&'a self, request: &'a Request) -> EvaluationContext<'a> {
            EvaluationContext::new(request, self.services())
        }
    }
}
