//! The policy decision point.
//!
//! A [`Pdp`] owns the injected registries, the policy repository and the
//! optional external collaborators (attribute finder, remote resolver). It is
//! immutable apart from the repository and can be shared across threads;
//! every call to [`Pdp::evaluate`] builds its own [`EvaluationContext`].

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::{debug, info, warn};

use warden_core::{PolicyId, StatusCodeComparator, StatusCodePriority};

use crate::combining::{CombiningAlgorithmRegistry, ONLY_ONE_APPLICABLE};
use crate::context::{EvaluationContext, EvaluationServices};
use crate::error::{EvaluationFault, PolicyError, PolicyResult};
use crate::finder::AttributeFinder;
use crate::function::FunctionRegistry;
use crate::model::EvaluatableNode;
use crate::repository::{OrderedPolicyRepository, PolicyRepository};
use crate::request::Request;
use crate::resolver::{EvaluatableResolver, SnapshotResolver, TimeoutResolver};
use crate::rule::Evaluatable;
use crate::target::{StandardTargetMatcher, TargetMatcher};
use crate::types::{DecisionResult, IndeterminateKind, Response};
use crate::validate::validate_node;
use crate::value::temporal::utc;

// ---------------------------------------------------------------------------
// EngineOptions
// ---------------------------------------------------------------------------

/// Tunables fixed when the PDP is built.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Policy-combining algorithm applied across the deployed top-level nodes.
    pub root_combining_algorithm: String,
    /// Offset assumed for date and time values that carry none.
    pub implicit_offset: FixedOffset,
    pub max_reference_depth: usize,
    /// Report applicable policies even when the request does not ask.
    pub return_policy_id_list: bool,
    /// Upper bound on a single remote reference lookup.
    pub reference_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            root_combining_algorithm: ONLY_ONE_APPLICABLE.to_string(),
            implicit_offset: utc(),
            max_reference_depth: 16,
            return_policy_id_list: false,
            reference_timeout: Duration::from_millis(2_000),
        }
    }
}

// ---------------------------------------------------------------------------
// PdpBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PdpBuilder {
    functions: Option<FunctionRegistry>,
    algorithms: Option<CombiningAlgorithmRegistry>,
    matcher: Option<Arc<dyn TargetMatcher>>,
    comparator: Option<Arc<dyn StatusCodeComparator>>,
    repository: Option<Arc<dyn PolicyRepository>>,
    finder: Option<Arc<dyn AttributeFinder>>,
    remote: Option<Arc<dyn EvaluatableResolver>>,
    options: EngineOptions,
}

impl PdpBuilder {
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn algorithms(mut self, algorithms: CombiningAlgorithmRegistry) -> Self {
        self.algorithms = Some(algorithms);
        self
    }

    pub fn matcher(mut self, matcher: Arc<dyn TargetMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn comparator(mut self, comparator: Arc<dyn StatusCodeComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn PolicyRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn attribute_finder(mut self, finder: Arc<dyn AttributeFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    /// Resolver consulted for references the repository cannot satisfy.
    /// Each lookup is bounded by [`EngineOptions::reference_timeout`].
    pub fn remote_resolver(mut self, resolver: Arc<dyn EvaluatableResolver>) -> Self {
        self.remote = Some(resolver);
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails when the root algorithm is not a registered policy-combining
    /// algorithm; nothing else can go wrong at evaluation time because of
    /// configuration.
    pub fn build(self) -> PolicyResult<Pdp> {
        let algorithms = self.algorithms.unwrap_or_else(CombiningAlgorithmRegistry::standard);
        if algorithms.policy_algorithm(&self.options.root_combining_algorithm).is_none() {
            return Err(PolicyError::UnknownAlgorithm(self.options.root_combining_algorithm));
        }
        if self.options.max_reference_depth == 0 {
            return Err(PolicyError::InvalidConfiguration(
                "max_reference_depth must be at least 1".into(),
            ));
        }
        let timeout = self.options.reference_timeout;
        let remote = self
            .remote
            .map(|inner| Arc::new(TimeoutResolver::new(inner, timeout)) as Arc<dyn EvaluatableResolver>);

        let pdp = Pdp {
            functions: self.functions.unwrap_or_else(FunctionRegistry::standard),
            algorithms,
            matcher: self.matcher.unwrap_or_else(|| Arc::new(StandardTargetMatcher)),
            comparator: self.comparator.unwrap_or_else(|| Arc::new(StatusCodePriority)),
            repository: self
                .repository
                .unwrap_or_else(|| Arc::new(OrderedPolicyRepository::new())),
            finder: self.finder,
            remote,
            options: self.options,
        };
        info!(
            root_algorithm = %pdp.options.root_combining_algorithm,
            functions = pdp.functions.len(),
            ordered = pdp.repository.is_ordered(),
            "policy decision point ready"
        );
        Ok(pdp)
    }
}

// ---------------------------------------------------------------------------
// Pdp
// ---------------------------------------------------------------------------

pub struct Pdp {
    functions: FunctionRegistry,
    algorithms: CombiningAlgorithmRegistry,
    matcher: Arc<dyn TargetMatcher>,
    comparator: Arc<dyn StatusCodeComparator>,
    repository: Arc<dyn PolicyRepository>,
    finder: Option<Arc<dyn AttributeFinder>>,
    remote: Option<Arc<dyn EvaluatableResolver>>,
    options: EngineOptions,
}

impl Pdp {
    pub fn builder() -> PdpBuilder {
        PdpBuilder::default()
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn algorithms(&self) -> &CombiningAlgorithmRegistry {
        &self.algorithms
    }

    pub fn repository(&self) -> &dyn PolicyRepository {
        self.repository.as_ref()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Validate and append a top-level policy or policy set.
    pub fn deploy(&self, node: EvaluatableNode) -> PolicyResult<()> {
        self.check(&node)?;
        self.repository.deploy(node)
    }

    pub fn deploy_at(&self, node: EvaluatableNode, position: usize) -> PolicyResult<()> {
        self.check(&node)?;
        self.repository.deploy_at(node, position)
    }

    pub fn undeploy(&self, id: &PolicyId) -> PolicyResult<Arc<EvaluatableNode>> {
        self.repository.undeploy(id)
    }

    fn check(&self, node: &EvaluatableNode) -> PolicyResult<()> {
        validate_node(node, &self.functions, &self.algorithms).map_err(|errors| {
            warn!(policy_id = %node.id(), problems = errors.len(), "evaluatable rejected");
            PolicyError::ValidationError(errors.join("; "))
        })
    }

    /// Decide one request against the repository as it stands right now.
    ///
    /// Never fails: every problem met during evaluation is folded into an
    /// Indeterminate decision and the response status.
    pub fn evaluate(&self, request: &Request) -> Response {
        let snapshot = self.repository.snapshot();
        let resolver = SnapshotResolver::new(&snapshot, self.remote.as_deref());
        let services = EvaluationServices {
            functions: &self.functions,
            algorithms: &self.algorithms,
            matcher: self.matcher.as_ref(),
            comparator: self.comparator.as_ref(),
            finder: self.finder.as_deref(),
            resolver: &resolver,
            implicit_offset: self.options.implicit_offset,
            max_reference_depth: self.options.max_reference_depth,
        };
        let mut ctx = EvaluationContext::new(request, services);

        let children: Vec<&dyn Evaluatable> = snapshot.iter().map(|n| n.as_ref() as &dyn Evaluatable).collect();
        debug!(evaluatables = children.len(), "evaluating request");
        let result = match self.algorithms.policy_algorithm(&self.options.root_combining_algorithm) {
            Some(algorithm) => algorithm.combine(&children, &[], &mut ctx),
            None => {
                ctx.record_fault(&EvaluationFault::Processing(format!(
                    "unknown root combining algorithm {}",
                    self.options.root_combining_algorithm
                )));
                DecisionResult::indeterminate(IndeterminateKind::DenyPermit)
            }
        };

        let include_ids = self.options.return_policy_id_list || request.return_policy_id_list;
        let response = ctx.into_response(result, include_ids);
        info!(
            decision = %response.decision,
            status = %response.status.code,
            obligations = response.obligations.len(),
            "request decided"
        );
        response
    }
}
