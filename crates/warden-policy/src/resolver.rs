//! Resolution of policy and policy-set references.
//!
//! Local references are answered from the repository snapshot the
//! evaluation started with. Anything else goes to an optional remote
//! resolver, which is the only blocking boundary in an evaluation and is
//! therefore bounded by [`TimeoutResolver`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::EvaluationFault;
use crate::model::{compare_versions, EvaluatableNode, IdReference};
use crate::types::PolicyKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no {kind:?} satisfies reference {reference}")]
    NotFound { reference: String, kind: PolicyKind },

    #[error("resolving {0} timed out")]
    Timeout(String),

    #[error("resolving {reference} failed: {message}")]
    Failed { reference: String, message: String },
}

impl From<ResolveError> for EvaluationFault {
    fn from(e: ResolveError) -> Self {
        EvaluationFault::NotFound(e.to_string())
    }
}

pub trait EvaluatableResolver: Send + Sync {
    fn resolve(&self, reference: &IdReference, kind: PolicyKind) -> Result<Arc<EvaluatableNode>, ResolveError>;
}

/// Highest version among the candidates that satisfy the reference.
fn best_match<'n, I>(candidates: I, reference: &IdReference, kind: PolicyKind) -> Option<&'n Arc<EvaluatableNode>>
where
    I: IntoIterator<Item = &'n Arc<EvaluatableNode>>,
{
    candidates
        .into_iter()
        .filter(|node| node.kind() == kind && reference.accepts(node.id(), node.version()))
        .max_by(|a, b| {
            compare_versions(a.version(), b.version()).unwrap_or_else(|| a.version().cmp(b.version()))
        })
}

// ---------------------------------------------------------------------------
// SnapshotResolver
// ---------------------------------------------------------------------------

/// Resolves against a repository snapshot, falling back to a remote resolver.
pub struct SnapshotResolver<'a> {
    snapshot: &'a [Arc<EvaluatableNode>],
    remote: Option<&'a dyn EvaluatableResolver>,
}

impl<'a> SnapshotResolver<'a> {
    pub fn new(snapshot: &'a [Arc<EvaluatableNode>], remote: Option<&'a dyn EvaluatableResolver>) -> Self {
        Self { snapshot, remote }
    }
}

impl EvaluatableResolver for SnapshotResolver<'_> {
    fn resolve(&self, reference: &IdReference, kind: PolicyKind) -> Result<Arc<EvaluatableNode>, ResolveError> {
        if let Some(node) = best_match(self.snapshot, reference, kind) {
            debug!(reference = %reference, version = node.version(), "reference resolved locally");
            return Ok(Arc::clone(node));
        }
        match self.remote {
            Some(remote) => remote.resolve(reference, kind),
            None => Err(ResolveError::NotFound {
                reference: reference.to_string(),
                kind,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryResolver
// ---------------------------------------------------------------------------

/// A fixed set of nodes, standing in for a remote policy store.
#[derive(Default)]
pub struct InMemoryResolver {
    nodes: Vec<Arc<EvaluatableNode>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: impl Into<EvaluatableNode>) -> Self {
        self.nodes.push(Arc::new(node.into()));
        self
    }
}

impl EvaluatableResolver for InMemoryResolver {
    fn resolve(&self, reference: &IdReference, kind: PolicyKind) -> Result<Arc<EvaluatableNode>, ResolveError> {
        best_match(&self.nodes, reference, kind)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                reference: reference.to_string(),
                kind,
            })
    }
}

// ---------------------------------------------------------------------------
// TimeoutResolver
// ---------------------------------------------------------------------------

/// Lookups allowed to run at once before new ones are refused.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Runs each lookup on a worker thread and gives up after `timeout`.
/// A lookup that times out keeps running detached and still counts against
/// `max_in_flight` until it returns; once the limit is reached new lookups
/// fail immediately instead of spawning more threads.
pub struct TimeoutResolver {
    inner: Arc<dyn EvaluatableResolver>,
    timeout: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

impl TimeoutResolver {
    pub fn new(inner: Arc<dyn EvaluatableResolver>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lookups currently running, including abandoned ones.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Reserve a worker slot. Fails when `max_in_flight` lookups are running.
    fn acquire(&self) -> bool {
        self.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_in_flight).then_some(n + 1)
            })
            .is_ok()
    }
}

impl EvaluatableResolver for TimeoutResolver {
    fn resolve(&self, reference: &IdReference, kind: PolicyKind) -> Result<Arc<EvaluatableNode>, ResolveError> {
        if !self.acquire() {
            warn!(reference = %reference, in_flight = self.in_flight(), "remote resolver saturated");
            return Err(ResolveError::Failed {
                reference: reference.to_string(),
                message: format!("{} lookups already outstanding", self.max_in_flight),
            });
        }
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let in_flight = Arc::clone(&self.in_flight);
        let owned = reference.clone();
        let spawned = thread::Builder::new()
            .name("warden-resolve".into())
            .spawn(move || {
                let result = inner.resolve(&owned, kind);
                // Release before sending so a caller that got the result sees the slot free.
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(ResolveError::Failed {
                reference: reference.to_string(),
                message: e.to_string(),
            });
        }
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    reference = %reference,
                    timeout_ms = self.timeout.as_millis() as u64,
                    in_flight = self.in_flight(),
                    "remote reference timed out"
                );
                Err(ResolveError::Timeout(reference.to_string()))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ResolveError::Failed {
                reference: reference.to_string(),
                message: "resolver thread exited without a result".into(),
            }),
        }
    }
}
