//! Deployed top-level policies and policy sets.
//!
//! The repository is the only mutable state shared between evaluations.
//! Each mutation builds a new list and swaps an `Arc` under a write lock, so
//! an evaluation holding a [`Snapshot`] never observes a partial update.

use std::sync::{Arc, RwLock};

use tracing::info;

use warden_core::PolicyId;

use crate::error::{PolicyError, PolicyResult};
use crate::model::EvaluatableNode;

pub type Snapshot = Arc<Vec<Arc<EvaluatableNode>>>;

pub trait PolicyRepository: Send + Sync {
    /// Append a node. Ids must be unique across the repository.
    fn deploy(&self, node: EvaluatableNode) -> PolicyResult<()>;

    /// Insert at `position` where the repository keeps an order; otherwise
    /// behaves like [`deploy`](PolicyRepository::deploy).
    fn deploy_at(&self, node: EvaluatableNode, position: usize) -> PolicyResult<()>;

    fn undeploy(&self, id: &PolicyId) -> PolicyResult<Arc<EvaluatableNode>>;

    fn get(&self, id: &PolicyId) -> Option<Arc<EvaluatableNode>>;

    fn snapshot(&self) -> Snapshot;

    fn evaluatables(&self) -> Vec<Arc<EvaluatableNode>> {
        self.snapshot().iter().cloned().collect()
    }

    fn is_ordered(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Shared store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Store {
    nodes: RwLock<Snapshot>,
}

impl Store {
    fn read(&self) -> Snapshot {
        match self.nodes.read() {
            Ok(guard) => Arc::clone(&guard),
            // The lock only guards an Arc swap; a poisoned lock still holds a
            // complete list.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn update<T>(&self, change: impl FnOnce(&mut Vec<Arc<EvaluatableNode>>) -> PolicyResult<T>) -> PolicyResult<T> {
        let mut guard = self
            .nodes
            .write()
            .map_err(|_| PolicyError::InternalError("policy repository lock poisoned".into()))?;
        let mut next: Vec<Arc<EvaluatableNode>> = guard.iter().cloned().collect();
        let out = change(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }

    fn insert(&self, node: EvaluatableNode, position: Option<usize>) -> PolicyResult<()> {
        let id = node.id().clone();
        let version = node.version().to_string();
        self.update(|nodes| {
            if nodes.iter().any(|n| n.id() == &id) {
                return Err(PolicyError::DuplicateEvaluatable(id.to_string()));
            }
            let at = position.map_or(nodes.len(), |p| p.min(nodes.len()));
            nodes.insert(at, Arc::new(node));
            info!(policy_id = %id, version = %version, position = at, "evaluatable deployed");
            Ok(())
        })
    }

    fn remove(&self, id: &PolicyId) -> PolicyResult<Arc<EvaluatableNode>> {
        self.update(|nodes| {
            let index = nodes
                .iter()
                .position(|n| n.id() == id)
                .ok_or_else(|| PolicyError::NotFound(id.to_string()))?;
            let removed = nodes.remove(index);
            info!(policy_id = %id, "evaluatable undeployed");
            Ok(removed)
        })
    }

    fn get(&self, id: &PolicyId) -> Option<Arc<EvaluatableNode>> {
        self.read().iter().find(|n| n.id() == id).cloned()
    }
}

// ---------------------------------------------------------------------------
// Ordered and unordered repositories
// ---------------------------------------------------------------------------

/// Keeps deployment order and honours explicit positions.
#[derive(Default)]
pub struct OrderedPolicyRepository {
    store: Store,
}

impl OrderedPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyRepository for OrderedPolicyRepository {
    fn deploy(&self, node: EvaluatableNode) -> PolicyResult<()> {
        self.store.insert(node, None)
    }

    fn deploy_at(&self, node: EvaluatableNode, position: usize) -> PolicyResult<()> {
        self.store.insert(node, Some(position))
    }

    fn undeploy(&self, id: &PolicyId) -> PolicyResult<Arc<EvaluatableNode>> {
        self.store.remove(id)
    }

    fn get(&self, id: &PolicyId) -> Option<Arc<EvaluatableNode>> {
        self.store.get(id)
    }

    fn snapshot(&self) -> Snapshot {
        self.store.read()
    }

    fn is_ordered(&self) -> bool {
        true
    }
}

/// Appends on every deploy; positions are ignored.
#[derive(Default)]
pub struct UnorderedPolicyRepository {
    store: Store,
}

impl UnorderedPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyRepository for UnorderedPolicyRepository {
    fn deploy(&self, node: EvaluatableNode) -> PolicyResult<()> {
        self.store.insert(node, None)
    }

    fn deploy_at(&self, node: EvaluatableNode, _position: usize) -> PolicyResult<()> {
        self.store.insert(node, None)
    }

    fn undeploy(&self, id: &PolicyId) -> PolicyResult<Arc<EvaluatableNode>> {
        self.store.remove(id)
    }

    fn get(&self, id: &PolicyId) -> Option<Arc<EvaluatableNode>> {
        self.store.get(id)
    }

    fn snapshot(&self) -> Snapshot {
        self.store.read()
    }

    fn is_ordered(&self) -> bool {
        false
    }
}
