//! Policy Information Point boundary: attribute lookups the request itself
//! could not satisfy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use warden_core::{AttributeId, Category, DataType};

use crate::error::EvaluationFault;
use crate::request::Request;

/// One designator lookup, as handed to an [`AttributeFinder`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeQuery {
    pub category: Category,
    pub attribute_id: AttributeId,
    pub data_type: DataType,
    pub issuer: Option<String>,
}

/// External attribute source. Consulted only when the request has no value
/// for a designator, and at most once per distinct query per evaluation.
///
/// Returns raw lexical values; the engine converts them to `data_type`.
pub trait AttributeFinder: Send + Sync {
    fn fetch(&self, request: &Request, query: &AttributeQuery) -> Result<Vec<String>, EvaluationFault>;
}

/// Attribute finder backed by a fixed table, keyed by category and attribute
/// id. Records how often it was asked, which tests use to check caching.
#[derive(Default)]
pub struct InMemoryAttributeFinder {
    values: HashMap<(Category, AttributeId), Vec<String>>,
    calls: AtomicUsize,
}

impl InMemoryAttributeFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(
        mut self,
        category: impl Into<Category>,
        attribute_id: impl Into<AttributeId>,
        values: &[&str],
    ) -> Self {
        self.values.insert(
            (category.into(), attribute_id.into()),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl AttributeFinder for InMemoryAttributeFinder {
    fn fetch(&self, _request: &Request, query: &AttributeQuery) -> Result<Vec<String>, EvaluationFault> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .values
            .get(&(query.category.clone(), query.attribute_id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
