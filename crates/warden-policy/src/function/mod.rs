//! The function layer: every function a policy can apply, looked up by URN.
//!
//! A [`FunctionRegistry`] is built once per engine and shared read-only by
//! all evaluations. Functions receive already-evaluated arguments; the
//! short-circuiting logical functions are special-cased by the expression
//! evaluator before their arguments are evaluated.

pub mod arithmetic;
pub mod bag;
pub mod comparison;
pub mod conversion;
pub mod equality;
pub mod higher_order;
pub mod logical;
pub mod matching;
pub mod string;
pub mod temporal;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::FixedOffset;
use tracing::debug;

use warden_core::DataType;

use crate::error::{FunctionError, PolicyError, PolicyResult};
use crate::value::{AttributeValue, Bag, Value};

pub const NS_1_0: &str = "urn:oasis:names:tc:xacml:1.0:function";
pub const NS_2_0: &str = "urn:oasis:names:tc:xacml:2.0:function";
pub const NS_3_0: &str = "urn:oasis:names:tc:xacml:3.0:function";

// ---------------------------------------------------------------------------
// Arity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

// ---------------------------------------------------------------------------
// Function trait
// ---------------------------------------------------------------------------

/// What a function sees besides its arguments.
pub struct FunctionEnv<'a> {
    pub registry: &'a FunctionRegistry,
    pub implicit_offset: FixedOffset,
}

pub trait Function: Send + Sync {
    fn id(&self) -> &str;

    fn arity(&self) -> Arity;

    /// Data type of a single-valued result, when fixed. Used by `map` to type
    /// the bag it builds from an empty input.
    fn return_type(&self) -> Option<DataType> {
        None
    }

    fn apply(&self, args: &[Value], env: &FunctionEnv<'_>) -> Result<Value, FunctionError>;

    /// Arity-checked entry point.
    fn call(&self, args: &[Value], env: &FunctionEnv<'_>) -> Result<Value, FunctionError> {
        if !self.arity().accepts(args.len()) {
            return Err(FunctionError::Arity {
                function: self.id().to_string(),
                expected: self.arity(),
                found: args.len(),
            });
        }
        self.apply(args, env)
    }
}

type NativeBody = dyn Fn(&str, &[Value], &FunctionEnv<'_>) -> Result<Value, FunctionError> + Send + Sync;

/// A function backed by a closure. All standard functions are built this way.
pub struct NativeFunction {
    id: String,
    arity: Arity,
    returns: Option<DataType>,
    body: Box<NativeBody>,
}

impl NativeFunction {
    pub fn new<F>(id: impl Into<String>, arity: Arity, returns: Option<DataType>, body: F) -> Self
    where
        F: Fn(&str, &[Value], &FunctionEnv<'_>) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            arity,
            returns,
            body: Box::new(body),
        }
    }
}

impl Function for NativeFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn return_type(&self) -> Option<DataType> {
        self.returns
    }

    fn apply(&self, args: &[Value], env: &FunctionEnv<'_>) -> Result<Value, FunctionError> {
        (self.body)(&self.id, args, env)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FunctionRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every standard function.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        equality::register(&mut registry);
        arithmetic::register(&mut registry);
        string::register(&mut registry);
        conversion::register(&mut registry);
        logical::register(&mut registry);
        comparison::register(&mut registry);
        temporal::register(&mut registry);
        bag::register(&mut registry);
        higher_order::register(&mut registry);
        matching::register(&mut registry);
        debug!(count = registry.len(), "standard function registry built");
        registry
    }

    /// Add a custom function. Identifiers must be unique.
    pub fn register(&mut self, function: Arc<dyn Function>) -> PolicyResult<()> {
        let id = function.id().to_string();
        if self.functions.contains_key(&id) {
            return Err(PolicyError::DuplicateFunction(id));
        }
        self.functions.insert(id, function);
        Ok(())
    }

    pub(crate) fn add(&mut self, function: NativeFunction) {
        self.functions
            .insert(function.id().to_string(), Arc::new(function));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Sorted identifiers, for listing.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers shared by the families
// ---------------------------------------------------------------------------

pub(crate) fn type_error(function: &str, index: usize, expected: impl Into<String>, found: &Value) -> FunctionError {
    FunctionError::Type {
        function: function.to_string(),
        index,
        expected: expected.into(),
        found: found.describe(),
    }
}

pub(crate) fn processing(function: &str, message: impl Into<String>) -> FunctionError {
    FunctionError::Processing {
        function: function.to_string(),
        message: message.into(),
    }
}

/// Single value of `data_type` at `index`.
pub(crate) fn single<'v>(
    function: &str,
    args: &'v [Value],
    index: usize,
    data_type: DataType,
) -> Result<&'v AttributeValue, FunctionError> {
    match &args[index] {
        Value::Single(v) if v.data_type() == data_type => Ok(v),
        other => Err(type_error(function, index, data_type.short_name(), other)),
    }
}

/// Bag of `data_type` at `index`.
pub(crate) fn bag_arg<'v>(
    function: &str,
    args: &'v [Value],
    index: usize,
    data_type: DataType,
) -> Result<&'v Bag, FunctionError> {
    match &args[index] {
        Value::Bag(b) if b.data_type() == data_type => Ok(b),
        other => Err(type_error(
            function,
            index,
            format!("bag of {}", data_type.short_name()),
            other,
        )),
    }
}

pub(crate) fn string_arg<'v>(function: &str, args: &'v [Value], index: usize) -> Result<&'v str, FunctionError> {
    match single(function, args, index, DataType::String)? {
        AttributeValue::String(s) => Ok(s),
        other => Err(type_error(function, index, "string", &Value::Single(other.clone()))),
    }
}

pub(crate) fn integer_arg(function: &str, args: &[Value], index: usize) -> Result<i64, FunctionError> {
    match single(function, args, index, DataType::Integer)? {
        AttributeValue::Integer(i) => Ok(*i),
        other => Err(type_error(function, index, "integer", &Value::Single(other.clone()))),
    }
}

pub(crate) fn double_arg(function: &str, args: &[Value], index: usize) -> Result<f64, FunctionError> {
    match single(function, args, index, DataType::Double)? {
        AttributeValue::Double(d) => Ok(*d),
        other => Err(type_error(function, index, "double", &Value::Single(other.clone()))),
    }
}

pub(crate) fn boolean_arg(function: &str, args: &[Value], index: usize) -> Result<bool, FunctionError> {
    match single(function, args, index, DataType::Boolean)? {
        AttributeValue::Boolean(b) => Ok(*b),
        other => Err(type_error(function, index, "boolean", &Value::Single(other.clone()))),
    }
}

pub(crate) fn boolean(b: bool) -> Value {
    Value::Single(AttributeValue::Boolean(b))
}

/// `<namespace>:<type>-<suffix>` for a per-type standard function.
pub(crate) fn typed_id(data_type: DataType, suffix: &str) -> String {
    format!(
        "{}:{}-{}",
        data_type.function_namespace(),
        data_type.short_name(),
        suffix
    )
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_standard_registry_has_core_functions() {
        let registry = FunctionRegistry::standard();
        for id in [
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            "urn:oasis:names:tc:xacml:1.0:function:and",
            "urn:oasis:names:tc:xacml:1.0:function:integer-add",
            "urn:oasis:names:tc:xacml:1.0:function:date-greater-than",
            "urn:oasis:names:tc:xacml:1.0:function:string-one-and-only",
            "urn:oasis:names:tc:xacml:3.0:function:any-of",
            "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match",
            "urn:oasis:names:tc:xacml:2.0:function:time-in-range",
            "urn:oasis:names:tc:xacml:2.0:function:ipAddress-one-and-only",
        ] {
            assert!(registry.contains(id), "missing {}", id);
        }
        assert!(registry.len() > 200);
    }

    #[test]
    fn test_arity_checked_before_apply() {
        let registry = FunctionRegistry::standard();
        let err = call(
            &registry,
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            vec![s("a")],
        )
        .unwrap_err();
        assert!(matches!(err, FunctionError::Arity { found: 1, .. }));
    }

    #[test]
    fn test_type_mismatch_is_function_error() {
        let registry = FunctionRegistry::standard();
        let err = call(
            &registry,
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            vec![s("a"), i(1)],
        )
        .unwrap_err();
        assert!(matches!(err, FunctionError::Type { index: 1, .. }));
    }

    #[test]
    fn test_custom_registration_rejects_duplicates() {
        let mut registry = FunctionRegistry::standard();
        let custom = Arc::new(NativeFunction::new(
            "urn:example:function:always-true",
            Arity::Exact(0),
            Some(DataType::Boolean),
            |_, _, _| Ok(boolean(true)),
        ));
        registry.register(custom.clone()).unwrap();
        assert!(matches!(
            registry.register(custom),
            Err(PolicyError::DuplicateFunction(_))
        ));
        assert_eq!(
            call(&registry, "urn:example:function:always-true", vec![]).unwrap(),
            b(true)
        );
    }

    #[test]
    fn test_ids_sorted() {
        let registry = FunctionRegistry::standard();
        let ids = registry.ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::Exact(2).to_string(), "2");
        assert_eq!(Arity::AtLeast(1).to_string(), "at least 1");
        assert!(Arity::AtLeast(2).accepts(5));
        assert!(!Arity::Exact(2).accepts(3));
    }
}
