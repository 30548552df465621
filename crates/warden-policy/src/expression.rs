//! Expressions: literal values, attribute designators and selectors,
//! function application, function references and variable references.
//!
//! Evaluation returns `Result<Value, EvaluationFault>`; faults are values,
//! converted to Indeterminate by the rule or policy that owns the expression.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use warden_core::{AttributeId, Category, DataType, MissingAttributeDetail};

use crate::context::{EvaluationContext, VariableSlot};
use crate::error::EvaluationFault;
use crate::finder::AttributeQuery;
use crate::function::logical;
use crate::value::{AttributeValue, Bag, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    Value(AttributeValue),
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
    Apply(Apply),
    /// A function passed to a higher-order function.
    Function { function_id: String },
    Variable { variable_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apply {
    pub function_id: String,
    #[serde(default)]
    pub arguments: Vec<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub variable_id: String,
    pub expression: Expression,
}

/// Variables visible to an expression: those of the enclosing policy.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'p> {
    pub policy_id: &'p str,
    pub variables: &'p [VariableDefinition],
}

impl<'p> Scope<'p> {
    pub fn new(policy_id: &'p str, variables: &'p [VariableDefinition]) -> Self {
        Self {
            policy_id,
            variables,
        }
    }

    /// Scope without variables, used for policy-set level expressions.
    pub fn empty(policy_id: &'p str) -> Self {
        Self::new(policy_id, &[])
    }

    fn definition(&self, variable_id: &str) -> Option<&'p VariableDefinition> {
        self.variables.iter().find(|v| v.variable_id == variable_id)
    }
}

impl Expression {
    pub fn apply(function_id: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::Apply(Apply {
            function_id: function_id.into(),
            arguments,
            description: None,
        })
    }

    pub fn value(value: AttributeValue) -> Self {
        Expression::Value(value)
    }

    pub fn evaluate(&self, scope: &Scope<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationFault> {
        match self {
            Expression::Value(v) => Ok(Value::Single(v.clone())),
            Expression::Designator(d) => d.evaluate(ctx).map(Value::Bag),
            Expression::Selector(s) => s.evaluate(ctx).map(Value::Bag),
            Expression::Apply(apply) => apply.evaluate(scope, ctx),
            Expression::Function { function_id } => {
                if ctx.functions().contains(function_id) {
                    Ok(Value::Function(function_id.clone()))
                } else {
                    Err(EvaluationFault::Processing(format!("unknown function {}", function_id)))
                }
            }
            Expression::Variable { variable_id } => evaluate_variable(variable_id, scope, ctx),
        }
    }

    /// Visit this expression and all nested ones.
    pub fn walk<'e>(&'e self, visit: &mut dyn FnMut(&'e Expression)) {
        visit(self);
        if let Expression::Apply(apply) = self {
            for arg in &apply.arguments {
                arg.walk(visit);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

impl Apply {
    fn evaluate(&self, scope: &Scope<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationFault> {
        let function = ctx
            .functions()
            .get(&self.function_id)
            .ok_or_else(|| EvaluationFault::Processing(format!("unknown function {}", self.function_id)))?;

        match self.function_id.as_str() {
            logical::AND => return self.short_circuit(scope, ctx, false),
            logical::OR => return self.short_circuit(scope, ctx, true),
            logical::N_OF => return self.n_of(scope, ctx),
            _ => {}
        }

        let mut args = Vec::with_capacity(self.arguments.len());
        for arg in &self.arguments {
            args.push(arg.evaluate(scope, ctx)?);
        }
        let env = ctx.function_env();
        function.call(&args, &env).map_err(EvaluationFault::from)
    }

    /// `and` stops at the first false, `or` at the first true; later
    /// arguments are never evaluated.
    fn short_circuit(&self, scope: &Scope<'_>, ctx: &mut EvaluationContext<'_>, stop_on: bool) -> Result<Value, EvaluationFault> {
        for (index, arg) in self.arguments.iter().enumerate() {
            if self.boolean_argument(index, arg, scope, ctx)? == stop_on {
                return Ok(Value::Single(AttributeValue::Boolean(stop_on)));
            }
        }
        Ok(Value::Single(AttributeValue::Boolean(!stop_on)))
    }

    fn n_of(&self, scope: &Scope<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationFault> {
        let first = self
            .arguments
            .first()
            .ok_or_else(|| EvaluationFault::Processing(format!("{}: missing argument n", self.function_id)))?;
        let n = match first.evaluate(scope, ctx)? {
            Value::Single(AttributeValue::Integer(n)) => n,
            other => {
                return Err(EvaluationFault::Processing(format!(
                    "{}: argument 0 must be integer, got {}",
                    self.function_id,
                    other.describe()
                )))
            }
        };
        let needed = logical::n_of_threshold(&self.function_id, n, self.arguments.len() - 1)?;
        let mut found = 0usize;
        for (index, arg) in self.arguments.iter().enumerate().skip(1) {
            if found >= needed {
                break;
            }
            if self.boolean_argument(index, arg, scope, ctx)? {
                found += 1;
            }
        }
        Ok(Value::Single(AttributeValue::Boolean(found >= needed)))
    }

    fn boolean_argument(
        &self,
        index: usize,
        arg: &Expression,
        scope: &Scope<'_>,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<bool, EvaluationFault> {
        let value = arg.evaluate(scope, ctx)?;
        value.as_boolean().ok_or_else(|| {
            EvaluationFault::Processing(format!(
                "{}: argument {} must be boolean, got {}",
                self.function_id,
                index,
                value.describe()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

fn evaluate_variable(variable_id: &str, scope: &Scope<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvaluationFault> {
    let definition = scope.definition(variable_id).ok_or_else(|| {
        EvaluationFault::Processing(format!(
            "variable '{}' is not defined in policy '{}'",
            variable_id, scope.policy_id
        ))
    })?;
    match ctx.variable_slot(definition) {
        Some(VariableSlot::Done(result)) => return result.clone(),
        Some(VariableSlot::InProgress) => {
            return Err(EvaluationFault::Processing(format!(
                "variable '{}' in policy '{}' refers to itself",
                variable_id, scope.policy_id
            )))
        }
        None => {}
    }
    ctx.set_variable_slot(definition, VariableSlot::InProgress);
    let result = definition.expression.evaluate(scope, ctx);
    debug!(policy_id = scope.policy_id, variable_id, ok = result.is_ok(), "variable evaluated");
    ctx.set_variable_slot(definition, VariableSlot::Done(result.clone()));
    result
}

// ---------------------------------------------------------------------------
// Attribute designators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDesignator {
    pub category: Category,
    pub attribute_id: AttributeId,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default)]
    pub must_be_present: bool,
}

impl AttributeDesignator {
    pub fn new(category: impl Into<Category>, attribute_id: impl Into<AttributeId>, data_type: DataType) -> Self {
        Self {
            category: category.into(),
            attribute_id: attribute_id.into(),
            data_type,
            issuer: None,
            must_be_present: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.must_be_present = true;
        self
    }

    fn missing_detail(&self) -> MissingAttributeDetail {
        MissingAttributeDetail {
            category: self.category.clone(),
            attribute_id: self.attribute_id.clone(),
            data_type: self.data_type,
            issuer: self.issuer.clone(),
        }
    }

    /// Values from the request; on a miss, from the attribute finder.
    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Bag, EvaluationFault> {
        let raw = ctx.request().raw_values(
            &self.category,
            &self.attribute_id,
            self.data_type,
            self.issuer.as_deref(),
        );
        let mut values = Vec::with_capacity(raw.len());
        for r in raw {
            values.push(r.parse()?);
        }

        if values.is_empty() {
            let query = AttributeQuery {
                category: self.category.clone(),
                attribute_id: self.attribute_id.clone(),
                data_type: self.data_type,
                issuer: self.issuer.clone(),
            };
            for raw in ctx.find_attribute(&query)? {
                values.push(AttributeValue::parse(self.data_type, &raw)?);
            }
        }

        if values.is_empty() && self.must_be_present {
            let detail = self.missing_detail();
            warn!(attribute = %detail, "required attribute missing");
            let fault = EvaluationFault::MissingAttribute(detail);
            ctx.record_fault(&fault);
            return Err(fault);
        }
        Ok(Bag::new(self.data_type, values))
    }
}

// ---------------------------------------------------------------------------
// Attribute selectors
// ---------------------------------------------------------------------------

/// Navigates the structured `content` of a request category with a JSON
/// Pointer. Scalars and arrays of scalars become bag members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSelector {
    pub category: Category,
    pub path: String,
    pub data_type: DataType,
    #[serde(default)]
    pub must_be_present: bool,
}

impl AttributeSelector {
    pub fn evaluate(&self, ctx: &mut EvaluationContext<'_>) -> Result<Bag, EvaluationFault> {
        let mut values = Vec::new();
        if let Some(node) = ctx
            .request()
            .content(&self.category)
            .and_then(|content| content.pointer(&self.path))
        {
            match node {
                serde_json::Value::Array(items) => {
                    for item in items {
                        if let Some(raw) = self.scalar(item)? {
                            values.push(AttributeValue::parse(self.data_type, &raw)?);
                        }
                    }
                }
                other => {
                    if let Some(raw) = self.scalar(other)? {
                        values.push(AttributeValue::parse(self.data_type, &raw)?);
                    }
                }
            }
        }

        if values.is_empty() && self.must_be_present {
            let fault = EvaluationFault::MissingAttribute(MissingAttributeDetail {
                category: self.category.clone(),
                attribute_id: AttributeId::new(self.path.clone()),
                data_type: self.data_type,
                issuer: None,
            });
            ctx.record_fault(&fault);
            return Err(fault);
        }
        Ok(Bag::new(self.data_type, values))
    }

    fn scalar(&self, node: &serde_json::Value) -> Result<Option<String>, EvaluationFault> {
        match node {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(s) => Ok(Some(s.clone())),
            serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
            serde_json::Value::Number(n) => Ok(Some(n.to_string())),
            _ => Err(EvaluationFault::Processing(format!(
                "selector {} reaches a structured node, expected scalars",
                self.path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::TestServices;
    use crate::finder::InMemoryAttributeFinder;
    use crate::request::Request;
    use serde_json::json;
    use warden_core::StatusCode;

    const NS: &str = "urn:oasis:names:tc:xacml:1.0:function";

    fn make_designator(category: &str, id: &str, data_type: DataType) -> Expression {
        Expression::Designator(AttributeDesignator::new(category, id, data_type))
    }

    fn make_one_and_only(inner: Expression) -> Expression {
        Expression::apply(format!("{}:string-one-and-only", NS), vec![inner])
    }

    fn lit(s: &str) -> Expression {
        Expression::value(AttributeValue::string(s))
    }

    fn make_request() -> Request {
        Request::new()
            .with_value("subject", "subject-id", DataType::String, "alice")
            .with_value("resource", "owner", DataType::String, "alice")
            .with_content("resource", json!({ "record": { "tags": ["a", "b"], "level": 3 } }))
    }

    #[test]
    fn test_apply_nested_functions() {
        let services = TestServices::new();
        let request = make_request();
        let mut ctx = services.context(&request);
        let expr = Expression::apply(
            format!("{}:string-equal", NS),
            vec![
                make_one_and_only(make_designator("subject", "subject-id", DataType::String)),
                make_one_and_only(make_designator("resource", "owner", DataType::String)),
            ],
        );
        let out = expr.evaluate(&Scope::empty("p"), &mut ctx).unwrap();
        assert_eq!(out.as_boolean(), Some(true));
    }

    #[test]
    fn test_and_short_circuits_before_fault() {
        let services = TestServices::new();
        let request = make_request();
        let mut ctx = services.context(&request);
        let failing = make_one_and_only(make_designator("resource", "nothing", DataType::String));
        let expr = Expression::apply(
            logical::AND,
            vec![Expression::value(AttributeValue::boolean(false)), failing.clone()],
        );
        assert_eq!(expr.evaluate(&Scope::empty("p"), &mut ctx).unwrap().as_boolean(), Some(false));

        let expr = Expression::apply(
            logical::OR,
            vec![failing, Expression::value(AttributeValue::boolean(true))],
        );
        assert!(expr.evaluate(&Scope::empty("p"), &mut ctx).is_err());
    }

    #[test]
    fn test_n_of_stops_once_satisfied() {
        let services = TestServices::new();
        let request = make_request();
        let mut ctx = services.context(&request);
        let failing = make_one_and_only(make_designator("resource", "nothing", DataType::String));
        let expr = Expression::apply(
            logical::N_OF,
            vec![
                Expression::value(AttributeValue::integer(1)),
                Expression::value(AttributeValue::boolean(true)),
                failing,
            ],
        );
        assert_eq!(expr.evaluate(&Scope::empty("p"), &mut ctx).unwrap().as_boolean(), Some(true));
    }

    #[test]
    fn test_required_designator_records_missing_attribute() {
        let services = TestServices::new();
        let request = Request::new();
        let mut ctx = services.context(&request);
        let expr = Expression::Designator(AttributeDesignator::new("subject", "subject-id", DataType::String).required());
        let err = expr.evaluate(&Scope::empty("p"), &mut ctx).unwrap_err();
        assert!(matches!(err, EvaluationFault::MissingAttribute(_)));
        assert_eq!(ctx.status(), StatusCode::MissingAttribute);
        assert_eq!(ctx.missing_attributes().len(), 1);
    }

    #[test]
    fn test_designator_falls_back_to_finder_once() {
        let finder = InMemoryAttributeFinder::new().with_values("subject", "role", &["admin"]);
        let services = TestServices::new().with_finder(finder);
        let request = Request::new();
        let mut ctx = services.context(&request);
        let expr = make_designator("subject", "role", DataType::String);
        for _ in 0..3 {
            let bag = expr.evaluate(&Scope::empty("p"), &mut ctx).unwrap();
            assert_eq!(bag.as_bag().unwrap().len(), 1);
        }
        assert_eq!(services.finder_calls(), 1);
    }

    #[test]
    fn test_finder_not_consulted_when_request_has_values() {
        let finder = InMemoryAttributeFinder::new().with_values("subject", "subject-id", &["mallory"]);
        let services = TestServices::new().with_finder(finder);
        let request = make_request();
        let mut ctx = services.context(&request);
        let bag = make_designator("subject", "subject-id", DataType::String)
            .evaluate(&Scope::empty("p"), &mut ctx)
            .unwrap();
        assert_eq!(bag.as_bag().unwrap().values(), &[AttributeValue::string("alice")]);
        assert_eq!(services.finder_calls(), 0);
    }

    #[test]
    fn test_selector_reads_content() {
        let services = TestServices::new();
        let request = make_request();
        let mut ctx = services.context(&request);
        let tags = AttributeSelector {
            category: Category::Resource,
            path: "/record/tags".into(),
            data_type: DataType::String,
            must_be_present: false,
        };
        assert_eq!(tags.evaluate(&mut ctx).unwrap().len(), 2);
        let level = AttributeSelector {
            category: Category::Resource,
            path: "/record/level".into(),
            data_type: DataType::Integer,
            must_be_present: true,
        };
        assert_eq!(level.evaluate(&mut ctx).unwrap().values(), &[AttributeValue::integer(3)]);
        let absent = AttributeSelector {
            category: Category::Resource,
            path: "/record/missing".into(),
            data_type: DataType::String,
            must_be_present: true,
        };
        assert!(absent.evaluate(&mut ctx).is_err());
        let structured = AttributeSelector {
            category: Category::Resource,
            path: "/record".into(),
            data_type: DataType::String,
            must_be_present: false,
        };
        assert!(matches!(structured.evaluate(&mut ctx), Err(EvaluationFault::Processing(_))));
    }

    #[test]
    fn test_variables_are_memoized_per_context() {
        let services = TestServices::new();
        let request = make_request();
        let variables = vec![VariableDefinition {
            variable_id: "owner".into(),
            expression: make_one_and_only(make_designator("resource", "owner", DataType::String)),
        }];
        let scope = Scope::new("p", &variables);
        let mut ctx = services.context(&request);
        let reference = Expression::Variable {
            variable_id: "owner".into(),
        };
        assert_eq!(reference.evaluate(&scope, &mut ctx).unwrap(), Value::Single(AttributeValue::string("alice")));
        assert!(matches!(
            ctx.variable_slot(&variables[0]),
            Some(VariableSlot::Done(Ok(_)))
        ));
        assert_eq!(reference.evaluate(&scope, &mut ctx).unwrap(), Value::Single(AttributeValue::string("alice")));
    }

    #[test]
    fn test_variable_cycle_is_processing_fault() {
        let services = TestServices::new();
        let request = make_request();
        let variables = vec![
            VariableDefinition {
                variable_id: "a".into(),
                expression: Expression::Variable { variable_id: "b".into() },
            },
            VariableDefinition {
                variable_id: "b".into(),
                expression: Expression::Variable { variable_id: "a".into() },
            },
        ];
        let scope = Scope::new("p", &variables);
        let mut ctx = services.context(&request);
        let err = Expression::Variable { variable_id: "a".into() }
            .evaluate(&scope, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, EvaluationFault::Processing(ref m) if m.contains("refers to itself")));
    }

    #[test]
    fn test_function_reference_and_higher_order() {
        let services = TestServices::new();
        let request = make_request();
        let mut ctx = services.context(&request);
        let expr = Expression::apply(
            "urn:oasis:names:tc:xacml:3.0:function:any-of",
            vec![
                Expression::Function {
                    function_id: format!("{}:string-equal", NS),
                },
                lit("b"),
                Expression::Selector(AttributeSelector {
                    category: Category::Resource,
                    path: "/record/tags".into(),
                    data_type: DataType::String,
                    must_be_present: false,
                }),
            ],
        );
        assert_eq!(expr.evaluate(&Scope::empty("p"), &mut ctx).unwrap().as_boolean(), Some(true));
    }

    #[test]
    fn test_expression_json_shape() {
        let json = r#"{
            "kind": "apply",
            "function_id": "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            "arguments": [
                { "kind": "value", "data_type": "string", "value": "alice" },
                { "kind": "apply",
                  "function_id": "urn:oasis:names:tc:xacml:1.0:function:string-one-and-only",
                  "arguments": [ { "kind": "designator", "category": "subject",
                                   "attribute_id": "subject-id", "data_type": "string",
                                   "must_be_present": true } ] }
            ]
        }"#;
        let expr: Expression = serde_json::from_str(json).unwrap();
        let mut count = 0;
        expr.walk(&mut |_| count += 1);
        assert_eq!(count, 4);
    }
}
