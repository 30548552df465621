//! Higher-order bag functions. The first argument names the function to
//! apply; it arrives as [`Value::Function`].

use std::sync::Arc;

use warden_core::DataType;

use super::{processing, type_error, Arity, Function, FunctionEnv, FunctionRegistry, NativeFunction, NS_1_0, NS_3_0};
use crate::error::FunctionError;
use crate::value::{Bag, Value};

pub fn register(registry: &mut FunctionRegistry) {
    for (ns, arity_any_of, arity_pairs, arity_map) in [
        (NS_1_0, Arity::Exact(3), Arity::Exact(3), Arity::Exact(2)),
        (NS_3_0, Arity::AtLeast(3), Arity::Exact(3), Arity::AtLeast(2)),
    ] {
        registry.add(NativeFunction::new(
            format!("{}:any-of", ns),
            arity_any_of,
            Some(DataType::Boolean),
            |id, args, env| quantify_single_bag(id, args, env, Quantifier::Any),
        ));
        registry.add(NativeFunction::new(
            format!("{}:all-of", ns),
            arity_any_of,
            Some(DataType::Boolean),
            |id, args, env| quantify_single_bag(id, args, env, Quantifier::All),
        ));
        registry.add(NativeFunction::new(
            format!("{}:any-of-any", ns),
            if ns == NS_3_0 { Arity::AtLeast(2) } else { arity_pairs },
            Some(DataType::Boolean),
            any_of_any,
        ));
        for (name, outer, inner) in [
            ("all-of-any", Quantifier::All, Quantifier::Any),
            ("any-of-all", Quantifier::Any, Quantifier::All),
            ("all-of-all", Quantifier::All, Quantifier::All),
        ] {
            registry.add(NativeFunction::new(
                format!("{}:{}", ns, name),
                arity_pairs,
                Some(DataType::Boolean),
                move |id, args, env| nested(id, args, env, outer, inner),
            ));
        }
        registry.add(NativeFunction::new(format!("{}:map", ns), arity_map, None, map));
    }
}

#[derive(Debug, Clone, Copy)]
enum Quantifier {
    Any,
    All,
}

impl Quantifier {
    /// Fold predicate results, stopping as soon as the outcome is known.
    fn over<I>(self, items: I) -> Result<bool, FunctionError>
    where
        I: IntoIterator<Item = Result<bool, FunctionError>>,
    {
        for item in items {
            match (self, item?) {
                (Quantifier::Any, true) => return Ok(true),
                (Quantifier::All, false) => return Ok(false),
                _ => {}
            }
        }
        Ok(matches!(self, Quantifier::All))
    }
}

fn target_function<'e>(id: &str, args: &[Value], env: &FunctionEnv<'e>) -> Result<&'e Arc<dyn Function>, FunctionError> {
    match &args[0] {
        Value::Function(name) => env
            .registry
            .get(name)
            .ok_or_else(|| processing(id, format!("unknown function {}", name))),
        other => Err(type_error(id, 0, "function", other)),
    }
}

fn predicate(
    id: &str,
    function: &Arc<dyn Function>,
    args: &[Value],
    env: &FunctionEnv<'_>,
) -> Result<bool, FunctionError> {
    let result = function.call(args, env)?;
    result
        .as_boolean()
        .ok_or_else(|| processing(id, format!("{} did not return a boolean", function.id())))
}

/// Position (within `args`) of the single bag argument after the function.
fn bag_position(id: &str, args: &[Value]) -> Result<usize, FunctionError> {
    let mut found = None;
    for (index, arg) in args.iter().enumerate().skip(1) {
        match arg {
            Value::Bag(_) if found.is_none() => found = Some(index),
            Value::Bag(_) => return Err(processing(id, "more than one bag argument")),
            Value::Function(_) => return Err(type_error(id, index, "value or bag", arg)),
            Value::Single(_) => {}
        }
    }
    found.ok_or_else(|| processing(id, "no bag argument"))
}

fn bag_at(args: &[Value], index: usize) -> Option<&Bag> {
    args[index].as_bag()
}

fn quantify_single_bag(id: &str, args: &[Value], env: &FunctionEnv<'_>, quantifier: Quantifier) -> Result<Value, FunctionError> {
    let function = target_function(id, args, env)?;
    let position = bag_position(id, args)?;
    let bag = bag_at(args, position).ok_or_else(|| processing(id, "no bag argument"))?;
    let mut call_args: Vec<Value> = args[1..].to_vec();
    let outcome = quantifier.over(bag.iter().map(|value| {
        call_args[position - 1] = Value::Single(value.clone());
        predicate(id, function, &call_args, env)
    }))?;
    Ok(super::boolean(outcome))
}

/// True if any combination of members, one per argument, satisfies the
/// predicate. Single values count as one-member bags.
fn any_of_any(id: &str, args: &[Value], env: &FunctionEnv<'_>) -> Result<Value, FunctionError> {
    let function = target_function(id, args, env)?;
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(args.len() - 1);
    for (index, arg) in args.iter().enumerate().skip(1) {
        columns.push(match arg {
            Value::Single(v) => vec![Value::Single(v.clone())],
            Value::Bag(b) => b.iter().cloned().map(Value::Single).collect(),
            Value::Function(_) => return Err(type_error(id, index, "value or bag", arg)),
        });
    }
    if columns.iter().any(Vec::is_empty) {
        return Ok(super::boolean(false));
    }
    let mut cursor = vec![0usize; columns.len()];
    loop {
        let call_args: Vec<Value> = cursor
            .iter()
            .enumerate()
            .map(|(col, &row)| columns[col][row].clone())
            .collect();
        if predicate(id, function, &call_args, env)? {
            return Ok(super::boolean(true));
        }
        // Advance the odometer.
        let mut col = columns.len();
        loop {
            if col == 0 {
                return Ok(super::boolean(false));
            }
            col -= 1;
            cursor[col] += 1;
            if cursor[col] < columns[col].len() {
                break;
            }
            cursor[col] = 0;
        }
    }
}

/// `outer` over the first bag of `inner` over the second bag.
fn nested(
    id: &str,
    args: &[Value],
    env: &FunctionEnv<'_>,
    outer: Quantifier,
    inner: Quantifier,
) -> Result<Value, FunctionError> {
    let function = target_function(id, args, env)?;
    let first = args[1]
        .as_bag()
        .ok_or_else(|| type_error(id, 1, "bag", &args[1]))?;
    let second = args[2]
        .as_bag()
        .ok_or_else(|| type_error(id, 2, "bag", &args[2]))?;
    let outcome = outer.over(first.iter().map(|a| {
        inner.over(second.iter().map(|b| {
            predicate(
                id,
                function,
                &[Value::Single(a.clone()), Value::Single(b.clone())],
                env,
            )
        }))
    }))?;
    Ok(super::boolean(outcome))
}

fn map(id: &str, args: &[Value], env: &FunctionEnv<'_>) -> Result<Value, FunctionError> {
    let function = target_function(id, args, env)?;
    let position = bag_position(id, args)?;
    let bag = bag_at(args, position).ok_or_else(|| processing(id, "no bag argument"))?;
    let mut call_args: Vec<Value> = args[1..].to_vec();
    let mut results = Vec::with_capacity(bag.len());
    for value in bag.iter() {
        call_args[position - 1] = Value::Single(value.clone());
        match function.call(&call_args, env)? {
            Value::Single(v) => results.push(v),
            other => {
                return Err(processing(
                    id,
                    format!("{} returned {}, expected a single value", function.id(), other.describe()),
                ))
            }
        }
    }
    let data_type = match results.first() {
        Some(v) => v.data_type(),
        None => function
            .return_type()
            .ok_or_else(|| processing(id, format!("cannot type the result of {}", function.id())))?,
    };
    if results.iter().any(|v| v.data_type() != data_type) {
        return Err(processing(id, "mapped values do not share a data type"));
    }
    Ok(Value::Bag(Bag::new(data_type, results)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn f(name: &str) -> Value {
        Value::Function(format!("{}:{}", NS_1_0, name))
    }

    fn strings(items: &[&str]) -> Value {
        bag_of(DataType::String, items)
    }

    fn ints(items: &[&str]) -> Value {
        bag_of(DataType::Integer, items)
    }

    #[test]
    fn test_any_of_and_all_of() {
        let r = FunctionRegistry::standard();
        let any = format!("{}:any-of", NS_3_0);
        let all = format!("{}:all-of", NS_3_0);
        let bag = strings(&["read", "write"]);
        assert_eq!(
            call(&r, &any, vec![f("string-equal"), s("write"), bag.clone()]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &all, vec![f("string-equal"), s("write"), bag.clone()]).unwrap(),
            b(false)
        );
        assert_eq!(
            call(&r, &any, vec![f("string-equal"), s("x"), strings(&[])]).unwrap(),
            b(false)
        );
        assert_eq!(
            call(&r, &all, vec![f("string-equal"), s("x"), strings(&[])]).unwrap(),
            b(true)
        );
    }

    #[test]
    fn test_any_of_bag_position_matters() {
        let r = FunctionRegistry::standard();
        let any = format!("{}:any-of", NS_3_0);
        // 10 > some member of the bag
        let gt = f("integer-greater-than");
        assert_eq!(
            call(&r, &any, vec![gt.clone(), i(10), ints(&["20", "5"])]).unwrap(),
            b(true)
        );
        // some member of the bag > 10
        assert_eq!(
            call(&r, &any, vec![gt, ints(&["1", "5"]), i(10)]).unwrap(),
            b(false)
        );
    }

    #[test]
    fn test_any_of_any() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:any-of-any", NS_1_0);
        assert_eq!(
            call(&r, &id, vec![f("string-equal"), strings(&["a", "b"]), strings(&["c", "b"])]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &id, vec![f("string-equal"), strings(&["a"]), strings(&["c"])]).unwrap(),
            b(false)
        );
    }

    #[test]
    fn test_nested_quantifiers() {
        let r = FunctionRegistry::standard();
        let gt = f("integer-greater-than");
        let all_any = format!("{}:all-of-any", NS_1_0);
        let any_all = format!("{}:any-of-all", NS_1_0);
        let all_all = format!("{}:all-of-all", NS_1_0);
        let low = ints(&["1", "2"]);
        let high = ints(&["3", "5"]);
        assert_eq!(
            call(&r, &all_any, vec![gt.clone(), ints(&["4", "6"]), high.clone()]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &any_all, vec![gt.clone(), ints(&["4", "6"]), high.clone()]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &all_all, vec![gt.clone(), high.clone(), low.clone()]).unwrap(),
            b(true)
        );
        assert_eq!(
            call(&r, &all_all, vec![gt, low, high]).unwrap(),
            b(false)
        );
    }

    #[test]
    fn test_map() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:map", NS_1_0);
        let out = call(
            &r,
            &id,
            vec![f("string-normalize-to-lower-case"), strings(&["Hello", "WORLD"])],
        )
        .unwrap();
        assert_eq!(out, strings(&["hello", "world"]));
        let empty = call(&r, &id, vec![f("string-normalize-to-lower-case"), strings(&[])]).unwrap();
        assert_eq!(empty, strings(&[]));
    }

    #[test]
    fn test_unknown_or_non_boolean_function() {
        let r = FunctionRegistry::standard();
        let any = format!("{}:any-of", NS_1_0);
        let unknown = Value::Function("urn:example:nope".into());
        assert!(call(&r, &any, vec![unknown, s("a"), strings(&["a"])]).is_err());
        assert!(call(&r, &any, vec![f("string-normalize-space"), s("a"), strings(&["a"])]).is_err());
        assert!(call(&r, &any, vec![s("not a function"), s("a"), strings(&["a"])]).is_err());
    }
}
