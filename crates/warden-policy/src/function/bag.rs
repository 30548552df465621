//! Per-type bag and set functions.

use warden_core::DataType;

use super::{bag_arg, boolean, processing, single, typed_id, Arity, FunctionRegistry, NativeFunction};
use crate::value::{AttributeValue, Bag, Value};

pub fn register(registry: &mut FunctionRegistry) {
    for data_type in DataType::ALL {
        register_bag_functions(registry, data_type);
        register_set_functions(registry, data_type);
    }
}

fn register_bag_functions(registry: &mut FunctionRegistry, data_type: DataType) {
    registry.add(NativeFunction::new(
        typed_id(data_type, "one-and-only"),
        Arity::Exact(1),
        Some(data_type),
        move |id, args, _| {
            let bag = bag_arg(id, args, 0, data_type)?;
            match bag.values() {
                [only] => Ok(Value::Single(only.clone())),
                values => Err(processing(
                    id,
                    format!("expected exactly one value, bag has {}", values.len()),
                )),
            }
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "bag-size"),
        Arity::Exact(1),
        Some(DataType::Integer),
        move |id, args, _| {
            let bag = bag_arg(id, args, 0, data_type)?;
            Ok(Value::Single(AttributeValue::Integer(bag.len() as i64)))
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "is-in"),
        Arity::Exact(2),
        Some(DataType::Boolean),
        move |id, args, env| {
            let value = single(id, args, 0, data_type)?;
            let bag = bag_arg(id, args, 1, data_type)?;
            Ok(boolean(bag.contains(value, env.implicit_offset)))
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "bag"),
        Arity::AtLeast(0),
        None,
        move |id, args, _| {
            let mut values = Vec::with_capacity(args.len());
            for index in 0..args.len() {
                values.push(single(id, args, index, data_type)?.clone());
            }
            Ok(Value::Bag(Bag::new(data_type, values)))
        },
    ));
}

fn register_set_functions(registry: &mut FunctionRegistry, data_type: DataType) {
    registry.add(NativeFunction::new(
        typed_id(data_type, "intersection"),
        Arity::Exact(2),
        None,
        move |id, args, env| {
            let a = bag_arg(id, args, 0, data_type)?;
            let b = bag_arg(id, args, 1, data_type)?;
            let common = a
                .distinct(env.implicit_offset)
                .into_iter()
                .filter(|v| b.contains(v, env.implicit_offset))
                .collect();
            Ok(Value::Bag(Bag::new(data_type, common)))
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "at-least-one-member-of"),
        Arity::Exact(2),
        Some(DataType::Boolean),
        move |id, args, env| {
            let a = bag_arg(id, args, 0, data_type)?;
            let b = bag_arg(id, args, 1, data_type)?;
            Ok(boolean(a.iter().any(|v| b.contains(v, env.implicit_offset))))
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "union"),
        Arity::AtLeast(2),
        None,
        move |id, args, env| {
            let mut all = Vec::new();
            for index in 0..args.len() {
                all.extend(bag_arg(id, args, index, data_type)?.iter().cloned());
            }
            let merged = Bag::new(data_type, all).distinct(env.implicit_offset);
            Ok(Value::Bag(Bag::new(data_type, merged)))
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "subset"),
        Arity::Exact(2),
        Some(DataType::Boolean),
        move |id, args, env| {
            let a = bag_arg(id, args, 0, data_type)?;
            let b = bag_arg(id, args, 1, data_type)?;
            Ok(boolean(is_subset(a, b, env.implicit_offset)))
        },
    ));
    registry.add(NativeFunction::new(
        typed_id(data_type, "set-equals"),
        Arity::Exact(2),
        Some(DataType::Boolean),
        move |id, args, env| {
            let a = bag_arg(id, args, 0, data_type)?;
            let b = bag_arg(id, args, 1, data_type)?;
            Ok(boolean(
                is_subset(a, b, env.implicit_offset) && is_subset(b, a, env.implicit_offset),
            ))
        },
    ));
}

fn is_subset(a: &Bag, b: &Bag, implicit: chrono::FixedOffset) -> bool {
    a.iter().all(|v| b.contains(v, implicit))
}
