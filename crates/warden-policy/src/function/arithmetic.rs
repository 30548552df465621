use warden_core::DataType;

use super::{double_arg, integer_arg, processing, Arity, FunctionRegistry, NativeFunction, NS_1_0};
use crate::value::{AttributeValue, Value};

fn int(i: i64) -> Value {
    Value::Single(AttributeValue::Integer(i))
}

fn dbl(d: f64) -> Value {
    Value::Single(AttributeValue::Double(d))
}

pub fn register(registry: &mut FunctionRegistry) {
    let variadic: [(&str, fn(i64, i64) -> Option<i64>, fn(f64, f64) -> f64); 2] = [
        ("add", i64::checked_add, |a, b| a + b),
        ("multiply", i64::checked_mul, |a, b| a * b),
    ];
    for (name, int_op, dbl_op) in variadic {
        registry.add(NativeFunction::new(
            format!("{}:integer-{}", NS_1_0, name),
            Arity::AtLeast(2),
            Some(DataType::Integer),
            move |id, args, _| {
                let mut acc = integer_arg(id, args, 0)?;
                for index in 1..args.len() {
                    let next = integer_arg(id, args, index)?;
                    acc = int_op(acc, next).ok_or_else(|| processing(id, "integer overflow"))?;
                }
                Ok(int(acc))
            },
        ));
        registry.add(NativeFunction::new(
            format!("{}:double-{}", NS_1_0, name),
            Arity::AtLeast(2),
            Some(DataType::Double),
            move |id, args, _| {
                let mut acc = double_arg(id, args, 0)?;
                for index in 1..args.len() {
                    acc = dbl_op(acc, double_arg(id, args, index)?);
                }
                Ok(dbl(acc))
            },
        ));
    }

    registry.add(NativeFunction::new(
        format!("{}:integer-subtract", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Integer),
        |id, args, _| {
            let a = integer_arg(id, args, 0)?;
            let b = integer_arg(id, args, 1)?;
            a.checked_sub(b)
                .map(int)
                .ok_or_else(|| processing(id, "integer overflow"))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:double-subtract", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Double),
        |id, args, _| Ok(dbl(double_arg(id, args, 0)? - double_arg(id, args, 1)?)),
    ));
    registry.add(NativeFunction::new(
        format!("{}:integer-divide", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Integer),
        |id, args, _| {
            let a = integer_arg(id, args, 0)?;
            let b = integer_arg(id, args, 1)?;
            if b == 0 {
                return Err(processing(id, "division by zero"));
            }
            a.checked_div(b)
                .map(int)
                .ok_or_else(|| processing(id, "integer overflow"))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:double-divide", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Double),
        |id, args, _| {
            let a = double_arg(id, args, 0)?;
            let b = double_arg(id, args, 1)?;
            if b == 0.0 {
                return Err(processing(id, "division by zero"));
            }
            Ok(dbl(a / b))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:integer-mod", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Integer),
        |id, args, _| {
            let a = integer_arg(id, args, 0)?;
            let b = integer_arg(id, args, 1)?;
            if b == 0 {
                return Err(processing(id, "division by zero"));
            }
            a.checked_rem(b)
                .map(int)
                .ok_or_else(|| processing(id, "integer overflow"))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:integer-abs", NS_1_0),
        Arity::Exact(1),
        Some(DataType::Integer),
        |id, args, _| {
            integer_arg(id, args, 0)?
                .checked_abs()
                .map(int)
                .ok_or_else(|| processing(id, "integer overflow"))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:double-abs", NS_1_0),
        Arity::Exact(1),
        Some(DataType::Double),
        |id, args, _| Ok(dbl(double_arg(id, args, 0)?.abs())),
    ));
    // XPath fn:round: halves round towards positive infinity.
    registry.add(NativeFunction::new(
        format!("{}:round", NS_1_0),
        Arity::Exact(1),
        Some(DataType::Double),
        |id, args, _| {
            let x = double_arg(id, args, 0)?;
            Ok(dbl(if x.is_finite() { (x + 0.5).floor() } else { x }))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:floor", NS_1_0),
        Arity::Exact(1),
        Some(DataType::Double),
        |id, args, _| Ok(dbl(double_arg(id, args, 0)?.floor())),
    ));
}
