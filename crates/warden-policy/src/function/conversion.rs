use warden_core::DataType;

use super::{double_arg, integer_arg, processing, single, string_arg, Arity, FunctionRegistry, NativeFunction, NS_1_0, NS_3_0};
use crate::value::{AttributeValue, Value};

/// Types with `<type>-from-string` / `string-from-<type>` pairs.
const STRING_CONVERTIBLE: [DataType; 13] = [
    DataType::Boolean,
    DataType::Integer,
    DataType::Double,
    DataType::Time,
    DataType::Date,
    DataType::DateTime,
    DataType::AnyUri,
    DataType::DayTimeDuration,
    DataType::YearMonthDuration,
    DataType::X500Name,
    DataType::Rfc822Name,
    DataType::IpAddress,
    DataType::DnsName,
];

pub fn register(registry: &mut FunctionRegistry) {
    registry.add(NativeFunction::new(
        format!("{}:double-to-integer", NS_1_0),
        Arity::Exact(1),
        Some(DataType::Integer),
        |id, args, _| {
            let d = double_arg(id, args, 0)?.trunc();
            // i64::MAX is not representable as a double; 2^63 is the first value out of range.
            if !d.is_finite() || d < i64::MIN as f64 || d >= -(i64::MIN as f64) {
                return Err(processing(id, format!("{} does not fit an integer", d)));
            }
            Ok(Value::Single(AttributeValue::Integer(d as i64)))
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:integer-to-double", NS_1_0),
        Arity::Exact(1),
        Some(DataType::Double),
        |id, args, _| {
            Ok(Value::Single(AttributeValue::Double(
                integer_arg(id, args, 0)? as f64,
            )))
        },
    ));

    for data_type in STRING_CONVERTIBLE {
        let short = data_type.short_name();
        registry.add(NativeFunction::new(
            format!("{}:{}-from-string", NS_3_0, short),
            Arity::Exact(1),
            Some(data_type),
            move |id, args, _| {
                let raw = string_arg(id, args, 0)?;
                AttributeValue::parse(data_type, raw)
                    .map(Value::Single)
                    .map_err(|e| processing(id, e.to_string()))
            },
        ));
        registry.add(NativeFunction::new(
            format!("{}:string-from-{}", NS_3_0, short),
            Arity::Exact(1),
            Some(DataType::String),
            move |id, args, _| {
                let value = single(id, args, 0, data_type)?;
                Ok(Value::Single(AttributeValue::String(value.to_string())))
            },
        ));
    }
}
