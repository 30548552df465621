use warden_core::DataType;

use super::{boolean, integer_arg, processing, single, string_arg, Arity, FunctionRegistry, NativeFunction, NS_1_0, NS_2_0, NS_3_0};
use crate::error::FunctionError;
use crate::value::{AttributeValue, Value};

fn text(s: impl Into<String>) -> Value {
    Value::Single(AttributeValue::String(s.into()))
}

/// Lexical form of the value at `index` when it has `data_type`.
fn lexical(id: &str, args: &[Value], index: usize, data_type: DataType) -> Result<String, FunctionError> {
    Ok(single(id, args, index, data_type)?.to_string())
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.add(NativeFunction::new(
        format!("{}:string-normalize-space", NS_1_0),
        Arity::Exact(1),
        Some(DataType::String),
        |id, args, _| Ok(text(string_arg(id, args, 0)?.trim())),
    ));
    registry.add(NativeFunction::new(
        format!("{}:string-normalize-to-lower-case", NS_1_0),
        Arity::Exact(1),
        Some(DataType::String),
        |id, args, _| Ok(text(string_arg(id, args, 0)?.to_lowercase())),
    ));
    registry.add(NativeFunction::new(
        format!("{}:string-concatenate", NS_2_0),
        Arity::AtLeast(2),
        Some(DataType::String),
        |id, args, _| {
            let mut out = String::new();
            for index in 0..args.len() {
                out.push_str(string_arg(id, args, index)?);
            }
            Ok(text(out))
        },
    ));

    // (needle, haystack) predicates, string and anyURI haystacks.
    let predicates: [(&str, fn(&str, &str) -> bool); 3] = [
        ("starts-with", |needle, hay| hay.starts_with(needle)),
        ("ends-with", |needle, hay| hay.ends_with(needle)),
        ("contains", |needle, hay| hay.contains(needle)),
    ];
    for (name, predicate) in predicates {
        for haystack in [DataType::String, DataType::AnyUri] {
            registry.add(NativeFunction::new(
                format!("{}:{}-{}", NS_3_0, haystack.short_name(), name),
                Arity::Exact(2),
                Some(DataType::Boolean),
                move |id, args, _| {
                    let needle = string_arg(id, args, 0)?;
                    let hay = lexical(id, args, 1, haystack)?;
                    Ok(boolean(predicate(needle, &hay)))
                },
            ));
        }
    }

    for source in [DataType::String, DataType::AnyUri] {
        registry.add(NativeFunction::new(
            format!("{}:{}-substring", NS_3_0, source.short_name()),
            Arity::Exact(3),
            Some(DataType::String),
            move |id, args, _| {
                let input = lexical(id, args, 0, source)?;
                let begin = integer_arg(id, args, 1)?;
                let end = integer_arg(id, args, 2)?;
                substring(id, &input, begin, end).map(text)
            },
        ));
    }
}

/// Characters `[begin, end)`; an `end` of -1 means the end of the input.
fn substring(id: &str, input: &str, begin: i64, end: i64) -> Result<String, FunctionError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len() as i64;
    let end = if end == -1 { len } else { end };
    if begin < 0 || begin > len || end < begin || end > len {
        return Err(processing(
            id,
            format!("substring [{}, {}) out of range for length {}", begin, end, len),
        ));
    }
    Ok(chars[begin as usize..end as usize].iter().collect())
}
