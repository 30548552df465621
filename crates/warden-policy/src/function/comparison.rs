use std::cmp::Ordering;

use warden_core::DataType;

use super::{boolean, single, typed_id, Arity, FunctionRegistry, NativeFunction};

const ORDERED: [DataType; 6] = [
    DataType::Integer,
    DataType::Double,
    DataType::String,
    DataType::Time,
    DataType::Date,
    DataType::DateTime,
];

pub fn register(registry: &mut FunctionRegistry) {
    let relations: [(&str, fn(Ordering) -> bool); 4] = [
        ("greater-than", |o| o == Ordering::Greater),
        ("greater-than-or-equal", |o| o != Ordering::Less),
        ("less-than", |o| o == Ordering::Less),
        ("less-than-or-equal", |o| o != Ordering::Greater),
    ];
    for data_type in ORDERED {
        for (suffix, holds) in relations {
            registry.add(NativeFunction::new(
                typed_id(data_type, suffix),
                Arity::Exact(2),
                Some(DataType::Boolean),
                move |id, args, env| {
                    let a = single(id, args, 0, data_type)?;
                    let b = single(id, args, 1, data_type)?;
                    // Unordered pairs (NaN) satisfy no relation.
                    Ok(boolean(
                        a.value_cmp(b, env.implicit_offset).map_or(false, holds),
                    ))
                },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    const NS: &str = "urn:oasis:names:tc:xacml:1.0:function";

    #[test]
    fn test_integer_relations() {
        let r = FunctionRegistry::standard();
        let gt = format!("{}:integer-greater-than", NS);
        let ge = format!("{}:integer-greater-than-or-equal", NS);
        let lt = format!("{}:integer-less-than", NS);
        let le = format!("{}:integer-less-than-or-equal", NS);
        assert_eq!(call(&r, &gt, vec![i(2), i(1)]).unwrap(), b(true));
        assert_eq!(call(&r, &ge, vec![i(1), i(1)]).unwrap(), b(true));
        assert_eq!(call(&r, &lt, vec![i(2), i(1)]).unwrap(), b(false));
        assert_eq!(call(&r, &le, vec![i(1), i(1)]).unwrap(), b(true));
    }

    #[test]
    fn test_date_greater_than() {
        let r = FunctionRegistry::standard();
        let gt = format!("{}:date-greater-than", NS);
        let later = typed(DataType::Date, "2020-01-02");
        let earlier = typed(DataType::Date, "2020-01-01");
        assert_eq!(call(&r, &gt, vec![later.clone(), earlier.clone()]).unwrap(), b(true));
        assert_eq!(call(&r, &gt, vec![earlier, later]).unwrap(), b(false));
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        let r = FunctionRegistry::standard();
        let lt = format!("{}:string-less-than", NS);
        assert_eq!(call(&r, &lt, vec![s("apple"), s("banana")]).unwrap(), b(true));
    }

    #[test]
    fn test_nan_satisfies_nothing() {
        let r = FunctionRegistry::standard();
        for suffix in ["greater-than", "less-than-or-equal"] {
            let id = format!("{}:double-{}", NS, suffix);
            assert_eq!(call(&r, &id, vec![d(f64::NAN), d(1.0)]).unwrap(), b(false));
        }
    }
}
