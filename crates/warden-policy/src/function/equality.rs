use warden_core::DataType;

use super::{boolean, single, string_arg, typed_id, Arity, FunctionRegistry, NativeFunction, NS_3_0};

pub fn register(registry: &mut FunctionRegistry) {
    for data_type in DataType::ALL {
        registry.add(equal(typed_id(data_type, "equal"), data_type));
    }
    // XACML 3.0 republished the duration equalities under its own namespace.
    for data_type in [DataType::DayTimeDuration, DataType::YearMonthDuration] {
        registry.add(equal(
            format!("{}:{}-equal", NS_3_0, data_type.short_name()),
            data_type,
        ));
    }
    registry.add(NativeFunction::new(
        format!("{}:string-equal-ignore-case", NS_3_0),
        Arity::Exact(2),
        Some(DataType::Boolean),
        |id, args, _| {
            let a = string_arg(id, args, 0)?;
            let b = string_arg(id, args, 1)?;
            Ok(boolean(a.to_lowercase() == b.to_lowercase()))
        },
    ));
}

fn equal(id: String, data_type: DataType) -> NativeFunction {
    NativeFunction::new(id, Arity::Exact(2), Some(DataType::Boolean), move |id, args, env| {
        let a = single(id, args, 0, data_type)?;
        let b = single(id, args, 1, data_type)?;
        Ok(boolean(a.value_eq(b, env.implicit_offset)))
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    const NS: &str = "urn:oasis:names:tc:xacml:1.0:function";

    #[test]
    fn test_string_equal() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:string-equal", NS);
        assert_eq!(call(&r, &id, vec![s("a"), s("a")]).unwrap(), b(true));
        assert_eq!(call(&r, &id, vec![s("a"), s("A")]).unwrap(), b(false));
    }

    #[test]
    fn test_string_equal_ignore_case() {
        let r = FunctionRegistry::standard();
        let id = "urn:oasis:names:tc:xacml:3.0:function:string-equal-ignore-case";
        assert_eq!(call(&r, id, vec![s("Hello"), s("hELLO")]).unwrap(), b(true));
    }

    #[test]
    fn test_date_equal_across_zones() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:dateTime-equal", NS);
        let a = typed(DataType::DateTime, "2024-01-01T12:00:00+01:00");
        let c = typed(DataType::DateTime, "2024-01-01T11:00:00Z");
        assert_eq!(call(&r, &id, vec![a, c]).unwrap(), b(true));
    }

    #[test]
    fn test_x500_and_rfc822_equal() {
        let r = FunctionRegistry::standard();
        let x = format!("{}:x500Name-equal", NS);
        assert_eq!(
            call(
                &r,
                &x,
                vec![
                    typed(DataType::X500Name, "CN=A,O=B"),
                    typed(DataType::X500Name, "cn=a, o=b"),
                ]
            )
            .unwrap(),
            b(true)
        );
        let m = format!("{}:rfc822Name-equal", NS);
        assert_eq!(
            call(
                &r,
                &m,
                vec![
                    typed(DataType::Rfc822Name, "joe@EXAMPLE.com"),
                    typed(DataType::Rfc822Name, "Joe@example.com"),
                ]
            )
            .unwrap(),
            b(false)
        );
    }

    #[test]
    fn test_duration_equal_in_both_namespaces() {
        let r = FunctionRegistry::standard();
        for id in [
            "urn:oasis:names:tc:xacml:1.0:function:dayTimeDuration-equal",
            "urn:oasis:names:tc:xacml:3.0:function:dayTimeDuration-equal",
        ] {
            let out = call(
                &r,
                id,
                vec![
                    typed(DataType::DayTimeDuration, "PT24H"),
                    typed(DataType::DayTimeDuration, "P1D"),
                ],
            )
            .unwrap();
            assert_eq!(out, b(true));
        }
    }

    #[test]
    fn test_double_nan_not_equal() {
        let r = FunctionRegistry::standard();
        let id = format!("{}:double-equal", NS);
        assert_eq!(call(&r, &id, vec![d(f64::NAN), d(f64::NAN)]).unwrap(), b(false));
        assert_eq!(call(&r, &id, vec![d(1.5), d(1.5)]).unwrap(), b(true));
    }
}
