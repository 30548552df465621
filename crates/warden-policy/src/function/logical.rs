//! Boolean connectives. When applied from a policy expression, `and`, `or`
//! and `n-of` are evaluated lazily by the expression evaluator; the eager
//! bodies registered here serve higher-order use and direct calls.

use warden_core::DataType;

use super::{boolean, boolean_arg, integer_arg, processing, Arity, FunctionRegistry, NativeFunction};

pub const AND: &str = "urn:oasis:names:tc:xacml:1.0:function:and";
pub const OR: &str = "urn:oasis:names:tc:xacml:1.0:function:or";
pub const N_OF: &str = "urn:oasis:names:tc:xacml:1.0:function:n-of";
pub const NOT: &str = "urn:oasis:names:tc:xacml:1.0:function:not";

pub fn register(registry: &mut FunctionRegistry) {
    registry.add(NativeFunction::new(AND, Arity::AtLeast(0), Some(DataType::Boolean), |id, args, _| {
        for index in 0..args.len() {
            if !boolean_arg(id, args, index)? {
                return Ok(boolean(false));
            }
        }
        Ok(boolean(true))
    }));
    registry.add(NativeFunction::new(OR, Arity::AtLeast(0), Some(DataType::Boolean), |id, args, _| {
        for index in 0..args.len() {
            if boolean_arg(id, args, index)? {
                return Ok(boolean(true));
            }
        }
        Ok(boolean(false))
    }));
    registry.add(NativeFunction::new(N_OF, Arity::AtLeast(1), Some(DataType::Boolean), |id, args, _| {
        let needed = n_of_threshold(id, integer_arg(id, args, 0)?, args.len() - 1)?;
        let mut found = 0usize;
        for index in 1..args.len() {
            if found >= needed {
                break;
            }
            if boolean_arg(id, args, index)? {
                found += 1;
            }
        }
        Ok(boolean(found >= needed))
    }));
    registry.add(NativeFunction::new(NOT, Arity::Exact(1), Some(DataType::Boolean), |id, args, _| {
        Ok(boolean(!boolean_arg(id, args, 0)?))
    }));
}

/// Validate the `n` of `n-of` against the number of remaining arguments.
pub fn n_of_threshold(id: &str, n: i64, available: usize) -> Result<usize, crate::error::FunctionError> {
    let needed = usize::try_from(n).map_err(|_| processing(id, format!("n must not be negative, got {}", n)))?;
    if needed > available {
        return Err(processing(
            id,
            format!("n is {} but only {} argument(s) follow", needed, available),
        ));
    }
    Ok(needed)
}
