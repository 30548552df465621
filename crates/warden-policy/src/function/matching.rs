//! Regular expression and name matching functions.
//!
//! Patterns follow XPath `fn:matches`: they match anywhere in the input
//! unless anchored with `^`/`$`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::Regex;
use tracing::trace;

use warden_core::DataType;

use super::{boolean, processing, single, string_arg, Arity, FunctionRegistry, NativeFunction, NS_1_0, NS_2_0};
use crate::error::FunctionError;
use crate::value::AttributeValue;

/// Compiled patterns shared by every regexp function of one registry.
#[derive(Default)]
struct RegexCache {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl RegexCache {
    fn get(&self, function: &str, pattern: &str) -> Result<Regex, FunctionError> {
        let mut compiled = match self.compiled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(re) = compiled.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern)
            .map_err(|e| processing(function, format!("invalid pattern '{}': {}", pattern, e)))?;
        trace!(pattern, "compiled regular expression");
        compiled.insert(pattern.to_string(), re.clone());
        Ok(re)
    }
}

pub fn register(registry: &mut FunctionRegistry) {
    let cache = Arc::new(RegexCache::default());
    let families = [
        (NS_1_0, DataType::String),
        (NS_2_0, DataType::AnyUri),
        (NS_2_0, DataType::IpAddress),
        (NS_2_0, DataType::DnsName),
        (NS_2_0, DataType::Rfc822Name),
        (NS_2_0, DataType::X500Name),
    ];
    for (ns, data_type) in families {
        let cache = Arc::clone(&cache);
        registry.add(NativeFunction::new(
            format!("{}:{}-regexp-match", ns, data_type.short_name()),
            Arity::Exact(2),
            Some(DataType::Boolean),
            move |id, args, _| {
                let pattern = string_arg(id, args, 0)?;
                let subject = single(id, args, 1, data_type)?.to_string();
                Ok(boolean(cache.get(id, pattern)?.is_match(&subject)))
            },
        ));
    }

    registry.add(NativeFunction::new(
        format!("{}:x500Name-match", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Boolean),
        |id, args, _| {
            match (
                single(id, args, 0, DataType::X500Name)?,
                single(id, args, 1, DataType::X500Name)?,
            ) {
                (AttributeValue::X500Name(suffix), AttributeValue::X500Name(name)) => {
                    Ok(boolean(suffix.is_suffix_of(name)))
                }
                _ => Err(processing(id, "unexpected argument types")),
            }
        },
    ));
    registry.add(NativeFunction::new(
        format!("{}:rfc822Name-match", NS_1_0),
        Arity::Exact(2),
        Some(DataType::Boolean),
        |id, args, _| {
            let pattern = string_arg(id, args, 0)?;
            match single(id, args, 1, DataType::Rfc822Name)? {
                AttributeValue::Rfc822Name(name) => Ok(boolean(name.matches_pattern(pattern))),
                _ => Err(processing(id, "unexpected argument types")),
            }
        },
    ));
}
