//! Typed attribute values.
//!
//! Every value carries its data type. Parsing from the lexical form used in
//! policies and requests fails with a [`ValueError`], which evaluation
//! reports as a syntax error.

pub mod bag;
pub mod names;
pub mod temporal;

use std::cmp::Ordering;
use std::fmt;

use base64::Engine as _;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use warden_core::DataType;

use crate::error::ValueError;

pub use bag::Bag;
pub use names::{DnsNameValue, IpAddressValue, PortRange, Rfc822Name, X500Name};
pub use temporal::{DayTimeDuration, XsDate, XsDateTime, XsTime, YearMonthDuration};

// ---------------------------------------------------------------------------
// AttributeValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawValue", into = "RawValue")]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Time(XsTime),
    Date(XsDate),
    DateTime(XsDateTime),
    DayTimeDuration(DayTimeDuration),
    YearMonthDuration(YearMonthDuration),
    AnyUri(String),
    HexBinary(Vec<u8>),
    Base64Binary(Vec<u8>),
    X500Name(X500Name),
    Rfc822Name(Rfc822Name),
    IpAddress(IpAddressValue),
    DnsName(DnsNameValue),
}

impl AttributeValue {
    /// Parse the lexical form of a value of `data_type`.
    pub fn parse(data_type: DataType, raw: &str) -> Result<Self, ValueError> {
        let err = |reason: &str| ValueError::new(data_type, raw, reason);
        // Strings are taken verbatim; every other lexical space ignores
        // surrounding whitespace.
        let text = raw.trim();
        let value = match data_type {
            DataType::String => AttributeValue::String(raw.to_string()),
            DataType::Boolean => match text {
                "true" | "1" => AttributeValue::Boolean(true),
                "false" | "0" => AttributeValue::Boolean(false),
                _ => return Err(err("expected true, false, 1 or 0")),
            },
            DataType::Integer => AttributeValue::Integer(
                text.parse::<i64>()
                    .map_err(|e| ValueError::new(data_type, raw, e.to_string()))?,
            ),
            DataType::Double => AttributeValue::Double(parse_double(text).ok_or_else(|| err("not a double"))?),
            DataType::Time => AttributeValue::Time(XsTime::parse(text)?),
            DataType::Date => AttributeValue::Date(XsDate::parse(text)?),
            DataType::DateTime => AttributeValue::DateTime(XsDateTime::parse(text)?),
            DataType::DayTimeDuration => {
                AttributeValue::DayTimeDuration(DayTimeDuration::parse(text)?)
            }
            DataType::YearMonthDuration => {
                AttributeValue::YearMonthDuration(YearMonthDuration::parse(text)?)
            }
            DataType::AnyUri => {
                if text.chars().any(char::is_whitespace) {
                    return Err(err("whitespace not allowed"));
                }
                AttributeValue::AnyUri(text.to_string())
            }
            DataType::HexBinary => AttributeValue::HexBinary(
                hex::decode(text).map_err(|e| ValueError::new(data_type, raw, e.to_string()))?,
            ),
            DataType::Base64Binary => {
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                AttributeValue::Base64Binary(
                    base64::engine::general_purpose::STANDARD
                        .decode(compact)
                        .map_err(|e| ValueError::new(data_type, raw, e.to_string()))?,
                )
            }
            DataType::X500Name => AttributeValue::X500Name(X500Name::parse(text)?),
            DataType::Rfc822Name => AttributeValue::Rfc822Name(Rfc822Name::parse(text)?),
            DataType::IpAddress => AttributeValue::IpAddress(IpAddressValue::parse(text)?),
            DataType::DnsName => AttributeValue::DnsName(DnsNameValue::parse(text)?),
        };
        Ok(value)
    }

    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::String(s.into())
    }

    pub fn integer(i: i64) -> Self {
        AttributeValue::Integer(i)
    }

    pub fn boolean(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }

    pub fn double(d: f64) -> Self {
        AttributeValue::Double(d)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            AttributeValue::String(_) => DataType::String,
            AttributeValue::Boolean(_) => DataType::Boolean,
            AttributeValue::Integer(_) => DataType::Integer,
            AttributeValue::Double(_) => DataType::Double,
            AttributeValue::Time(_) => DataType::Time,
            AttributeValue::Date(_) => DataType::Date,
            AttributeValue::DateTime(_) => DataType::DateTime,
            AttributeValue::DayTimeDuration(_) => DataType::DayTimeDuration,
            AttributeValue::YearMonthDuration(_) => DataType::YearMonthDuration,
            AttributeValue::AnyUri(_) => DataType::AnyUri,
            AttributeValue::HexBinary(_) => DataType::HexBinary,
            AttributeValue::Base64Binary(_) => DataType::Base64Binary,
            AttributeValue::X500Name(_) => DataType::X500Name,
            AttributeValue::Rfc822Name(_) => DataType::Rfc822Name,
            AttributeValue::IpAddress(_) => DataType::IpAddress,
            AttributeValue::DnsName(_) => DataType::DnsName,
        }
    }

    /// Type-specific equality. Values of different types are never equal.
    pub fn value_eq(&self, other: &AttributeValue, implicit: FixedOffset) -> bool {
        use AttributeValue as V;
        match (self, other) {
            (V::Date(a), V::Date(b)) => a.compare(b, implicit) == Ordering::Equal,
            (V::Time(a), V::Time(b)) => a.compare(b, implicit) == Ordering::Equal,
            (V::DateTime(a), V::DateTime(b)) => a.compare(b, implicit) == Ordering::Equal,
            _ => self == other,
        }
    }

    /// Total order for the types that have one; `None` otherwise, or when
    /// the types differ, or for NaN.
    pub fn value_cmp(&self, other: &AttributeValue, implicit: FixedOffset) -> Option<Ordering> {
        use AttributeValue as V;
        match (self, other) {
            (V::String(a), V::String(b)) => Some(a.cmp(b)),
            (V::Integer(a), V::Integer(b)) => Some(a.cmp(b)),
            (V::Double(a), V::Double(b)) => a.partial_cmp(b),
            (V::Date(a), V::Date(b)) => Some(a.compare(b, implicit)),
            (V::Time(a), V::Time(b)) => Some(a.compare(b, implicit)),
            (V::DateTime(a), V::DateTime(b)) => Some(a.compare(b, implicit)),
            (V::DayTimeDuration(a), V::DayTimeDuration(b)) => Some(a.cmp(b)),
            (V::YearMonthDuration(a), V::YearMonthDuration(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) | AttributeValue::AnyUri(s) => Some(s),
            _ => None,
        }
    }
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    // Rust also accepts "inf", "infinity" and "nan"; the XML Schema lexical
    // space does not.
    if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    text.parse::<f64>().ok()
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "INF".to_string()
    } else if d == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{}", d)
    }
}

/// Canonical lexical form.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) | AttributeValue::AnyUri(s) => f.write_str(s),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => f.write_str(&format_double(*d)),
            AttributeValue::Time(t) => write!(f, "{}", t),
            AttributeValue::Date(d) => write!(f, "{}", d),
            AttributeValue::DateTime(d) => write!(f, "{}", d),
            AttributeValue::DayTimeDuration(d) => write!(f, "{}", d),
            AttributeValue::YearMonthDuration(d) => write!(f, "{}", d),
            AttributeValue::HexBinary(b) => f.write_str(&hex::encode_upper(b)),
            AttributeValue::Base64Binary(b) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
            AttributeValue::X500Name(n) => write!(f, "{}", n),
            AttributeValue::Rfc822Name(n) => write!(f, "{}", n),
            AttributeValue::IpAddress(n) => write!(f, "{}", n),
            AttributeValue::DnsName(n) => write!(f, "{}", n),
        }
    }
}

// ---------------------------------------------------------------------------
// RawValue: the wire form `{ "data_type": ..., "value": ... }`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValue {
    pub data_type: DataType,
    pub value: String,
}

impl RawValue {
    pub fn new(data_type: DataType, value: impl Into<String>) -> Self {
        Self {
            data_type,
            value: value.into(),
        }
    }

    pub fn parse(&self) -> Result<AttributeValue, ValueError> {
        AttributeValue::parse(self.data_type, &self.value)
    }
}

impl TryFrom<RawValue> for AttributeValue {
    type Error = ValueError;

    fn try_from(raw: RawValue) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<AttributeValue> for RawValue {
    fn from(value: AttributeValue) -> Self {
        RawValue::new(value.data_type(), value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Value: result of evaluating an expression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Single(AttributeValue),
    Bag(Bag),
    /// A function passed as an argument to a higher-order function.
    Function(String),
}

impl Value {
    /// Human readable shape, used in type errors.
    pub fn describe(&self) -> String {
        match self {
            Value::Single(v) => v.data_type().short_name().to_string(),
            Value::Bag(b) => format!("bag of {}", b.data_type().short_name()),
            Value::Function(id) => format!("function {}", id),
        }
    }

    pub fn as_single(&self) -> Option<&AttributeValue> {
        match self {
            Value::Single(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bag(&self) -> Option<&Bag> {
        match self {
            Value::Bag(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Single(AttributeValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(v: AttributeValue) -> Self {
        Value::Single(v)
    }
}

impl From<Bag> for Value {
    fn from(b: Bag) -> Self {
        Value::Bag(b)
    }
}
