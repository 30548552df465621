use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Typed identifiers — prevent stringly-typed confusion
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(PolicyId, "Identifier of a deployed Policy or PolicySet.");
define_id!(RuleId, "Identifier of a Rule inside a Policy.");
define_id!(AttributeId, "Identifier of a request attribute.");

// ---------------------------------------------------------------------------
// Effect — what a rule yields when it applies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    /// The opposite effect.
    pub fn other(self) -> Effect {
        match self {
            Effect::Permit => Effect::Deny,
            Effect::Deny => Effect::Permit,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Permit => write!(f, "Permit"),
            Effect::Deny => write!(f, "Deny"),
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionType — the four-valued outcome seen by callers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionType {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

impl From<Effect> for DecisionType {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => DecisionType::Permit,
            Effect::Deny => DecisionType::Deny,
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionType::Permit => write!(f, "Permit"),
            DecisionType::Deny => write!(f, "Deny"),
            DecisionType::NotApplicable => write!(f, "NotApplicable"),
            DecisionType::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusCode — why an evaluation could not complete cleanly
// ---------------------------------------------------------------------------

/// XACML status codes. Severity ranking lives in
/// [`StatusCodePriority`](crate::traits::StatusCodePriority), not in the
/// declaration order of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:ok")]
    Ok,
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:missing-attribute")]
    MissingAttribute,
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:processing-error")]
    ProcessingError,
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:syntax-error")]
    SyntaxError,
}

impl StatusCode {
    pub fn urn(self) -> &'static str {
        match self {
            StatusCode::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            StatusCode::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            StatusCode::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
            StatusCode::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
        }
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.urn())
    }
}

impl FromStr for StatusCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            StatusCode::Ok,
            StatusCode::MissingAttribute,
            StatusCode::ProcessingError,
            StatusCode::SyntaxError,
        ]
        .into_iter()
        .find(|code| code.urn() == s)
        .ok_or_else(|| CoreError::UnknownStatusCode(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Category — which section of the request an attribute lives in
// ---------------------------------------------------------------------------

/// Attribute category. The four XACML 2.0 sections map onto the XACML 3.0
/// category URNs; anything else is carried verbatim as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    AccessSubject,
    RecipientSubject,
    IntermediarySubject,
    Codebase,
    RequestingMachine,
    Resource,
    Action,
    Environment,
    Custom(String),
}

impl Category {
    pub fn urn(&self) -> &str {
        match self {
            Category::AccessSubject => "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject",
            Category::RecipientSubject => {
                "urn:oasis:names:tc:xacml:1.0:subject-category:recipient-subject"
            }
            Category::IntermediarySubject => {
                "urn:oasis:names:tc:xacml:1.0:subject-category:intermediary-subject"
            }
            Category::Codebase => "urn:oasis:names:tc:xacml:1.0:subject-category:codebase",
            Category::RequestingMachine => {
                "urn:oasis:names:tc:xacml:1.0:subject-category:requesting-machine"
            }
            Category::Resource => "urn:oasis:names:tc:xacml:3.0:attribute-category:resource",
            Category::Action => "urn:oasis:names:tc:xacml:3.0:attribute-category:action",
            Category::Environment => "urn:oasis:names:tc:xacml:3.0:attribute-category:environment",
            Category::Custom(urn) => urn,
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        match s.as_str() {
            "subject" | "access-subject" | "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject" => {
                Category::AccessSubject
            }
            "recipient-subject" | "urn:oasis:names:tc:xacml:1.0:subject-category:recipient-subject" => {
                Category::RecipientSubject
            }
            "intermediary-subject"
            | "urn:oasis:names:tc:xacml:1.0:subject-category:intermediary-subject" => {
                Category::IntermediarySubject
            }
            "codebase" | "urn:oasis:names:tc:xacml:1.0:subject-category:codebase" => {
                Category::Codebase
            }
            "requesting-machine"
            | "urn:oasis:names:tc:xacml:1.0:subject-category:requesting-machine" => {
                Category::RequestingMachine
            }
            "resource" | "urn:oasis:names:tc:xacml:3.0:attribute-category:resource" => {
                Category::Resource
            }
            "action" | "urn:oasis:names:tc:xacml:3.0:attribute-category:action" => Category::Action,
            "environment" | "urn:oasis:names:tc:xacml:3.0:attribute-category:environment" => {
                Category::Environment
            }
            _ => Category::Custom(s),
        }
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Category::from(s.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.urn().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.urn())
    }
}

// ---------------------------------------------------------------------------
// DataType — the closed set of supported attribute data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    String,
    Boolean,
    Integer,
    Double,
    Time,
    Date,
    DateTime,
    DayTimeDuration,
    YearMonthDuration,
    AnyUri,
    HexBinary,
    Base64Binary,
    X500Name,
    Rfc822Name,
    IpAddress,
    DnsName,
}

impl DataType {
    pub const ALL: [DataType; 16] = [
        DataType::String,
        DataType::Boolean,
        DataType::Integer,
        DataType::Double,
        DataType::Time,
        DataType::Date,
        DataType::DateTime,
        DataType::DayTimeDuration,
        DataType::YearMonthDuration,
        DataType::AnyUri,
        DataType::HexBinary,
        DataType::Base64Binary,
        DataType::X500Name,
        DataType::Rfc822Name,
        DataType::IpAddress,
        DataType::DnsName,
    ];

    pub fn urn(self) -> &'static str {
        match self {
            DataType::String => "http://www.w3.org/2001/XMLSchema#string",
            DataType::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            DataType::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            DataType::Double => "http://www.w3.org/2001/XMLSchema#double",
            DataType::Time => "http://www.w3.org/2001/XMLSchema#time",
            DataType::Date => "http://www.w3.org/2001/XMLSchema#date",
            DataType::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            DataType::DayTimeDuration => "http://www.w3.org/2001/XMLSchema#dayTimeDuration",
            DataType::YearMonthDuration => "http://www.w3.org/2001/XMLSchema#yearMonthDuration",
            DataType::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            DataType::HexBinary => "http://www.w3.org/2001/XMLSchema#hexBinary",
            DataType::Base64Binary => "http://www.w3.org/2001/XMLSchema#base64Binary",
            DataType::X500Name => "urn:oasis:names:tc:xacml:1.0:data-type:x500Name",
            DataType::Rfc822Name => "urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name",
            DataType::IpAddress => "urn:oasis:names:tc:xacml:2.0:data-type:ipAddress",
            DataType::DnsName => "urn:oasis:names:tc:xacml:2.0:data-type:dnsName",
        }
    }

    /// Name used to build standard function identifiers, e.g. `string` in
    /// `urn:oasis:names:tc:xacml:1.0:function:string-equal`.
    pub fn short_name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Double => "double",
            DataType::Time => "time",
            DataType::Date => "date",
            DataType::DateTime => "dateTime",
            DataType::DayTimeDuration => "dayTimeDuration",
            DataType::YearMonthDuration => "yearMonthDuration",
            DataType::AnyUri => "anyURI",
            DataType::HexBinary => "hexBinary",
            DataType::Base64Binary => "base64Binary",
            DataType::X500Name => "x500Name",
            DataType::Rfc822Name => "rfc822Name",
            DataType::IpAddress => "ipAddress",
            DataType::DnsName => "dnsName",
        }
    }

    /// Function namespace the standard per-type functions are published in.
    pub fn function_namespace(self) -> &'static str {
        match self {
            DataType::IpAddress | DataType::DnsName => "urn:oasis:names:tc:xacml:2.0:function",
            _ => "urn:oasis:names:tc:xacml:1.0:function",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.urn())
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // XACML 2.0 published the durations under the XQuery working draft namespace.
        match s {
            "http://www.w3.org/TR/2002/WD-xquery-operators-20020816#dayTimeDuration" => {
                return Ok(DataType::DayTimeDuration)
            }
            "http://www.w3.org/TR/2002/WD-xquery-operators-20020816#yearMonthDuration" => {
                return Ok(DataType::YearMonthDuration)
            }
            _ => {}
        }
        DataType::ALL
            .into_iter()
            .find(|dt| dt.urn() == s || dt.short_name() == s)
            .ok_or_else(|| CoreError::UnknownDataType(s.to_string()))
    }
}

impl TryFrom<String> for DataType {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DataType> for String {
    fn from(dt: DataType) -> Self {
        dt.urn().to_string()
    }
}

// ---------------------------------------------------------------------------
// MissingAttributeDetail — what would have been needed to decide
// ---------------------------------------------------------------------------

/// Descriptor of a must-be-present attribute that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MissingAttributeDetail {
    pub category: Category,
    pub attribute_id: AttributeId,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl fmt::Display for MissingAttributeDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) in {}",
            self.attribute_id,
            self.data_type.short_name(),
            self.category
        )?;
        if let Some(ref issuer) = self.issuer {
            write!(f, " issued by {}", issuer)?;
        }
        Ok(())
    }
}
