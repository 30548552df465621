use thiserror::Error;
use warden_core::{DataType, MissingAttributeDetail, StatusCode};

use crate::function::Arity;

/// Load-time and deploy-time failures. Never produced while a request is
/// being evaluated; runtime problems are [`EvaluationFault`]s instead.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy load error: {0}")]
    LoadError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("unknown combining algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("duplicate function registration: {0}")]
    DuplicateFunction(String),

    #[error("an evaluatable with id '{0}' is already deployed")]
    DuplicateEvaluatable(String),

    #[error("evaluatable not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// A runtime fault raised while evaluating one request. Carried through the
/// recursive evaluation as a value and converted into an Indeterminate
/// decision (plus a status code in the context) at the nearest rule, target
/// or policy boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationFault {
    #[error("missing attribute: {0}")]
    MissingAttribute(MissingAttributeDetail),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("reference not found: {0}")]
    NotFound(String),
}

impl EvaluationFault {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EvaluationFault::MissingAttribute(_) => StatusCode::MissingAttribute,
            EvaluationFault::Syntax(_) => StatusCode::SyntaxError,
            EvaluationFault::Processing(_) | EvaluationFault::NotFound(_) => {
                StatusCode::ProcessingError
            }
        }
    }
}

/// Failure of a single function application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
    #[error("{function}: expected {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: Arity,
        found: usize,
    },

    #[error("{function}: argument {index} must be {expected}, got {found}")]
    Type {
        function: String,
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{function}: {message}")]
    Processing { function: String, message: String },
}

impl From<FunctionError> for EvaluationFault {
    fn from(e: FunctionError) -> Self {
        EvaluationFault::Processing(e.to_string())
    }
}

/// Conversion of a raw string into a typed attribute value failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {} value '{value}': {reason}", data_type.short_name())]
pub struct ValueError {
    pub data_type: DataType,
    pub value: String,
    pub reason: String,
}

impl ValueError {
    pub fn new(data_type: DataType, value: &str, reason: impl Into<String>) -> Self {
        Self {
            data_type,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ValueError> for EvaluationFault {
    fn from(e: ValueError) -> Self {
        EvaluationFault::Syntax(e.to_string())
    }
}
