use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown data type: {0}")]
    UnknownDataType(String),

    #[error("unknown status code: {0}")]
    UnknownStatusCode(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
