use thiserror::Error;

use mlb_tensor::TensorError;

/// Opaque failure surfaced unchanged from the native engine.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct EngineError(pub String);

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("'{0}' input is required")]
    RequiredInput(String),
    #[error("'{field}' input must be {expected}")]
    InputType {
        field: String,
        expected: &'static str,
    },
    #[error("'{field}' input must be an object with {expected}")]
    DictShape {
        field: String,
        expected: &'static str,
    },
    #[error("format must be one of: raw, png, jpg, rgba, heif, tiff (got {0:?})")]
    InvalidImageFormat(String),
    #[error("raw pixel format must be one of: rgba, argb, abgr, bgra (got {0:?})")]
    InvalidPixelFormat(String),
    #[error("schema entry '{field}' is missing {what}")]
    MalformedSchema {
        field: String,
        what: &'static str,
    },
    #[error("output feature '{0}' missing from native result")]
    MissingOutput(String),
    #[error("output feature '{field}' has wrong kind (expected {expected})")]
    OutputKind {
        field: String,
        expected: &'static str,
    },
    #[error("tensor error for '{field}': {source}")]
    Tensor {
        field: String,
        #[source]
        source: TensorError,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("batch task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
