use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("dtype must be one of: i32, f16, f32, f64 (got {0:?})")]
    InvalidDtype(String),
    #[error("array must be an array of numbers")]
    NonFiniteElement,
    #[error("array dimension must be a sequence or a buffer")]
    InvalidDimension,
    #[error("array leaf must be a sequence of numbers or a buffer")]
    InvalidLeaf,
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DtypeMismatch { expected: String, got: String },
    #[error("storage length {len} does not match shape {shape:?} (numel={numel})")]
    LengthMismatch {
        len: usize,
        shape: Vec<usize>,
        numel: usize,
    },
    #[error("write of {count} elements at offset {offset} overflows storage of {len}")]
    Overflow {
        offset: usize,
        count: usize,
        len: usize,
    },
    #[error("byte buffer length {len} is not a multiple of element width {width}")]
    MisalignedBytes { len: usize, width: usize },
    #[error("index {index:?} out of bounds for shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },
}

pub type Result<T> = std::result::Result<T, TensorError>;
