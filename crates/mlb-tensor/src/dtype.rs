use std::fmt;
use std::str::FromStr;

use crate::error::TensorError;

/// Element kinds supported by the native multiarray allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// 32-bit signed integer.
    I32,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}

impl Dtype {
    /// All recognized element kinds, in declaration order.
    pub const ALL: [Dtype; 4] = [Dtype::I32, Dtype::F16, Dtype::F32, Dtype::F64];

    /// Returns the size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Dtype::I32 => 4,
            Dtype::F16 => 2,
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }

    /// Converts a native dtype table index to a `Dtype`.
    ///
    /// The native table is `[_, i32, f64, f16, f32]`:
    /// - 1 => I32
    /// - 2 => F64
    /// - 3 => F16
    /// - 4 => F32
    pub fn from_native_index(id: u32) -> Option<Dtype> {
        match id {
            1 => Some(Dtype::I32),
            2 => Some(Dtype::F64),
            3 => Some(Dtype::F16),
            4 => Some(Dtype::F32),
            _ => None,
        }
    }

    /// Returns the native dtype table index for this `Dtype`.
    pub fn to_native_index(&self) -> u32 {
        match self {
            Dtype::I32 => 1,
            Dtype::F64 => 2,
            Dtype::F16 => 3,
            Dtype::F32 => 4,
        }
    }

    /// Returns true if element access must go through the half-float codec.
    pub fn needs_f16_codec(&self) -> bool {
        matches!(self, Dtype::F16)
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::I32 => write!(f, "i32"),
            Dtype::F16 => write!(f, "f16"),
            Dtype::F32 => write!(f, "f32"),
            Dtype::F64 => write!(f, "f64"),
        }
    }
}

impl FromStr for Dtype {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Dtype, TensorError> {
        match s {
            "i32" => Ok(Dtype::I32),
            "f16" => Ok(Dtype::F16),
            "f32" => Ok(Dtype::F32),
            "f64" => Ok(Dtype::F64),
            other => Err(TensorError::InvalidDtype(other.to_string())),
        }
    }
}
