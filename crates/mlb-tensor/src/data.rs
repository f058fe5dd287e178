use half::f16;

use crate::dtype::Dtype;
use crate::error::{Result, TensorError};

/// A typed or raw binary buffer used as a tensor construction source.
///
/// `Bytes` carries an untyped allocation whose element count depends on the
/// target dtype's element width; the typed variants carry their own count.
/// `F16` holds raw binary16 bit patterns, decoded through the half codec
/// whenever the destination dtype is not F16.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferData {
    /// Raw bytes, reinterpreted per the target dtype (little-endian).
    Bytes(Vec<u8>),
    I32(Vec<i32>),
    /// Raw IEEE 754 binary16 codes.
    F16(Vec<u16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl BufferData {
    /// Element count of this buffer under the given target dtype.
    ///
    /// # Errors
    /// Returns an error if a raw byte buffer's length is not a multiple of
    /// the dtype's element width.
    pub fn element_count(&self, dtype: Dtype) -> Result<usize> {
        match self {
            BufferData::Bytes(b) => {
                let width = dtype.size_in_bytes();
                if b.len() % width != 0 {
                    return Err(TensorError::MisalignedBytes {
                        len: b.len(),
                        width,
                    });
                }
                Ok(b.len() / width)
            }
            BufferData::I32(v) => Ok(v.len()),
            BufferData::F16(v) => Ok(v.len()),
            BufferData::F32(v) => Ok(v.len()),
            BufferData::F64(v) => Ok(v.len()),
        }
    }

    /// Reads element `i` of a typed buffer as f64, decoding F16 codes
    /// through the half codec.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds or if the buffer is `Bytes` (raw
    /// bytes have no element representation of their own).
    pub(crate) fn get_as_f64(&self, i: usize) -> f64 {
        match self {
            BufferData::Bytes(_) => unreachable!("raw bytes are copied bitwise"),
            BufferData::I32(v) => v[i] as f64,
            BufferData::F16(v) => f16::from_bits(v[i]).to_f64(),
            BufferData::F32(v) => v[i] as f64,
            BufferData::F64(v) => v[i],
        }
    }
}

/// Nested tensor construction source.
///
/// The explicit tagged classification of every shape the tensor constructor
/// accepts: a scalar, a flat numeric sequence, a binary buffer, or a nested
/// structure of further sources.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Scalar(f64),
    Numbers(Vec<f64>),
    Buffer(BufferData),
    Nested(Vec<TensorData>),
}

impl From<f64> for TensorData {
    fn from(v: f64) -> TensorData {
        TensorData::Scalar(v)
    }
}

impl From<Vec<f64>> for TensorData {
    fn from(v: Vec<f64>) -> TensorData {
        TensorData::Numbers(v)
    }
}

impl From<BufferData> for TensorData {
    fn from(b: BufferData) -> TensorData {
        TensorData::Buffer(b)
    }
}

impl From<Vec<TensorData>> for TensorData {
    fn from(children: Vec<TensorData>) -> TensorData {
        TensorData::Nested(children)
    }
}
