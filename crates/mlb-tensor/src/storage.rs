use half::f16;

use crate::data::BufferData;
use crate::dtype::Dtype;
use crate::error::{Result, TensorError};

/// Flat backing storage for one tensor, tagged by element kind.
///
/// One enum stands in for four per-dtype buffer variants: `get` and `set`
/// route F16 elements through the half-float codec and pass the other kinds
/// through at native width.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    I32(Vec<i32>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Storage {
    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: Dtype, n: usize) -> Storage {
        match dtype {
            Dtype::I32 => Storage::I32(vec![0; n]),
            Dtype::F16 => Storage::F16(vec![f16::ZERO; n]),
            Dtype::F32 => Storage::F32(vec![0.0; n]),
            Dtype::F64 => Storage::F64(vec![0.0; n]),
        }
    }

    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            Storage::I32(v) => v.len(),
            Storage::F16(v) => v.len(),
            Storage::F32(v) => v.len(),
            Storage::F64(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element kind of this storage.
    pub fn dtype(&self) -> Dtype {
        match self {
            Storage::I32(_) => Dtype::I32,
            Storage::F16(_) => Dtype::F16,
            Storage::F32(_) => Dtype::F32,
            Storage::F64(_) => Dtype::F64,
        }
    }

    /// Reads the element at `offset` as f64. F16 decodes through the codec.
    ///
    /// # Panics
    /// Panics if `offset >= len()`.
    pub fn get(&self, offset: usize) -> f64 {
        match self {
            Storage::I32(v) => v[offset] as f64,
            Storage::F16(v) => v[offset].to_f64(),
            Storage::F32(v) => v[offset] as f64,
            Storage::F64(v) => v[offset],
        }
    }

    /// Writes `value` at `offset`. F16 encodes through the codec; I32
    /// truncates toward zero.
    ///
    /// # Panics
    /// Panics if `offset >= len()`.
    pub fn set(&mut self, offset: usize, value: f64) {
        match self {
            Storage::I32(v) => v[offset] = value as i32,
            Storage::F16(v) => v[offset] = f16::from_f64(value),
            Storage::F32(v) => v[offset] = value as f32,
            Storage::F64(v) => v[offset] = value,
        }
    }

    /// Bulk-copies a source buffer into this storage starting at
    /// `dest_offset`, converting element representations where they differ.
    ///
    /// A source whose representation matches the destination dtype is copied
    /// directly; raw bytes are reinterpreted little-endian at the destination
    /// width; everything else converts element by element, decoding F16 codes
    /// through the half codec on the way.
    ///
    /// Returns the number of elements copied.
    pub fn copy_from(&mut self, source: &BufferData, dest_offset: usize) -> Result<usize> {
        let count = source.element_count(self.dtype())?;
        if dest_offset + count > self.len() {
            return Err(TensorError::Overflow {
                offset: dest_offset,
                count,
                len: self.len(),
            });
        }

        match source {
            BufferData::Bytes(bytes) => self.copy_from_bytes(bytes, dest_offset, count),
            BufferData::I32(src) => {
                if let Storage::I32(dst) = self {
                    dst[dest_offset..dest_offset + count].copy_from_slice(src);
                } else {
                    self.copy_converted(source, dest_offset, count);
                }
            }
            BufferData::F16(src) => {
                if let Storage::F16(dst) = self {
                    // Matching representation: take the codes bitwise.
                    for (d, &code) in dst[dest_offset..dest_offset + count].iter_mut().zip(src)
                    {
                        *d = f16::from_bits(code);
                    }
                } else {
                    self.copy_converted(source, dest_offset, count);
                }
            }
            BufferData::F32(src) => {
                if let Storage::F32(dst) = self {
                    dst[dest_offset..dest_offset + count].copy_from_slice(src);
                } else {
                    self.copy_converted(source, dest_offset, count);
                }
            }
            BufferData::F64(src) => {
                if let Storage::F64(dst) = self {
                    dst[dest_offset..dest_offset + count].copy_from_slice(src);
                } else {
                    self.copy_converted(source, dest_offset, count);
                }
            }
        }

        Ok(count)
    }

    /// Element-by-element conversion path, decoding F16 source codes through
    /// the half codec.
    fn copy_converted(&mut self, source: &BufferData, dest_offset: usize, count: usize) {
        for i in 0..count {
            self.set(dest_offset + i, source.get_as_f64(i));
        }
    }

    /// Reinterprets little-endian bytes at this storage's element width.
    fn copy_from_bytes(&mut self, bytes: &[u8], dest_offset: usize, count: usize) {
        match self {
            Storage::I32(dst) => {
                for i in 0..count {
                    let b: [u8; 4] = bytes[i * 4..i * 4 + 4].try_into().unwrap();
                    dst[dest_offset + i] = i32::from_le_bytes(b);
                }
            }
            Storage::F16(dst) => {
                for i in 0..count {
                    let b: [u8; 2] = bytes[i * 2..i * 2 + 2].try_into().unwrap();
                    dst[dest_offset + i] = f16::from_le_bytes(b);
                }
            }
            Storage::F32(dst) => {
                for i in 0..count {
                    let b: [u8; 4] = bytes[i * 4..i * 4 + 4].try_into().unwrap();
                    dst[dest_offset + i] = f32::from_le_bytes(b);
                }
            }
            Storage::F64(dst) => {
                for i in 0..count {
                    let b: [u8; 8] = bytes[i * 8..i * 8 + 8].try_into().unwrap();
                    dst[dest_offset + i] = f64::from_le_bytes(b);
                }
            }
        }
    }

    /// Element-wise conversion into newly allocated storage of `dtype`.
    /// The original storage is left unchanged.
    pub fn cast(&self, dtype: Dtype) -> Storage {
        let mut out = Storage::zeros(dtype, self.len());
        for i in 0..self.len() {
            out.set(i, self.get(i));
        }
        out
    }

    /// Returns the data as an i32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not I32.
    pub fn as_i32_slice(&self) -> Result<&[i32]> {
        match self {
            Storage::I32(v) => Ok(v.as_slice()),
            other => Err(mismatch(Dtype::I32, other.dtype())),
        }
    }

    /// Returns the data as an f16 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F16.
    pub fn as_f16_slice(&self) -> Result<&[f16]> {
        match self {
            Storage::F16(v) => Ok(v.as_slice()),
            other => Err(mismatch(Dtype::F16, other.dtype())),
        }
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            Storage::F32(v) => Ok(v.as_slice()),
            other => Err(mismatch(Dtype::F32, other.dtype())),
        }
    }

    /// Returns the data as an f64 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F64.
    pub fn as_f64_slice(&self) -> Result<&[f64]> {
        match self {
            Storage::F64(v) => Ok(v.as_slice()),
            other => Err(mismatch(Dtype::F64, other.dtype())),
        }
    }
}

fn mismatch(expected: Dtype, got: Dtype) -> TensorError {
    TensorError::DtypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}
