//! `mlb-tensor` - Dtype-tagged flat buffers and nested-view tensors.
//!
//! This crate provides:
//! - A `Dtype` enum (i32, f16, f32, f64) with element widths and native
//!   index mapping
//! - A `Storage` type over one flat backing allocation, routing f16 access
//!   through the half-float codec
//! - Shape utilities and shape inference over nested construction sources
//! - A `Tensor` type: an N-dimensional tree of zero-copy views over a
//!   single flat storage, built by a recursive fill

pub mod data;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use data::{BufferData, TensorData};
pub use dtype::Dtype;
pub use error::{Result, TensorError};
pub use shape::{infer_shape, Shape};
pub use storage::Storage;
pub use tensor::{Node, Tensor, ViewSpan};
