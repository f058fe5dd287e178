//! `mlb-model` - Schema-driven feature marshaling for a native inference
//! engine.
//!
//! This crate provides:
//! - Feature schema types declared by a loaded model
//! - A tagged input/output value classification for the application boundary
//! - The `Engine` trait: the contract consumed from the native engine
//! - A schema compiler producing one specialized encode/decode plan per model
//! - The public `Model` with `predict` and order-preserving concurrent
//!   `batch`

pub mod engine;
pub mod error;
pub mod feature;
pub mod model;
mod plan;
pub mod schema;

// Re-export primary types at the crate root for convenience.
pub use engine::{BoxFuture, Engine, EngineResult, ModelInfo, OpenOptions};
pub use error::{EngineError, ModelError, Result};
pub use feature::{
    Feature, FeatureSet, ImageFormat, ImageInput, ImagePayload, ImageRef, Input, Output,
    OutputValue, PixelFormat, RawImage, Value,
};
pub use model::{ImageFlags, Model, OutputFlags, Prediction, PredictFlags};
pub use schema::{DictKeyKind, FeatureType, Schema, SchemaEntry};

// The tensor layer is part of the public marshaling surface.
pub use mlb_tensor::{BufferData, Dtype, Shape, Storage, Tensor, TensorData};
