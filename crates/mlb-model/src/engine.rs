use std::future::Future;
use std::pin::Pin;

use crate::error::EngineError;
use crate::feature::{FeatureSet, ImageFormat, ImagePayload, ImageRef, RawImage};
use crate::schema::{Schema, SchemaEntry};

/// Boxed future used at the marshaling layer's single suspension point.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Options for opening a model.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    /// Compute unit selection passed through to the engine.
    pub units: String,
    /// Low-precision accumulation on GPU.
    pub lpaog: bool,
}

impl Default for OpenOptions {
    fn default() -> OpenOptions {
        OpenOptions {
            units: "all".to_string(),
            lpaog: true,
        }
    }
}

/// Everything the native engine reports about a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub path: String,
    pub units: String,
    pub lpaog: bool,
    /// Declared input feature schema.
    pub input: Schema,
    /// Declared output feature schema.
    pub output: Schema,
}

/// Contract consumed from the native inference engine.
///
/// Model loading, weight execution, image codecs, filesystem access, and
/// network fetches all live behind this trait. Failures cross it as opaque
/// `EngineError`s and are surfaced unchanged by the marshaling core.
///
/// Implementations must tolerate concurrent calls; the marshaling core
/// shares one engine across simultaneous predict invocations without
/// locking.
pub trait Engine: Send + Sync + 'static {
    /// Load a model and report its declared schemas.
    fn load(&self, path: &str, options: &OpenOptions) -> EngineResult<ModelInfo>;

    /// Run inference over an encoded feature set.
    fn predict(&self, model: &ModelInfo, features: FeatureSet) -> EngineResult<FeatureSet>;

    /// Decode an image file from disk.
    fn image_from_file(&self, path: &str, entry: &SchemaEntry) -> EngineResult<ImageRef>;

    /// Decode encoded image bytes.
    fn image_from_bytes(&self, bytes: &[u8], entry: &SchemaEntry) -> EngineResult<ImageRef>;

    /// Wrap raw pixel data.
    fn image_from_raw(&self, raw: &RawImage, entry: &SchemaEntry) -> EngineResult<ImageRef>;

    /// Fetch and decode a remote image. The only asynchronous operation in
    /// the engine contract.
    fn image_fetch<'a>(
        &'a self,
        url: &'a str,
        entry: &'a SchemaEntry,
    ) -> BoxFuture<'a, EngineResult<ImageRef>>;

    /// Materialize an image feature in the requested output format.
    fn image_get(&self, image: &ImageRef, format: ImageFormat) -> EngineResult<ImagePayload>;
}
