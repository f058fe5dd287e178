use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use mlb_tensor::{Tensor, TensorData};

use crate::error::ModelError;

/// Pixel channel order for raw image payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba,
    Argb,
    Abgr,
    Bgra,
}

impl PixelFormat {
    /// Native raw-pixel format table: [rgba, argb, abgr, bgra].
    pub fn to_native_index(&self) -> u32 {
        match self {
            PixelFormat::Rgba => 0,
            PixelFormat::Argb => 1,
            PixelFormat::Abgr => 2,
            PixelFormat::Bgra => 3,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Rgba => write!(f, "rgba"),
            PixelFormat::Argb => write!(f, "argb"),
            PixelFormat::Abgr => write!(f, "abgr"),
            PixelFormat::Bgra => write!(f, "bgra"),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<PixelFormat, ModelError> {
        match s {
            "rgba" => Ok(PixelFormat::Rgba),
            "argb" => Ok(PixelFormat::Argb),
            "abgr" => Ok(PixelFormat::Abgr),
            "bgra" => Ok(PixelFormat::Bgra),
            other => Err(ModelError::InvalidPixelFormat(other.to_string())),
        }
    }
}

/// Output format for image features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Raw,
    Png,
    Jpg,
    Rgba,
    Heif,
    Tiff,
}

impl ImageFormat {
    /// Native getter format table: [raw, rgba, jpg, png, heif, tiff].
    ///
    /// Note the table order differs from the recognized-format list.
    pub fn to_native_index(&self) -> u32 {
        match self {
            ImageFormat::Raw => 0,
            ImageFormat::Rgba => 1,
            ImageFormat::Jpg => 2,
            ImageFormat::Png => 3,
            ImageFormat::Heif => 4,
            ImageFormat::Tiff => 5,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Raw => write!(f, "raw"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpg => write!(f, "jpg"),
            ImageFormat::Rgba => write!(f, "rgba"),
            ImageFormat::Heif => write!(f, "heif"),
            ImageFormat::Tiff => write!(f, "tiff"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<ImageFormat, ModelError> {
        match s {
            "raw" => Ok(ImageFormat::Raw),
            "png" => Ok(ImageFormat::Png),
            "jpg" => Ok(ImageFormat::Jpg),
            "rgba" => Ok(ImageFormat::Rgba),
            "heif" => Ok(ImageFormat::Heif),
            "tiff" => Ok(ImageFormat::Tiff),
            other => Err(ModelError::InvalidImageFormat(other.to_string())),
        }
    }
}

/// Raw pixel image descriptor: dimensions, channel order, byte payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub buffer: Vec<u8>,
}

/// The shapes an image input value can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    /// Filesystem path to an encoded image.
    File(String),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    /// Remote image, fetched asynchronously during encoding. This is the
    /// only input shape that defers the predict call.
    Url(String),
    /// Raw pixel data.
    Raw(RawImage),
}

/// One application-side input value, classified once at the validation
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Dict(HashMap<String, f64>),
    Tensor(TensorData),
    Image(ImageInput),
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Value {
        Value::Tensor(TensorData::Numbers(v))
    }
}

impl From<TensorData> for Value {
    fn from(v: TensorData) -> Value {
        Value::Tensor(v)
    }
}

impl From<ImageInput> for Value {
    fn from(v: ImageInput) -> Value {
        Value::Image(v)
    }
}

/// Engine-opaque handle for a decoded image feature.
#[derive(Clone)]
pub struct ImageRef(pub Arc<dyn Any + Send + Sync>);

impl ImageRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> ImageRef {
        ImageRef(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ImageRef(..)")
    }
}

/// Decoded image payload returned by the native getter.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    Raw(RawImage),
    Encoded {
        format: ImageFormat,
        bytes: Vec<u8>,
    },
}

/// One named value exchanged with the native engine.
#[derive(Debug, Clone)]
pub enum Feature {
    Invalid,
    String(String),
    I64(i64),
    F64(f64),
    Dict(HashMap<String, f64>),
    Image(ImageRef),
    MultiArray(Tensor),
}

/// One decoded output value handed back to the application.
#[derive(Debug, Clone)]
pub enum OutputValue {
    Invalid,
    String(String),
    I64(i64),
    F64(f64),
    Dict(HashMap<String, f64>),
    Image(ImagePayload),
    Tensor(Tensor),
}

/// Application-side input object: named values for the model's input schema.
pub type Input = HashMap<String, Value>;

/// Decoded output object: named values for the model's output schema.
pub type Output = HashMap<String, OutputValue>;

/// A named feature map passed to and returned from native predict.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    entries: HashMap<String, Feature>,
}

impl FeatureSet {
    pub fn new() -> FeatureSet {
        FeatureSet::default()
    }

    pub fn with_capacity(n: usize) -> FeatureSet {
        FeatureSet {
            entries: HashMap::with_capacity(n),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, feature: Feature) {
        self.entries.insert(name.into(), feature);
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }
}
