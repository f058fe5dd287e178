use tracing::debug;

use mlb_tensor::{Dtype, Tensor, TensorData};

use crate::engine::{Engine, ModelInfo};
use crate::error::{ModelError, Result};
use crate::feature::{Feature, FeatureSet, ImageInput, Input, Output, OutputValue, Value};
use crate::model::PredictFlags;
use crate::schema::{DictKeyKind, FeatureType, SchemaEntry};

/// Encode action for one input field, resolved once at compile time.
#[derive(Debug, Clone)]
enum EncodeKind {
    Invalid,
    MultiArray { dtype: Dtype },
    String,
    I64,
    F64,
    Dict { key: DictKeyKind },
    Image,
}

#[derive(Debug, Clone)]
struct InputStep {
    name: String,
    optional: bool,
    kind: EncodeKind,
    /// The schema entry, forwarded to engine-side constructors.
    entry: SchemaEntry,
}

/// Decode action for one output field.
#[derive(Debug, Clone, Copy)]
enum DecodeKind {
    Invalid,
    String,
    I64,
    F64,
    Dict,
    Image,
    MultiArray,
}

#[derive(Debug, Clone)]
struct OutputStep {
    name: String,
    kind: DecodeKind,
}

/// A remote image input recorded during encoding, resolved before the
/// native predict call is issued.
#[derive(Debug, Clone)]
pub(crate) struct PendingFetch {
    pub name: String,
    pub url: String,
    pub entry: SchemaEntry,
}

/// Result of the synchronous encode pass.
pub(crate) enum Encoded {
    /// All inputs encoded; the feature set is complete.
    Ready(FeatureSet),
    /// One or more image inputs need a remote fetch first.
    Pending {
        features: FeatureSet,
        fetches: Vec<PendingFetch>,
    },
}

/// A compiled marshaling procedure.
///
/// Built once per loaded model by walking the frozen schemas, then
/// dispatched by a single loop at predict time. Owns no mutable state and is
/// safe to invoke concurrently.
#[derive(Debug)]
pub(crate) struct Plan {
    inputs: Vec<InputStep>,
    outputs: Vec<OutputStep>,
}

impl Plan {
    /// Walk both schemas and produce the specialized step lists.
    ///
    /// # Errors
    /// Rejects a multiarray entry without a dtype and a dict entry without a
    /// key kind.
    pub fn compile(info: &ModelInfo) -> Result<Plan> {
        let mut inputs = Vec::with_capacity(info.input.len());
        for (name, entry) in info.input.iter() {
            let kind = match entry.feature_type {
                FeatureType::Invalid => EncodeKind::Invalid,
                FeatureType::MultiArray => EncodeKind::MultiArray {
                    dtype: entry.dtype.ok_or_else(|| ModelError::MalformedSchema {
                        field: name.to_string(),
                        what: "a dtype",
                    })?,
                },
                FeatureType::String => EncodeKind::String,
                FeatureType::I64 => EncodeKind::I64,
                FeatureType::F64 => EncodeKind::F64,
                FeatureType::Dict => EncodeKind::Dict {
                    key: entry.key.ok_or_else(|| ModelError::MalformedSchema {
                        field: name.to_string(),
                        what: "a key kind",
                    })?,
                },
                FeatureType::Image => EncodeKind::Image,
            };
            inputs.push(InputStep {
                name: name.to_string(),
                optional: entry.optional,
                kind,
                entry: entry.clone(),
            });
        }

        let mut outputs = Vec::with_capacity(info.output.len());
        for (name, entry) in info.output.iter() {
            let kind = match entry.feature_type {
                FeatureType::Invalid => DecodeKind::Invalid,
                FeatureType::String => DecodeKind::String,
                FeatureType::I64 => DecodeKind::I64,
                FeatureType::F64 => DecodeKind::F64,
                FeatureType::Dict => DecodeKind::Dict,
                FeatureType::Image => DecodeKind::Image,
                FeatureType::MultiArray => DecodeKind::MultiArray,
            };
            outputs.push(OutputStep {
                name: name.to_string(),
                kind,
            });
        }

        debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            "compiled marshaling plan"
        );
        Ok(Plan { inputs, outputs })
    }

    /// Encode all input fields in schema order.
    ///
    /// URL image inputs are not encoded inline; they are recorded as pending
    /// fetches so the caller can resolve them before the native predict call.
    /// Every validation error is raised here, before any inference runs.
    pub fn encode(&self, engine: &dyn Engine, input: &mut Input) -> Result<Encoded> {
        let mut features = FeatureSet::with_capacity(self.inputs.len());
        let mut fetches = Vec::new();

        for step in &self.inputs {
            if matches!(step.kind, EncodeKind::Invalid) {
                features.set(step.name.clone(), Feature::Invalid);
                continue;
            }

            let value = match input.remove(&step.name) {
                Some(v) => v,
                None if step.optional => {
                    features.set(step.name.clone(), Feature::Invalid);
                    continue;
                }
                None => return Err(ModelError::RequiredInput(step.name.clone())),
            };

            let feature = match &step.kind {
                EncodeKind::Invalid => unreachable!("handled above"),
                EncodeKind::MultiArray { dtype } => {
                    let data = match value {
                        Value::Tensor(data) => data,
                        Value::Number(n) => TensorData::Scalar(n),
                        _ => return Err(input_type(step, "a tensor")),
                    };
                    let tensor =
                        Tensor::new(&data, *dtype).map_err(|source| ModelError::Tensor {
                            field: step.name.clone(),
                            source,
                        })?;
                    Feature::MultiArray(tensor)
                }
                EncodeKind::String => match value {
                    Value::String(s) => Feature::String(s),
                    _ => return Err(input_type(step, "a string")),
                },
                EncodeKind::I64 => match value {
                    Value::Number(n) if n.is_finite() => Feature::I64(n as i64),
                    _ => return Err(input_type(step, "a number")),
                },
                EncodeKind::F64 => match value {
                    Value::Number(n) if n.is_finite() => Feature::F64(n),
                    _ => return Err(input_type(step, "a number")),
                },
                EncodeKind::Dict { key } => {
                    let map = match value {
                        Value::Dict(m) => m,
                        _ => return Err(input_type(step, "an object")),
                    };
                    validate_dict(&step.name, *key, &map)?;
                    Feature::Dict(map)
                }
                EncodeKind::Image => {
                    let image = match value {
                        Value::Image(i) => i,
                        _ => return Err(input_type(step, "an image")),
                    };
                    match image {
                        ImageInput::File(path) => {
                            Feature::Image(engine.image_from_file(&path, &step.entry)?)
                        }
                        ImageInput::Bytes(bytes) => {
                            Feature::Image(engine.image_from_bytes(&bytes, &step.entry)?)
                        }
                        ImageInput::Raw(raw) => {
                            Feature::Image(engine.image_from_raw(&raw, &step.entry)?)
                        }
                        ImageInput::Url(url) => {
                            fetches.push(PendingFetch {
                                name: step.name.clone(),
                                url,
                                entry: step.entry.clone(),
                            });
                            continue;
                        }
                    }
                }
            };
            features.set(step.name.clone(), feature);
        }

        if fetches.is_empty() {
            Ok(Encoded::Ready(features))
        } else {
            Ok(Encoded::Pending { features, fetches })
        }
    }

    /// Decode the native result set in schema order.
    pub fn decode(
        &self,
        engine: &dyn Engine,
        result: &FeatureSet,
        flags: &PredictFlags,
    ) -> Result<Output> {
        let mut output = Output::with_capacity(self.outputs.len());

        for step in &self.outputs {
            let feature = result
                .get(&step.name)
                .ok_or_else(|| ModelError::MissingOutput(step.name.clone()))?;

            let value = match step.kind {
                DecodeKind::Invalid => match feature {
                    Feature::Invalid => OutputValue::Invalid,
                    _ => return Err(output_kind(step, "invalid")),
                },
                DecodeKind::String => match feature {
                    Feature::String(s) => OutputValue::String(s.clone()),
                    _ => return Err(output_kind(step, "string")),
                },
                DecodeKind::I64 => match feature {
                    Feature::I64(v) => OutputValue::I64(*v),
                    _ => return Err(output_kind(step, "i64")),
                },
                DecodeKind::F64 => match feature {
                    Feature::F64(v) => OutputValue::F64(*v),
                    _ => return Err(output_kind(step, "f64")),
                },
                DecodeKind::Dict => match feature {
                    Feature::Dict(m) => OutputValue::Dict(m.clone()),
                    _ => return Err(output_kind(step, "dict")),
                },
                DecodeKind::Image => {
                    let format = flags
                        .output
                        .get(&step.name)
                        .and_then(|f| f.format)
                        .unwrap_or(flags.image.format);
                    match feature {
                        Feature::Image(image) => {
                            OutputValue::Image(engine.image_get(image, format)?)
                        }
                        _ => return Err(output_kind(step, "image")),
                    }
                }
                DecodeKind::MultiArray => {
                    let tensor = match feature {
                        Feature::MultiArray(t) => t,
                        _ => return Err(output_kind(step, "multiarray")),
                    };
                    let cast = flags.output.get(&step.name).and_then(|f| f.dtype);
                    let tensor = match cast {
                        Some(dtype) => tensor.cast(dtype),
                        None => Tensor::from_storage(
                            tensor.storage().clone(),
                            tensor.shape().clone(),
                        )
                        .map_err(|source| ModelError::Tensor {
                            field: step.name.clone(),
                            source,
                        })?,
                    };
                    OutputValue::Tensor(tensor)
                }
            };
            output.insert(step.name.clone(), value);
        }

        Ok(output)
    }
}

fn input_type(step: &InputStep, expected: &'static str) -> ModelError {
    ModelError::InputType {
        field: step.name.clone(),
        expected,
    }
}

fn output_kind(step: &OutputStep, expected: &'static str) -> ModelError {
    ModelError::OutputKind {
        field: step.name.clone(),
        expected,
    }
}

/// Validates dictionary keys and values against the declared key kind.
///
/// Integer-keyed dictionaries require every key to be the canonical decimal
/// form of a non-negative 32-bit integer; values must always be finite.
fn validate_dict(
    field: &str,
    key: DictKeyKind,
    map: &std::collections::HashMap<String, f64>,
) -> Result<()> {
    for (k, v) in map {
        if key == DictKeyKind::I64 {
            let canonical = k.parse::<u32>().map(|n| n.to_string());
            if canonical.as_deref() != Ok(k.as_str()) {
                return Err(ModelError::DictShape {
                    field: field.to_string(),
                    expected: "integer keys",
                });
            }
        }
        if !v.is_finite() {
            return Err(ModelError::DictShape {
                field: field.to_string(),
                expected: "number values",
            });
        }
    }
    Ok(())
}
