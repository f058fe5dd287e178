use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use mlb_tensor::Dtype;

use crate::engine::{BoxFuture, Engine, ModelInfo, OpenOptions};
use crate::error::{ModelError, Result};
use crate::feature::{Feature, ImageFormat, Input, Output};
use crate::plan::{Encoded, Plan};
use crate::schema::Schema;

/// Global image flags applied to every image output without a per-field
/// override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFlags {
    pub format: ImageFormat,
}

impl Default for ImageFlags {
    fn default() -> ImageFlags {
        ImageFlags {
            format: ImageFormat::Raw,
        }
    }
}

/// Per-output-field marshaling overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFlags {
    /// Desired format for an image output.
    pub format: Option<ImageFormat>,
    /// Dtype override for a multiarray output, applied as a cast before the
    /// nested view is rebuilt.
    pub dtype: Option<Dtype>,
}

/// Per-call marshaling flags.
#[derive(Debug, Clone, Default)]
pub struct PredictFlags {
    pub image: ImageFlags,
    pub output: HashMap<String, OutputFlags>,
}

/// Result of a predict call.
///
/// Encoding, inference, and decoding run synchronously unless at least one
/// image input was a remote URL; in that case the whole remaining pipeline
/// is deferred behind the fetch. Callers must not assume synchronicity.
pub enum Prediction {
    Ready(Output),
    Deferred(BoxFuture<'static, Result<Output>>),
}

impl Prediction {
    /// Returns true if the call suspended on a remote image fetch.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Prediction::Deferred(_))
    }

    /// Await the output regardless of which arm this is.
    pub async fn resolve(self) -> Result<Output> {
        match self {
            Prediction::Ready(output) => Ok(output),
            Prediction::Deferred(future) => future.await,
        }
    }

    /// The output if it is already available.
    pub fn into_ready(self) -> Option<Output> {
        match self {
            Prediction::Ready(output) => Some(output),
            Prediction::Deferred(_) => None,
        }
    }
}

impl fmt::Debug for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Ready(output) => f.debug_tuple("Ready").field(output).finish(),
            Prediction::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A loaded model plus its compiled marshaling procedure.
///
/// The engine handle, model info, and plan are shared read-only across
/// concurrent predict invocations; this layer performs no locking.
pub struct Model {
    engine: Arc<dyn Engine>,
    info: Arc<ModelInfo>,
    plan: Arc<Plan>,
}

impl Model {
    /// Open a model through the engine and compile its marshaling plan.
    pub fn open(engine: Arc<dyn Engine>, path: &str, options: OpenOptions) -> Result<Model> {
        let info = engine.load(path, &options)?;
        let plan = Plan::compile(&info)?;
        debug!(
            path,
            units = %info.units,
            inputs = info.input.len(),
            outputs = info.output.len(),
            "model opened"
        );
        Ok(Model {
            engine,
            info: Arc::new(info),
            plan: Arc::new(plan),
        })
    }

    /// Open with default options (`units = "all"`, `lpaog = true`).
    pub fn open_default(engine: Arc<dyn Engine>, path: &str) -> Result<Model> {
        Model::open(engine, path, OpenOptions::default())
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn units(&self) -> &str {
        &self.info.units
    }

    pub fn lpaog(&self) -> bool {
        self.info.lpaog
    }

    /// The model's declared input schema (read-only).
    pub fn input(&self) -> &Schema {
        &self.info.input
    }

    /// The model's declared output schema (read-only).
    pub fn output(&self) -> &Schema {
        &self.info.output
    }

    /// Run the compiled marshaling procedure once: encode inputs, invoke
    /// native predict, decode outputs.
    ///
    /// Returns `Prediction::Ready` unless an image input required a remote
    /// fetch, in which case the fetch, the native call, and the decode all
    /// happen inside the deferred future. Validation errors abort before any
    /// native predict call.
    pub fn predict(&self, mut input: Input, flags: PredictFlags) -> Result<Prediction> {
        trace!(path = %self.info.path, "predict");

        match self.plan.encode(self.engine.as_ref(), &mut input)? {
            Encoded::Ready(features) => {
                let result = self.engine.predict(&self.info, features)?;
                let output = self.plan.decode(self.engine.as_ref(), &result, &flags)?;
                Ok(Prediction::Ready(output))
            }
            Encoded::Pending {
                mut features,
                fetches,
            } => {
                let engine = Arc::clone(&self.engine);
                let info = Arc::clone(&self.info);
                let plan = Arc::clone(&self.plan);
                Ok(Prediction::Deferred(Box::pin(async move {
                    for fetch in fetches {
                        let image = engine.image_fetch(&fetch.url, &fetch.entry).await?;
                        features.set(fetch.name, Feature::Image(image));
                    }
                    let result = engine.predict(&info, features)?;
                    plan.decode(engine.as_ref(), &result, &flags)
                })))
            }
        }
    }

    /// Run the compiled procedure over every input concurrently.
    ///
    /// Results are returned in input order regardless of completion order.
    /// The first failure fails the whole batch; there is no partial-success
    /// mode and no cancellation of still-running items.
    pub async fn batch(&self, inputs: Vec<Input>, flags: PredictFlags) -> Result<Vec<Output>> {
        let mut handles = Vec::with_capacity(inputs.len());
        for input in inputs {
            let prediction = self.predict(input, flags.clone())?;
            handles.push(tokio::spawn(prediction.resolve()));
        }

        let mut outputs = Vec::with_capacity(handles.len());
        for handle in handles {
            let output = handle
                .await
                .map_err(|e| ModelError::Join(e.to_string()))??;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("path", &self.info.path)
            .field("units", &self.info.units)
            .field("lpaog", &self.info.lpaog)
            .finish_non_exhaustive()
    }
}
