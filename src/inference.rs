// src/inference.rs

use crate::tensor::{InputTensor, OutputTensor};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::future::Future;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Asynchronous inference backend. The production implementation wraps an
/// ONNX Runtime session; tests substitute canned outputs.
pub trait InferenceSession: Send + Sync {
    fn run(&self, input: InputTensor) -> impl Future<Output = Result<OutputTensor>> + Send;
}

pub struct OrtSession {
    session: Mutex<Session>,
}

impl OrtSession {
    pub fn from_bytes(bytes: &[u8], num_threads: usize) -> Result<Self> {
        info!("Building ONNX Runtime session ({} model bytes)", bytes.len());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .commit_from_memory(bytes)
            .context("failed to build inference session")?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self> {
        info!("Loading model: {}", path.as_ref().display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .commit_from_file(path.as_ref())
            .context("failed to load model")?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl<S: InferenceSession> InferenceSession for std::sync::Arc<S> {
    fn run(&self, input: InputTensor) -> impl Future<Output = Result<OutputTensor>> + Send {
        self.as_ref().run(input)
    }
}

impl InferenceSession for OrtSession {
    fn run(&self, input: InputTensor) -> impl Future<Output = Result<OutputTensor>> + Send {
        async move {
            let input_value = ort::value::Value::from_array((
                input.dims.as_slice(),
                input.data.into_boxed_slice(),
            ))?;

            let mut session = self.session.lock().await;
            let outputs = session.run(ort::inputs!["images" => input_value])?;
            let output = &outputs[0];
            let (shape, data) = output.try_extract_tensor::<f32>()?;
            debug!("model output shape: {:?}", shape);

            let dims = shape.iter().map(|&d| d as usize).collect();
            Ok(OutputTensor::new(data.to_vec(), dims))
        }
    }
}
