use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use candle_core::{DType, Device};
use candle_onnx::onnx::ModelProto;
use prost::Message;
use tracing::debug;
use super::{Backend, EngineError, InferenceEngine, InferenceSession};
use crate::artifact::ModelArtifact;
use crate::tensor::{NamedTensors, Tensor};

/// Evaluates ONNX artifacts with `candle-onnx`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CandleEngine;

impl CandleEngine {
    fn device(backend: Backend) -> candle_core::Result<Device> {
        match backend {
            Backend::Cpu => Ok(Device::Cpu),
            Backend::Accelerated => {
                if candle_core::utils::cuda_is_available() {
                    Device::new_cuda(0)
                } else if candle_core::utils::metal_is_available() {
                    Device::new_metal(0)
                } else {
                    Err(candle_core::Error::Msg(
                        "candle was built without CUDA or Metal support".to_string(),
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl InferenceEngine for CandleEngine {
    async fn create_session(
        &self,
        artifact: &ModelArtifact,
        backend: Backend,
    ) -> Result<Box<dyn InferenceSession>, EngineError> {
        let device = Self::device(backend)?;
        let model = ModelProto::decode(artifact.bytes())?;
        debug!(%backend, nodes = model.graph.as_ref().map_or(0, |g| g.node.len()), "Decoded ONNX graph");
        Ok(Box::new(CandleSession {
            model: Arc::new(model),
            device,
        }))
    }
}

struct CandleSession {
    model: Arc<ModelProto>,
    device: Device,
}

impl CandleSession {
    fn to_candle(tensor: Tensor, device: &Device) -> candle_core::Result<candle_core::Tensor> {
        let shape = tensor.shape().to_vec();
        candle_core::Tensor::from_vec(tensor.into_vec(), shape, device)
    }

    fn from_candle(tensor: &candle_core::Tensor) -> Result<Tensor, EngineError> {
        let shape = tensor.dims().to_vec();
        let data = tensor
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        Tensor::with_shape(data, shape)
            .ok_or_else(|| "output tensor shape does not match its data".into())
    }
}

#[async_trait]
impl InferenceSession for CandleSession {
    async fn run(&self, inputs: NamedTensors) -> Result<NamedTensors, EngineError> {
        let inputs = inputs
            .into_iter()
            .map(|(name, tensor)| Ok((name, Self::to_candle(tensor, &self.device)?)))
            .collect::<candle_core::Result<HashMap<_, _>>>()?;

        let model = self.model.clone();
        let outputs = tokio::task::spawn_blocking(move || candle_onnx::simple_eval(&model, inputs))
            .await??;

        outputs
            .iter()
            .map(|(name, tensor)| Ok((name.clone(), Self::from_candle(tensor)?)))
            .collect()
    }
}
