//! # Inference Backends
//!
//! This module holds the seam between the worker and whatever engine executes the
//! model graph. The worker only knows the [`InferenceEngine`] and
//! [`InferenceSession`] traits; tensor kernels live entirely behind them.

//! ## Feature Flags
//!
//! - `candle`: Enables a candle engine that evaluates ONNX artifacts with `candle-onnx`
//!
//! ## Usage
//!
//! Implement [`InferenceEngine`] for your runtime, then hand it to
//! [`crate::worker::SessionLifecycle`] together with an artifact source and the
//! ordered list of [`Backend`] candidates to try.

mod core_trait;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle engine implementation.
///
/// This module is only available when the `candle` feature flag is enabled.
/// `Backend::Accelerated` binds to the first CUDA or Metal device candle was
/// compiled for, `Backend::Cpu` binds to the host.
pub mod candle;

pub use core_trait::*;

#[cfg(test)]
/// Scriptable engine for tests.
///
/// Implements the reference "double" model over plain vectors.
pub(crate) mod mock_engine;
