//! # Kiln
//!
//! Run numeric-vector inference in a background worker without blocking the
//! foreground controller.
//!
//! ## Overview
//!
//! Two components talk over a strict message boundary, no shared memory:
//!
//! - The **controller** ([`controller::Controller`]) owns user-facing state. It
//!   sends one handshake when it acquires a worker, then run requests carrying
//!   an input vector, and folds every response into a
//!   [`controller::ControllerState`].
//! - The **worker** ([`worker::WorkerHandle`]) owns the model artifact, the
//!   inference session and the backend fallback policy, and executes requests
//!   strictly one after another.
//!
//! ## Architecture
//!
//! ### Handshake
//!
//! The worker fetches the artifact through an [`artifact::ArtifactSource`], then
//! asks the [`backend::InferenceEngine`] for a session on each configured
//! [`backend::Backend`] in order, adopting the first that succeeds. If every
//! backend fails the handshake still succeeds, degraded, with a warning and the
//! `fallback` sentinel in place of a backend. Only a failed fetch fails it.
//!
//! ### Protocol
//!
//! Each request gets zero or more `status` notifications, then exactly one
//! terminal response: `handshake_complete`, `result`, `stats` or `error`. The
//! controller keeps `loading` set between sending a request and receiving its
//! terminal response, and refuses to send another one in between.
//!
//! ### Engines
//!
//! Tensor kernels live behind [`backend::InferenceEngine`]. The worker hands the
//! session one rank-1 `f32` tensor named `"input"` and reads back the tensor named
//! `"output"`.
//!
//! ## Features
//!
//! - **candle** - Enables an ONNX engine backed by candle
//! - **http** - Enables fetching artifacts over HTTP with reqwest
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kiln::config::WorkerConfig;
//! use kiln::controller::Controller;
//! use kiln::worker::{SessionLifecycle, WorkerHandle};
//!
//! # async fn example(engine: Arc<dyn kiln::backend::InferenceEngine>) -> Result<(), kiln::error::InputError> {
//! let config = WorkerConfig::default();
//! let (worker, responses) = WorkerHandle::spawn(SessionLifecycle::from_config(engine, &config));
//! let mut controller = Controller::new(worker, responses);
//! controller.settle().await;
//!
//! controller.run_text("1,2,3,4")?;
//! let state = controller.settle().await;
//! println!("{}: {:?}", state.status, state.last_result);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod tensor;
pub mod worker;

/// Constants for client reference
pub use tensor::constant;
