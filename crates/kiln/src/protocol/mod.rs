//! Controller ↔ worker message protocol.
//!
//! Every request travels in an [`Envelope`] carrying a fresh [`RequestId`]; every
//! response the worker emits for it echoes that id. A request gets any number of
//! [`Response::Status`] notifications followed by exactly one terminal response.
//!
//! In-process the envelopes move over tokio channels as owned values. Across a
//! process boundary [`framing`] carries them as JSON Lines.

mod message;
pub mod framing;

pub use message::*;
