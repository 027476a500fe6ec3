//! # Inference Worker
//!
//! The worker owns the model artifact, the inference session and the backend
//! selection policy. It is driven entirely by [`crate::protocol`] messages.
//!
//! ## Module Structure
//!
//! * [`SessionLifecycle`] - the `Uninitialized → Loading → SessionCreating →
//!   Ready ⇄ Running` state machine, with `Degraded` and `Failed` outcomes,
//!   first-match-wins backend fallback and lazy session creation on run.
//!
//! * [`RequestHandler`] - maps each request to lifecycle calls and emits its
//!   status notifications and single terminal response.
//!
//! * [`WorkerHandle`] - spawns the handler as a background tokio task fed by a
//!   channel, and terminates it on drop.
//!
//! * [`serve_io`] - runs the handler over a JSON Lines byte stream instead, for a
//!   worker living in another process.
mod session;
mod handler;
mod handle;
mod io;

pub use session::{HandshakeOutcome, RunOutput, SessionLifecycle, WorkerPhase};
pub use handler::{Outbox, RequestHandler};
pub use handle::WorkerHandle;
pub use io::serve_io;
