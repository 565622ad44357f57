//! Built-in interceptors.
//!
//! Every one of these is generic over the metadata and result types, so they
//! fit any pipeline:
//!
//! - [`Trace`]: span per call, latency, outcome.
//! - [`CancelGuard`]: stops the call when its execution context is done.
//! - [`Timeout`]: tightens the deadline, then guards like [`CancelGuard`].
//! - [`CatchPanic`]: turns a panic further down the chain into an error.
//!
//! Order matters. A typical stack is `Trace`, `CatchPanic`, `Timeout`: the
//! trace span covers everything, and a panic or timeout is reported by it.

mod cancel;
mod panic;
mod trace;

pub use cancel::{CancelGuard, Timeout};
pub use panic::CatchPanic;
pub use trace::Trace;
