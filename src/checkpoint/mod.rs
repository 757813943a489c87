//! Checkpoint subsystem
//!
//! A checkpoint bounds replay: everything at or below its watermark is
//! reflected outside the log, so recovery starts from the newest checkpoint
//! entry instead of the first record ever written.
//!
//! # Pieces
//!
//! - [`CheckpointGate`]: lock-free single-flight guard
//! - [`CheckpointWatermark`]: monotonic last-checkpoint timestamp
//! - [`CheckpointPolicy`]: checkpoint-by-size trigger
//! - [`CheckpointCoordinator`]: runs one checkpoint transaction end to end
//!
//! Checkpoint failure is never fatal and never moves the watermark.

mod coordinator;
mod errors;
mod gate;
mod policy;

pub use coordinator::CheckpointCoordinator;
pub use errors::{CheckpointError, CheckpointErrorCode, CheckpointResult, Severity};
pub use gate::{CheckpointGate, CheckpointState, CheckpointWatermark};
pub use policy::CheckpointPolicy;
