//! HTTP wrapper around the run orchestrator.

mod router;
mod state;

pub use router::build_router;
pub use state::ServerState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
