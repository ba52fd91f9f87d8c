//! Shared imports: `anyhow` for the orchestration layers and the `tracing` macros for everyone.

pub use anyhow::{Context, Error, bail, ensure};
pub use tracing::{debug, info, instrument, warn};

pub type Result<T = (), E = Error> = anyhow::Result<T, E>;
