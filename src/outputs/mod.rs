//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Writes the [`ResultEnvelope`](crate::models::ResultEnvelope) consumed by static sites

pub mod json;
