//! Shared types for the webioc crates: configuration, the common error
//! type, session variant tags and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
pub mod variant;

pub use error::{Error, Result};
pub use variant::SessionVariant;
