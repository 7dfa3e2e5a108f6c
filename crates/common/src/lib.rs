//! Common types for the token gateway workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
