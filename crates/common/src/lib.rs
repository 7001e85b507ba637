//! Common types shared by the headless auth crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
