//! # precis-shared
//!
//! Data model, wire protocol and error types shared by the Précis crates.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{GatewayError, ProtocolError};
pub use types::*;
