//! freightcheck common library
//!
//! Data model shared by the acceptance harness: credentials, waypoint
//! records, cargo details, carrier selection and the submitted transport
//! request. Nothing in here talks to a browser.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// freightcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
