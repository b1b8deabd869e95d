//! Core types shared across the crate.
//!
//! Currently this is the error taxonomy; see [`error`] for the failure
//! classes and the propagation policy.

pub mod error;

pub use error::{ReportError, Result};
