//! Error handling for the rendering pipeline.
//!
//! The error system follows two principles:
//! 1. **Strongly-typed failure classes** ([`ReportError`]) for the faults the
//!    pipeline distinguishes, so callers can branch on them.
//! 2. **`anyhow` propagation** at orchestration seams, with `.context(...)`
//!    adding the file path or template name the operation was touching.
//!
//! # Propagation policy
//!
//! Resolution and generation failures abort the request before any RPC call
//! is made; there is no partial engine invocation. A fault reported by the
//! engine is wrapped as [`ReportError::EngineFault`] and surfaced to the
//! caller - never retried. Failures while removing temporary files are
//! logged at `warn` level and never propagated; cleanup can never mask a
//! successful render. A configured but unregistered delivery target is
//! likewise a logged warning with a direct-return fallback, not an error.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = anyhow::Result<T>;

/// Failure classes of the rendering pipeline.
///
/// Every variant is fatal for the request it occurs in; none of them is
/// retried automatically. Non-fatal conditions (cleanup failures, missing
/// delivery targets) are logged, not represented here.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The template exists but carries no content blob.
    #[error("report template '{name}' has no content")]
    MissingTemplate {
        /// Report name of the empty template.
        name: String,
    },

    /// A nested-template reference names a template absent from the store.
    #[error("sub-template '{name}' not found")]
    SubreportNotFound {
        /// The referenced template name, as extracted from the parent's
        /// content with the compiled-file suffix stripped.
        name: String,
    },

    /// The nested-template reference graph revisited a template.
    ///
    /// The reference graph must be acyclic for resolution to terminate;
    /// a revisit is a configuration error in the template set.
    #[error("cyclic sub-template reference through '{name}'")]
    CyclicReference {
        /// Report name at which the cycle closed.
        name: String,
    },

    /// The requested report is not registered in the template store.
    #[error("report '{name}' not found")]
    ReportNotFound {
        /// The requested report name or stringified id.
        name: String,
    },

    /// The template content could not be introspected.
    #[error("cannot parse template markup: {reason}")]
    TemplateParse {
        /// Parser diagnostic.
        reason: String,
    },

    /// The external engine reported a failure while rendering.
    #[error("render engine fault: {message}")]
    EngineFault {
        /// The engine-side fault message, verbatim.
        message: String,
    },

    /// The external engine could not be reached at the configured port.
    #[error("render engine unreachable on port {port}: {reason}")]
    EngineUnavailable {
        /// Configured RPC port.
        port: u16,
        /// Transport-level diagnostic.
        reason: String,
    },

    /// Configuration file or value rejected.
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the offending value.
        message: String,
    },
}
