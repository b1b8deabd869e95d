//! rapport - report rendering orchestration
//!
//! `rapport` turns a request for "render report R over business records X"
//! into a finished document. It resolves the report template and any nested
//! sub-templates onto a staging directory, materializes per-language label
//! tables, generates tabular input data from the underlying records, invokes
//! an external rendering engine over XML-RPC, and assembles the engine's
//! output into the final artifact: a single file, a zip of per-record files,
//! or a merged (optionally compacted) multi-page PDF.
//!
//! # Architecture Overview
//!
//! The pipeline is synchronous and sequential per request. A request enters
//! [`ReportService::execute`], which applies the one-document-per-record
//! policy, drives the render orchestrator once per output document, and
//! packages the results:
//!
//! ```text
//! ReportService::execute
//!   └── render::Renderer::render          (one call per output document)
//!         ├── resolver::TemplateResolver  (templates + label tables on disk)
//!         │     └── labels                (per-language property files)
//!         ├── datagen                     (CSV feed per template node)
//!         ├── engine::RenderEngine        (RPC call, out-of-process engine)
//!         └── cleanup                     (best-effort temp-file removal)
//! ```
//!
//! # Core Modules
//!
//! - [`resolver`] - Template resolution with a validity-checked path cache
//! - [`labels`] - Per-language label tables in the engine's property format
//! - [`datagen`] - Record-based and query-based tabular data generation
//! - [`render`] - Temp-resource lifecycle, RPC parameters, engine invocation
//! - [`assemble`] - Zip packaging and PDF merge/compaction
//! - [`engine`] - The [`engine::RenderEngine`] capability and its XML-RPC adapter
//! - [`store`] - Traits for the storage, translation, and delivery collaborators
//! - [`template`] - Introspection of the markup-based template format
//! - [`config`] - Runtime configuration (engine port, caching, cleanup, ...)
//! - [`core`] - Error taxonomy shared across the crate
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rapport::config::Config;
//! use rapport::service::ReportService;
//! use rapport::store::memory::MemoryStore;
//! use rapport::engine::xmlrpc::XmlRpcEngine;
//! use rapport::{DataSource, RenderContext, RenderRequest, ReportRef};
//!
//! # fn example() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::new("postgresql://localhost/erp", "erp")?);
//! let config = Config::default();
//! let engine = Arc::new(XmlRpcEngine::new(config.port, config.pid_file.clone()));
//! let service = ReportService::new(config, store.clone(), store.clone(), store, engine);
//!
//! let request = RenderRequest {
//!     report: ReportRef::Name("invoice".into()),
//!     model: None,
//!     ids: vec![1, 2, 3],
//!     source: DataSource::Model,
//!     parameters: Default::default(),
//!     output_format: None,
//!     return_pages: false,
//! };
//! let delivery = service.execute(&request, &RenderContext::anonymous("en"))?;
//! std::fs::write(format!("{}.{}", delivery.filename, delivery.kind), &delivery.bytes)?;
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod config;
pub mod constants;
pub mod core;
pub mod datagen;
pub mod engine;
pub mod labels;
pub mod render;
pub mod resolver;
pub mod service;
pub mod store;
pub mod template;
pub mod utils;

pub use crate::core::error::{ReportError, Result};
pub use crate::render::{RenderContext, Rendered};
pub use crate::service::{Delivery, ReportService};
pub use crate::store::{Record, RecordId, ReportTemplate, TemplateId};

use std::collections::BTreeMap;

/// How the tabular data for a render is obtained.
///
/// Exactly one variant is active per template node: either the caller already
/// holds the record snapshots in hand, or the rows are re-fetched from the
/// storage layer by record type and id.
#[derive(Debug, Clone, Default)]
pub enum DataSource {
    /// Re-fetch rows for the requested record type and ids.
    #[default]
    Model,
    /// Use the record snapshots supplied by the caller.
    Records(Vec<Record>),
}

/// Reference to the report to render: an explicit template id, or a lookup
/// by registered report name.
#[derive(Debug, Clone)]
pub enum ReportRef {
    /// Explicit template id.
    Id(TemplateId),
    /// Lookup by exact report name in the template store.
    Name(String),
}

/// A single render request.
///
/// `parameters` are free-form overrides merged into the engine parameter map;
/// caller-supplied values win on key collision. `output_format` overrides the
/// template's declared extension when present.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The report to render.
    pub report: ReportRef,
    /// Record-type override; the template's own record type wins when set.
    pub model: Option<String>,
    /// The record ids the report covers.
    pub ids: Vec<RecordId>,
    /// Record-based vs. query-based data generation.
    pub source: DataSource,
    /// Caller parameter overrides for the engine call.
    pub parameters: BTreeMap<String, engine::Value>,
    /// Output format override (e.g. `pdf`, `xls`).
    pub output_format: Option<String>,
    /// Surface the engine-reported page count in the result.
    pub return_pages: bool,
}
