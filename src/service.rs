//! The composition root.
//!
//! [`ReportService`] owns the configuration, the collaborator stores, the
//! engine capability, the delivery-target registry, and the template
//! resolver (and with it the path cache). One service instance serves the
//! whole process; requests may run concurrently on independent threads, the
//! cache being the only shared mutable state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::assemble;
use crate::config::Config;
use crate::constants::FORMAT_ZIP;
use crate::core::error::{ReportError, Result};
use crate::engine::RenderEngine;
use crate::render::{RenderContext, Renderer};
use crate::resolver::TemplateResolver;
use crate::store::{DeliveryTarget, RecordStore, ReportTemplate, TemplateStore, TranslationStore};
use crate::{RenderRequest, ReportRef};

/// A finished document as handed back to the caller.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Format token; zip archives use `zip`.
    pub kind: String,
    /// Document or archive bytes.
    pub bytes: Vec<u8>,
    /// Whether the client should print without a dialog.
    pub direct_print: bool,
    /// Suggested filename stem (no extension).
    pub filename: String,
    /// Engine-reported page count, when the caller asked for it.
    pub pages: Option<u32>,
}

/// Owns the pipeline's wiring; see the module docs.
pub struct ReportService {
    config: Config,
    templates: Arc<dyn TemplateStore>,
    records: Arc<dyn RecordStore>,
    engine: Arc<dyn RenderEngine>,
    resolver: TemplateResolver,
    delivery_targets: HashMap<String, Arc<dyn DeliveryTarget>>,
}

impl ReportService {
    /// Wire a service from its collaborators.
    pub fn new(
        config: Config,
        templates: Arc<dyn TemplateStore>,
        translations: Arc<dyn TranslationStore>,
        records: Arc<dyn RecordStore>,
        engine: Arc<dyn RenderEngine>,
    ) -> Self {
        let resolver = TemplateResolver::new(config.clone(), templates.clone(), translations);
        Self {
            config,
            templates,
            records,
            engine,
            resolver,
            delivery_targets: HashMap::new(),
        }
    }

    /// Register an alternate delivery target under a name the configuration
    /// can point at.
    pub fn register_delivery_target(&mut self, name: &str, target: Arc<dyn DeliveryTarget>) {
        self.delivery_targets.insert(name.to_string(), target);
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The template resolver (and its path cache).
    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    /// Execute a render request end to end.
    ///
    /// Applies the per-record packaging policy, surfaces the page count
    /// when `return_pages` is set, and routes the document to a configured
    /// delivery target when one is registered. A configured but missing
    /// target logs a warning and falls back to returning the document.
    pub fn execute(&self, request: &RenderRequest, ctx: &RenderContext) -> Result<Delivery> {
        let template = self.lookup(&request.report)?;
        let renderer = Renderer {
            config: &self.config,
            resolver: &self.resolver,
            templates: self.templates.as_ref(),
            records: self.records.as_ref(),
            engine: self.engine.as_ref(),
        };
        let mut delivery =
            assemble::assemble(&renderer, &template, request, ctx, self.records.as_ref())?;

        if delivery.kind == FORMAT_ZIP {
            return Ok(delivery);
        }
        if request.return_pages {
            // Page-counting callers get the raw display name back; they are
            // inspecting the render, not saving the file.
            delivery.filename = template.name.clone();
            return Ok(delivery);
        }
        delivery.pages = None;

        if let Some(target_name) = &self.config.delivery_target {
            match self.delivery_targets.get(target_name) {
                Some(target) => return target.deliver(delivery),
                None => {
                    warn!(name = %target_name, "delivery target not registered; returning document");
                }
            }
        }
        Ok(delivery)
    }

    /// Merge independently rendered PDF documents into one, honoring the
    /// configured compaction toggle.
    pub fn merge_documents(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>> {
        assemble::pdf::merge(documents, self.config.compact_on_merge)
    }

    fn lookup(&self, report: &ReportRef) -> Result<ReportTemplate> {
        match report {
            ReportRef::Id(id) => self
                .templates
                .by_id(*id)?
                .ok_or_else(|| ReportError::ReportNotFound { name: id.to_string() }.into()),
            ReportRef::Name(name) => self
                .templates
                .by_name(name)?
                .ok_or_else(|| ReportError::ReportNotFound { name: name.clone() }.into()),
        }
    }
}
