//! Template resolution and the path cache.
//!
//! [`TemplateResolver::resolve`] turns a [`ReportTemplate`] into a
//! filesystem path the engine can load: the template content is written
//! verbatim onto a staging directory, every nested sub-template it
//! references is recursively materialized into the same directory first,
//! and one label table per active language is staged next to each file.
//!
//! # Path cache
//!
//! Resolved paths are remembered per template id for the lifetime of the
//! resolver. An entry is only honored while the file still exists and, when
//! the caller pins a staging directory, while the cached path lies under
//! that directory; anything else is a silent miss and the template is
//! re-resolved. Entries are never explicitly evicted.
//!
//! Output is deterministic (the same template always yields the same bytes
//! at the same path), so concurrent resolutions racing on a cache miss may
//! duplicate work but never conflict; no locking is needed beyond the
//! concurrent map itself.
//!
//! # Nested references
//!
//! Sub-templates are discovered by scanning the raw content for the
//! engine's embedded-expression tag pair and extracting the quoted file
//! name. The reference graph must be acyclic; resolution tracks the active
//! path and aborts with [`ReportError::CyclicReference`] when a template
//! re-enters it. Shared sub-templates (diamonds) are fine - the second
//! visit hits the cache.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::{COMPILED_SUFFIX, SUBREPORT_PATTERN};
use crate::core::error::{ReportError, Result};
use crate::labels;
use crate::store::{ReportTemplate, TemplateStore, TranslationStore};
use crate::utils::fs;

/// Resolves templates onto staging directories, with caching.
pub struct TemplateResolver {
    config: Config,
    templates: Arc<dyn TemplateStore>,
    translations: Arc<dyn TranslationStore>,
    cache: DashMap<u64, PathBuf>,
}

impl TemplateResolver {
    /// Create a resolver with an empty path cache.
    ///
    /// The cache lives as long as the resolver; owning it here (rather than
    /// in process-wide state) keeps its lifecycle explicit.
    pub fn new(
        config: Config,
        templates: Arc<dyn TemplateStore>,
        translations: Arc<dyn TranslationStore>,
    ) -> Self {
        Self { config, templates, translations, cache: DashMap::new() }
    }

    /// Resolve a template to a ready-to-render file path.
    ///
    /// When `staging` is `None`, a directory is allocated: the configured
    /// persistent cache directory (created if absent), or a fresh unique
    /// temporary directory. Passing `Some(dir)` pins resolution (and cache
    /// validity) to that directory.
    pub fn resolve(&self, template: &ReportTemplate, staging: Option<&Path>) -> Result<PathBuf> {
        let mut active = HashSet::new();
        self.resolve_guarded(template, staging, &mut active)
    }

    fn resolve_guarded(
        &self,
        template: &ReportTemplate,
        staging: Option<&Path>,
        active: &mut HashSet<u64>,
    ) -> Result<PathBuf> {
        if !active.insert(template.id.0) {
            return Err(ReportError::CyclicReference { name: template.report_name.clone() }.into());
        }
        let resolved = self.resolve_one(template, staging, active);
        active.remove(&template.id.0);
        resolved
    }

    fn resolve_one(
        &self,
        template: &ReportTemplate,
        staging: Option<&Path>,
        active: &mut HashSet<u64>,
    ) -> Result<PathBuf> {
        if self.config.use_cache {
            if let Some(cached) = self.cache.get(&template.id.0).map(|e| e.value().clone()) {
                let rooted = staging.is_none_or(|dir| cached.starts_with(dir));
                if rooted && cached.is_file() {
                    debug!(report = %template.report_name, path = %cached.display(), "path cache hit");
                    return Ok(cached);
                }
            }
        }

        let allocated;
        let staging_dir: &Path = match staging {
            Some(dir) => dir,
            None => {
                allocated = self.allocate_staging()?;
                &allocated
            }
        };

        if template.content.is_empty() {
            return Err(ReportError::MissingTemplate { name: template.report_name.clone() }.into());
        }

        // Materialize nested templates into the same staging directory
        // before the parent, so the engine finds every referenced file.
        for name in scan_references(&template.content) {
            let sub = self
                .templates
                .by_name(&name)?
                .ok_or_else(|| ReportError::SubreportNotFound { name: name.clone() })?;
            self.resolve_guarded(&sub, Some(staging_dir), active)?;
        }

        let target = staging_dir.join(template.file_name());
        fs::write_bytes(&target, &template.content)?;

        let keys = self.translations.report_keys(&template.report_name)?;
        labels::materialize(self.translations.as_ref(), &template.basename(), staging_dir, &keys)?;

        self.cache.insert(template.id.0, target.clone());
        info!(report = %template.report_name, path = %target.display(), "template resolved");
        Ok(target)
    }

    fn allocate_staging(&self) -> Result<PathBuf> {
        match &self.config.cache_dir {
            Some(dir) => {
                fs::ensure_dir(dir)?;
                Ok(dir.clone())
            }
            None => fs::keep_temp_dir("rapport-"),
        }
    }
}

/// Extract referenced template names from raw content, in document order.
///
/// Matches the embedded-expression tag pair, takes the quoted segment, and
/// strips the compiled-file suffix to obtain the store lookup name.
pub fn scan_references(content: &[u8]) -> Vec<String> {
    let pattern = Regex::new(SUBREPORT_PATTERN).expect("static pattern");
    let text = String::from_utf8_lossy(content);
    pattern
        .find_iter(&text)
        .filter_map(|m| {
            let quoted = m.as_str().split('"').nth(1)?;
            Some(quoted.strip_suffix(COMPILED_SUFFIX).unwrap_or(quoted).to_string())
        })
        .collect()
}
