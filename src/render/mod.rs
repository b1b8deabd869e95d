//! The render orchestrator.
//!
//! [`Renderer::render`] drives one engine invocation end to end:
//!
//! 1. **Preparing** - allocate the temporary data and output files and
//!    start the cleanup set.
//! 2. **Resolving** - materialize the template (and its sub-templates and
//!    label tables) through the resolver.
//! 3. **Generating** - produce the tabular feed for the main template and
//!    for every sub-template that declares one. All feeds exist before the
//!    engine is called; a generation failure aborts without any RPC.
//! 4. **Invoking** - assemble the connection bundle and parameter map and
//!    call the engine.
//! 5. **Collecting** - read the produced document into memory.
//! 6. **Cleaning** - the cleanup set removes every temporary file on every
//!    exit path, success or failure; removal failures are logged and never
//!    propagated. `Config::unlink = false` keeps the files for debugging.

use std::collections::BTreeMap;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::RenderRequest;
use crate::config::Config;
use crate::constants::{
    PARAM_IDS, PARAM_REPORT_DIR, PARAM_REPORT_LOCALE, PARAM_SOURCES_DIR, PARAM_STANDARD_DIR,
    PARAM_SUBREPORT_DIR,
};
use crate::core::error::{ReportError, Result};
use crate::datagen;
use crate::engine::{ConnectionBundle, RenderEngine, SubreportBinding, Value};
use crate::resolver::TemplateResolver;
use crate::store::{Record, RecordStore, ReportTemplate, TemplateStore};
use crate::template::TemplateMeta;
use crate::utils::fs;

/// Ambient facts of one render request: locale and acting user.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Locale the report is rendered in.
    pub locale: String,
    /// The acting user's record; header feeds are seeded with it.
    pub user: Record,
}

impl RenderContext {
    /// Context with a locale and the given acting user.
    pub fn new(locale: &str, user: Record) -> Self {
        Self { locale: locale.to_string(), user }
    }

    /// Context without a meaningful acting user (batch jobs, tests).
    pub fn anonymous(locale: &str) -> Self {
        Self::new(
            locale,
            Record { id: 0, rec_name: String::new(), fields: serde_json::Map::new() },
        )
    }
}

/// One engine invocation's result.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Output format token.
    pub format: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Engine-reported page count.
    pub pages: u32,
}

/// Temporary files of one render, removed when the set drops.
///
/// Cleanup is best-effort on every exit path; a file that cannot be removed
/// is logged and left behind, never failing the render.
struct TempSet {
    files: Vec<PathBuf>,
    unlink: bool,
}

impl TempSet {
    fn new(unlink: bool) -> Self {
        Self { files: Vec::new(), unlink }
    }

    fn add(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    fn extend(&mut self, paths: &[PathBuf]) {
        self.files.extend_from_slice(paths);
    }
}

impl Drop for TempSet {
    fn drop(&mut self) {
        if !self.unlink {
            debug!(count = self.files.len(), "keeping temporary files");
            return;
        }
        for file in &self.files {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(file = %file.display(), error = %e, "could not remove temporary file"),
            }
        }
    }
}

/// Drives single engine invocations. Borrowed wiring from the composition
/// root; one instance per service, shared across requests.
pub struct Renderer<'a> {
    /// Pipeline configuration.
    pub config: &'a Config,
    /// Template resolver (owns the path cache).
    pub resolver: &'a TemplateResolver,
    /// Template store, for sub-template lookups during feed generation.
    pub templates: &'a dyn TemplateStore,
    /// Record store, for query-based feeds and the connection descriptor.
    pub records: &'a dyn RecordStore,
    /// The engine capability.
    pub engine: &'a dyn RenderEngine,
}

impl Renderer<'_> {
    /// Render one document over the request's record ids.
    pub fn render(
        &self,
        template: &ReportTemplate,
        request: &RenderRequest,
        ctx: &RenderContext,
    ) -> Result<Rendered> {
        let output_format =
            request.output_format.clone().unwrap_or_else(|| template.extension.clone());

        let mut temp = TempSet::new(self.config.unlink);
        let data_file = fs::keep_temp_file()?;
        temp.add(data_file.clone());
        let output_file = fs::keep_temp_file()?;
        temp.add(output_file.clone());
        debug!(data_file = %data_file.display(), "allocated temporary data file");

        let start = Instant::now();

        let report_path = self.resolver.resolve(template, None)?;
        let meta = TemplateMeta::parse(&template.content)?;
        let model = template.model.as_deref().or(request.model.as_deref());

        if meta.needs_tabular_feed() {
            let mut generator =
                datagen::dispatch(&meta, &request.source, model, &request.ids, ctx)?;
            generator.generate(self.records, &data_file)?;
            temp.extend(generator.temp_files());
        }

        let bindings = self.generate_subreport_feeds(&meta, &report_path, request, model, ctx, &mut temp)?;

        let descriptor = self.records.descriptor();
        let connection = ConnectionBundle {
            output: output_format.clone(),
            data_file: data_file.clone(),
            dsn: descriptor.dsn(),
            user: descriptor.user_name(),
            password: descriptor.password(),
            subreports: bindings,
        };
        let parameters = self.parameters(template, &report_path, request, ctx);

        let pages = self.engine.invoke(&report_path, &output_file, &connection, &parameters)?;

        let bytes = fs::read_bytes(&output_file)?;
        info!(
            report = %template.report_name,
            pages,
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "render complete"
        );
        Ok(Rendered { format: output_format, bytes, pages })
    }

    /// Generate one feed per sub-template that declares tabular data.
    fn generate_subreport_feeds(
        &self,
        meta: &TemplateMeta,
        report_path: &Path,
        request: &RenderRequest,
        model: Option<&str>,
        ctx: &RenderContext,
        temp: &mut TempSet,
    ) -> Result<Vec<SubreportBinding>> {
        let staging_dir = report_path.parent().unwrap_or_else(|| Path::new("."));
        let mut bindings = Vec::new();
        for element in &meta.subreports {
            let name = element.template_name();
            let sub = self
                .templates
                .by_name(name)?
                .ok_or_else(|| ReportError::SubreportNotFound { name: name.to_string() })?;
            let sub_meta = TemplateMeta::parse(&sub.content)?;
            if !sub_meta.needs_tabular_feed() {
                continue;
            }
            let Some(parameter) = element.parameter.clone() else {
                warn!(subreport = name, "no data-source parameter; feed skipped");
                continue;
            };

            let sub_data = fs::keep_temp_file()?;
            temp.add(sub_data.clone());
            debug!(subreport = name, parameter, data_file = %sub_data.display(),
                "generating sub-template feed");

            let mut generator =
                datagen::dispatch(&sub_meta, &request.source, model, &request.ids, ctx)?;
            generator.generate(self.records, &sub_data)?;
            temp.extend(generator.temp_files());

            bindings.push(SubreportBinding {
                parameter,
                data_file: sub_data,
                template_file: staging_dir.join(sub.file_name()),
            });
        }
        Ok(bindings)
    }

    /// Assemble the engine parameter map; caller overrides win.
    fn parameters(
        &self,
        template: &ReportTemplate,
        report_path: &Path,
        request: &RenderRequest,
        ctx: &RenderContext,
    ) -> BTreeMap<String, Value> {
        let report_dir = report_path.parent().unwrap_or_else(|| Path::new("."));
        let sources_dir = {
            let relative = Path::new(&template.path).parent().unwrap_or_else(|| Path::new(""));
            with_separator(&self.config.sources_root.join(relative))
        };

        let mut params = BTreeMap::new();
        params.insert(
            PARAM_STANDARD_DIR.to_string(),
            Value::from(self.config.sources_root.display().to_string()),
        );
        params.insert(PARAM_REPORT_LOCALE.to_string(), Value::from(ctx.locale.clone()));
        params.insert(
            PARAM_IDS.to_string(),
            Value::List(request.ids.iter().map(|id| Value::Int(*id)).collect()),
        );
        params.insert(PARAM_SOURCES_DIR.to_string(), Value::from(sources_dir));
        params.insert(PARAM_SUBREPORT_DIR.to_string(), Value::from(with_separator(report_dir)));
        params.insert(PARAM_REPORT_DIR.to_string(), Value::from(report_dir.display().to_string()));
        for (key, value) in &request.parameters {
            params.insert(key.clone(), value.clone());
        }
        params
    }
}

/// Directory path with a trailing separator; the engine concatenates file
/// names onto it verbatim.
fn with_separator(dir: &Path) -> String {
    let mut s = dir.display().to_string();
    if !s.ends_with(MAIN_SEPARATOR) {
        s.push(MAIN_SEPARATOR);
    }
    s
}
