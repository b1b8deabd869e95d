//! Constants shared across the rendering pipeline.
//!
//! These are wire- and file-format contracts of the external rendering
//! engine: the markup tags scanned during resolution, the file suffixes of
//! source and compiled templates, and the parameter keys of the RPC call.
//! Defining them centrally keeps the format knowledge out of the
//! orchestration logic.

/// File suffix of source template files written to the staging directory.
pub const TEMPLATE_SUFFIX: &str = ".jrxml";

/// File suffix used by nested-template references inside template content.
///
/// References point at the engine's compiled form; the name before this
/// suffix is the lookup key into the template store.
pub const COMPILED_SUFFIX: &str = ".jasper";

/// File suffix of the per-language label tables staged next to a template.
pub const LABELS_SUFFIX: &str = ".properties";

/// Tag pair scanned for nested-template references.
///
/// The body is an embedded expression holding a quoted file name ending in
/// [`COMPILED_SUFFIX`], e.g. `$P{SUBREPORT_DIR} + "invoice_lines.jasper"`.
pub const SUBREPORT_PATTERN: &str = "(?s)<subreportExpression>.*?</subreportExpression>";

/// Engine parameter: directory of the engine's standard resources.
pub const PARAM_STANDARD_DIR: &str = "STANDARD_DIR";
/// Engine parameter: locale the report is rendered in.
pub const PARAM_REPORT_LOCALE: &str = "REPORT_LOCALE";
/// Engine parameter: the record ids covered by the render.
pub const PARAM_IDS: &str = "IDS";
/// Engine parameter: directory of the original template sources.
pub const PARAM_SOURCES_DIR: &str = "SOURCES_DIR";
/// Engine parameter: staging directory holding resolved sub-templates,
/// with a trailing path separator as the engine concatenates file names.
pub const PARAM_SUBREPORT_DIR: &str = "SUBREPORT_DIR";
/// Engine parameter: directory of the resolved main template.
pub const PARAM_REPORT_DIR: &str = "REPORT_DIR";

/// Format token of zipped multi-record output.
pub const FORMAT_ZIP: &str = "zip";

/// Maximum filename stem length.
///
/// Windows and its office suite reject longer names in common setups; 255
/// chars is the hard path+name limit, 40 keeps headroom for directories.
pub const FILENAME_MAX: usize = 40;

/// Maximum number of record labels folded into a zip archive's filename.
pub const ZIP_FILENAME_LABELS: usize = 5;
