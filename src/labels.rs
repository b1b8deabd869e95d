//! Per-language label tables.
//!
//! For every active language, the resolver stages a flat `key=value` table
//! next to the template so the engine can render localized labels. The file
//! format is the engine's property-table contract: one pair per line, every
//! character of both key and value written as a `\uXXXX` escape, which keeps
//! the table safe regardless of delimiters or control characters in the
//! source strings.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::constants::LABELS_SUFFIX;
use crate::core::error::Result;
use crate::store::TranslationStore;
use crate::utils::fs;

/// Escape a string for the engine's property-table format.
fn escape(data: &str) -> String {
    let mut out = String::with_capacity(data.len() * 6);
    for c in data.chars() {
        // Outside the BMP this widens past four digits; the engine's
        // decoder accepts that.
        let _ = write!(out, "\\u{:04x}", c as u32);
    }
    out
}

/// Serialize one key→value table into property format.
///
/// Empty values fall back to the key itself, so untranslated labels render
/// as their source string instead of a blank.
pub fn write_properties(path: &Path, pairs: &[(String, String)]) -> Result<()> {
    let mut out = String::new();
    for (key, value) in pairs {
        let value = if value.is_empty() { key } else { value };
        out.push_str(&escape(key));
        out.push('=');
        out.push_str(&escape(value));
        out.push('\n');
    }
    fs::write_bytes(path, out.as_bytes())
}

/// Materialize one label table per active language.
///
/// `keys` are the source strings registered against the template's report
/// name; a missing or empty translation falls back to the key. Files are
/// named `<basename>_<language-lowercased>.properties` inside `dir`.
pub fn materialize(
    translations: &dyn TranslationStore,
    basename: &str,
    dir: &Path,
    keys: &BTreeSet<String>,
) -> Result<()> {
    for language in translations.languages()? {
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            let text = translations.translate(&language.code, key)?.unwrap_or_default();
            pairs.push((key.clone(), text));
        }
        let file = dir.join(format!(
            "{basename}_{}{LABELS_SUFFIX}",
            language.code.to_lowercase()
        ));
        debug!(language = %language.code, file = %file.display(), "writing label table");
        write_properties(&file, &pairs)?;
    }
    Ok(())
}
