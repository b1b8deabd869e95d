//! Tabular data generation.
//!
//! Templates declaring the tabular data language consume a generated CSV
//! feed. The strategy is a tagged variant selected once per template node:
//! record-based when the caller already holds the record snapshots, or
//! query-based when the rows must be re-fetched by record type and ids. A
//! page-header node is special-cased to a record-based feed seeded with
//! exactly the acting-user record.
//!
//! Columns are the template's declared field paths; a dotted path walks the
//! record's field tree. Binary field values are spilled to temporary files
//! and the cell carries the file path instead, so the engine can load the
//! payload (e.g. an image) from disk. Spilled files are owned by the
//! generator and must be collected by the caller for cleanup - generation
//! never deletes anything itself.
//!
//! All generation happens before the engine call; nothing is deferred past
//! the RPC boundary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use tracing::debug;

use crate::DataSource;
use crate::core::error::Result;
use crate::render::RenderContext;
use crate::store::{Record, RecordId, RecordStore};
use crate::template::TemplateMeta;
use crate::utils::fs;

/// Key marking a JSON object field value as a binary payload.
const BINARY_KEY: &str = "binary";

/// How the rows of one feed are obtained.
#[derive(Debug, Clone)]
enum Strategy {
    /// Serialize record snapshots already in hand.
    RecordBased { records: Vec<Record> },
    /// Re-fetch rows for a record type and id list at generation time.
    QueryBased { model: String, ids: Vec<RecordId> },
}

/// Generator for one template node's tabular feed.
#[derive(Debug)]
pub struct DataGenerator {
    strategy: Strategy,
    fields: Vec<String>,
    temp_files: Vec<PathBuf>,
}

/// Pick the generation strategy for a template node.
///
/// A header node always gets a record-based feed of the acting user,
/// regardless of the parent's mode. Otherwise the caller's data source
/// decides: explicit records, or a query over `model` and `ids`.
pub fn dispatch(
    meta: &TemplateMeta,
    source: &DataSource,
    model: Option<&str>,
    ids: &[RecordId],
    ctx: &RenderContext,
) -> Result<DataGenerator> {
    let strategy = if meta.is_header {
        Strategy::RecordBased { records: vec![ctx.user.clone()] }
    } else {
        match source {
            DataSource::Records(records) => Strategy::RecordBased { records: records.clone() },
            DataSource::Model => {
                let model = model.context("report declares no record type to query")?;
                Strategy::QueryBased { model: model.to_string(), ids: ids.to_vec() }
            }
        }
    };
    Ok(DataGenerator { strategy, fields: meta.fields.clone(), temp_files: Vec::new() })
}

impl DataGenerator {
    /// Write the tabular payload to `target`.
    pub fn generate(&mut self, store: &dyn RecordStore, target: &Path) -> Result<()> {
        let rows = match &self.strategy {
            Strategy::RecordBased { records } => records.clone(),
            Strategy::QueryBased { model, ids } => store.fetch(model, ids)?,
        };
        debug!(rows = rows.len(), columns = self.fields.len(), target = %target.display(),
            "generating tabular feed");

        let fields = self.fields.clone();
        let mut writer = csv::Writer::from_path(target)
            .with_context(|| format!("failed to open data file: {}", target.display()))?;
        writer.write_record(&fields)?;
        for record in &rows {
            let mut cells = Vec::with_capacity(fields.len());
            for field in &fields {
                cells.push(self.render_cell(record, field)?);
            }
            writer.write_record(&cells)?;
        }
        writer.flush().context("failed to flush data file")?;
        Ok(())
    }

    /// Temporary files created while generating (spilled binary payloads).
    /// The caller is responsible for removing them after the render.
    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    fn render_cell(&mut self, record: &Record, field: &str) -> Result<String> {
        match lookup(record, field) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Object(map)) if map.contains_key(BINARY_KEY) => {
                self.spill_binary(&map[BINARY_KEY])
            }
            // Compound values pass through as JSON; the template decides
            // what to do with them.
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Decode a base64 payload into a temp file and return its path.
    fn spill_binary(&mut self, payload: &Value) -> Result<String> {
        let encoded = payload.as_str().unwrap_or("");
        let bytes = BASE64.decode(encoded).context("invalid base64 in binary field")?;
        let path = fs::keep_temp_file()?;
        fs::write_bytes(&path, &bytes)?;
        let cell = path.display().to_string();
        self.temp_files.push(path);
        Ok(cell)
    }
}

/// Resolve a dotted field path against a record.
///
/// `id` and `rec_name` resolve to the record's identity unless shadowed by
/// an explicit field of the same name.
fn lookup<'a>(record: &'a Record, path: &str) -> Option<Value> {
    let mut parts = path.split('.');
    let head = parts.next()?;
    let mut current: &'a Value = match record.fields.get(head) {
        Some(v) => v,
        None if head == "id" => return Some(Value::from(record.id)),
        None if head == "rec_name" => return Some(Value::from(record.rec_name.clone())),
        None => return None,
    };
    for part in parts {
        current = current.get(part)?;
    }
    Some(current.clone())
}
