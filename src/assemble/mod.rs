//! Output assembly.
//!
//! Applies the "one document per record" vs. "one document for all records"
//! policy and packages the result. A template flagged `single` with more
//! than one requested record renders each record separately and packs the
//! documents into a zip archive; everything else is a single engine
//! invocation returned directly. Filenames are slugged and length-capped so
//! the documents open cleanly on picky platforms.
//!
//! PDF merging for batch flows lives in [`pdf`].

pub mod pdf;

use std::io::{Cursor, Write as _};

use tracing::debug;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::constants::{FILENAME_MAX, FORMAT_ZIP, ZIP_FILENAME_LABELS};
use crate::core::error::Result;
use crate::render::{RenderContext, Renderer};
use crate::service::Delivery;
use crate::store::{Record, RecordStore, ReportTemplate};
use crate::utils::text::{slugify, truncate};
use crate::{DataSource, RenderRequest};

/// Render a request and package the output.
///
/// Returns the finished document (or archive) with its direct-print flag
/// and computed filename. The page count is populated for single documents;
/// archives have none.
pub fn assemble(
    renderer: &Renderer<'_>,
    template: &ReportTemplate,
    request: &RenderRequest,
    ctx: &RenderContext,
    records: &dyn RecordStore,
) -> Result<Delivery> {
    let stem = truncate(&slugify(&template.name), FILENAME_MAX);

    if template.single && request.ids.len() > 1 {
        return assemble_zip(renderer, template, request, ctx, records, &stem);
    }

    let rendered = renderer.render(template, request, ctx)?;
    Ok(Delivery {
        kind: rendered.format,
        bytes: rendered.bytes,
        direct_print: template.direct_print,
        filename: stem,
        pages: Some(rendered.pages),
    })
}

/// Render one document per record id and pack them into a zip archive.
fn assemble_zip(
    renderer: &Renderer<'_>,
    template: &ReportTemplate,
    request: &RenderRequest,
    ctx: &RenderContext,
    records: &dyn RecordStore,
    stem: &str,
) -> Result<Delivery> {
    let labels = record_labels(template, request, records)?;

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(&mut cursor);
    let options = SimpleFileOptions::default();

    for (index, id) in request.ids.iter().enumerate() {
        let single_request = RenderRequest {
            ids: vec![*id],
            source: narrow_source(&request.source, *id),
            ..request.clone()
        };
        let rendered = renderer.render(template, &single_request, ctx)?;

        let label = labels.get(index).cloned().unwrap_or_else(|| id.to_string());
        let entry_stem =
            truncate(&format!("{}-{}", slugify(&template.name), slugify(&label)), FILENAME_MAX);
        let entry = format!("{entry_stem}.{}", rendered.format);
        debug!(entry = %entry, "adding archive entry");
        writer.start_file(entry, options)?;
        writer.write_all(&rendered.bytes)?;
    }
    writer.finish()?;

    let suffix = labels
        .iter()
        .take(ZIP_FILENAME_LABELS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("-");
    let filename = truncate(&slugify(&format!("{}-{suffix}", template.name)), FILENAME_MAX);

    Ok(Delivery {
        kind: FORMAT_ZIP.to_string(),
        bytes: cursor.into_inner(),
        direct_print: false,
        filename,
        pages: None,
    })
}

/// Display labels of the requested records, in id order.
fn record_labels(
    template: &ReportTemplate,
    request: &RenderRequest,
    records: &dyn RecordStore,
) -> Result<Vec<String>> {
    if let DataSource::Records(rows) = &request.source {
        return Ok(request
            .ids
            .iter()
            .map(|id| {
                rows.iter()
                    .find(|r| r.id == *id)
                    .map(|r| r.rec_name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect());
    }
    let model = template.model.as_deref().or(request.model.as_deref());
    let rows: Vec<Record> = match model {
        Some(model) => records.fetch(model, &request.ids)?,
        None => Vec::new(),
    };
    Ok(request
        .ids
        .iter()
        .map(|id| {
            rows.iter()
                .find(|r| r.id == *id)
                .map(|r| r.rec_name.clone())
                .unwrap_or_else(|| id.to_string())
        })
        .collect())
}

/// Narrow a record-based source to one record for a per-record render.
fn narrow_source(source: &DataSource, id: crate::store::RecordId) -> DataSource {
    match source {
        DataSource::Model => DataSource::Model,
        DataSource::Records(rows) => {
            DataSource::Records(rows.iter().filter(|r| r.id == id).cloned().collect())
        }
    }
}
