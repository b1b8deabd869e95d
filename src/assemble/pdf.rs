//! PDF merging and optional compaction.
//!
//! Batch-print flows render documents independently and need them combined
//! into one multi-page PDF. [`merge`] concatenates the page streams of the
//! inputs in order. With compaction enabled, the merged document is handed
//! to the external `gs` optimizer, which typically deduplicates embedded
//! images (a 17 MB batch can come back under 2 MB); any optimizer failure
//! falls back to the merged-but-uncompacted bytes so output is never
//! corrupted by the optimization step.

use std::collections::BTreeMap;
use std::process::Command;

use anyhow::Context;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::core::error::Result;

/// Merge PDF documents into one, pages in input order.
///
/// `compact` routes the result through the external optimizer; on any
/// optimizer failure the uncompacted merge is returned instead.
pub fn merge(documents: &[Vec<u8>], compact: bool) -> Result<Vec<u8>> {
    anyhow::ensure!(!documents.is_empty(), "no documents to merge");

    let mut max_id = 1;
    let mut merged_pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut merged_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for bytes in documents {
        let mut doc = Document::load_mem(bytes).context("input is not a valid PDF")?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        for (_, object_id) in doc.get_pages() {
            let object =
                doc.get_object(object_id).context("page object missing from input")?.clone();
            merged_pages.push((object_id, object));
        }
        merged_objects.extend(doc.objects.clone());
    }

    let mut target = Document::with_version("1.5");
    let mut pages_root: Option<(ObjectId, Object)> = None;
    let mut catalog_root: Option<(ObjectId, Object)> = None;

    for (object_id, object) in &merged_objects {
        let type_name = object
            .as_dict()
            .ok()
            .and_then(|d| d.get(b"Type").ok())
            .and_then(|t| t.as_name().ok());
        match type_name {
            Some(b"Catalog") => {
                if catalog_root.is_none() {
                    catalog_root = Some((*object_id, object.clone()));
                }
            }
            Some(b"Pages") => {
                // Fold page-tree dictionaries together so inherited
                // resources survive the merge.
                if let Ok(dict) = object.as_dict() {
                    let mut dict = dict.clone();
                    if let Some((_, ref existing)) = pages_root {
                        if let Ok(old) = existing.as_dict() {
                            dict.extend(old);
                        }
                    }
                    pages_root = Some((*object_id, Object::Dictionary(dict)));
                }
            }
            // Pages are re-parented below; navigation trees are dropped.
            Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
            _ => {
                target.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_object) = pages_root.context("merged input has no page tree")?;
    let (catalog_id, catalog_object) = catalog_root.context("merged input has no catalog")?;

    for (object_id, object) in &merged_pages {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            target.objects.insert(*object_id, Object::Dictionary(dict));
        }
    }

    if let Ok(dict) = pages_object.as_dict() {
        let mut dict = dict.clone();
        dict.set("Count", merged_pages.len() as i64);
        dict.set(
            "Kids",
            merged_pages.iter().map(|(id, _)| Object::Reference(*id)).collect::<Vec<_>>(),
        );
        target.objects.insert(pages_id, Object::Dictionary(dict));
    }
    if let Ok(dict) = catalog_object.as_dict() {
        let mut dict = dict.clone();
        dict.set("Pages", pages_id);
        dict.remove(b"Outlines");
        target.objects.insert(catalog_id, Object::Dictionary(dict));
    }

    target.trailer.set("Root", catalog_id);
    target.max_id = max_id;
    target.renumber_objects();
    target.compress();

    let mut merged = Vec::new();
    target.save_to(&mut merged).context("failed to serialize merged PDF")?;
    debug!(inputs = documents.len(), pages = merged_pages.len(), bytes = merged.len(),
        "merged documents");

    if compact {
        match compact_with_optimizer(&merged) {
            Some(compacted) => return Ok(compacted),
            None => warn!("PDF optimizer failed; returning uncompacted merge"),
        }
    }
    Ok(merged)
}

/// Page count of a PDF document.
pub fn page_count(pdf: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(pdf).context("input is not a valid PDF")?;
    Ok(doc.get_pages().len())
}

/// Run the external optimizer over merged bytes. `None` on any failure.
fn compact_with_optimizer(merged: &[u8]) -> Option<Vec<u8>> {
    let dir = tempfile::tempdir().ok()?;
    let merged_path = dir.path().join("merged.pdf");
    let compacted_path = dir.path().join("compacted.pdf");
    std::fs::write(&merged_path, merged).ok()?;

    let status = Command::new(optimizer_command())
        .args(["-q", "-dBATCH", "-dNOPAUSE", "-dSAFER", "-sDEVICE=pdfwrite",
            "-dPDFSETTINGS=/prepress"])
        .arg(format!("-sOutputFile={}", compacted_path.display()))
        .arg(&merged_path)
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }
    std::fs::read(&compacted_path).ok()
}

/// The optimizer executable; overridable so tests can substitute a script.
fn optimizer_command() -> String {
    std::env::var("RAPPORT_PDF_OPTIMIZER").unwrap_or_else(|_| "gs".to_string())
}
