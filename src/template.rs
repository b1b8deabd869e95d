//! Introspection of the engine's markup-based template format.
//!
//! The orchestration layer needs four facts about a template before it can
//! drive a render: which data language it declares (only `xpath` templates
//! consume a generated tabular feed), which field paths its columns bind to,
//! whether it is a page-header feed, and which sub-templates it embeds with
//! which data-source parameter. [`TemplateMeta::parse`] pulls exactly those
//! facts out of the raw content and nothing else; the layout semantics of
//! the markup stay with the engine.

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;

use crate::core::error::{ReportError, Result};

/// Declared data language of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLanguage {
    /// The engine reads a generated tabular file through xpath bindings;
    /// the pipeline must produce a data feed before invoking the engine.
    Xpath,
    /// Any engine-side query language; no generated feed is needed.
    Other(String),
}

/// A sub-template element found in a parent template.
#[derive(Debug, Clone)]
pub struct SubreportElement {
    /// Referenced file name as quoted in the embedded expression,
    /// e.g. `invoice_lines.jasper`.
    pub reference: String,
    /// Engine parameter the sub-template reads its data feed from,
    /// extracted from the element's data-source expression.
    pub parameter: Option<String>,
}

impl SubreportElement {
    /// The template-store lookup name: the reference with the compiled-file
    /// suffix stripped.
    pub fn template_name(&self) -> &str {
        self.reference
            .strip_suffix(crate::constants::COMPILED_SUFFIX)
            .unwrap_or(&self.reference)
    }
}

/// The orchestration-relevant facts of one template.
#[derive(Debug, Clone)]
pub struct TemplateMeta {
    /// Declared data language.
    pub language: DataLanguage,
    /// Declared field paths, in declaration order. These become the columns
    /// of the generated tabular feed.
    pub fields: Vec<String>,
    /// Whether this template renders a page header. Header feeds are always
    /// seeded with the acting-user record.
    pub is_header: bool,
    /// Embedded sub-template elements, in document order.
    pub subreports: Vec<SubreportElement>,
}

impl TemplateMeta {
    /// Whether a tabular data feed must be generated for this template.
    pub fn needs_tabular_feed(&self) -> bool {
        self.language == DataLanguage::Xpath
    }

    /// Parse template content.
    ///
    /// Unknown elements are skipped; the parser only fails on malformed
    /// markup, not on missing declarations. A template without a
    /// `queryString` defaults to the `xpath` data language.
    pub fn parse(content: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(content);
        reader.config_mut().trim_text(true);

        let mut meta = Self {
            language: DataLanguage::Xpath,
            fields: Vec::new(),
            is_header: false,
            subreports: Vec::new(),
        };

        // $P{NAME} inside a data-source expression names the feed parameter.
        let param_re = Regex::new(r"\$P\{([A-Za-z0-9_]+)\}").expect("static pattern");

        let mut in_subreport = false;
        let mut capture: Option<Capture> = None;
        let mut pending = SubreportElement { reference: String::new(), parameter: None };
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| ReportError::TemplateParse { reason: e.to_string() })?;
            let empty = matches!(&event, Event::Empty(_));
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    match e.local_name().as_ref() {
                        b"queryString" => {
                            if let Some(lang) = attr(e, b"language")? {
                                meta.language = match lang.to_ascii_lowercase().as_str() {
                                    "xpath" => DataLanguage::Xpath,
                                    _ => DataLanguage::Other(lang),
                                };
                            }
                        }
                        b"field" => {
                            if let Some(name) = attr(e, b"name")? {
                                meta.fields.push(name);
                            }
                        }
                        b"property" => {
                            if attr(e, b"name")?.as_deref() == Some("isHeader") {
                                meta.is_header = attr(e, b"value")?.as_deref() == Some("true");
                            }
                        }
                        b"subreport" if !empty => {
                            in_subreport = true;
                            pending = SubreportElement { reference: String::new(), parameter: None };
                        }
                        b"subreportExpression" if in_subreport && !empty => {
                            capture = Some(Capture::Reference);
                        }
                        b"dataSourceExpression" if in_subreport && !empty => {
                            capture = Some(Capture::Parameter);
                        }
                        _ => {}
                    }
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ReportError::TemplateParse { reason: e.to_string() })?;
                    apply_capture(&capture, &text, &mut pending, &param_re);
                }
                Event::CData(ref t) => {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    apply_capture(&capture, &text, &mut pending, &param_re);
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"subreportExpression" | b"dataSourceExpression" => capture = None,
                    b"subreport" => {
                        in_subreport = false;
                        if !pending.reference.is_empty() {
                            meta.subreports.push(std::mem::replace(
                                &mut pending,
                                SubreportElement { reference: String::new(), parameter: None },
                            ));
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(meta)
    }
}

enum Capture {
    Reference,
    Parameter,
}

fn apply_capture(
    capture: &Option<Capture>,
    text: &str,
    pending: &mut SubreportElement,
    param_re: &Regex,
) {
    match capture {
        Some(Capture::Reference) => {
            // The expression concatenates a directory parameter with a quoted
            // file name; the quoted segment is the reference.
            if let Some(name) = text.split('"').nth(1) {
                pending.reference = name.to_string();
            }
        }
        Some(Capture::Parameter) => {
            if let Some(m) = param_re.captures(text) {
                pending.parameter = Some(m[1].to_string());
            }
        }
        None => {}
    }
}

fn attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|e| ReportError::TemplateParse { reason: e.to_string() })?;
        if a.key.local_name().as_ref() == key {
            let value = a
                .unescape_value()
                .map_err(|e| ReportError::TemplateParse { reason: e.to_string() })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
