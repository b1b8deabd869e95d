//! XML-RPC adapter for the out-of-process rendering engine.
//!
//! The engine runs as a long-lived service listening on a configured local
//! port; it records its process id in a pid file so operators (and this
//! adapter's liveness warning) can find it. One call, `Report.execute`,
//! does all the work: it takes the connection structure, the resolved
//! template path, the output file path, and the parameter structure, and
//! answers with the rendered page count or a fault.
//!
//! Transport failures map to [`ReportError::EngineUnavailable`]; faults the
//! engine reports map to [`ReportError::EngineFault`]. Neither is retried.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use super::{ConnectionBundle, RenderEngine, Value};
use crate::core::error::{ReportError, Result};

/// Method invoked on the engine service.
const METHOD: &str = "Report.execute";

/// XML-RPC client for the rendering engine.
pub struct XmlRpcEngine {
    port: u16,
    pid_file: PathBuf,
    client: reqwest::blocking::Client,
}

impl XmlRpcEngine {
    /// Create a client for the engine listening on `port`.
    pub fn new(port: u16, pid_file: PathBuf) -> Self {
        Self { port, pid_file, client: reqwest::blocking::Client::new() }
    }

    fn endpoint(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }
}

impl RenderEngine for XmlRpcEngine {
    fn invoke(
        &self,
        template: &Path,
        output: &Path,
        connection: &ConnectionBundle,
        parameters: &BTreeMap<String, Value>,
    ) -> Result<u32> {
        if !self.pid_file.is_file() {
            // The engine may still be reachable (freshly started, pid file
            // elsewhere); the connection attempt below is authoritative.
            warn!(pid_file = %self.pid_file.display(), "engine pid file not found");
        }

        let body = encode_call(
            METHOD,
            &[
                connection.to_value(),
                Value::from(template.display().to_string()),
                Value::from(output.display().to_string()),
                Value::Struct(parameters.clone()),
            ],
        );
        debug!(port = self.port, template = %template.display(), "invoking render engine");

        let response = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|e| ReportError::EngineUnavailable { port: self.port, reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::EngineUnavailable {
                port: self.port,
                reason: format!("HTTP {status}"),
            }
            .into());
        }
        let text = response.text().map_err(|e| ReportError::EngineUnavailable {
            port: self.port,
            reason: e.to_string(),
        })?;
        decode_response(&text)
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Str(s) => {
            let _ = write!(out, "<string>{}</string>", escape_xml(s));
        }
        Value::Int(i) => {
            let _ = write!(out, "<int>{i}</int>");
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::List(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape_xml(name));
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

/// Serialize a method call envelope.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall>");
    let _ = write!(out, "<methodName>{}</methodName><params>", escape_xml(method));
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Parse a method response into a page count, or surface the fault.
pub fn decode_response(xml: &str) -> Result<u32> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_fault = false;
    let mut in_int = false;
    let mut in_string = false;
    let mut pages: Option<u32> = None;
    let mut fault_text = String::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ReportError::EngineFault { message: format!("bad response: {e}") })?;
        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"fault" => in_fault = true,
                b"int" | b"i4" => in_int = true,
                b"string" => in_string = true,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"fault" => in_fault = false,
                b"int" | b"i4" => in_int = false,
                b"string" => in_string = false,
                _ => {}
            },
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| ReportError::EngineFault { message: format!("bad response: {e}") })?;
                if in_fault && in_string {
                    fault_text.push_str(&text);
                } else if !in_fault && in_int && pages.is_none() {
                    pages = text.trim().parse().ok();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !fault_text.is_empty() {
        return Err(ReportError::EngineFault { message: fault_text }.into());
    }
    pages.ok_or_else(|| {
        ReportError::EngineFault { message: "response carries no page count".into() }.into()
    })
}
