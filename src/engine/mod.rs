//! The external rendering engine as a capability.
//!
//! The pipeline never assumes how the engine is reached; everything it
//! needs is behind [`RenderEngine::invoke`], which takes the resolved
//! template path, the output file the engine must fill, the database
//! [`ConnectionBundle`], and a flat parameter map. The production adapter
//! ([`xmlrpc::XmlRpcEngine`]) speaks XML-RPC to a long-lived out-of-process
//! engine; tests implement the trait directly.
//!
//! The engine's process lifecycle is not managed here - the adapter only
//! locates the service via its configured port and pid file. A connection
//! failure or an engine-reported fault surfaces as an error and is never
//! retried.

pub mod xmlrpc;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::error::Result;

/// A parameter value in the engine call contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String scalar.
    Str(String),
    /// Integer scalar.
    Int(i64),
    /// Boolean scalar.
    Bool(bool),
    /// Ordered list.
    List(Vec<Value>),
    /// Nested key/value structure.
    Struct(BTreeMap<String, Value>),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Data feed binding of one sub-template.
#[derive(Debug, Clone)]
pub struct SubreportBinding {
    /// Engine parameter the sub-template reads its feed from.
    pub parameter: String,
    /// Generated data file.
    pub data_file: PathBuf,
    /// Resolved sub-template file.
    pub template_file: PathBuf,
}

/// Everything the engine needs to connect to its data.
#[derive(Debug, Clone)]
pub struct ConnectionBundle {
    /// Requested output format token.
    pub output: String,
    /// Generated data file of the main template.
    pub data_file: PathBuf,
    /// Database connection string.
    pub dsn: String,
    /// Database user.
    pub user: String,
    /// Database password; empty when the descriptor carries none.
    pub password: String,
    /// Sub-template data bindings.
    pub subreports: Vec<SubreportBinding>,
}

impl ConnectionBundle {
    /// The bundle as an engine parameter structure, using the wire names of
    /// the call contract.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("output".to_string(), Value::from(self.output.clone()));
        map.insert("dataFile".to_string(), Value::from(self.data_file.display().to_string()));
        map.insert("dsn".to_string(), Value::from(self.dsn.clone()));
        map.insert("user".to_string(), Value::from(self.user.clone()));
        map.insert("password".to_string(), Value::from(self.password.clone()));
        let subs = self
            .subreports
            .iter()
            .map(|s| {
                let mut sub = BTreeMap::new();
                sub.insert("parameter".to_string(), Value::from(s.parameter.clone()));
                sub.insert("dataFile".to_string(), Value::from(s.data_file.display().to_string()));
                sub.insert(
                    "templateFile".to_string(),
                    Value::from(s.template_file.display().to_string()),
                );
                Value::Struct(sub)
            })
            .collect();
        map.insert("subreports".to_string(), Value::List(subs));
        Value::Struct(map)
    }
}

/// The rendering engine capability.
pub trait RenderEngine: Send + Sync {
    /// Render `template` into `output` and return the page count.
    fn invoke(
        &self,
        template: &Path,
        output: &Path,
        connection: &ConnectionBundle,
        parameters: &BTreeMap<String, Value>,
    ) -> Result<u32>;
}
