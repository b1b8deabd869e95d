//! In-memory collaborator store.
//!
//! Implements every collaborator trait against plain maps. This is the
//! backend the test suites run on, and doubles as a reference for wiring the
//! traits to a real storage layer.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::Result;

use super::{
    Language, Record, RecordId, RecordStore, ReportTemplate, StorageDescriptor, TemplateId,
    TemplateStore, TranslationStore,
};

/// Map-backed implementation of the collaborator traits.
pub struct MemoryStore {
    templates: RwLock<HashMap<u64, ReportTemplate>>,
    languages: RwLock<Vec<Language>>,
    report_keys: RwLock<HashMap<String, BTreeSet<String>>>,
    translations: RwLock<HashMap<(String, String), String>>,
    records: RwLock<HashMap<String, Vec<Record>>>,
    descriptor: StorageDescriptor,
}

impl MemoryStore {
    /// Create an empty store with the given connection descriptor.
    pub fn new(uri: &str, database: &str) -> Result<Self> {
        Ok(Self {
            templates: RwLock::new(HashMap::new()),
            languages: RwLock::new(Vec::new()),
            report_keys: RwLock::new(HashMap::new()),
            translations: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
            descriptor: StorageDescriptor::new(uri, database)?,
        })
    }

    /// Register a template.
    pub fn add_template(&self, template: ReportTemplate) {
        self.templates.write().unwrap().insert(template.id.0, template);
    }

    /// Register an active translatable language.
    pub fn add_language(&self, code: &str) {
        self.languages.write().unwrap().push(Language { code: code.to_string() });
    }

    /// Register a label source string for a report.
    pub fn add_report_key(&self, report_name: &str, key: &str) {
        self.report_keys
            .write()
            .unwrap()
            .entry(report_name.to_string())
            .or_default()
            .insert(key.to_string());
    }

    /// Register a translation for a (language, key) pair.
    pub fn add_translation(&self, language: &str, key: &str, text: &str) {
        self.translations
            .write()
            .unwrap()
            .insert((language.to_string(), key.to_string()), text.to_string());
    }

    /// Register record snapshots for a record type.
    pub fn add_records(&self, model: &str, records: Vec<Record>) {
        self.records.write().unwrap().entry(model.to_string()).or_default().extend(records);
    }
}

impl TemplateStore for MemoryStore {
    fn by_id(&self, id: TemplateId) -> Result<Option<ReportTemplate>> {
        Ok(self.templates.read().unwrap().get(&id.0).cloned())
    }

    fn by_name(&self, report_name: &str) -> Result<Option<ReportTemplate>> {
        Ok(self
            .templates
            .read()
            .unwrap()
            .values()
            .find(|t| t.report_name == report_name)
            .cloned())
    }
}

impl TranslationStore for MemoryStore {
    fn languages(&self) -> Result<Vec<Language>> {
        Ok(self.languages.read().unwrap().clone())
    }

    fn report_keys(&self, report_name: &str) -> Result<BTreeSet<String>> {
        Ok(self.report_keys.read().unwrap().get(report_name).cloned().unwrap_or_default())
    }

    fn translate(&self, language: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .translations
            .read()
            .unwrap()
            .get(&(language.to_string(), key.to_string()))
            .cloned())
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, model: &str, ids: &[RecordId]) -> Result<Vec<Record>> {
        let records = self.records.read().unwrap();
        let rows = records.get(model).map(Vec::as_slice).unwrap_or(&[]);
        // Preserve the requested id order, like a browse by id list would.
        Ok(ids
            .iter()
            .filter_map(|id| rows.iter().find(|r| r.id == *id).cloned())
            .collect())
    }

    fn descriptor(&self) -> &StorageDescriptor {
        &self.descriptor
    }
}
