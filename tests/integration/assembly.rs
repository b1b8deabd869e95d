//! Packaging policy: per-record archives, direct returns, delivery targets.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::{Arc, Mutex};

use rapport::config::Config;
use rapport::render::RenderContext;
use rapport::service::Delivery;
use rapport::store::{DeliveryTarget, ReportTemplate};
use rapport::{DataSource, RenderRequest, ReportRef};

use crate::common::{invoice_record, invoice_template, service_with};

fn request(ids: Vec<i64>) -> RenderRequest {
    RenderRequest {
        report: ReportRef::Name("invoice".into()),
        model: None,
        ids,
        source: DataSource::Model,
        parameters: BTreeMap::new(),
        output_format: None,
        return_pages: false,
    }
}

fn single_invoice() -> ReportTemplate {
    ReportTemplate { single: true, ..invoice_template() }
}

fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries
}

#[test]
fn single_template_with_many_ids_produces_zip() {
    let (store, engine, service) = service_with(Config::default());
    store.add_template(single_invoice());

    let delivery = service.execute(&request(vec![1, 2, 3]), &RenderContext::anonymous("en")).unwrap();

    assert_eq!(delivery.kind, "zip");
    assert!(!delivery.direct_print);
    // Stem plus the (up to five) record labels, slugged and capped.
    assert_eq!(delivery.filename, "customer-invoice-inv-001-inv-002-inv-003");
    assert!(delivery.filename.len() <= 40);
    assert_eq!(engine.invocation_count(), 3, "one render per record");

    let entries = zip_entries(&delivery.bytes);
    assert_eq!(entries.len(), 3);
    let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        ["customer-invoice-inv-001.pdf", "customer-invoice-inv-002.pdf", "customer-invoice-inv-003.pdf"]
    );
    // Each entry is the render of exactly its record.
    assert_eq!(entries[0].1, b"%FAKE-DOC ids=1");
    assert_eq!(entries[1].1, b"%FAKE-DOC ids=2");
    assert_eq!(entries[2].1, b"%FAKE-DOC ids=3");
}

#[test]
fn single_template_with_one_id_returns_document() {
    let (store, engine, service) = service_with(Config::default());
    store.add_template(single_invoice());

    let delivery = service.execute(&request(vec![2]), &RenderContext::anonymous("en")).unwrap();

    assert_eq!(delivery.kind, "pdf");
    assert_eq!(delivery.bytes, b"%FAKE-DOC ids=2");
    assert_eq!(engine.invocation_count(), 1);
}

#[test]
fn multi_record_template_never_zips() {
    let (_, engine, service) = service_with(Config::default());

    let delivery = service.execute(&request(vec![1, 2, 3]), &RenderContext::anonymous("en")).unwrap();

    assert_eq!(delivery.kind, "pdf");
    assert_eq!(engine.invocation_count(), 1);
}

#[test]
fn record_source_is_narrowed_per_archive_entry() {
    let (store, engine, service) = service_with(Config::default());
    store.add_template(single_invoice());

    let mut req = request(vec![1, 2]);
    req.source = DataSource::Records(vec![
        invoice_record(1, "INV-001", "Acme"),
        invoice_record(2, "INV-002", "Globex"),
    ]);
    let delivery = service.execute(&req, &RenderContext::anonymous("en")).unwrap();

    assert_eq!(delivery.kind, "zip");
    assert_eq!(engine.invocation_count(), 2);
    let entries = zip_entries(&delivery.bytes);
    assert_eq!(entries[0].0, "customer-invoice-inv-001.pdf");
    assert_eq!(entries[1].0, "customer-invoice-inv-002.pdf");
}

#[test]
fn long_names_are_capped_at_forty_characters() {
    let (store, _, service) = service_with(Config::default());
    store.add_template(ReportTemplate {
        name: "An Extraordinarily Verbose Customer Invoice Report Title".into(),
        ..invoice_template()
    });

    let delivery = service.execute(&request(vec![1]), &RenderContext::anonymous("en")).unwrap();
    assert!(delivery.filename.len() <= 40, "{}", delivery.filename);
}

struct Spooler {
    seen: Mutex<Vec<String>>,
}

impl DeliveryTarget for Spooler {
    fn deliver(&self, delivery: Delivery) -> anyhow::Result<Delivery> {
        self.seen.lock().unwrap().push(delivery.filename.clone());
        Ok(Delivery { kind: "spooled".into(), bytes: Vec::new(), ..delivery })
    }
}

#[test]
fn registered_delivery_target_receives_document() {
    let config = Config { delivery_target: Some("spooler".into()), ..Config::default() };
    let (_, _, mut service) = service_with(config);
    let spooler = Arc::new(Spooler { seen: Mutex::new(Vec::new()) });
    service.register_delivery_target("spooler", spooler.clone());

    let delivery = service.execute(&request(vec![1]), &RenderContext::anonymous("en")).unwrap();

    assert_eq!(delivery.kind, "spooled");
    let seen = spooler.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], "customer-invoice");
}

#[test]
fn missing_delivery_target_falls_back_to_direct_return() {
    let config = Config { delivery_target: Some("ghost".into()), ..Config::default() };
    let (_, _, service) = service_with(config);

    let delivery = service.execute(&request(vec![1]), &RenderContext::anonymous("en")).unwrap();

    // Warned and returned directly; the render must not fail.
    assert_eq!(delivery.kind, "pdf");
    assert_eq!(delivery.bytes, b"%FAKE-DOC ids=1");
}
