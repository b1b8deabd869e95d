//! Template resolution and path cache behavior.

use std::sync::Arc;

use rapport::config::Config;
use rapport::core::error::ReportError;
use rapport::resolver::TemplateResolver;
use rapport::store::memory::MemoryStore;
use rapport::store::{ReportTemplate, TemplateId};

use crate::common::{invoice_template, seeded_store};

fn resolver_with(config: Config) -> (Arc<MemoryStore>, TemplateResolver) {
    let store = seeded_store();
    let resolver = TemplateResolver::new(config, store.clone(), store.clone());
    (store, resolver)
}

#[test]
fn cached_path_is_reused_without_rewriting() {
    let staging = tempfile::tempdir().unwrap();
    let config = Config { cache_dir: Some(staging.path().to_path_buf()), ..Config::default() };
    let (_, resolver) = resolver_with(config);
    let template = invoice_template();

    let first = resolver.resolve(&template, None).unwrap();
    // Tamper with the staged file; a cache hit must not restore it.
    std::fs::write(&first, b"sentinel").unwrap();
    let second = resolver.resolve(&template, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&second).unwrap(), b"sentinel");
}

#[test]
fn cache_disabled_rewrites_identical_bytes() {
    let staging = tempfile::tempdir().unwrap();
    let config = Config {
        use_cache: false,
        cache_dir: Some(staging.path().to_path_buf()),
        ..Config::default()
    };
    let (_, resolver) = resolver_with(config);
    let template = invoice_template();

    let first = resolver.resolve(&template, None).unwrap();
    let original = std::fs::read(&first).unwrap();
    std::fs::write(&first, b"sentinel").unwrap();
    let second = resolver.resolve(&template, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&second).unwrap(), original);
    assert_eq!(original, template.content);
}

#[test]
fn cache_self_heals_when_file_disappears() {
    let config = Config::default();
    let (_, resolver) = resolver_with(config);
    let template = invoice_template();

    let first = resolver.resolve(&template, None).unwrap();
    std::fs::remove_file(&first).unwrap();
    let second = resolver.resolve(&template, None).unwrap();

    assert!(second.is_file());
    assert_eq!(std::fs::read(&second).unwrap(), template.content);
}

#[test]
fn staging_constraint_invalidates_foreign_cache_entries() {
    let config = Config::default();
    let (_, resolver) = resolver_with(config);
    let template = invoice_template();

    let first = resolver.resolve(&template, None).unwrap();
    let pinned = tempfile::tempdir().unwrap();
    let second = resolver.resolve(&template, Some(pinned.path())).unwrap();

    assert_ne!(first, second);
    assert!(second.starts_with(pinned.path()));
    assert!(second.is_file());
}

#[test]
fn subreports_and_labels_are_staged_alongside() {
    let staging = tempfile::tempdir().unwrap();
    let config = Config { cache_dir: Some(staging.path().to_path_buf()), ..Config::default() };
    let (_, resolver) = resolver_with(config);

    let path = resolver.resolve(&invoice_template(), None).unwrap();
    let dir = path.parent().unwrap();

    assert_eq!(path.file_name().unwrap(), "invoice.jrxml");
    assert!(dir.join("invoice_lines.jrxml").is_file());
    // One label table per (template, language) pair, language lowercased.
    assert!(dir.join("invoice_en.properties").is_file());
    assert!(dir.join("invoice_nl_nl.properties").is_file());
    assert!(dir.join("invoice_lines_en.properties").is_file());
    assert!(dir.join("invoice_lines_nl_nl.properties").is_file());
}

#[test]
fn missing_subreport_is_fatal_and_named() {
    let store = seeded_store();
    let config = Config::default();
    let resolver = TemplateResolver::new(config, store.clone(), store.clone());

    let content = r#"<jasperReport name="broken">
      <subreportExpression><![CDATA[$P{SUBREPORT_DIR} + "ghost.jasper"]]></subreportExpression>
    </jasperReport>"#;
    let template = ReportTemplate {
        id: TemplateId(10),
        name: "Broken".into(),
        report_name: "broken".into(),
        content: content.as_bytes().to_vec(),
        extension: "pdf".into(),
        single: false,
        direct_print: false,
        model: None,
        path: "sales/report/broken.jrxml".into(),
    };

    let err = resolver.resolve(&template, None).unwrap_err();
    match err.downcast_ref::<ReportError>() {
        Some(ReportError::SubreportNotFound { name }) => assert_eq!(name, "ghost"),
        other => panic!("expected SubreportNotFound, got {other:?}"),
    }
}

#[test]
fn empty_template_is_fatal() {
    let store = seeded_store();
    let config = Config::default();
    let resolver = TemplateResolver::new(config, store.clone(), store.clone());

    let template = ReportTemplate { content: Vec::new(), ..invoice_template() };
    let err = resolver.resolve(&template, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReportError>(),
        Some(ReportError::MissingTemplate { name }) if name == "invoice"
    ));
}

#[test]
fn cyclic_references_are_fatal() {
    let store = seeded_store();
    let a = ReportTemplate {
        id: TemplateId(20),
        name: "Cycle A".into(),
        report_name: "cycle_a".into(),
        content: br#"<x><subreportExpression><![CDATA[$P{SUBREPORT_DIR} + "cycle_b.jasper"]]></subreportExpression></x>"#.to_vec(),
        extension: "pdf".into(),
        single: false,
        direct_print: false,
        model: None,
        path: "sales/report/cycle_a.jrxml".into(),
    };
    let b = ReportTemplate {
        id: TemplateId(21),
        report_name: "cycle_b".into(),
        name: "Cycle B".into(),
        content: br#"<x><subreportExpression><![CDATA[$P{SUBREPORT_DIR} + "cycle_a.jasper"]]></subreportExpression></x>"#.to_vec(),
        path: "sales/report/cycle_b.jrxml".into(),
        ..a.clone()
    };
    store.add_template(a.clone());
    store.add_template(b);

    let config = Config::default();
    let resolver = TemplateResolver::new(config, store.clone(), store.clone());
    let err = resolver.resolve(&a, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReportError>(),
        Some(ReportError::CyclicReference { name }) if name == "cycle_a"
    ));
}

#[test]
fn shared_subreports_are_not_cycles() {
    // Two parents referencing the same sub-template is a diamond, not a
    // cycle; the second visit must resolve (via cache) without error.
    let store = seeded_store();
    let parent = ReportTemplate {
        id: TemplateId(30),
        name: "Diamond".into(),
        report_name: "diamond".into(),
        content: br#"<x>
            <subreportExpression><![CDATA[$P{SUBREPORT_DIR} + "invoice_lines.jasper"]]></subreportExpression>
            <subreportExpression><![CDATA[$P{SUBREPORT_DIR} + "invoice_lines.jasper"]]></subreportExpression>
        </x>"#
            .to_vec(),
        extension: "pdf".into(),
        single: false,
        direct_print: false,
        model: None,
        path: "sales/report/diamond.jrxml".into(),
    };
    store.add_template(parent.clone());

    let config = Config::default();
    let resolver = TemplateResolver::new(config, store.clone(), store.clone());
    let path = resolver.resolve(&parent, None).unwrap();
    assert!(path.parent().unwrap().join("invoice_lines.jrxml").is_file());
}
