//! Full renders through the orchestrator against the fake engine.

use std::collections::BTreeMap;

use rapport::config::Config;
use rapport::core::error::ReportError;
use rapport::engine::Value;
use rapport::render::RenderContext;
use rapport::store::{ReportTemplate, TemplateId};
use rapport::{DataSource, RenderRequest, ReportRef};

use crate::common::service_with;

fn invoice_request(ids: Vec<i64>) -> RenderRequest {
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

#[test]
fn renders_one_document_for_all_ids() {
    let (_, engine, service) = service_with(Config::default());
    let delivery =
        service.execute(&invoice_request(vec![1, 2, 3]), &RenderContext::anonymous("en")).unwrap();

    assert_eq!(delivery.kind, "pdf");
    assert_eq!(delivery.bytes, b"%FAKE-DOC ids=1,2,3");
    assert!(!delivery.direct_print);
    assert_eq!(delivery.filename, "customer-invoice");
    assert_eq!(delivery.pages, None);
    assert_eq!(engine.invocation_count(), 1);
}

#[test]
fn engine_receives_connection_and_parameters() {
    let (_, engine, service) = service_with(Config::default());
    let mut request = invoice_request(vec![1, 2]);
    request.parameters.insert("WATERMARK".into(), Value::from("draft"));
    // Caller overrides win on collision.
    request.parameters.insert("REPORT_LOCALE".into(), Value::from("fr"));

    service.execute(&request, &RenderContext::anonymous("en")).unwrap();

    let invocations = engine.invocations.lock().unwrap();
    let call = &invocations[0];

    assert_eq!(call.connection.output, "pdf");
    assert_eq!(call.connection.dsn, "jdbc:postgresql://localhost:5432/testdb");
    assert_eq!(call.connection.user, "erp");
    assert_eq!(call.connection.password, "secret");
    assert_eq!(call.connection.subreports.len(), 1);
    let binding = &call.connection.subreports[0];
    assert_eq!(binding.parameter, "invoice_lines_DATA");
    assert_eq!(binding.template_file.file_name().unwrap(), "invoice_lines.jrxml");

    assert_eq!(call.parameters["REPORT_LOCALE"], Value::from("fr"));
    assert_eq!(call.parameters["WATERMARK"], Value::from("draft"));
    assert_eq!(
        call.parameters["IDS"],
        Value::List(vec![Value::Int(1), Value::Int(2)])
    );
    let Value::Str(subreport_dir) = &call.parameters["SUBREPORT_DIR"] else {
        panic!("SUBREPORT_DIR must be a string")
    };
    assert!(subreport_dir.ends_with(std::path::MAIN_SEPARATOR));
    assert_eq!(call.template.file_name().unwrap(), "invoice.jrxml");
}

#[test]
fn temporary_files_are_removed_after_success() {
    let (_, engine, service) = service_with(Config::default());
    service.execute(&invoice_request(vec![1]), &RenderContext::anonymous("en")).unwrap();

    let invocations = engine.invocations.lock().unwrap();
    let call = &invocations[0];
    assert!(!call.connection.data_file.exists(), "main data file must be cleaned up");
    assert!(!call.output.exists(), "output file must be cleaned up");
    for sub in &call.connection.subreports {
        assert!(!sub.data_file.exists(), "sub-template feed must be cleaned up");
    }
}

#[test]
fn temporary_files_are_removed_after_engine_fault() {
    let (_, engine, service) = service_with(Config::default());
    engine.fail_with("fill failed");

    let err =
        service.execute(&invoice_request(vec![1]), &RenderContext::anonymous("en")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReportError>(),
        Some(ReportError::EngineFault { message }) if message == "fill failed"
    ));

    let invocations = engine.invocations.lock().unwrap();
    let call = &invocations[0];
    assert!(!call.connection.data_file.exists());
    assert!(!call.output.exists());
}

#[test]
fn unlink_disabled_keeps_temporary_files() {
    let config = Config { unlink: false, ..Config::default() };
    let (_, engine, service) = service_with(config);
    service.execute(&invoice_request(vec![1]), &RenderContext::anonymous("en")).unwrap();

    let invocations = engine.invocations.lock().unwrap();
    let call = &invocations[0];
    assert!(call.connection.data_file.exists());
    assert!(call.output.exists());

    // Clean up manually; the pipeline deliberately left these behind.
    let _ = std::fs::remove_file(&call.connection.data_file);
    let _ = std::fs::remove_file(&call.output);
    for sub in &call.connection.subreports {
        let _ = std::fs::remove_file(&sub.data_file);
    }
}

#[test]
fn generation_failure_aborts_before_any_rpc() {
    let (store, engine, service) = service_with(Config::default());
    // A tabular template with no record type cannot build a query feed.
    store.add_template(ReportTemplate {
        id: TemplateId(40),
        name: "No Model".into(),
        report_name: "no_model".into(),
        content: br#"<jasperReport><queryString language="xpath"/><field name="x"/></jasperReport>"#
            .to_vec(),
        extension: "pdf".into(),
        single: false,
        direct_print: false,
        model: None,
        path: "misc/report/no_model.jrxml".into(),
    });

    let mut request = invoice_request(vec![1]);
    request.report = ReportRef::Name("no_model".into());
    let result = service.execute(&request, &RenderContext::anonymous("en"));

    assert!(result.is_err());
    assert_eq!(engine.invocation_count(), 0, "no engine call may happen after a generation failure");
}

#[test]
fn return_pages_surfaces_count_and_raw_name() {
    let (_, _, service) = service_with(Config::default());
    let mut request = invoice_request(vec![1]);
    request.return_pages = true;

    let delivery = service.execute(&request, &RenderContext::anonymous("en")).unwrap();
    assert_eq!(delivery.pages, Some(3));
    assert_eq!(delivery.filename, "Customer Invoice");
}

#[test]
fn output_format_override_wins() {
    let (_, engine, service) = service_with(Config::default());
    let mut request = invoice_request(vec![1]);
    request.output_format = Some("xls".into());

    let delivery = service.execute(&request, &RenderContext::anonymous("en")).unwrap();
    assert_eq!(delivery.kind, "xls");
    let invocations = engine.invocations.lock().unwrap();
    assert_eq!(invocations[0].connection.output, "xls");
}

#[test]
fn unknown_report_is_an_error() {
    let (_, _, service) = service_with(Config::default());
    let mut request = invoice_request(vec![1]);
    request.report = ReportRef::Name("ghost".into());

    let err = service.execute(&request, &RenderContext::anonymous("en")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReportError>(),
        Some(ReportError::ReportNotFound { name }) if name == "ghost"
    ));
}
