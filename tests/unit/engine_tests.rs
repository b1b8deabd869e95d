//! Engine transport error surface.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rapport::core::error::ReportError;
use rapport::engine::xmlrpc::XmlRpcEngine;
use rapport::engine::{ConnectionBundle, RenderEngine};

#[test]
fn unreachable_engine_reports_port() {
    // Grab an ephemeral port and release it so nothing is listening there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let engine = XmlRpcEngine::new(port, PathBuf::from("/nonexistent/engine.pid"));
    let connection = ConnectionBundle {
        output: "pdf".into(),
        data_file: PathBuf::from("/tmp/none.csv"),
        dsn: "jdbc:postgresql://localhost:5432/x".into(),
        user: "x".into(),
        password: String::new(),
        subreports: Vec::new(),
    };

    let err = engine
        .invoke(Path::new("/tmp/none.jrxml"), Path::new("/tmp/none.pdf"), &connection, &BTreeMap::new())
        .unwrap_err();
    match err.downcast_ref::<ReportError>() {
        Some(ReportError::EngineUnavailable { port: reported, .. }) => assert_eq!(*reported, port),
        other => panic!("expected EngineUnavailable, got {other:?}"),
    }
}
