//! Integration tests for report-forge.
//!
//! These tests validate:
//! - Builder validation happens before any collaborator runs
//! - Reserved geometry keys reach the data model passed downstream
//! - File, stream and byte outputs agree and never leave partial files
//! - The shipped templates render end to end with the default engine

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use report_forge::page::{ORIENTATION_KEY, PAGE_SIZE_KEY};
use report_forge::pipeline::compute_layout_config;
use report_forge::{
    ConfigurationError, DataModel, EngineConfig, Error, HtmlRenderer, PageSize, PipelineConfig, RenderError,
    ReportEngine, ReportErrorKind, TemplateError, TemplateExpander,
};
use serde_json::{json, Value};

// =====================================================================
// Helpers
// =====================================================================

fn templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn shipped_engine() -> ReportEngine {
    ReportEngine::new(EngineConfig::new(templates_dir()))
}

fn object(value: Value) -> DataModel {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn sample_report_data() -> DataModel {
    object(json!({
        "title": "Test Report",
        "subtitle": "Test Subtitle",
        "generatedDate": "February 26, 2026",
        "author": "Test Author",
        "description": "Test Description",
        "items": [
            { "id": "001", "name": "Item 1", "description": "Description 1", "quantity": 10, "price": 25.99 },
            { "id": "002", "name": "Item 2", "description": "Description 2", "quantity": 5, "price": 49.99 }
        ],
        "total": 509.85
    }))
}

fn invoice_data() -> DataModel {
    object(json!({
        "companyName": "Test Company",
        "companyAddress": "123 Test St",
        "companyCity": "Test City",
        "companyState": "TS",
        "companyZip": "12345",
        "companyPhone": "(555) 555-5555",
        "invoiceNumber": "TEST-001",
        "invoiceDate": "02/26/2026",
        "dueDate": "03/28/2026",
        "customerName": "Test Customer",
        "customerAddress": "456 Customer Ave",
        "customerCity": "Customer City",
        "customerState": "CS",
        "customerZip": "67890",
        "lineItems": [ { "description": "Test Service", "quantity": 10, "unitPrice": 100.0 } ],
        "subtotal": 1000.0,
        "tax": 80.0,
        "taxRate": "8.00",
        "total": 1080.0
    }))
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..4], b"%PDF", "Missing PDF header");
}

/// Shared record of what the fake collaborators were asked to do.
#[derive(Default)]
struct Calls {
    expanded: AtomicUsize,
    rendered: AtomicUsize,
    last_model: Mutex<Option<DataModel>>,
}

impl Calls {
    fn last_model(&self) -> DataModel {
        self.last_model.lock().unwrap().clone().expect("expander was called")
    }
}

struct RecordingExpander(Arc<Calls>);

impl TemplateExpander for RecordingExpander {
    fn expand(&self, template: &str, model: &DataModel) -> Result<String, TemplateError> {
        self.0.expanded.fetch_add(1, Ordering::SeqCst);
        *self.0.last_model.lock().unwrap() = Some(model.clone());
        Ok(format!("<html><body><p>{template}</p></body></html>"))
    }
}

struct CountingRenderer(Arc<Calls>);

impl HtmlRenderer for CountingRenderer {
    fn render(&self, html: &str, sink: &mut dyn Write) -> Result<(), RenderError> {
        self.0.rendered.fetch_add(1, Ordering::SeqCst);
        sink.write_all(b"%PDF-1.7\n")?;
        sink.write_all(html.as_bytes())?;
        sink.write_all(b"\n%%EOF\n")?;
        sink.flush()?;
        Ok(())
    }
}

fn recording_engine() -> (ReportEngine, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let engine = ReportEngine::with_collaborators(
        EngineConfig::default(),
        Box::new(RecordingExpander(Arc::clone(&calls))),
        Box::new(CountingRenderer(Arc::clone(&calls))),
    );
    (engine, calls)
}

// =====================================================================
// Builder contract
// =====================================================================

#[test]
fn missing_template_invokes_no_collaborator() {
    let (engine, calls) = recording_engine();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.pdf");

    let builder = engine.builder().with_data("title", "Test");
    let results = [
        builder.generate_as_bytes().map(|_| ()),
        builder.generate_to(&mut Vec::new()),
        builder.generate_to_file(&out),
    ];
    for result in results {
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::MissingTemplate))
        ));
    }
    assert_eq!(calls.expanded.load(Ordering::SeqCst), 0);
    assert_eq!(calls.rendered.load(Ordering::SeqCst), 0);
    assert!(!out.exists());
}

#[test]
fn orientation_is_last_write_wins() {
    let (engine, calls) = recording_engine();
    engine
        .builder()
        .with_template("report.html")
        .landscape()
        .portrait()
        .with_page_size(PageSize::A4)
        .generate_as_bytes()
        .unwrap();

    let model = calls.last_model();
    assert_eq!(model[ORIENTATION_KEY], json!("portrait"));
    assert_eq!(model[PAGE_SIZE_KEY], json!("A4"));
}

#[test]
fn clear_data_removes_reserved_keys_downstream() {
    let (engine, calls) = recording_engine();
    engine
        .builder()
        .with_template("report.html")
        .landscape()
        .with_page_size(PageSize::Legal)
        .clear_data()
        .with_data("title", "After clear")
        .generate_as_bytes()
        .unwrap();

    let model = calls.last_model();
    assert!(!model.contains_key(ORIENTATION_KEY));
    assert!(!model.contains_key(PAGE_SIZE_KEY));
    assert_eq!(model["title"], json!("After clear"));
}

#[test]
fn builder_can_be_reused() {
    let (engine, calls) = recording_engine();
    let builder = engine.builder().with_template("report.html");
    let first = builder.generate_as_bytes().unwrap();
    let second = builder.generate_as_bytes().unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.expanded.load(Ordering::SeqCst), 2);
    assert_eq!(calls.rendered.load(Ordering::SeqCst), 2);
}

// =====================================================================
// Outputs
// =====================================================================

#[test]
fn file_and_bytes_have_equal_length() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.pdf");
    let engine = shipped_engine();
    let builder = engine
        .builder()
        .with_template("sample-report.html")
        .extend_data(sample_report_data());

    builder.generate_to_file(&out).unwrap();
    let bytes = builder.generate_as_bytes().unwrap();
    let on_disk = fs::read(&out).unwrap();

    assert!(!bytes.is_empty());
    assert_eq!(on_disk.len(), bytes.len());
}

#[test]
fn missing_template_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("test.pdf");
    let err = shipped_engine()
        .generate_report_to_file("non-existent-template.html", &sample_report_data(), &out)
        .unwrap_err();

    assert_eq!(err.kind(), ReportErrorKind::Template);
    assert!(err.message().contains("non-existent-template.html"));
    assert!(!out.exists());
}

#[test]
fn stream_output_matches_bytes() {
    let (engine, _) = recording_engine();
    let builder = engine.builder().with_template("report.html");
    let mut sink = Vec::new();
    builder.generate_to(&mut sink).unwrap();
    assert_eq!(sink, builder.generate_as_bytes().unwrap());
}

// =====================================================================
// End to end with the default collaborators
// =====================================================================

#[test]
fn minimal_template_scenario() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("minimal.html"),
        "<html><body><h1>{{ title }}</h1><p>Total: {{ total }}</p></body></html>",
    )
    .unwrap();
    let engine = ReportEngine::new(EngineConfig::new(dir.path()));

    let data = object(json!({
        "title": "Test Report",
        "items": [ { "id": "001", "name": "Item 1", "price": 25.99, "quantity": 10 } ],
        "total": 259.90
    }));
    let bytes = engine
        .builder()
        .with_template("minimal.html")
        .extend_data(data)
        .generate_as_bytes()
        .unwrap();
    assert_valid_pdf(&bytes);
}

#[test]
fn shipped_templates_render() {
    let engine = shipped_engine();
    for (template, data) in [
        ("sample-report.html", sample_report_data()),
        ("landscape-report.html", sample_report_data()),
        ("invoice.html", invoice_data()),
    ] {
        let bytes = engine
            .builder()
            .with_template(template)
            .extend_data(data)
            .generate_as_bytes()
            .unwrap_or_else(|e| panic!("{template}: {e}"));
        assert_valid_pdf(&bytes);
    }
}

#[test]
fn every_page_size_renders() {
    let dir = tempfile::tempdir().unwrap();
    let engine = shipped_engine();
    for size in PageSize::ALL {
        let out = dir.path().join(format!("test-{size}.pdf"));
        engine
            .builder()
            .with_template("landscape-report.html")
            .landscape()
            .with_page_size(size)
            .extend_data(sample_report_data())
            .generate_to_file(&out)
            .unwrap();
        assert!(fs::metadata(&out).unwrap().len() > 0);
    }
}

#[test]
fn page_style_drives_layout_geometry() {
    // The expanded HTML carries the builder's geometry in an @page rule.
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("geo.html"),
        "<html><head><style>{{ page_style() }}</style></head><body><p>x</p></body></html>",
    )
    .unwrap();
    let expander = report_forge::MiniJinjaExpander::new(&EngineConfig::new(dir.path()));
    let mut model = DataModel::new();
    model.insert(ORIENTATION_KEY.into(), json!("landscape"));
    model.insert(PAGE_SIZE_KEY.into(), json!("letter"));

    let html = expander.expand("geo.html", &model).unwrap();
    let layout = compute_layout_config(&html, &PipelineConfig::default()).unwrap();
    assert_eq!((layout.page_width_pt, layout.page_height_pt), (792.0, 612.0));
}

#[test]
fn undefined_variable_fails_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("t.html"), "<p>{{ nope }}</p>").unwrap();

    let strict = ReportEngine::new(EngineConfig::new(dir.path()));
    let err = strict.generate_report_as_bytes("t.html", &DataModel::new()).unwrap_err();
    assert_eq!(err.kind(), ReportErrorKind::Template);

    let lenient = ReportEngine::new(EngineConfig::new(dir.path()).with_strict_undefined(false));
    assert_valid_pdf(&lenient.generate_report_as_bytes("t.html", &DataModel::new()).unwrap());
}

#[test]
fn malformed_html_is_a_render_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.html"), "<div><p>ok</p></span></div>").unwrap();
    let engine = ReportEngine::new(EngineConfig::new(dir.path()));

    let err = engine.generate_report_as_bytes("bad.html", &DataModel::new()).unwrap_err();
    assert_eq!(err.kind(), ReportErrorKind::Render);
}

#[test]
fn engine_is_shared_across_threads() {
    let engine = Arc::new(shipped_engine());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut data = sample_report_data();
                data.insert("title".into(), json!(format!("Report {i}")));
                engine.generate_report_as_bytes("sample-report.html", &data)
            })
        })
        .collect();

    for handle in handles {
        let bytes = handle.join().unwrap().unwrap();
        assert_valid_pdf(&bytes);
    }
}
