//! Pipeline integration tests against an in-process stub model.
//!
//! No network and no API key needed: the stub is injected through
//! `ExtractionConfig::builder().model_client(...)` and records what it was
//! sent.

use async_trait::async_trait;
use base64::Engine;
use edgequake_extract::{
    extract, extract_to_csv, extract_to_file, ContentPart, ExtractError, ExtractionConfig,
    ExtractionModel, ExtractionProgressCallback, ModelReply, UploadedFile,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replies with a canned text and keeps a copy of every request.
struct StubModel {
    reply: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, Vec<ContentPart>)>>,
}

impl StubModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_parts(&self) -> Vec<ContentPart> {
        self.seen.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait]
impl ExtractionModel for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(
        &self,
        system_instruction: &str,
        parts: &[ContentPart],
    ) -> Result<ModelReply, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((system_instruction.to_string(), parts.to_vec()));
        Ok(ModelReply::new(self.reply.clone()))
    }
}

/// Always fails like a dropped connection.
struct FailingModel;

#[async_trait]
impl ExtractionModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _: &str, _: &[ContentPart]) -> Result<ModelReply, ExtractError> {
        Err(ExtractError::Transport {
            message: "connection reset".into(),
        })
    }
}

#[derive(Default)]
struct Events {
    started: AtomicUsize,
    files_read: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
}

impl ExtractionProgressCallback for Events {
    fn on_extraction_start(&self, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_read(&self, _i: usize, _t: usize, _n: &str, _b: usize) {
        self.files_read.fetch_add(1, Ordering::SeqCst);
    }
    fn on_extraction_complete(&self, _records: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_extraction_error(&self, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn config_with(model: Arc<dyn ExtractionModel>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .model_client(model)
        .build()
        .expect("valid config")
}

fn text_file(name: &str, body: &str) -> UploadedFile {
    UploadedFile::from_bytes(name, "text/plain", body.as_bytes().to_vec())
}

const INVOICES: &str = r#"[
  {"vendor":"Acme, Inc.","date":"2024-03-01","total":120.5},
  {"vendor":"Beta GmbH","date":"2024-03-04","total":80}
]"#;

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_and_image_batch_produces_csv() {
    let model = StubModel::replying(INVOICES);
    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];
    let files = vec![
        text_file("ledger.txt", "Acme 120.50\nBeta 80.00"),
        UploadedFile::from_bytes("scan.png", "image/png", png.clone()),
    ];

    let output = extract(files, "vendor, date, total", &config_with(model.clone()))
        .await
        .unwrap();

    assert_eq!(output.dataset.len(), 2);
    assert_eq!(output.stats.files, 2);
    assert_eq!(output.stats.content_parts, 7);
    assert_eq!(
        output.to_csv().unwrap(),
        "vendor,date,total\n\"Acme, Inc.\",2024-03-01,120.5\nBeta GmbH,2024-03-04,80"
    );

    let parts = model.last_parts();
    assert_eq!(parts.len(), 7);
    assert_eq!(
        parts[0].as_text(),
        Some("USER INSTRUCTION: \"vendor, date, total\"\n\n---")
    );
    assert_eq!(parts[2].as_text(), Some("Acme 120.50\nBeta 80.00"));
    match &parts[5] {
        ContentPart::InlineBinary { media_type, data } => {
            assert_eq!(media_type, "image/png");
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(data)
                .unwrap();
            assert_eq!(decoded, png);
        }
        other => panic!("expected inline binary part, got {other:?}"),
    }
}

#[tokio::test]
async fn framing_follows_input_order_under_concurrency() {
    let model = StubModel::replying(r#"[{"n":1}]"#);
    let names: Vec<String> = (0..12).map(|i| format!("f{i:02}.txt")).collect();
    let files = names
        .iter()
        .map(|n| text_file(n, &format!("body of {n}")))
        .collect();
    let config = ExtractionConfig::builder()
        .model_client(model.clone())
        .read_concurrency(5)
        .build()
        .unwrap();

    extract(files, "count", &config).await.unwrap();

    let parts = model.last_parts();
    let starts: Vec<String> = parts
        .iter()
        .filter_map(|p| p.as_text())
        .filter_map(|t| t.strip_prefix("\nSTART OF FILE: "))
        .map(|t| t.trim_end_matches("\n---\n").to_string())
        .collect();
    assert_eq!(starts, names);

    let framing = parts
        .iter()
        .filter_map(|p| p.as_text())
        .filter(|t| t.contains("START OF FILE: ") || t.contains("END OF FILE: ") || t.starts_with("USER INSTRUCTION: "))
        .count();
    assert_eq!(framing, 2 * names.len() + 1);
}

#[tokio::test]
async fn default_system_instruction_is_sent() {
    let model = StubModel::replying(r#"[{"a":1}]"#);
    extract(vec![text_file("a.txt", "a")], "a", &config_with(model.clone()))
        .await
        .unwrap();
    let seen = model.seen.lock().unwrap();
    assert!(seen[0].0.contains("JSON array"));
}

#[tokio::test]
async fn extract_to_csv_returns_text() {
    let model = StubModel::replying(r#"[{"a":"x","b":null}]"#);
    let csv = extract_to_csv(vec![text_file("a.txt", "x")], "a and b", &config_with(model))
        .await
        .unwrap();
    assert_eq!(csv, "a,b\nx,");
}

#[tokio::test]
async fn extract_to_file_writes_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/extracted_data.csv");
    let model = StubModel::replying(INVOICES);

    let stats = extract_to_file(
        vec![text_file("a.txt", "x")],
        "invoices",
        &path,
        &config_with(model),
    )
    .await
    .unwrap();

    assert_eq!(stats.records, 2);
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("vendor,date,total\n"));
    assert!(!path.with_extension("csv.tmp").exists());
}

// ── Failure modes ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_array_is_empty_result_not_malformed() {
    let model = StubModel::replying("[]");
    let err = extract(vec![text_file("a.txt", "x")], "anything", &config_with(model))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyResult), "got {err:?}");
}

#[tokio::test]
async fn fenced_reply_is_malformed() {
    let model = StubModel::replying("```json\n[{\"a\":1}]\n```");
    let err = extract(vec![text_file("a.txt", "x")], "anything", &config_with(model))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::MalformedResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn object_reply_is_malformed() {
    let model = StubModel::replying(r#"{"a":1}"#);
    let err = extract(vec![text_file("a.txt", "x")], "anything", &config_with(model))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "malformed_response");
}

#[tokio::test]
async fn no_files_rejected_before_model_runs() {
    let model = StubModel::replying(INVOICES);
    let err = extract(Vec::new(), "anything", &config_with(model.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Validation(_)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn blank_instruction_rejected_before_reading() {
    let model = StubModel::replying(INVOICES);
    let events = Arc::new(Events::default());
    let config = ExtractionConfig::builder()
        .model_client(model.clone())
        .progress_callback(events.clone())
        .build()
        .unwrap();
    // Nonexistent path: reading it would fail with Read, not Validation.
    let files = vec![UploadedFile::from_path("/definitely/not/here.txt")];

    let err = extract(files, "  \t", &config).await.unwrap_err();

    assert!(matches!(err, ExtractError::Validation(_)));
    assert_eq!(model.calls(), 0);
    assert_eq!(events.started.load(Ordering::SeqCst), 0);
    assert_eq!(events.files_read.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unreadable_file_is_read_error_and_model_not_called() {
    let model = StubModel::replying(INVOICES);
    let files = vec![
        text_file("ok.txt", "fine"),
        UploadedFile::from_path("/definitely/not/here.txt"),
    ];
    let err = extract(files, "anything", &config_with(model.clone()))
        .await
        .unwrap_err();
    match err {
        ExtractError::Read { name, .. } => assert_eq!(name, "here.txt"),
        other => panic!("expected Read error, got {other:?}"),
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn transport_failure_surfaces_and_reports_error() {
    let events = Arc::new(Events::default());
    let config = ExtractionConfig::builder()
        .model_client(Arc::new(FailingModel))
        .progress_callback(events.clone())
        .build()
        .unwrap();

    let err = extract(vec![text_file("a.txt", "x")], "anything", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractError::Transport { .. }));
    assert_eq!(events.started.load(Ordering::SeqCst), 1);
    assert_eq!(events.files_read.load(Ordering::SeqCst), 1);
    assert_eq!(events.errors.load(Ordering::SeqCst), 1);
    assert_eq!(events.completed.load(Ordering::SeqCst), 0);
}

#[test]
fn sync_wrapper_runs_pipeline() {
    let model = StubModel::replying(r#"[{"k":"v"}]"#);
    let output = edgequake_extract::extract_sync(
        vec![text_file("a.txt", "x")],
        "k",
        &config_with(model),
    )
    .unwrap();
    assert_eq!(output.to_csv().unwrap(), "k\nv");
}

#[test]
fn validation_rejects_without_runtime() {
    let model = StubModel::replying(INVOICES);
    let err = tokio_test::block_on(extract(Vec::new(), "", &config_with(model)))
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("instruction"));
}
