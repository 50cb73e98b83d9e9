//! End-to-end tests for edgequake-extract.
//!
//! These make live Gemini calls. They are gated behind the `E2E_ENABLED`
//! environment variable and need `API_KEY` (or `GEMINI_API_KEY`).
//!
//! Run with:
//!   E2E_ENABLED=1 API_KEY=... cargo test --test e2e -- --nocapture

use edgequake_extract::{
    extract, extract_to_file, parse_csv, resolve_input, ExtractError, ExtractionConfig,
    UploadedFile,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set and a credential is present.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if ExtractionConfig::default().resolve_api_key().is_none() {
            println!("SKIP — no API_KEY / GEMINI_API_KEY in the environment");
            return;
        }
    }};
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("write fixture");
    path
}

const INVOICES_TXT: &str = "\
Invoice 1001 from Acme Corp, dated 2024-01-15, total 1,250.00 EUR.
Invoice 1002 from Beta Supplies, dated 2024-01-20, total 87.50 EUR.
Invoice 1003 from Gamma Logistics, dated 2024-02-02, total 430.10 EUR.
";

const STAFF_CSV: &str = "\
id;full name;department
7;Ada Lovelace;Research
9;Grace Hopper;Engineering
";

// ── Live extraction tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_invoices_from_text() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(&dir, "invoices.txt", INVOICES_TXT);

    let output = extract(
        vec![UploadedFile::from_path(&path)],
        "One row per invoice with columns invoice_number, vendor, date, total",
        &ExtractionConfig::default(),
    )
    .await
    .expect("extraction should succeed");

    assert_eq!(output.dataset.len(), 3, "three invoices in the fixture");
    let csv = output.to_csv().unwrap();
    println!("{csv}");
    assert!(csv.lines().next().unwrap().contains("vendor"));
    assert!(csv.contains("Acme"));
}

#[tokio::test]
async fn test_extract_across_two_files_to_disk() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let a = write_fixture(&dir, "invoices.txt", INVOICES_TXT);
    let b = write_fixture(&dir, "staff.csv", STAFF_CSV);
    let out = dir.path().join("extracted_data.csv");

    let config = ExtractionConfig::builder()
        .download_timeout_secs(30)
        .build()
        .unwrap();
    let files = vec![
        resolve_input(a.to_str().unwrap(), None, &config).await.unwrap(),
        resolve_input(b.to_str().unwrap(), None, &config).await.unwrap(),
    ];
    let stats = extract_to_file(
        files,
        "List every person or company name mentioned, with a column source_file",
        &out,
        &config,
    )
    .await
    .expect("extraction should succeed");

    assert_eq!(stats.files, 2);
    let reloaded = parse_csv(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(reloaded.len(), stats.records);
    assert!(reloaded.len() >= 5, "3 vendors + 2 people, got {}", reloaded.len());
}

#[tokio::test]
async fn test_impossible_instruction_is_empty_or_data() {
    e2e_skip_unless_ready!();
    let files = vec![UploadedFile::from_bytes(
        "weather.txt",
        "text/plain",
        b"It rained on Tuesday.".to_vec(),
    )];

    match extract(
        files,
        "List every invoice total. If there are none return an empty array.",
        &ExtractionConfig::default(),
    )
    .await
    {
        Err(ExtractError::EmptyResult) => {}
        Ok(output) => println!("model found something anyway: {:?}", output.to_csv()),
        Err(other) => panic!("unexpected failure: {other}"),
    }
}

#[tokio::test]
async fn test_bad_key_is_rejected() {
    e2e_skip_unless_ready!();
    let config = ExtractionConfig::builder()
        .api_key("definitely-not-a-valid-key")
        .build()
        .unwrap();
    let files = vec![UploadedFile::from_bytes("a.txt", "text/plain", b"x".to_vec())];

    let err = extract(files, "anything", &config).await.unwrap_err();
    assert!(matches!(err, ExtractError::Transport { .. }), "got {err:?}");
}
