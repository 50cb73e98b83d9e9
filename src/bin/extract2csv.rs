//! CLI binary for edgequake-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and writes the CSV.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_extract::{
    extract, resolve_input, validate_request, write_csv_file, ExtractionConfig,
    ExtractionProgressCallback, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a file counter while reading, then a spinner while the
/// model works.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_files: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_files as u64);
        self.bar.set_prefix("Reading");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting from {total_files} files…"))
        ));
    }

    fn on_file_read(&self, index: usize, total: usize, name: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {:<32}  {}",
            green("✓"),
            index + 1,
            total,
            name,
            dim(&format!("{bytes} bytes")),
        ));
        self.bar.inc(1);
    }

    fn on_request_sent(&self, content_parts: usize) {
        self.bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed_precise}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        self.bar.set_prefix("Extracting");
        self.bar
            .set_message(format!("waiting for the model ({content_parts} parts)"));
    }

    fn on_extraction_complete(&self, records: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} records extracted", green("✔"), bold(&records.to_string()));
    }

    fn on_extraction_error(&self, error: &str) {
        self.bar.finish_and_clear();
        let msg = if error.chars().count() > 120 {
            format!("{}\u{2026}", error.chars().take(119).collect::<String>())
        } else {
            error.to_string()
        };
        eprintln!("{} {}", red("✘"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One row per invoice from a folder of receipts
  extract2csv receipts/*.jpg --prompt "vendor, date, total for each receipt"

  # Write to a specific file
  extract2csv notes.txt export.csv -p "every person mentioned with their role" -o people.csv

  # Print the CSV instead of writing a file
  extract2csv report.md --prompt "all KPIs with value and unit" --stdout

  # Long instruction kept in a file
  extract2csv contracts/*.txt --prompt-file instructions.txt

  # Remote input
  extract2csv https://example.com/price-list.csv -p "product and price in EUR"

  # Dump the validated records and stats as JSON
  extract2csv scan.png -p "line items" --json > items.json

ENVIRONMENT VARIABLES:
  API_KEY                 Gemini API key (read first)
  GEMINI_API_KEY          Gemini API key (fallback)
  EXTRACT_MODEL           Override model ID (default gemini-2.5-flash)
  EXTRACT_BASE_URL        Override the API base URL
  RUST_LOG                Override log filtering

SETUP:
  1. Set API key:     export API_KEY=...
  2. Extract:         extract2csv data.txt --prompt "..."
"#;

/// Extract tabular data from files into CSV using Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "extract2csv",
    version,
    about = "Extract tabular data from files into CSV using Gemini",
    long_about = "Send a batch of files (text, CSV, Markdown, images; local paths, URLs or \
data URIs) together with a natural-language instruction to Gemini, validate that the reply is a \
JSON array of records, and write it out as CSV.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths, HTTP/HTTPS URLs or data: URIs, in the order the model should see them.
    inputs: Vec<String>,

    /// What to extract, in natural language.
    #[arg(short, long, env = "EXTRACT_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the instruction from a text file.
    #[arg(long, env = "EXTRACT_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Write CSV to this file.
    #[arg(
        short,
        long,
        env = "EXTRACT_OUTPUT",
        default_value = "extracted_data.csv",
        conflicts_with = "stdout"
    )]
    output: PathBuf,

    /// Write CSV to stdout instead of a file.
    #[arg(long)]
    stdout: bool,

    /// Output structured JSON (records + stats) on stdout instead of CSV.
    #[arg(long, env = "EXTRACT_JSON")]
    json: bool,

    /// Gemini model ID.
    #[arg(long, env = "EXTRACT_MODEL")]
    model: Option<String>,

    /// Environment variable holding the API key.
    #[arg(long, env = "EXTRACT_API_KEY_ENV")]
    api_key_env: Option<String>,

    /// API base URL (for proxies or a local mock).
    #[arg(long, env = "EXTRACT_BASE_URL")]
    base_url: Option<String>,

    /// Force this media type for every input instead of guessing from the name.
    #[arg(long, env = "EXTRACT_MEDIA_TYPE")]
    media_type: Option<String>,

    /// Path to a text file containing a custom system instruction.
    #[arg(long, env = "EXTRACT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Model call timeout in seconds.
    #[arg(long, env = "EXTRACT_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Number of files read concurrently.
    #[arg(long, env = "EXTRACT_READ_CONCURRENCY", default_value_t = 4)]
    read_concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "EXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.stdout;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut config = build_config(&cli).await?;

    // ── Instruction + inputs ─────────────────────────────────────────────
    let instruction = read_instruction(&cli).await?;
    let files = resolve_inputs(&cli, &instruction, &config).await?;

    // The bar only starts once the request is known to be valid.
    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        config.progress_callback = Some(cb as Arc<dyn ExtractionProgressCallback>);
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(files, &instruction, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let csv = output
        .to_csv()
        .context("Extraction produced no records")?;

    if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(csv.as_bytes())
            .and_then(|_| handle.write_all(b"\n"))
            .context("Failed to write to stdout")?;
    } else {
        write_csv_file(&cli.output, &csv)
            .await
            .context("Failed to write CSV")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} records from {} files  {}ms  →  {}",
                green("✔"),
                output.stats.records,
                output.stats.files,
                output.stats.total_duration_ms,
                bold(&cli.output.display().to_string()),
            );
        }
    }

    if !cli.quiet && !cli.json {
        if let (Some(i), Some(o)) = (output.stats.input_tokens, output.stats.output_tokens) {
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&i.to_string()),
                dim(&o.to_string()),
            );
        }
    }

    Ok(())
}

/// `--prompt` wins; otherwise `--prompt-file`; otherwise empty, which the
/// library rejects with a validation error.
async fn read_instruction(cli: &Cli) -> Result<String> {
    if let Some(ref p) = cli.prompt {
        return Ok(p.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path));
    }
    Ok(String::new())
}

/// Check the request, then resolve every input in order. Validation runs
/// first so a blank instruction never triggers a download.
async fn resolve_inputs(
    cli: &Cli,
    instruction: &str,
    config: &ExtractionConfig,
) -> Result<Vec<UploadedFile>> {
    validate_request(cli.inputs.len(), instruction)?;

    let mut files = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let file = resolve_input(input, cli.media_type.as_deref(), config)
            .await
            .with_context(|| format!("Failed to resolve input '{input}'"))?;
        files.push(file);
    }
    Ok(files)
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .read_concurrency(cli.read_concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_instruction(text);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref var) = cli.api_key_env {
        builder = builder.api_key_env(var.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_extract::ExtractError;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("extract2csv").chain(args.iter().copied()))
            .expect("valid args")
    }

    #[tokio::test]
    async fn blank_instruction_rejected_before_any_download() {
        // Port 1 refuses connections: reaching the network would surface as a
        // download error, not a validation error.
        let cli = parse(&["http://127.0.0.1:1/never.csv", "--prompt", "   "]);
        let config = build_config(&cli).await.unwrap();

        let err = resolve_inputs(&cli, "   ", &config).await.unwrap_err();

        assert!(
            matches!(err.downcast_ref::<ExtractError>(), Some(ExtractError::Validation(_))),
            "got {err:#}"
        );
    }

    #[tokio::test]
    async fn download_timeout_flag_reaches_config() {
        let cli = parse(&["a.txt", "-p", "x", "--download-timeout", "7"]);
        let config = build_config(&cli).await.unwrap();
        assert_eq!(config.download_timeout_secs, 7);
    }

    #[tokio::test]
    async fn local_inputs_resolve_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("b.txt");
        let b = dir.path().join("a.csv");
        std::fs::write(&a, "first").unwrap();
        std::fs::write(&b, "second").unwrap();
        let cli = parse(&[a.to_str().unwrap(), b.to_str().unwrap(), "-p", "rows"]);
        let config = build_config(&cli).await.unwrap();

        let files = resolve_inputs(&cli, "rows", &config).await.unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["b.txt", "a.csv"]);
    }
}
