// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// fieldscan — extract form fields from scanned engineering documents.
//
// Entry point. Initialises logging, selects the OCR backend and language
// model, runs the page pipeline over the given images and prints JSON.

mod backends;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use fieldscan_core::error::{FieldscanError, Result};
use fieldscan_core::PipelineConfig;
use fieldscan_document::{DocumentExtractor, DocumentText, ExtractionOrchestrator, OcrClientSlot};
use fieldscan_extract::FieldReconciler;
use serde_json::json;

/// Extract form fields from scanned engineering documents
#[derive(Parser, Debug)]
#[command(name = "fieldscan")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the local OCR models
    #[arg(long, global = true)]
    ocr_model_dir: Option<PathBuf>,

    /// Cloud vision API key (defaults to GOOGLE_VISION_API_KEY)
    #[arg(long, global = true)]
    vision_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract named fields from one document (one image per page)
    Extract(ExtractArgs),
    /// Print the cleaned, region-annotated text of one document
    Text(TextArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Page images, in page order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Field to extract (repeatable)
    #[arg(short, long = "field", required = true)]
    fields: Vec<String>,

    /// Use deterministic pattern matching only, without a language model
    #[arg(long)]
    deterministic_only: bool,

    /// Give the language model a summary of the first detected regions
    #[arg(long)]
    region_summary: bool,

    /// Also print the extracted document text to stderr
    #[arg(long)]
    show_text: bool,
}

#[derive(Args, Debug)]
struct TextArgs {
    /// Page images, in page order
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("fieldscan starting");

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "fieldscan failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match &cli.command {
        Command::Text(args) => {
            let document = extract_document(cli, &config, &args.images)?;
            if document.is_empty() {
                eprintln!("no text could be extracted from the document");
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", document.text);
            Ok(ExitCode::SUCCESS)
        }
        Command::Extract(args) => {
            let document = extract_document(cli, &config, &args.images)?;
            if args.show_text {
                eprintln!("{}", document.text);
            }
            if document.is_empty() {
                print_error(&FieldscanError::InvalidInput(
                    "no text could be extracted from the document".into(),
                ));
                return Ok(ExitCode::FAILURE);
            }

            match reconcile(args, &config, &document) {
                Ok(fields) => {
                    println!("{}", serde_json::to_string_pretty(&fields)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Field extraction failed");
                    print_error(&err);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn extract_document(cli: &Cli, config: &PipelineConfig, images: &[PathBuf]) -> Result<DocumentText> {
    let client = backends::ocr_client(cli.vision_key.as_deref(), cli.ocr_model_dir.as_deref())?;
    let slot = OcrClientSlot::new();
    slot.install(client)?;

    let orchestrator = ExtractionOrchestrator::from_config(config, slot);
    let document = DocumentExtractor::new(orchestrator).extract_files(images);
    for page in document.failed_pages() {
        tracing::warn!(page = page.page, error = ?page.error, "Page produced no text");
    }
    Ok(document)
}

fn reconcile(
    args: &ExtractArgs,
    config: &PipelineConfig,
    document: &DocumentText,
) -> Result<fieldscan_core::FieldMap> {
    if args.deterministic_only {
        return FieldReconciler::deterministic()
            .with_config(config.reconciler.clone())
            .extract_fields_deterministic(&document.text, &args.fields);
    }

    let reconciler = backends::model_reconciler()?.with_config(config.reconciler.clone());
    let regions = args.region_summary.then(|| document.region_summaries());
    reconciler.extract_fields(&document.text, &args.fields, regions.as_deref())
}

/// Print a reconciliation failure as `{"error": ..., "raw_output": ...}`.
fn print_error(err: &FieldscanError) {
    let mut body = json!({ "error": err.to_string() });
    if let Some(raw) = err.raw_output() {
        body["raw_output"] = json!(raw);
    }
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{{\"error\": \"{err}\"}}"),
    }
}
