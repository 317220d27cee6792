//! CLI entry point for the hyperlink repair tool.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use hyperlink_core::config::{load_config_file, load_default_config};
use hyperlink_core::{
    EngineConfig, HttpLookupService, HyperlinkRecord, LookupClient, PassControl, PassInput,
    PassOptions, PassOutput, RepairPipeline, RetryExecutor, TitleMode,
};
use serde::Serialize;
use tracing::{debug, info, warn};

mod cli;
mod progress_ui;

use cli::Args;

/// Records written back for the document collaborator.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputDocument<'a> {
    records: &'a [HyperlinkRecord],
    removed: &'a [HyperlinkRecord],
    cancelled: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout may carry the JSON output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => load_default_config()?,
    }
    .config;
    if let Some(max_retries) = args.max_retries {
        config.max_retry_attempts = u32::from(max_retries);
    }

    let input = read_input(&args.input)?;
    info!(
        records = input.records.len(),
        input = %args.input.display(),
        "Hyperlink repair starting"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let (control, progress) = PassControl::new()
        .with_cancel_flag(Arc::clone(&interrupted))
        .with_progress_channel();
    let pipeline = build_pipeline(&args, &config, control)?;

    let use_spinner = progress_ui::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        args.no_progress,
    );
    let (progress_handle, progress_stop) = progress_ui::spawn_progress_ui(use_spinner, progress);

    let output = pipeline.run(input).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    write_output(args.output.as_deref(), &output)?;
    write_report(&args, &output)?;

    for (category, count) in &output.counts {
        debug!(category = %category, count, "changelog count");
    }
    if output.service_needs_update {
        warn!(
            notes = ?output.service_notes,
            "Lookup service version changed; consider updating this tool"
        );
    }

    if output.cancelled {
        warn!("Interrupted. Partial results were written; run again to finish.");
        return Ok(ExitCode::FAILURE);
    }

    info!(
        records = output.records.len(),
        removed = output.removed.len(),
        changes = output.changelog.len(),
        "Hyperlink repair complete"
    );
    Ok(ExitCode::SUCCESS)
}

fn read_input(path: &Path) -> Result<PassInput> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse input file '{}'", path.display()))
}

fn build_pipeline(args: &Args, config: &EngineConfig, control: PassControl) -> Result<RepairPipeline> {
    let options = PassOptions {
        target: config.target_settings(),
        replacements: config.replacements.clone(),
        title_mode: if args.detect_only {
            TitleMode::DetectOnly
        } else {
            TitleMode::Apply
        },
    };

    let lookup_url = if args.offline {
        None
    } else {
        config.lookup_url.as_deref()
    };
    let cancel = control.cancel_flag();
    let mut pipeline = RepairPipeline::new(options).with_control(control);

    match lookup_url {
        Some(url) => {
            let service = HttpLookupService::new(url, config.timeout())
                .context("Failed to configure lookup service")?;
            let executor = RetryExecutor::new(config.retry_policy()).with_cancel_flag(cancel);
            pipeline = pipeline.with_lookup(LookupClient::new(Arc::new(service), executor));
            debug!(lookup_url = url, "lookup service enabled");
        }
        None => info!("No lookup service configured; running local repairs only"),
    }

    Ok(pipeline)
}

fn write_output(path: Option<&Path>, output: &PassOutput) -> Result<()> {
    let document = OutputDocument {
        records: &output.records,
        removed: &output.removed,
        cancelled: output.cancelled,
    };
    let json = serde_json::to_string_pretty(&document).context("Failed to serialize records")?;

    match path {
        Some(path) => fs::write(path, format!("{json}\n"))
            .with_context(|| format!("Failed to write output file '{}'", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").context("Failed to write records to stdout")?;
        }
    }
    Ok(())
}

fn write_report(args: &Args, output: &PassOutput) -> Result<()> {
    match &args.report {
        Some(path) => fs::write(path, &output.report)
            .with_context(|| format!("Failed to write report file '{}'", path.display()))?,
        None if !args.quiet => {
            let mut stderr = io::stderr().lock();
            write!(stderr, "{}", output.report).context("Failed to write report")?;
        }
        None => {}
    }
    Ok(())
}
