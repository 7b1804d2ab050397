//! CLI entry point for rfetch.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use resumable_fetch::download::constants::{
    CHUNK_SIZE, CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
};
use resumable_fetch::{
    DownloadEvent, DownloadRequest, DownloadResult, Downloader, HttpClient, RetryPolicy,
};
use tracing::{debug, info};

mod app_config;
mod cli;
mod progress;

use app_config::FileConfig;
use cli::Args;

/// Exit status for a download stopped by Ctrl-C (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

/// Effective settings after merging CLI flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    output_dir: PathBuf,
    user_agent: Option<String>,
    max_attempts: u32,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    chunk_size: usize,
}

fn resolve_settings(args: &Args, config: Option<&FileConfig>) -> Settings {
    let config = config.cloned().unwrap_or_default();
    Settings {
        output_dir: args
            .dir
            .clone()
            .or(config.output_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        user_agent: args.user_agent.clone().or(config.user_agent),
        max_attempts: args
            .max_attempts
            .or(config.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS),
        connect_timeout: Duration::from_secs(
            args.connect_timeout
                .or(config.connect_timeout_secs)
                .unwrap_or(CONNECT_TIMEOUT_SECS),
        ),
        read_timeout: config.read_timeout_secs.map(Duration::from_secs),
        chunk_size: config.chunk_size.unwrap_or(CHUNK_SIZE),
    }
}

fn build_request(args: &Args, settings: &Settings) -> DownloadRequest {
    let request = if let Some(output) = &args.output {
        DownloadRequest::to_file(&args.url, output)
    } else if args.guess_name {
        DownloadRequest::guessing_name(&args.url, &settings.output_dir, args.mime.clone())
    } else {
        DownloadRequest::to_dir(&args.url, &settings.output_dir)
    };
    match &settings.user_agent {
        Some(user_agent) => request.with_user_agent(user_agent),
        None => request,
    }
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

    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = app_config::load_default_file_config()?;
    let settings = resolve_settings(&args, file_config.as_ref());
    debug!(?settings, "effective settings");

    if args.output.is_none() {
        tokio::fs::create_dir_all(&settings.output_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create output directory '{}'",
                    settings.output_dir.display()
                )
            })?;
    }

    let client = HttpClient::with_timeouts(settings.connect_timeout, settings.read_timeout)
        .context("Failed to build HTTP client")?;
    let downloader = Downloader::new(Arc::new(client))
        .retry_policy(RetryPolicy::with_max_attempts(settings.max_attempts))
        .chunk_size(settings.chunk_size);

    let request = build_request(&args, &settings);
    info!(url = %args.url, "rfetch starting");

    let mut handle = downloader.spawn(request);
    let interrupt = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let counter = progress::ByteCounter::new(
        progress::should_show_progress(io::stderr().is_terminal(), args.quiet, args.json),
        &args.url,
    );
    let mut outcome = None;
    while let Some(event) = handle.next_event().await {
        match event {
            DownloadEvent::Progress(bytes) => counter.set(bytes),
            DownloadEvent::Finished(result) => outcome = Some(result),
        }
    }
    counter.finish();

    let Some(result) = outcome else {
        anyhow::bail!("download finished without a result");
    };
    report(&result, args.json, args.quiet)?;

    Ok(exit_code(&result))
}

fn report(result: &DownloadResult, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    match result {
        DownloadResult::Completed {
            path,
            bytes_on_disk,
            ..
        } => {
            if !quiet {
                println!("{} ({bytes_on_disk} bytes)", path.display());
            }
        }
        DownloadResult::Cancelled {
            path,
            bytes_on_disk,
            diagnostic,
        } => {
            eprintln!(
                "{} Partial file kept: {} ({bytes_on_disk} bytes)",
                diagnostic.problem,
                path.display()
            );
        }
        DownloadResult::Failed(diagnostic) => {
            eprintln!("{}", diagnostic.problem);
            eprintln!("  Needed: {}", diagnostic.remedy);
            if let Some(cause) = &diagnostic.cause {
                debug!(error = %cause, "failure cause");
            }
        }
    }
    Ok(())
}

fn exit_code(result: &DownloadResult) -> ExitCode {
    match result {
        DownloadResult::Completed { .. } => ExitCode::SUCCESS,
        DownloadResult::Cancelled { .. } => ExitCode::from(EXIT_CANCELLED),
        DownloadResult::Failed(_) => ExitCode::FAILURE,
    }
}
