use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use fhirscope_client::{AuthenticatedClient, FhirError};
use fhirscope_core::cursor_log::CursorLog;
use fhirscope_core::endpoints::{load_endpoints, prepare_endpoints};
use fhirscope_core::probe::{EndpointResult, ProbeOptions, probe_endpoints};
use fhirscope_core::report::{generate_latency_report, generate_walk_summary};
use fhirscope_core::walk::{WalkOptions, parse_contract_month, walk_cursors};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error};

// Helper functions shared by both handlers

/// Expand a leading `~` in a path taken from the command line or environment
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

fn required<'a, T>(args: &'a ArgMatches, name: &str) -> Result<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    args.get_one::<T>(name)
        .with_context(|| format!("Missing required setting --{}", name))
}

/// Logs go to stderr so the latency table on stdout stays clean
pub fn init_logging(quiet: bool) {
    let level = if quiet { Level::WARN } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();
}

pub fn walk_options_from_args(args: &ArgMatches) -> Result<WalkOptions> {
    let host = required::<String>(args, "host")?;
    let port = *required::<u16>(args, "port")?;
    let contract_id = required::<String>(args, "contract-id")?;
    let contract_month = parse_contract_month(required::<String>(args, "contract-month")?)?;

    let mut options = WalkOptions::for_host(host, port, contract_id.clone(), contract_month);
    if let Some(year) = args.get_one::<String>("reference-year") {
        options = options.with_reference_year(year.clone());
    }
    if let Some(limit) = args.get_one::<u64>("max-pages") {
        options = options.with_page_limit(*limit as usize);
    }
    Ok(options)
}

pub fn probe_options_from_args(args: &ArgMatches) -> ProbeOptions {
    let defaults = ProbeOptions::default();
    ProbeOptions {
        tries: args
            .get_one::<u64>("tries")
            .map(|t| *t as usize)
            .unwrap_or(defaults.tries),
        concurrency: args.get_one::<usize>("concurrency").copied(),
    }
}

pub fn client_from_args(args: &ArgMatches) -> Result<AuthenticatedClient> {
    let cert_path = expand_path(required::<PathBuf>(args, "cert")?);
    let timeout = args.get_one::<u64>("timeout").map(|s| Duration::from_secs(*s));
    Ok(AuthenticatedClient::from_pem_file(&cert_path, timeout)?)
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn endpoint_bar(quiet: bool, total: usize) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} endpoints {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}

/// Prints a failure the way both subcommands report them. The caller exits.
pub fn report_failure(err: &anyhow::Error) {
    let kind = err
        .downcast_ref::<FhirError>()
        .map(|e| e.kind().to_string())
        .unwrap_or_else(|| "unexpected".to_string());
    error!(kind = %kind, "{:#}", err);
    eprintln!("{} {} error: {:#}", "✗".red().bold(), kind, err);
}

pub async fn handle_cursors(args: &ArgMatches, quiet: bool) -> Result<()> {
    let options = walk_options_from_args(args)?;
    let client = client_from_args(args)?;

    let log_dir = args
        .get_one::<PathBuf>("log-dir")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| PathBuf::from("."));
    let mut log = CursorLog::create_in(&log_dir)
        .with_context(|| format!("Failed to create cursor log in {}", log_dir.display()))?;

    if !quiet {
        println!(
            "{} Walking cursors for contract {} month {:02}",
            "→".blue(),
            options.contract_id.bright_white(),
            options.contract_month
        );
        println!(
            "{} Logging to {}",
            "→".blue(),
            log.path().display().to_string().bright_white()
        );
    }

    let pb = spinner(quiet);
    pb.set_message("Fetching first page...");
    let pb_clone = pb.clone();
    let progress = Arc::new(move |pages: usize, cursors: usize| {
        pb_clone.set_message(format!("{} pages fetched, {} cursors", pages, cursors));
    });

    let outcome = walk_cursors(&client, &options, &mut log, Some(progress)).await;
    pb.finish_and_clear();

    let summary = outcome.with_context(|| {
        format!(
            "Cursor walk aborted; cursors found so far are in {}",
            log.path().display()
        )
    })?;

    println!(
        "{} {}",
        "✓".green().bold(),
        generate_walk_summary(&summary, log.path())
    );
    Ok(())
}

pub async fn handle_latency(args: &ArgMatches, quiet: bool) -> Result<()> {
    let client = client_from_args(args)?;

    let base_url = required::<String>(args, "base-url")?;
    let endpoints_path = expand_path(required::<PathBuf>(args, "endpoints")?);
    let specs = load_endpoints(&endpoints_path)?;
    let endpoints = prepare_endpoints(base_url, &specs)?;
    let options = probe_options_from_args(args);

    let pb = endpoint_bar(quiet, endpoints.len());
    let pb_clone = pb.clone();
    let progress = Arc::new(move |result: &EndpointResult| {
        pb_clone.set_message(result.path.clone());
        pb_clone.inc(1);
    });

    let outcome = probe_endpoints(&client, endpoints, &options, Some(progress)).await;
    pb.finish_and_clear();

    let results = outcome.context("Latency probe aborted")?;
    print!("{}", generate_latency_report(&results));
    Ok(())
}
