//! Application orchestrator.
//! Resolves and loads the config, initializes logging, installs the signal
//! handler, then runs the service (or a one-shot mode) until interrupted.
//!
//! Exit codes: 0 success, 1 runtime failure, 2 startup failure (config or
//! folders), 3 at least one file lost custody.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use pdf_exporter::cli::Args;
use pdf_exporter::config::load_config;
use pdf_exporter::output as out;
use pdf_exporter::{IngestError, SequenceStore, Service, StopToken, resolve_config_path, shutdown};

use crate::logging::init_tracing;

const EXIT_RUNTIME: u8 = 1;
const EXIT_STARTUP: u8 = 2;
const EXIT_CUSTODY_LOSS: u8 = 3;

/// How often the main thread checks that the watcher is still alive.
const LIVENESS_TICK: Duration = Duration::from_secs(1);

pub fn run(args: Args) -> ExitCode {
    let Some(config_path) = resolve_config_path(args.config.as_deref()) else {
        out::print_error("Could not determine a config path; pass --config or set PDF_EXPORTER_CONFIG.");
        return ExitCode::from(EXIT_STARTUP);
    };

    if args.print_config {
        out::print_info(&format!("Configuration file:\n  {}", config_path.display()));
        if !config_path.exists() {
            out::print_warn("No file exists there yet; the agent will refuse to start without one.");
        }
        return ExitCode::SUCCESS;
    }

    let record = match load_config(&config_path) {
        Ok(r) => r,
        Err(e) => {
            // Log with CLI settings only so the failure still reaches the log file.
            let _guard = init_tracing(args.log_level_for(&Default::default()), args.log_file.as_deref(), args.json)
                .ok()
                .flatten();
            report_startup_error(&e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let level = args.log_level_for(&record.options);
    let log_file = args.log_file_for(&record.options);
    let guard = match init_tracing(level, log_file.as_deref(), args.json) {
        Ok(g) => g,
        Err(e) => {
            out::print_error(&format!("Failed to initialize logging: {e:#}"));
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    debug!(?args, "Starting pdf_exporter");
    info!(path = %config_path.display(), "Configuration loaded");
    let store = Arc::new(SequenceStore::with_record(&config_path, record));
    let code = run_with_store(&args, store, &config_path);

    // Flush the file appender before exit.
    drop(guard);
    code
}

fn run_with_store(args: &Args, store: Arc<SequenceStore>, config_path: &Path) -> ExitCode {
    let mut service = Service::from_store(store);

    if args.check {
        return match service.folders().ensure_ready() {
            Ok(()) => {
                out::print_success(&format!("Configuration '{}' and folders are usable", config_path.display()));
                ExitCode::SUCCESS
            }
            Err(e) => {
                report_startup_error(&e);
                ExitCode::from(EXIT_STARTUP)
            }
        };
    }

    if args.sweep_once {
        if let Err(e) = service.folders().ensure_ready() {
            report_startup_error(&e);
            return ExitCode::from(EXIT_STARTUP);
        }
        return match service.sweep_once() {
            Ok(sweep) => {
                out::print_info(&format!(
                    "Resent {} of {} waiting files ({} failed, {} still moving)",
                    sweep.delivered.len(),
                    sweep.attempted,
                    sweep.failed,
                    sweep.timed_out
                ));
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(code = e.code(), error = %e, "Resend sweep failed");
                ExitCode::from(EXIT_RUNTIME)
            }
        };
    }

    let token = StopToken::new();
    {
        let token = token.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown::request();
            token.cancel();
        }) {
            warn!(error = %e, "Could not install signal handler; stop with SIGKILL only");
        }
    }

    if let Err(e) = service.start() {
        report_startup_error(&e);
        return ExitCode::from(if e.is_startup() { EXIT_STARTUP } else { EXIT_RUNTIME });
    }

    let mut watcher_died = false;
    while !token.wait_timeout(LIVENESS_TICK) {
        if !service.is_watching() {
            error!("Folder monitoring stopped unexpectedly; shutting down");
            watcher_died = true;
            break;
        }
    }
    if shutdown::is_requested() {
        out::print_warn("Received interrupt; finishing in-progress files...");
    }

    let report = service.stop();
    out::print_report(&report);
    if report.has_custody_loss() {
        for path in &report.custody_lost {
            error!(severity = "critical", path = %path.display(), "File requires manual recovery");
        }
        ExitCode::from(EXIT_CUSTODY_LOSS)
    } else if watcher_died {
        ExitCode::from(EXIT_RUNTIME)
    } else {
        ExitCode::SUCCESS
    }
}

fn report_startup_error(e: &IngestError) {
    let kind = match e {
        IngestError::ConfigMissing(_) => "config_missing",
        IngestError::ConfigInvalid { .. } => "config_invalid",
        IngestError::DirectoryUnavailable { .. } => "directory_unavailable",
        IngestError::Watch(_) => "watch_failed",
        _ => "startup_error",
    };
    error!(code = e.code(), kind, error = %e, "Startup failed");
    out::print_error(&e.to_string());
}
