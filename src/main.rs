//! parfind - Parallel search for files & dirs
//!
//! Entry point for the CLI application.

use clap::error::ErrorKind;
use clap::Parser;
use parfind::config::{extract_exec_args, CliArgs, ScanConfig};
use parfind::summary::print_summary;
use parfind::walker::{ScanCoordinator, ScanReport};
use std::io;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // the exec argument span may contain anything, including strings that
    // look like options, so it is stripped from argv before clap runs
    let argv: Vec<String> = std::env::args().collect();
    let (argv, exec_cmdline) = match extract_exec_args(argv) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let args = match CliArgs::try_parse_from(argv) {
        Ok(args) => args,
        Err(e) => {
            let kind = e.kind();
            let _ = e.print();
            return match kind {
                // usage output counts as a failed run; version does not
                ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    setup_logging(args.verbose);

    match run(args, exec_cmdline) {
        Ok(report) if report.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs, exec_cmdline: Vec<String>) -> parfind::Result<ScanReport> {
    let config = Arc::new(ScanConfig::from_args(args, exec_cmdline)?);

    let coordinator = ScanCoordinator::new(Arc::clone(&config));

    // first interrupt drains the scan gracefully, the second forces exit
    let ctx = coordinator.context();
    let interrupt_count = Arc::new(AtomicU32::new(0));
    ctrlc::set_handler(move || {
        let count = interrupt_count.fetch_add(1, Ordering::SeqCst);
        if count == 0 {
            eprintln!("\nInterrupt received, shutting down gracefully...");
            eprintln!("Press Ctrl+C again to force exit immediately.");
            ctx.request_shutdown();
        } else {
            eprintln!("\nForced exit!");
            std::process::exit(130);
        }
    })
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let report = coordinator.run();

    print_summary(&config, &report);

    Ok(report)
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("parfind=info,warn")
    } else {
        EnvFilter::new("parfind=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
