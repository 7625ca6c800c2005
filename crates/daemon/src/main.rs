// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! taskd: per-task runner daemon for a decentralized inference network
//! node.
//!
//! Architecture:
//! - Manager loop: pulls events from the shared event queue and routes
//!   each to its task's runner, spawning a fresh runner the first time a
//!   task is seen (see `taskd_runtime::TaskManager`).
//! - Each task runner drives its own task independently from creation to
//!   a terminal on-chain status.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use fs2::FileExt;
use std::fs::File;
use taskd_daemon::{build_manager, Config, DaemonError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition.
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("taskd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("taskd {}", env!("CARGO_PKG_VERSION"));
                println!("Per-task runner daemon for a decentralized inference network node");
                println!();
                println!("USAGE:");
                println!("    taskd");
                println!();
                println!("Configuration is read entirely from the environment; see");
                println!("TASKD_STATE_DIR, TASKD_ACCOUNT, TASKD_RELAY_URL.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: taskd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    std::fs::create_dir_all(&config.state_dir)?;

    let _lock = acquire_lock(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!(account = %config.account, "starting taskd");

    let manager = build_manager(&config);
    let manager_handle = tokio::spawn(manager.clone().run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("taskd ready");

    tokio::select! {
        result = manager_handle => {
            if let Err(err) = result {
                error!(%err, "manager loop task panicked");
            } else {
                info!("event queue closed, shutting down");
            }
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    info!("taskd stopped");
    Ok(())
}

/// Acquires the single-instance lock file, writing this process's pid.
/// The returned `File` must be kept alive for the duration of the
/// process; the lock is released when it is dropped.
fn acquire_lock(config: &Config) -> Result<File, DaemonError> {
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(DaemonError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(DaemonError::NoStateDir)?,
        config.log_path.file_name().ok_or(DaemonError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
