// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! libvirt-guest-syncd
//!
//! Background process that keeps libvirt domain lifecycle and systemd
//! `libvirt-guest@<domain>.service` units converged. Bootstraps the
//! reconciler against the real hypervisor, init-system bus, and
//! journal tail, then just watches its liveness until asked to stop.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use vg_adapters::{JournalTailer, LibvirtAdapter, SystemdAdapter};
use vg_core::SystemClock;
use vg_daemon::{Config, LifecycleError};
use vg_engine::Reconciler;

/// How often the main loop polls `Reconciler::healthy()`.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("libvirt-guest-syncd {}", env!("CARGO_PKG_VERSION"));
                return std::process::ExitCode::SUCCESS;
            }
            "--help" | "-h" | "help" => {
                print_help();
                return std::process::ExitCode::SUCCESS;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: libvirt-guest-syncd [--help | --version]");
                return std::process::ExitCode::FAILURE;
            }
        }
    }

    let config = Config::load();
    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: failed to set up logging: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!("starting libvirt-guest-syncd");

    match run(config).await {
        Ok(()) => {
            info!("daemon stopped cleanly");
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "daemon exiting unhealthy");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let (hypervisor, hypervisor_events) = LibvirtAdapter::connect(config.libvirt_uri.as_deref())?;
    let hypervisor = Arc::new(hypervisor);

    let units = SystemdAdapter::connect().await?;
    let tailer = Arc::new(JournalTailer::new());

    let reconciler = Reconciler::bootstrap(
        hypervisor,
        hypervisor_events,
        units,
        tailer,
        SystemClock,
        config.reconciler,
    )
    .await?;

    info!("reconciler bootstrapped, entering steady state");

    wait_for_shutdown_or_failure(reconciler).await
}

async fn wait_for_shutdown_or_failure(
    reconciler: Reconciler<LibvirtAdapter>,
) -> Result<(), LifecycleError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut health_check = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    // The first tick fires immediately; skip it so the interval actually
    // waits HEALTH_CHECK_INTERVAL before the first liveness check.
    health_check.tick().await;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                reconciler.shutdown().await;
                return Ok(());
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                reconciler.shutdown().await;
                return Ok(());
            }
            _ = health_check.tick() => {
                if !reconciler.healthy() {
                    reconciler.shutdown().await;
                    return Err(LifecycleError::Reconcile(
                        vg_engine::ReconcileError::Bootstrap(
                            "a supervised component stopped running".to_string(),
                        ),
                    ));
                }
            }
        }
    }
}

fn print_help() {
    println!("libvirt-guest-syncd {}", env!("CARGO_PKG_VERSION"));
    println!("Bidirectional sync between libvirt domains and their systemd units");
    println!();
    println!("USAGE:");
    println!("    libvirt-guest-syncd");
    println!();
    println!("The daemon is normally started by its own systemd unit and takes");
    println!("no arguments; configuration is read entirely from the environment");
    println!("(LIBVIRT_DEFAULT_URI, VG_UNIT_PREFIX, VG_LOG_PATH, and the VG_*");
    println!("timing knobs documented in README).");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config.log_path.parent().ok_or(LifecycleError::NoLogDir)?;
    std::fs::create_dir_all(parent)?;

    let file_name = config
        .log_path
        .file_name()
        .ok_or(LifecycleError::NoLogDir)?;
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

