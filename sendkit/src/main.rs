//! `sendkit-sim` — drive one scripted delivery attempt and report the outcome.
//!
//! ```bash
//! # Default scenario: three devices, sealed sender, no failures
//! cargo run --bin sendkit-sim
//!
//! # Scripted failures come from the config file
//! cargo run --bin sendkit-sim -- --config sim.toml --log-level debug
//!
//! # Malformed device list: the attempt starts empty
//! cargo run --bin sendkit-sim -- --devices 1,0
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

use sendkit::attempt::{AttemptParams, DeliveryAttempt};
use sendkit::config::{CliArgs, SimulatorConfig};
use sendkit::sim::{self, SimulatedService};
use sendkit_proto::access::{AccessKey, SenderCertificate, SendingAccess, UnidentifiedAccessMode};
use sendkit_proto::address::ServiceAddress;
use sendkit_proto::recipient::RecipientRecord;

/// Message body used by the simulated send.
const SIM_MESSAGE: &str = "hello from sendkit-sim";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match SimulatorConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            SimulatorConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let recipient = RecipientRecord::new(
        ServiceAddress::from_uuid(Uuid::now_v7()),
        config.sim.devices.clone(),
    );
    let sending_access = config.sim.sealed_sender.then(|| {
        SendingAccess::new(
            UnidentifiedAccessMode::Enabled,
            AccessKey::new([0x5a; 16]),
            SenderCertificate::new(b"sim-certificate".to_vec()),
        )
    });

    let attempt = DeliveryAttempt::with_config(
        AttemptParams {
            message: Arc::new(SIM_MESSAGE.to_string()),
            thread: Arc::new(Uuid::now_v7()),
            recipient: Arc::new(recipient),
            sending_access,
            local_address: ServiceAddress::from_uuid(Uuid::now_v7()),
        },
        config.attempt,
    )
    .on_success(|| tracing::info!("message delivered to every device"))
    .on_failure(|e| tracing::warn!(error = %e, "message delivery failed"))
    .on_send_error(|e| tracing::debug!(error = %e, "recording send error"));
    let attempt = Arc::new(attempt);

    let service = Arc::new(SimulatedService::from_config(&config.sim));
    let outcome = match sim::run_attempt(Arc::clone(&attempt), Arc::clone(&service)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "driver bookkeeping error");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for delivery in service.deliveries() {
        println!(
            "device {} <- {} ({})",
            delivery.device, delivery.transport, delivery.mode
        );
    }
    println!(
        "remaining attempts: {}, websocket failed: {}, sealed: {}",
        attempt.remaining_attempts(),
        attempt.has_websocket_send_failed(),
        attempt.is_ud_send()
    );

    match outcome {
        Ok(()) => {
            println!("delivered");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging to stderr, or to `file_path` when given.
///
/// A path without a usable directory and file name falls back to stderr
/// with a warning.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let target = file_path.and_then(|path| {
        let target = log_file_target(path);
        if target.is_none() {
            eprintln!(
                "Warning: cannot log to {}, logging to stderr instead",
                path.display()
            );
        }
        target
    });

    let Some((log_dir, file_name)) = target else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Splits a log file path into the directory and file name the appender
/// needs. A bare file name logs to the current directory.
fn log_file_target(path: &Path) -> Option<(&Path, &str)> {
    let file_name = path.file_name()?.to_str()?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Some((dir, file_name))
}
