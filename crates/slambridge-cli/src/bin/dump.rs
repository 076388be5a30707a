//! `slambridge-dump` – print every frame sensor clients send.
//!
//! Listens on the same address as `slambridge` but publishes nothing: valid
//! JSON is pretty-printed to stdout, anything else is echoed raw. Useful for
//! checking a sensor client before ROS is running.

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use slambridge_cli::{build_runtime, config, install_shutdown_handler, print_banner, telemetry};
use slambridge_middleware::{FramePrinter, Listener};
use slambridge_types::BridgeError;
use tokio::sync::watch;
use tracing::error;

fn main() -> ExitCode {
    let _telemetry = telemetry::init_tracing("slambridge-dump");

    print_banner("Frame dump (no ROS publishing)");

    let cfg = config::load_or_default();
    let addr = match cfg.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    println!("  Listening on {}\n", format!("ws://{addr}").bold());

    let (_shutdown_tx, shutdown_rx) = install_shutdown_handler();

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(addr, shutdown_rx)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "dump server failed");
            println!("{}: {}", "Dump error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(addr: std::net::SocketAddr, shutdown: watch::Receiver<bool>) -> Result<(), BridgeError> {
    let printer = Arc::new(FramePrinter::stdout());
    Listener::bind(addr, printer).await?.run(shutdown).await
}
