//! `slambridge` – sensor WebSocket to ROS 2 bridge.
//!
//! 1. Loads `~/.slambridge/config.toml` (writing defaults on first run) and
//!    applies `SLAMBRIDGE_*` overrides.
//! 2. Connects to `rosbridge_server` and advertises the scan, odom and imu
//!    topics.
//! 3. Listens for sensor clients and routes every frame onto those topics.
//! 4. On Ctrl-C / SIGTERM, stops accepting, closes open connections, flushes
//!    what was already routed and exits.
//!
//! Exits non-zero when the listener cannot bind, rosbridge is unreachable, or
//! either task fails while running.

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use slambridge_cli::{build_runtime, config, install_shutdown_handler, print_banner, telemetry};
use slambridge_middleware::{Forwarder, Listener, RosbridgeSink, Router, TopicBus};
use slambridge_types::{BridgeConfig, BridgeError};
use tokio::sync::watch;
use tracing::{error, info};

fn main() -> ExitCode {
    let _telemetry = telemetry::init_tracing("slambridge");

    print_banner("Sensor WebSocket → ROS 2 bridge");

    let cfg = Arc::new(config::load_or_default());
    println!(
        "  Sensors   {}",
        format!("ws://{}:{}", cfg.listen_host, cfg.listen_port).bold()
    );
    println!("  rosbridge {}", cfg.rosbridge_url.bold());
    println!(
        "  Topics    {} {} {}\n",
        cfg.topics.scan.dimmed(),
        cfg.topics.odom.dimmed(),
        cfg.topics.imu.dimmed()
    );

    let (shutdown_tx, shutdown_rx) = install_shutdown_handler();

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, shutdown_tx, shutdown_rx)) {
        Ok(()) => {
            println!("{}", "  ✓ Bridge stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "bridge failed");
            println!("{}: {}", "Bridge error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cfg: Arc<BridgeConfig>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    let addr = cfg.listen_addr()?;

    let bus = Arc::new(TopicBus::new(cfg.bus_capacity.max(1)));
    // Subscribe before anything can publish so no frame is missed.
    let bus_rx = bus.subscribe();

    let sink = RosbridgeSink::connect(&cfg.rosbridge_url).await?;
    let forwarder = Forwarder::new(sink, &cfg);

    let router = Arc::new(Router::new(Arc::clone(&cfg), bus));
    let listener = Listener::bind(addr, router).await?;

    let mut listener_task = tokio::spawn(listener.run(shutdown_rx.clone()));
    let mut forwarder_task = tokio::spawn(forwarder.run(bus_rx, shutdown_rx));

    // Whichever task ends first, stop the other one too.
    let (listener_result, forwarder_result) = tokio::select! {
        res = &mut listener_task => {
            shutdown_tx.send_replace(true);
            (res, (&mut forwarder_task).await)
        }
        res = &mut forwarder_task => {
            shutdown_tx.send_replace(true);
            ((&mut listener_task).await, res)
        }
    };

    let listener_result = listener_result
        .map_err(|e| BridgeError::Transport(format!("listener task panicked: {e}")))?;
    let forwarder_result = forwarder_result
        .map_err(|e| BridgeError::Transport(format!("forwarder task panicked: {e}")))?;

    listener_result?;
    let sink = forwarder_result?;
    info!(url = sink.url(), "rosbridge session closed");
    Ok(())
}
