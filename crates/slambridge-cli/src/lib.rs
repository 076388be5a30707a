//! Shared start-up plumbing for the `slambridge` and `slambridge-dump`
//! binaries.

pub mod config;
pub mod telemetry;

use std::sync::Arc;

use colored::Colorize;
use tokio::sync::watch;
use tracing::warn;

/// Print the start-up banner.
pub fn print_banner(subtitle: &str) {
    println!();
    println!("{}", r#"     _               _          _    _          "#.bold().cyan());
    println!("{}", r#" ___| |__ _ _ __    | |__ _ _ _(_)__| |__ _ ___ "#.bold().cyan());
    println!("{}", r#"(_-<| / _` | '  \   | '_ \ '_| / _` / _` / -_)"#.bold().cyan());
    println!("{}", r#"/__/|_\__,_|_|_|_|  |_.__/_| |_\__,_\__, \___|"#.bold().cyan());
    println!("{}", r#"                                    |___/      "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "slambridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  {subtitle}");
    println!();
}

/// Create the shutdown channel and flip it to `true` on Ctrl-C / SIGTERM.
///
/// The sender is returned so a task that fails can stop the others the same
/// way.
pub fn install_shutdown_handler() -> (Arc<watch::Sender<bool>>, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    let tx = Arc::new(tx);
    let tx_ctrlc = Arc::clone(&tx);

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Shutdown requested – closing connections …".yellow().bold());
        tx_ctrlc.send_replace(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; graceful shutdown unavailable");
    }

    (tx, rx)
}

/// Multi-threaded Tokio runtime for the binaries.
pub fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("slambridge")
        .build()
}
