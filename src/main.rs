//! # HTTP from TCP - Entry Point
//! src/main.rs
//!
//! Levanta el servidor con las rutas de demostración y bloquea hasta que
//! termine el accept loop.

use http_from_tcp::commands::demo_router;
use http_from_tcp::config::Config;
use http_from_tcp::metrics::MetricsCollector;
use http_from_tcp::server::Server;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = Config::from_args();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = config.validate() {
        error!(error = %e, "configuración inválida");
        process::exit(2);
    }

    info!(
        address = %config.address(),
        read_chunk = config.read_chunk_size,
        read_timeout_ms = config.read_timeout_ms,
        write_timeout_ms = config.write_timeout_ms,
        "configuración"
    );

    let metrics = Arc::new(MetricsCollector::new());
    let router = demo_router(Arc::clone(&metrics));

    let result = Server::bind(config, router)
        .map(|server| server.with_metrics(metrics))
        .and_then(Server::start)
        .and_then(|handle| handle.join());

    if let Err(e) = result {
        error!(error = %e, "error fatal");
        process::exit(1);
    }
}
