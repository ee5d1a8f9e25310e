//! Executor service binary.

use anyhow::{Context, Result};
use clap::Parser;
use execbox_core::{ConfigLoader, ExecutionEngine};
use execbox_server::{shutdown_signal, ExecutorServer, ServerConfig, DEFAULT_PORT};
use log::LevelFilter;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "execbox server - run untrusted code in sandboxes over HTTP")]
struct Cli {
    #[clap(long, help = "Address to listen on [default: 127.0.0.1:8081]")]
    bind_addr: Option<String>,

    #[clap(long, env = "PORT", help = "Listen on all interfaces at this port when --bind-addr is absent")]
    port: Option<u16>,

    #[clap(long, short, help = "Engine configuration file (YAML)")]
    config: Option<PathBuf>,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, help = "Disable CORS headers")]
    no_cors: bool,

    #[clap(long = "cors-origin", help = "Allowed CORS origin, repeatable (default: any)")]
    cors_origins: Vec<String>,
}

impl Cli {
    fn bind_addr(&self) -> Result<SocketAddr> {
        match (&self.bind_addr, self.port) {
            (Some(addr), _) => addr
                .parse()
                .with_context(|| format!("Invalid bind address '{}'", addr)),
            (None, Some(port)) => Ok(SocketAddr::from(([0, 0, 0, 0], port))),
            (None, None) => Ok(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let engine_config = ConfigLoader::load(cli.config.as_deref())
        .await
        .context("Failed to load engine configuration")?;
    log::info!(
        "Engine limits: {} bytes memory, {} nano CPUs, {} pids, default timeout {}s",
        engine_config.limits.memory_bytes,
        engine_config.limits.nano_cpus,
        engine_config.limits.pids_limit,
        engine_config.execution.default_timeout_seconds
    );

    let engine = ExecutionEngine::connect_docker(engine_config)?;
    // The service still starts so that /health answers; executions fail until Docker is back.
    if let Err(e) = engine.health_check().await {
        log::warn!("Docker is not reachable yet: {}", e);
    }

    let mut server_config = ServerConfig::default()
        .with_bind_addr(cli.bind_addr()?)
        .with_cors(!cli.no_cors)
        .with_logging(true);
    if !cli.cors_origins.is_empty() {
        server_config = server_config.with_cors_origins(cli.cors_origins.clone());
    }

    let server = ExecutorServer::with_config(Arc::new(engine), server_config);

    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
