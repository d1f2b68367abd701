//! WebSocket chat relay with broadcast functionality.
//!
//! Receives messages from clients and broadcasts them to all connected clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin agora-server
//! cargo run --bin agora-server -- --host 127.0.0.1 --port 3000 --workers 2
//! cargo run --bin agora-server -- --config ./agora.toml
//! ```

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use agora_server::{
    config::{ConfigOverrides, ServerConfig},
    ui::Server,
    usecase::ConnectionHub,
};
use agora_shared::{logger::setup_logger, time::SystemClock};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "agora-server")]
#[command(about = "WebSocket chat relay with broadcast support", long_about = None)]
struct Args {
    /// Host address to bind the server to [default: 0.0.0.0]
    #[arg(short = 'H', long, env = "AGORA_HOST")]
    host: Option<String>,

    /// Port number to bind the server to [default: 8080]
    #[arg(short = 'p', long, env = "AGORA_PORT")]
    port: Option<u16>,

    /// Number of runtime worker threads [default: one per CPU core]
    #[arg(short = 'w', long, env = "AGORA_WORKERS")]
    workers: Option<usize>,

    /// Path to a TOML config file
    #[arg(short = 'c', long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            workers: self.workers,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match ServerConfig::resolve(args.config.as_deref(), args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("agora-server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to build runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let hub = Arc::new(
            ConnectionHub::new(Arc::new(SystemClock)).with_send_timeout(config.send_timeout()),
        );
        tracing::info!(
            "Starting with {} worker threads",
            config
                .workers
                .map_or_else(|| "auto".to_string(), |workers| workers.to_string())
        );

        match Server::new(hub).run(&config.bind_addr()).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Server error: {}", e);
                ExitCode::FAILURE
            }
        }
    })
}
