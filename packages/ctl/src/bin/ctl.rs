//! Process supervisor CLI for the Agora chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin agora-ctl -- start --daemon
//! cargo run --bin agora-ctl -- status
//! cargo run --bin agora-ctl -- restart --port 9000 --daemon
//! cargo run --bin agora-ctl -- stop
//! ```

use std::process::ExitCode;

use agora_ctl::{
    cli::{Cli, CliError, Command, Options},
    domain::ServerProcessState,
    infrastructure::{PidFile, SystemProcessControl},
    usecase::{StartOutcome, StatusReport, Supervisor},
};
use agora_shared::{logger::setup_logger, time::format_epoch_secs_local};
use clap::{CommandFactory, Parser};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let Some(command) = cli.command else {
        if let Err(e) = Cli::command().print_help() {
            tracing::error!("Failed to print help: {}", e);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    let supervisor = Supervisor::new(SystemProcessControl::new(), PidFile::new(&cli.options.pid));

    match run(command, &cli.options, &supervisor).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Command,
    options: &Options,
    supervisor: &Supervisor<SystemProcessControl>,
) -> Result<ExitCode, CliError> {
    match command {
        Command::Start => {
            let server = options.server_command()?;
            if supervisor.state() != ServerProcessState::Running {
                announce_start(options);
                options.ensure_log_dir()?;
            }
            let outcome = supervisor.start(&server, &options.launch_mode()).await?;
            println!("{}", outcome);
            Ok(exit_code(outcome))
        }
        Command::Stop => {
            println!("Stopping Agora server...");
            let outcome = supervisor.stop().await?;
            println!("{}", outcome);
            Ok(ExitCode::SUCCESS)
        }
        Command::Restart => {
            let server = options.server_command()?;
            options.ensure_log_dir()?;
            println!("Restarting Agora server on {}...", options.address());
            let outcome = supervisor.restart(&server, &options.launch_mode()).await?;
            println!("{}", outcome.stop);
            println!("{}", outcome.start);
            Ok(exit_code(outcome.start))
        }
        Command::Status => {
            print_status(&supervisor.status().await, options);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn announce_start(options: &Options) {
    println!("Starting Agora server on {}...", options.address());
    if options.daemon {
        println!("Starting in daemon mode...");
    } else {
        println!("Starting in foreground mode. Press Ctrl+C to stop.");
    }
}

/// Non-zero foreground exit codes are passed through
fn exit_code(outcome: StartOutcome) -> ExitCode {
    match outcome {
        StartOutcome::Exited { code: Some(0) } => ExitCode::SUCCESS,
        StartOutcome::Exited { code: Some(code) } => {
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        StartOutcome::Exited { code: None } => ExitCode::FAILURE,
        StartOutcome::AlreadyRunning { .. } | StartOutcome::Detached { .. } => ExitCode::SUCCESS,
    }
}

fn print_status(report: &StatusReport, options: &Options) {
    let StatusReport::Running { pid, snapshot } = report else {
        println!("{}", report);
        return;
    };

    println!("Server is running with PID {} on {}.", pid, options.address());
    if let Some(snapshot) = snapshot {
        let started = format_epoch_secs_local(snapshot.start_time)
            .unwrap_or_else(|| snapshot.start_time.to_string());
        println!("Process details:");
        println!("  Started: {}", started);
        println!("  CPU usage: {:.1}%", snapshot.cpu_percent);
        println!(
            "  Memory usage: {:.2} MB",
            snapshot.memory_bytes as f64 / BYTES_PER_MB
        );
    }
}
