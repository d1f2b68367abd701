//! Command-line interface of `agora-ctl`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::{
    domain::{LaunchMode, ServerCommand},
    usecase::SupervisorError,
};

#[derive(Parser, Debug)]
#[command(name = "agora-ctl")]
#[command(about = "Start, stop, restart and inspect the Agora chat server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the server (foreground unless --daemon)
    Start,
    /// Stop the server recorded in the PID file
    Stop,
    /// Stop the server, then start it again
    Restart,
    /// Show whether the server is running
    Status,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Host address the server binds to
    #[arg(long, global = true, env = "AGORA_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the server binds to
    #[arg(long, global = true, env = "AGORA_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of server worker threads
    #[arg(long, global = true, env = "AGORA_WORKERS")]
    pub workers: Option<usize>,

    /// Run the server in the background
    #[arg(short, long, global = true)]
    pub daemon: bool,

    /// Server config file (passed on only if it exists)
    #[arg(long, global = true, env = "AGORA_CONFIG", default_value = "./agora.toml")]
    pub config: PathBuf,

    /// Log file for daemon mode
    #[arg(long, global = true, env = "AGORA_LOG", default_value = "./logs/agora-server.log")]
    pub log: PathBuf,

    /// PID file of the daemon
    #[arg(long, global = true, env = "AGORA_PID", default_value = "./agora-server.pid")]
    pub pid: PathBuf,

    /// Server binary [default: agora-server next to this executable]
    #[arg(long, global = true, env = "AGORA_SERVER_BIN")]
    pub server_bin: Option<PathBuf>,
}

/// Errors raised by the command-line front end
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("cannot locate the agora-server binary: {0}")]
    ServerBinary(#[source] io::Error),

    #[error("cannot create log directory '{}': {source}", path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Options {
    /// Command line for the server process
    pub fn server_command(&self) -> Result<ServerCommand, CliError> {
        let program = match &self.server_bin {
            Some(program) => program.clone(),
            None => default_server_bin().map_err(CliError::ServerBinary)?,
        };
        Ok(ServerCommand {
            program,
            host: self.host.clone(),
            port: self.port,
            workers: self.workers,
            config: self.config.is_file().then(|| self.config.clone()),
        })
    }

    pub fn launch_mode(&self) -> LaunchMode {
        if self.daemon {
            LaunchMode::Detached {
                log: self.log.clone(),
            }
        } else {
            LaunchMode::Foreground
        }
    }

    /// Create the log file's parent directory (daemon mode only)
    pub fn ensure_log_dir(&self) -> Result<(), CliError> {
        if !self.daemon {
            return Ok(());
        }
        match self.log.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) => fs::create_dir_all(dir).map_err(|source| CliError::LogDir {
                path: dir.to_path_buf(),
                source,
            }),
            None => Ok(()),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_server_bin() -> io::Result<PathBuf> {
    let ctl = std::env::current_exe()?;
    Ok(sibling_binary(&ctl, "agora-server"))
}

fn sibling_binary(exe: &Path, name: &str) -> PathBuf {
    exe.with_file_name(format!("{}{}", name, std::env::consts::EXE_SUFFIX))
}
