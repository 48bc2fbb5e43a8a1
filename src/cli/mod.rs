// CLI module - start/stop commands for the TTS API server

mod output;

use crate::config::ServiceConfig;
use crate::daemon::{
    ControllerSettings, PidFile, ServiceController, ServiceStatus, StopOutcome, SystemProbe,
};
use crate::error::{CtlError, Result};
use crate::process::{DetachedLauncher, ProcessMonitor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code of `status` when nothing is running
const EXIT_NOT_RUNNING: i32 = 3;

type SystemController = ServiceController<PidFile, SystemProbe, DetachedLauncher>;

/// ttsctl - start and stop the F5-TTS API server in the background
#[derive(Parser, Debug)]
#[command(name = "ttsctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base working directory (overrides F5_TTS_BASE_DIR)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Address the server binds to
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port the server listens on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the server in the background
    Start,

    /// Stop the running server
    Stop {
        /// Kill the server (SIGKILL) instead of the configured signal
        #[arg(short, long)]
        force: bool,
    },

    /// Show whether the server is running
    Status,

    /// Stop the server if running, then start it again
    Restart,
}

impl Cli {
    /// Run the CLI application and return the process exit code
    pub fn run() -> i32 {
        let cli = Cli::parse();
        init_logging(cli.verbose);

        match cli.execute() {
            Ok(code) => code,
            Err(CtlError::AlreadyRunning(pid)) => {
                output::print_already_running(pid);
                CtlError::AlreadyRunning(pid).exit_code()
            }
            Err(e) => {
                output::print_error(&e.to_string());
                e.exit_code()
            }
        }
    }

    /// Execute the parsed command
    fn execute(&self) -> Result<i32> {
        let config = self.resolve_config()?;
        let paths = config.paths();
        let settings = ControllerSettings::from_config(&config)?;
        let controller: SystemController = ServiceController::new(
            PidFile::with_path(&paths.pid_file),
            SystemProbe::new(),
            DetachedLauncher::new(),
            settings,
        );

        tracing::debug!("PID file: {}", paths.pid_file.display());

        match self.command {
            Commands::Start => {
                let spec = config.launch_spec(&paths);
                let outcome = controller.start(&paths, &spec)?;
                output::print_started(&outcome);
                Ok(0)
            }

            Commands::Stop { force } => {
                let outcome = stop_with_progress(&controller, force)?;
                output::print_stopped(&outcome);
                Ok(0)
            }

            Commands::Status => {
                let status = controller.status()?;
                let snapshot = match status {
                    ServiceStatus::Running(pid) => ProcessMonitor::new().snapshot(pid),
                    _ => None,
                };
                output::print_status(&status, snapshot.as_ref(), &paths.pid_file);
                Ok(match status {
                    ServiceStatus::Running(_) => 0,
                    _ => EXIT_NOT_RUNNING,
                })
            }

            Commands::Restart => {
                let spec = config.launch_spec(&paths);
                let (stopped, started) = with_progress(&controller, "Restarting server...", || {
                    controller.restart(&paths, &spec)
                })?;
                output::print_stopped(&stopped);
                output::print_started(&started);
                Ok(0)
            }
        }
    }

    /// Defaults, then the config file, then the environment, then flags
    fn resolve_config(&self) -> Result<ServiceConfig> {
        self.resolve_config_with(|key| std::env::var(key).ok())
    }

    fn resolve_config_with<F>(&self, lookup: F) -> Result<ServiceConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config {
            Some(ref path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };

        config.apply_env_with(lookup)?;

        if let Some(ref base_dir) = self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Stop, showing a spinner while waiting for the exit
fn stop_with_progress(controller: &SystemController, force: bool) -> Result<StopOutcome> {
    with_progress(controller, "Stopping server...", || controller.stop(force))
}

/// Run `action` under a spinner when the stop path polls for the exit
fn with_progress<T, F>(controller: &SystemController, message: &str, action: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    if controller.settings().stop_timeout.is_zero() {
        return action();
    }

    let pb = output::create_progress_bar(message);
    let result = action();
    match result {
        Ok(_) => output::finish_progress_success(pb, "Done"),
        Err(ref e) => output::finish_progress_error(pb, &e.to_string()),
    }
    result
}

/// Initialise tracing on stderr; RUST_LOG takes precedence over `verbose`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENV_BASE_DIR, ENV_PORT};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["ttsctl", "start"]).unwrap();
        assert_eq!(cli.command, Commands::Start);

        let cli = Cli::try_parse_from(["ttsctl", "stop", "--force"]).unwrap();
        assert_eq!(cli.command, Commands::Stop { force: true });

        let cli = Cli::try_parse_from(["ttsctl", "status", "-v"]).unwrap();
        assert_eq!(cli.command, Commands::Status);
        assert!(cli.verbose);

        assert!(Cli::try_parse_from(["ttsctl"]).is_err());
        assert!(Cli::try_parse_from(["ttsctl", "launch"]).is_err());
    }

    #[test]
    fn test_flags_override_environment() {
        let cli =
            Cli::try_parse_from(["ttsctl", "--port", "7100", "--base-dir", "/cli", "start"])
                .unwrap();

        let config = cli
            .resolve_config_with(|key| match key {
                ENV_PORT => Some("9000".to_string()),
                ENV_BASE_DIR => Some("/env".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.port, 7100);
        assert_eq!(config.base_dir, PathBuf::from("/cli"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ttsctl.toml");
        fs::write(&config_path, "port = 7000\nhost = \"127.0.0.1\"\n").unwrap();

        let path_arg = config_path.to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["ttsctl", "--config", path_arg.as_str(), "stop"]).unwrap();

        let config = cli
            .resolve_config_with(|key| (key == ENV_PORT).then(|| "7001".to_string()))
            .unwrap();

        assert_eq!(config.port, 7001);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_flag_value_rejected() {
        let cli = Cli::try_parse_from(["ttsctl", "--host", "", "start"]).unwrap();
        let result = cli.resolve_config_with(|_| None);
        assert!(matches!(result, Err(CtlError::ConfigValidationError(_))));
    }
}
