// Process launcher - detached spawning of the service

use crate::error::{CtlError, Result};
use crate::process::spec::LaunchSpec;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Spawns the service as a detached background process
pub trait ProcessLauncher {
    /// Spawn `spec` with stdout and stderr appended to `log_sink`.
    ///
    /// Returns as soon as the child exists. The child is not awaited and
    /// keeps writing to the log sink after this call returns.
    fn launch(&self, spec: &LaunchSpec, log_sink: &Path) -> Result<u32>;
}

impl<T: ProcessLauncher + ?Sized> ProcessLauncher for &T {
    fn launch(&self, spec: &LaunchSpec, log_sink: &Path) -> Result<u32> {
        (**self).launch(spec, log_sink)
    }
}

/// Launcher that puts the child in its own session so it outlives the
/// controller and its terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

impl DetachedLauncher {
    pub fn new() -> Self {
        Self
    }
}

/// Open the log sink for appending, creating it and its directory if needed
fn open_log_sink(log_sink: &Path) -> Result<File> {
    if let Some(parent) = log_sink.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                CtlError::LaunchFailed(format!(
                    "Failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_sink)
        .map_err(|e| {
            CtlError::LaunchFailed(format!(
                "Failed to open log file {}: {}",
                log_sink.display(),
                e
            ))
        })
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: setsid is async-signal-safe and touches no parent state
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::from)?;
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn detach(_command: &mut Command) {}

impl ProcessLauncher for DetachedLauncher {
    fn launch(&self, spec: &LaunchSpec, log_sink: &Path) -> Result<u32> {
        let mut stdout = open_log_sink(log_sink)?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| CtlError::LaunchFailed(format!("Failed to share log file: {}", e)))?;

        writeln!(
            stdout,
            "==> {} launching: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            spec.command_line()
        )
        .map_err(|e| CtlError::LaunchFailed(format!("Failed to write log header: {}", e)))?;

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        detach(&mut command);

        let child = command.spawn().map_err(|e| {
            CtlError::LaunchFailed(format!(
                "Failed to spawn '{}': {}",
                spec.program.display(),
                e
            ))
        })?;

        let pid = child.id();
        tracing::info!("Spawned '{}' with PID {}", spec.command_line(), pid);

        // Dropping the handle neither waits for nor kills the child
        drop(child);

        Ok(pid)
    }
}
