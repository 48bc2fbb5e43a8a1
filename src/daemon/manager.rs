// Service lifecycle management: the start/stop protocol around the PID file

use super::pid::PidStore;
use super::probe::{LivenessProbe, Signaller, StopSignal};
use crate::config::{ServiceConfig, ServicePaths};
use crate::error::{CtlError, Result};
use crate::process::{LaunchSpec, ProcessLauncher};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Interval between liveness checks while waiting for a stopped process
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How `stop` signals the service and whether it waits for the exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub stop_signal: StopSignal,
    /// Zero clears the record immediately after signalling
    pub stop_timeout: Duration,
    pub poll_interval: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            stop_signal: config.stop_signal()?,
            stop_timeout: config.stop_timeout(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stop_signal: StopSignal::Term,
            stop_timeout: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A PID record that no longer describes a live process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleRecord {
    /// The recorded process no longer exists
    Dead(u32),
    /// The record could not be parsed
    Corrupt(String),
}

/// What the PID record says about the service right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Running(u32),
    Stale(StaleRecord),
    Stopped,
}

/// Result of a successful `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub pid: u32,
    pub log_file: PathBuf,
    /// Record removed before launching, if any
    pub replaced_stale: Option<StaleRecord>,
}

/// Whether `stop` observed the process exit after signalling it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitConfirmation {
    /// No wait was configured
    NotAwaited,
    Exited,
    TimedOut,
}

/// Result of `stop`; every variant leaves nothing recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped {
        pid: u32,
        signal: StopSignal,
        exit: ExitConfirmation,
    },
    /// A stale record was found and removed
    NotRunning(StaleRecord),
    /// No PID file existed
    NotFound,
}

/// Orchestrates start/stop of the single service instance
pub struct ServiceController<S, P, L> {
    store: S,
    probe: P,
    launcher: L,
    settings: ControllerSettings,
}

impl<S, P, L> ServiceController<S, P, L>
where
    S: PidStore,
    P: LivenessProbe + Signaller,
    L: ProcessLauncher,
{
    pub fn new(store: S, probe: P, launcher: L, settings: ControllerSettings) -> Self {
        Self {
            store,
            probe,
            launcher,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Classify the current record without changing it
    pub fn status(&self) -> Result<ServiceStatus> {
        match self.store.read() {
            Ok(Some(pid)) if self.probe.is_alive(pid) => Ok(ServiceStatus::Running(pid)),
            Ok(Some(pid)) => Ok(ServiceStatus::Stale(StaleRecord::Dead(pid))),
            Ok(None) => Ok(ServiceStatus::Stopped),
            Err(CtlError::CorruptRecord(reason)) => {
                Ok(ServiceStatus::Stale(StaleRecord::Corrupt(reason)))
            }
            Err(e) => Err(e),
        }
    }

    /// Launch the service unless a live instance is recorded.
    ///
    /// Directories are created first, whatever the record says. A stale
    /// or corrupt record is removed before launching. Nothing is written
    /// when the launch fails.
    pub fn start(&self, paths: &ServicePaths, spec: &LaunchSpec) -> Result<StartOutcome> {
        paths.ensure()?;

        let replaced_stale = match self.status()? {
            ServiceStatus::Running(pid) => {
                tracing::info!("Refusing to start: PID {} is alive", pid);
                return Err(CtlError::AlreadyRunning(pid));
            }
            ServiceStatus::Stale(stale) => {
                self.discard(&stale)?;
                Some(stale)
            }
            ServiceStatus::Stopped => None,
        };

        let pid = self.launcher.launch(spec, &paths.log_file)?;

        if let Err(e) = self.store.write(pid) {
            tracing::error!("Service started as PID {} but the record was not saved", pid);
            return Err(e);
        }

        tracing::info!("Service started with PID {}", pid);

        Ok(StartOutcome {
            pid,
            log_file: paths.log_file.clone(),
            replaced_stale,
        })
    }

    /// Signal the recorded instance and remove the record.
    ///
    /// With a zero stop timeout the record is removed right after the
    /// signal is sent, so the process may still be exiting.
    pub fn stop(&self, force: bool) -> Result<StopOutcome> {
        let pid = match self.status()? {
            ServiceStatus::Running(pid) => pid,
            ServiceStatus::Stale(stale) => {
                self.discard(&stale)?;
                return Ok(StopOutcome::NotRunning(stale));
            }
            ServiceStatus::Stopped => {
                tracing::debug!("No PID file, nothing to stop");
                return Ok(StopOutcome::NotFound);
            }
        };

        let signal = if force {
            StopSignal::Kill
        } else {
            self.settings.stop_signal
        };

        tracing::info!("Sending {} to PID {}", signal, pid);
        self.probe.signal(pid, signal)?;

        let exit = self.await_exit(pid);
        if exit == ExitConfirmation::TimedOut {
            tracing::warn!(
                "PID {} still alive {:?} after {}",
                pid,
                self.settings.stop_timeout,
                signal
            );
        }

        self.store.clear()?;

        Ok(StopOutcome::Stopped { pid, signal, exit })
    }

    /// Stop whatever is recorded, then start a fresh instance
    pub fn restart(
        &self,
        paths: &ServicePaths,
        spec: &LaunchSpec,
    ) -> Result<(StopOutcome, StartOutcome)> {
        let stopped = self.stop(false)?;
        let started = self.start(paths, spec)?;
        Ok((stopped, started))
    }

    fn discard(&self, stale: &StaleRecord) -> Result<()> {
        match stale {
            StaleRecord::Dead(pid) => {
                tracing::warn!("Removing stale PID file for dead PID {}", pid)
            }
            StaleRecord::Corrupt(reason) => {
                tracing::warn!("Removing corrupt PID file: {}", reason)
            }
        }
        self.store.clear()
    }

    fn await_exit(&self, pid: u32) -> ExitConfirmation {
        if self.settings.stop_timeout.is_zero() {
            return ExitConfirmation::NotAwaited;
        }

        let start = Instant::now();
        while start.elapsed() < self.settings.stop_timeout {
            if !self.probe.is_alive(pid) {
                tracing::debug!("PID {} exited after {:?}", pid, start.elapsed());
                return ExitConfirmation::Exited;
            }
            std::thread::sleep(self.settings.poll_interval);
        }

        if self.probe.is_alive(pid) {
            ExitConfirmation::TimedOut
        } else {
            ExitConfirmation::Exited
        }
    }
}
