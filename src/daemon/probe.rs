// Process existence checks and signal delivery

use crate::error::{CtlError, Result};
use std::fmt;
use std::str::FromStr;

/// Reports whether a process with a given PID exists on the host.
///
/// Existence only: a zombie, or an unrelated process that reused the PID,
/// is reported as alive.
pub trait LivenessProbe {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Delivers a termination signal to a process
pub trait Signaller {
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

impl<T: LivenessProbe + ?Sized> LivenessProbe for &T {
    fn is_alive(&self, pid: u32) -> bool {
        (**self).is_alive(pid)
    }
}

impl<T: Signaller + ?Sized> Signaller for &T {
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        (**self).signal(pid, signal)
    }
}

/// Signals the controller may use to stop the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    #[default]
    Term,
    Int,
    Quit,
    Kill,
    Hup,
}

impl StopSignal {
    pub const NAMES: [&'static str; 5] = ["SIGTERM", "SIGINT", "SIGQUIT", "SIGKILL", "SIGHUP"];

    pub fn name(&self) -> &'static str {
        match self {
            StopSignal::Term => "SIGTERM",
            StopSignal::Int => "SIGINT",
            StopSignal::Quit => "SIGQUIT",
            StopSignal::Kill => "SIGKILL",
            StopSignal::Hup => "SIGHUP",
        }
    }

    #[cfg(unix)]
    fn as_nix(&self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;
        match self {
            StopSignal::Term => Signal::SIGTERM,
            StopSignal::Int => Signal::SIGINT,
            StopSignal::Quit => Signal::SIGQUIT,
            StopSignal::Kill => Signal::SIGKILL,
            StopSignal::Hup => Signal::SIGHUP,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StopSignal {
    type Err = CtlError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" => Ok(StopSignal::Term),
            "INT" => Ok(StopSignal::Int),
            "QUIT" => Ok(StopSignal::Quit),
            "KILL" => Ok(StopSignal::Kill),
            "HUP" => Ok(StopSignal::Hup),
            _ => Err(CtlError::ConfigValidationError(format!(
                "Invalid stop_signal: {}. Must be one of: {}",
                s,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// Probe and signaller backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl SystemProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl LivenessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }

        // Signal 0 performs the permission and existence checks only
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(Errno::ESRCH) => false,
            Err(e) => {
                tracing::debug!("Liveness probe for PID {} failed: {}", pid, e);
                false
            }
        }
    }
}

#[cfg(not(unix))]
impl LivenessProbe for SystemProbe {
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }
}

#[cfg(unix)]
impl Signaller for SystemProbe {
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| CtlError::SignalError(format!("PID {} is out of range", pid)))?;

        match kill(Pid::from_raw(raw), signal.as_nix()) {
            Ok(()) => Ok(()),
            // Exited between the probe and the signal
            Err(Errno::ESRCH) => {
                tracing::debug!("PID {} vanished before {} was delivered", pid, signal);
                Ok(())
            }
            Err(e) => Err(CtlError::SignalError(format!(
                "Failed to send {} to PID {}: {}",
                signal, pid, e
            ))),
        }
    }
}

#[cfg(not(unix))]
impl Signaller for SystemProbe {
    fn signal(&self, _pid: u32, _signal: StopSignal) -> Result<()> {
        Err(CtlError::SignalError(
            "Signals are only supported on Unix systems".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stop_signal() {
        assert_eq!("SIGTERM".parse::<StopSignal>().unwrap(), StopSignal::Term);
        assert_eq!("sigint".parse::<StopSignal>().unwrap(), StopSignal::Int);
        assert_eq!("KILL".parse::<StopSignal>().unwrap(), StopSignal::Kill);
        assert_eq!(" hup ".parse::<StopSignal>().unwrap(), StopSignal::Hup);
        assert!(matches!(
            "SIGSTOP".parse::<StopSignal>(),
            Err(CtlError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_names_round_trip() {
        for name in StopSignal::NAMES {
            assert_eq!(name.parse::<StopSignal>().unwrap().name(), name);
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_current_process_is_alive() {
        assert!(SystemProbe::new().is_alive(std::process::id()));
    }

    #[test]
    #[cfg(unix)]
    fn test_reaped_process_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(!SystemProbe::new().is_alive(pid));
    }

    #[test]
    fn test_out_of_range_pid_is_dead() {
        assert!(!SystemProbe::new().is_alive(u32::MAX));
        assert!(!SystemProbe::new().is_alive(0));
    }

    #[test]
    #[cfg(unix)]
    fn test_signal_terminates_process() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        let probe = SystemProbe::new();

        probe.signal(pid, StopSignal::Term).unwrap();
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(!probe.is_alive(pid));
    }
}
