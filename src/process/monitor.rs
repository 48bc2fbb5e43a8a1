// Process monitor - resource snapshot of the running service

use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Point-in-time resource usage of a running process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    /// Executable name as reported by the OS
    pub name: String,
    /// Resident memory in bytes
    pub memory: u64,
    pub cpu_usage: f32,
    pub run_time: Duration,
}

/// Process monitor for collecting resource usage statistics
pub struct ProcessMonitor {
    system: System,
}

impl ProcessMonitor {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Collect a snapshot for `pid`, `None` if the OS does not know it
    pub fn snapshot(&mut self, pid: u32) -> Option<ProcessSnapshot> {
        let sys_pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        self.system.process(sys_pid).map(|process| ProcessSnapshot {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            memory: process.memory(),
            cpu_usage: process.cpu_usage(),
            run_time: Duration::from_secs(process.run_time()),
        })
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_current_process() {
        let mut monitor = ProcessMonitor::new();
        let snapshot = monitor.snapshot(std::process::id()).unwrap();

        assert_eq!(snapshot.pid, std::process::id());
        assert!(snapshot.memory > 0);
        assert!(!snapshot.name.is_empty());
    }

    #[test]
    fn test_snapshot_reaped_process() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let mut monitor = ProcessMonitor::new();
        assert!(monitor.snapshot(pid).is_none());
    }
}
