// Daemon module - single-instance control of the background service

pub mod manager;
pub mod pid;
pub mod probe;

pub use manager::{
    ControllerSettings, ExitConfirmation, ServiceController, ServiceStatus, StaleRecord,
    StartOutcome, StopOutcome,
};
pub use pid::{MemoryPidStore, PidFile, PidStore};
pub use probe::{LivenessProbe, Signaller, StopSignal, SystemProbe};
