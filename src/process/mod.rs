// Process module - launching the service and inspecting it

pub mod monitor;
pub mod spawner;
pub mod spec;

pub use monitor::{ProcessMonitor, ProcessSnapshot};
pub use spawner::{DetachedLauncher, ProcessLauncher};
pub use spec::LaunchSpec;
