// Command-line scenarios: exit codes and messages of the ttsctl binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use ttsctl::daemon::{LivenessProbe, PidFile, PidStore, Signaller, StopSignal, SystemProbe};

const F5_TTS_VARS: [&str; 8] = [
    "F5_TTS_BASE_DIR",
    "F5_TTS_CACHE_DIR",
    "F5_TTS_CHARACTER_DIR",
    "F5_TTS_MODEL_DIR",
    "F5_TTS_LOG_DIR",
    "F5_TTS_HOST",
    "F5_TTS_PORT",
    "F5_TTS_PYTHON",
];

struct Workspace {
    _temp_dir: TempDir,
    base_dir: PathBuf,
    config: PathBuf,
}

impl Workspace {
    /// Workspace whose "server" is a shell script that sleeps.
    ///
    /// `sh` takes the module argument as its script; `-m` only turns on
    /// job control, and the server flags become ignored positionals.
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base_dir = temp_dir.path().join("f5-tts");
        let script = temp_dir.path().join("server.sh");
        fs::write(&script, "exec sleep 30\n").unwrap();

        let config = temp_dir.path().join("ttsctl.toml");
        fs::write(
            &config,
            format!(
                "program = \"/bin/sh\"\nmodule = \"{}\"\n",
                script.display()
            ),
        )
        .unwrap();

        Self {
            _temp_dir: temp_dir,
            base_dir,
            config,
        }
    }

    fn pid_file(&self) -> PathBuf {
        self.base_dir.join("api_server.pid")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_ttsctl"));
        for var in F5_TTS_VARS {
            command.env_remove(var);
        }
        command
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config)
            .arg("--base-dir")
            .arg(&self.base_dir);
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().unwrap()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Ok(Some(pid)) = PidFile::with_path(self.pid_file()).read() {
            let _ = SystemProbe::new().signal(pid, StopSignal::Kill);
        }
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn recorded_pid(path: &Path) -> u32 {
    PidFile::with_path(path).read().unwrap().unwrap()
}

/// PID of a process that has already exited and been reaped
fn dead_pid() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[test]
fn test_start_then_refuse_second_start() {
    let ws = Workspace::new();

    let first = ws.run(&["start"]);
    assert_eq!(first.status.code(), Some(0), "{}", stdout(&first));
    assert!(stdout(&first).contains("Server started in the background"));

    let pid = recorded_pid(&ws.pid_file());
    assert!(SystemProbe::new().is_alive(pid));

    let second = ws.run(&["start"]);
    assert_eq!(second.status.code(), Some(1));
    assert!(stdout(&second).contains(&format!("already running with PID {}", pid)));
    assert_eq!(recorded_pid(&ws.pid_file()), pid);
}

#[test]
fn test_stop_running_server_then_stop_again() {
    let ws = Workspace::new();
    assert_eq!(ws.run(&["start"]).status.code(), Some(0));
    let pid = recorded_pid(&ws.pid_file());

    let stopped = ws.run(&["stop"]);
    assert_eq!(stopped.status.code(), Some(0));
    assert!(stdout(&stopped).contains(&format!("Server (PID {}) stopped", pid)));
    assert!(!ws.pid_file().exists());

    let again = ws.run(&["stop"]);
    assert_eq!(again.status.code(), Some(0));
    assert!(stdout(&again).contains("PID file not found"));
}

#[test]
fn test_stop_with_stale_pid_file() {
    let ws = Workspace::new();
    let stale = dead_pid();
    PidFile::with_path(ws.pid_file()).write(stale).unwrap();

    let output = ws.run(&["stop"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("not running"));
    assert!(!ws.pid_file().exists());
}

#[test]
fn test_status_reports_not_running() {
    let ws = Workspace::new();

    let output = ws.run(&["status"]);

    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).contains("Server is not running"));
}

#[test]
fn test_launch_failure_exits_nonzero() {
    let ws = Workspace::new();

    let output = ws
        .command()
        .arg("start")
        .env("F5_TTS_PYTHON", "/nonexistent/python")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
    assert!(!ws.pid_file().exists());
}

#[test]
fn test_restart_replaces_running_server() {
    let ws = Workspace::new();
    assert_eq!(ws.run(&["start"]).status.code(), Some(0));
    let old_pid = recorded_pid(&ws.pid_file());

    let output = ws.run(&["restart"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains(&format!("Server (PID {}) stopped", old_pid)));
    assert!(text.contains("Server started in the background"));
    assert_ne!(recorded_pid(&ws.pid_file()), old_pid);
}
