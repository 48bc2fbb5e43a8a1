// Output formatting and display for CLI

use crate::daemon::{ExitConfirmation, ServiceStatus, StaleRecord, StartOutcome, StopOutcome};
use crate::process::ProcessSnapshot;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub fn print_started(outcome: &StartOutcome) {
    if let Some(ref stale) = outcome.replaced_stale {
        print_info(&format!("Removed {}", describe_stale(stale)));
    }
    println!("{}", "✓ Server started in the background".green().bold());
    println!("  {}: {}", "PID".bold(), outcome.pid);
    println!("  {}: {}", "Log".bold(), outcome.log_file.display().to_string().cyan());
}

/// Refusal to start goes to stdout so scripts can capture the PID
pub fn print_already_running(pid: u32) {
    println!(
        "{} Server is already running with PID {}",
        "✗".red().bold(),
        pid
    );
}

pub fn print_stopped(outcome: &StopOutcome) {
    match outcome {
        StopOutcome::Stopped { pid, signal, exit } => {
            println!(
                "{}",
                format!("✓ Server (PID {}) stopped", pid).green().bold()
            );
            match exit {
                ExitConfirmation::NotAwaited => {}
                ExitConfirmation::Exited => println!("  {}: exited", "Process".bold()),
                ExitConfirmation::TimedOut => println!(
                    "  {}: {}",
                    "Process".bold(),
                    format!("still exiting after {}", signal).yellow()
                ),
            }
        }

        StopOutcome::NotRunning(stale) => {
            println!(
                "{} Server is not running; removed {}",
                "ℹ".blue().bold(),
                describe_stale(stale)
            );
        }

        StopOutcome::NotFound => {
            println!("{} PID file not found", "ℹ".blue().bold());
        }
    }
}

pub fn print_status(status: &ServiceStatus, snapshot: Option<&ProcessSnapshot>, pid_file: &Path) {
    match status {
        ServiceStatus::Running(pid) => {
            println!("{}", "✓ Server is running".green().bold());
            println!("  {}: {}", "PID".bold(), pid);
            if let Some(snapshot) = snapshot {
                println!("  {}: {}", "Command".bold(), snapshot.name);
                println!("  {}: {}", "Uptime".bold(), format_duration(&snapshot.run_time));
                println!("  {}: {}", "Memory".bold(), format_memory(snapshot.memory));
                println!("  {}: {:.1}%", "CPU".bold(), snapshot.cpu_usage);
            }
        }

        ServiceStatus::Stale(stale) => {
            println!("{}", "✗ Server is not running".red().bold());
            println!(
                "  {}: {} ({})",
                "PID file".bold(),
                pid_file.display(),
                describe_stale(stale).yellow()
            );
        }

        ServiceStatus::Stopped => {
            println!("{}", "✗ Server is not running".red().bold());
        }
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

fn describe_stale(stale: &StaleRecord) -> String {
    match stale {
        StaleRecord::Dead(pid) => format!("stale PID file (PID {} is gone)", pid),
        StaleRecord::Corrupt(reason) => format!("corrupt PID file ({})", reason),
    }
}

fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

fn format_memory(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    }
}

/// Create a spinner for long operations
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn finish_progress_success(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✓".green(), message));
}

pub fn finish_progress_error(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✗".red(), message));
}
