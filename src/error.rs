use thiserror::Error;

/// Main error type for the service controller
#[derive(Debug, Error)]
pub enum CtlError {
    // Lifecycle errors
    #[error("Service is already running with PID {0}")]
    AlreadyRunning(u32),

    #[error("Failed to launch service: {0}")]
    LaunchFailed(String),

    #[error("Failed to send signal: {0}")]
    SignalError(String),

    // PID file errors
    #[error("Corrupt PID file: {0}")]
    CorruptRecord(String),

    #[error("PID file error: {0}")]
    PidFileError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CtlError {
    /// Process exit code reported by the CLI for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CtlError::AlreadyRunning(_) => 1,
            _ => 2,
        }
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, CtlError>;
