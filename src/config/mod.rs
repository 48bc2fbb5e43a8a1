// Configuration module - service settings, environment overrides and paths

use crate::daemon::pid::DEFAULT_PID_FILE;
use crate::daemon::probe::StopSignal;
use crate::error::{CtlError, Result};
use crate::process::LaunchSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables read when resolving the configuration
pub const ENV_BASE_DIR: &str = "F5_TTS_BASE_DIR";
pub const ENV_CACHE_DIR: &str = "F5_TTS_CACHE_DIR";
pub const ENV_CHARACTER_DIR: &str = "F5_TTS_CHARACTER_DIR";
pub const ENV_MODEL_DIR: &str = "F5_TTS_MODEL_DIR";
pub const ENV_LOG_DIR: &str = "F5_TTS_LOG_DIR";
pub const ENV_HOST: &str = "F5_TTS_HOST";
pub const ENV_PORT: &str = "F5_TTS_PORT";
pub const ENV_PYTHON: &str = "F5_TTS_PYTHON";

/// Settings for launching and controlling the TTS API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Working directory of the service; relative paths resolve against it
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Reference voices, one sub-directory per character
    #[serde(default)]
    pub character_dir: Option<PathBuf>,

    /// Model checkpoints and the Hugging Face cache
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Interpreter used to run the server module
    #[serde(default = "default_program")]
    pub program: PathBuf,

    #[serde(default = "default_module")]
    pub module: String,

    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default)]
    pub debug: bool,

    /// Extra arguments appended after the generated flags
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Log file name inside the log directory
    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default = "default_stop_signal")]
    pub stop_signal: String,

    /// How long `stop` waits for the process to exit; 0 clears the PID
    /// file right after signalling
    #[serde(default)]
    pub stop_timeout_secs: u64,
}

// Default value functions for serde
fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6006
}

fn default_program() -> PathBuf {
    PathBuf::from("python")
}

fn default_module() -> String {
    "f5_tts.api_server".to_string()
}

fn default_pid_file() -> PathBuf {
    PathBuf::from(DEFAULT_PID_FILE)
}

fn default_log_file() -> String {
    "api_server.log".to_string()
}

fn default_stop_signal() -> String {
    "SIGTERM".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            cache_dir: None,
            character_dir: None,
            model_dir: None,
            log_dir: None,
            host: default_host(),
            port: default_port(),
            program: default_program(),
            module: default_module(),
            model_path: None,
            debug: false,
            args: Vec::new(),
            env: HashMap::new(),
            pid_file: default_pid_file(),
            log_file: default_log_file(),
            stop_signal: default_stop_signal(),
            stop_timeout_secs: 0,
        }
    }
}

/// Resolved filesystem locations used by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePaths {
    pub base_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub character_dir: PathBuf,
    pub model_dir: PathBuf,
    pub log_dir: PathBuf,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

impl ServicePaths {
    /// Directories that must exist before the service is launched
    pub fn directories(&self) -> [&Path; 5] {
        [
            self.base_dir.as_path(),
            self.cache_dir.as_path(),
            self.character_dir.as_path(),
            self.model_dir.as_path(),
            self.log_dir.as_path(),
        ]
    }

    /// Create every service directory, succeeding if they already exist
    pub fn ensure(&self) -> Result<()> {
        for dir in self.directories() {
            std::fs::create_dir_all(dir).map_err(|e| {
                CtlError::ConfigError(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Load a configuration file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<ServiceConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CtlError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let mut config = match extension {
            "toml" => Self::parse_toml(&contents)?,
            "json" => Self::parse_json(&contents)?,
            _ => {
                return Err(CtlError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.expand_env_vars();
        config.validate()?;

        Ok(config)
    }

    fn parse_toml(contents: &str) -> Result<ServiceConfig> {
        toml::from_str(contents)
            .map_err(|e| CtlError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    fn parse_json(contents: &str) -> Result<ServiceConfig> {
        serde_json::from_str(contents)
            .map_err(|e| CtlError::InvalidConfig(format!("Failed to parse JSON: {}", e)))
    }

    /// Apply `F5_TTS_*` overrides using `lookup` to read variables
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(ENV_BASE_DIR) {
            self.base_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_CHARACTER_DIR) {
            self.character_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_MODEL_DIR) {
            self.model_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = get(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(host) = get(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = get(ENV_PORT) {
            self.port = port.trim().parse().map_err(|e| {
                CtlError::ConfigError(format!("Invalid {} '{}': {}", ENV_PORT, port, e))
            })?;
        }
        if let Some(program) = get(ENV_PYTHON) {
            self.program = PathBuf::from(program);
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CtlError::ConfigValidationError(
                "host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(CtlError::ConfigValidationError(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        if self.program.as_os_str().is_empty() {
            return Err(CtlError::ConfigValidationError(
                "program must not be empty".to_string(),
            ));
        }

        if self.module.trim().is_empty() {
            return Err(CtlError::ConfigValidationError(
                "module must not be empty".to_string(),
            ));
        }

        if self.pid_file.as_os_str().is_empty() || self.log_file.trim().is_empty() {
            return Err(CtlError::ConfigValidationError(
                "pid_file and log_file must not be empty".to_string(),
            ));
        }

        self.stop_signal()?;

        Ok(())
    }

    /// Parsed stop signal
    pub fn stop_signal(&self) -> Result<StopSignal> {
        self.stop_signal.parse()
    }

    /// Get stop timeout as Duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Resolve every directory and file location against `base_dir`
    pub fn paths(&self) -> ServicePaths {
        let base = self.base_dir.clone();
        let resolve = |explicit: &Option<PathBuf>, fallback: &str| match explicit {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base.join(path),
            None => base.join(fallback),
        };

        let log_dir = resolve(&self.log_dir, "logs");
        let pid_file = if self.pid_file.is_absolute() {
            self.pid_file.clone()
        } else {
            base.join(&self.pid_file)
        };

        ServicePaths {
            cache_dir: resolve(&self.cache_dir, "cache"),
            character_dir: resolve(&self.character_dir, "characters"),
            model_dir: resolve(&self.model_dir, "models"),
            log_file: log_dir.join(&self.log_file),
            log_dir,
            pid_file,
            base_dir: base,
        }
    }

    /// Build the server command line for `paths`
    pub fn launch_spec(&self, paths: &ServicePaths) -> LaunchSpec {
        let mut spec = LaunchSpec::new(&self.program)
            .arg("-m")
            .arg(&self.module)
            .args(["--host".to_string(), self.host.clone()])
            .args(["--port".to_string(), self.port.to_string()])
            .args([
                "--cache-dir".to_string(),
                paths.cache_dir.display().to_string(),
            ])
            .args([
                "--character-dir".to_string(),
                paths.character_dir.display().to_string(),
            ]);

        if let Some(ref model_path) = self.model_path {
            let model_path = if model_path.is_absolute() {
                model_path.clone()
            } else {
                paths.base_dir.join(model_path)
            };
            spec = spec.args(["--model-path".to_string(), model_path.display().to_string()]);
        }

        if self.debug {
            spec = spec.arg("--debug");
        }

        spec = spec.args(self.args.iter().cloned()).current_dir(&paths.base_dir);

        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }

        spec.env(ENV_BASE_DIR, paths.base_dir.display().to_string())
            .env(ENV_CACHE_DIR, paths.cache_dir.display().to_string())
            .env(ENV_CHARACTER_DIR, paths.character_dir.display().to_string())
            .env(ENV_MODEL_DIR, paths.model_dir.display().to_string())
            .env(ENV_LOG_DIR, paths.log_dir.display().to_string())
            .env("HF_HOME", paths.model_dir.display().to_string())
    }

    /// Expand environment variables in configuration fields
    fn expand_env_vars(&mut self) {
        self.base_dir = Self::expand_env_in_path(&self.base_dir);
        self.program = Self::expand_env_in_path(&self.program);
        self.pid_file = Self::expand_env_in_path(&self.pid_file);

        for dir in [
            &mut self.cache_dir,
            &mut self.character_dir,
            &mut self.model_dir,
            &mut self.log_dir,
            &mut self.model_path,
        ] {
            if let Some(path) = dir.take() {
                *dir = Some(Self::expand_env_in_path(&path));
            }
        }

        self.args = self
            .args
            .iter()
            .map(|arg| Self::expand_env_in_string(arg))
            .collect();

        // Values only
        self.env = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), Self::expand_env_in_string(v)))
            .collect();
    }

    /// Expand `$VAR` and `${VAR}` in a string
    fn expand_env_in_string(s: &str) -> String {
        expand_with(s, |name| std::env::var(name).ok())
    }

    fn expand_env_in_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        PathBuf::from(Self::expand_env_in_string(&path_str))
    }
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Substitute variable references, taking the longest name after `$`.
/// Unset variables are left as written.
fn expand_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) if braced[..end].chars().all(is_var_char) => (&braced[..end], end + 2),
                _ => ("", 0),
            },
            None => {
                let end = after.find(|c: char| !is_var_char(c)).unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => {
                result.push_str(&value);
                rest = &after[consumed..];
            }
            None => {
                result.push('$');
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}
