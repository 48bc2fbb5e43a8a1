// PID file management for the supervised service

use crate::error::{CtlError, Result};
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default PID file name, resolved against the base directory
pub const DEFAULT_PID_FILE: &str = "api_server.pid";

/// Single-slot record of the supervised instance's process identifier.
///
/// A stored PID is a claim, not proof, that the instance is alive.
/// There is no locking: callers check liveness before calling `write`.
pub trait PidStore {
    /// Read the stored PID, `None` when no record exists
    fn read(&self) -> Result<Option<u32>>;

    /// Store `pid`, replacing any existing record
    fn write(&self, pid: u32) -> Result<()>;

    /// Remove the record; no-op when absent
    fn clear(&self) -> Result<()>;
}

impl<T: PidStore + ?Sized> PidStore for &T {
    fn read(&self) -> Result<Option<u32>> {
        (**self).read()
    }

    fn write(&self, pid: u32) -> Result<()> {
        (**self).write(pid)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Parse the textual contents of a PID record
pub fn parse_pid(content: &str) -> Result<u32> {
    let trimmed = content.trim();
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CtlError::CorruptRecord(format!(
            "Invalid PID '{}': expected decimal digits only",
            trimmed
        )));
    }
    match trimmed.parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid as u32),
        Ok(pid) => Err(CtlError::CorruptRecord(format!(
            "PID must be positive, found {}",
            pid
        ))),
        Err(e) => Err(CtlError::CorruptRecord(format!(
            "Invalid PID '{}': {}",
            trimmed, e
        ))),
    }
}

/// PID record backed by a file holding the decimal PID and a newline
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a PID file manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PidStore for PidFile {
    fn read(&self) -> Result<Option<u32>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CtlError::PidFileError(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let content = String::from_utf8(bytes).map_err(|e| {
            CtlError::CorruptRecord(format!("PID file is not valid UTF-8: {}", e))
        })?;
        parse_pid(&content).map(Some)
    }

    fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CtlError::PidFileError(format!("Failed to create PID directory: {}", e))
                })?;
            }
        }

        // Write to a sibling and rename so readers never see a partial record
        let staging = self.staging_path();
        fs::write(&staging, format!("{}\n", pid))
            .map_err(|e| CtlError::PidFileError(format!("Failed to write PID file: {}", e)))?;
        fs::rename(&staging, &self.path)
            .map_err(|e| CtlError::PidFileError(format!("Failed to replace PID file: {}", e)))?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CtlError::PidFileError(format!(
                "Failed to remove PID file: {}",
                e
            ))),
        }
    }
}

/// In-memory PID record, holding raw text so corrupt records can be modelled
#[derive(Debug, Default)]
pub struct MemoryPidStore {
    content: RefCell<Option<String>>,
}

impl MemoryPidStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding an existing record for `pid`
    pub fn with_pid(pid: u32) -> Self {
        Self::with_content(format!("{}\n", pid))
    }

    /// Store holding arbitrary raw record text
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            content: RefCell::new(Some(content.into())),
        }
    }

    /// Raw record text, `None` when cleared
    pub fn content(&self) -> Option<String> {
        self.content.borrow().clone()
    }
}

impl PidStore for MemoryPidStore {
    fn read(&self) -> Result<Option<u32>> {
        match self.content.borrow().as_deref() {
            Some(content) => parse_pid(content).map(Some),
            None => Ok(None),
        }
    }

    fn write(&self, pid: u32) -> Result<()> {
        *self.content.borrow_mut() = Some(format!("{}\n", pid));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.content.borrow_mut() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("svc.pid"));

        pid_file.write(31337).unwrap();

        assert_eq!(pid_file.read().unwrap(), Some(31337));
        let raw = fs::read_to_string(pid_file.path()).unwrap();
        assert_eq!(raw, "31337\n");
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("missing.pid"));

        assert!(!pid_file.exists());
        assert_eq!(pid_file.read().unwrap(), None);
    }

    #[test]
    fn test_write_overwrites_existing_record() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("svc.pid"));

        pid_file.write(100).unwrap();
        pid_file.write(200).unwrap();

        assert_eq!(pid_file.read().unwrap(), Some(200));
        assert!(!temp_dir.path().join("svc.pid.tmp").exists());
    }

    #[test]
    fn test_write_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("run/nested/svc.pid"));

        pid_file.write(7).unwrap();
        assert_eq!(pid_file.read().unwrap(), Some(7));
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::with_path(temp_dir.path().join("svc.pid"));

        pid_file.write(55).unwrap();
        assert!(pid_file.exists());

        pid_file.clear().unwrap();
        assert!(!pid_file.exists());

        // Clearing again is a no-op
        pid_file.clear().unwrap();
    }

    #[test]
    fn test_corrupt_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("svc.pid");
        let pid_file = PidFile::with_path(&path);

        for bad in ["", "abc", "-5", "+5", "0", "12 34", "99999999999"] {
            fs::write(&path, bad).unwrap();
            assert!(
                matches!(pid_file.read(), Err(CtlError::CorruptRecord(_))),
                "expected corrupt record for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_non_utf8_contents_are_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("svc.pid");
        let pid_file = PidFile::with_path(&path);

        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(pid_file.read(), Err(CtlError::CorruptRecord(_))));
    }

    #[test]
    fn test_parse_pid_rejects_sign() {
        assert!(matches!(parse_pid("+5"), Err(CtlError::CorruptRecord(_))));
        assert!(matches!(parse_pid(" +42\n"), Err(CtlError::CorruptRecord(_))));
    }

    #[test]
    fn test_parse_pid_tolerates_whitespace() {
        assert_eq!(parse_pid("  1234\n").unwrap(), 1234);
        assert_eq!(parse_pid("1\r\n").unwrap(), 1);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryPidStore::new();
        assert_eq!(store.read().unwrap(), None);

        store.write(12).unwrap();
        assert_eq!(store.read().unwrap(), Some(12));
        assert_eq!(store.content().as_deref(), Some("12\n"));

        store.clear().unwrap();
        assert_eq!(store.content(), None);

        let corrupt = MemoryPidStore::with_content("garbage");
        assert!(matches!(corrupt.read(), Err(CtlError::CorruptRecord(_))));
    }
}
