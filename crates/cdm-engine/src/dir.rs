//! Collaborators at the file-system boundary: directory handles and progress sinks.

use crate::error::IoError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

// ============================================================================
// Directory handles
// ============================================================================

/// A flat directory of files, addressed by file name.
pub trait CdmDirectory: fmt::Debug + Send + Sync {
    /// Stable description of where the directory lives; two handles with the
    /// same location refer to the same files.
    fn location(&self) -> String;

    /// File names, sorted.
    fn list_files(&self) -> Result<Vec<String>, IoError>;

    fn read_file(&self, name: &str) -> Result<Vec<u8>, IoError>;

    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), IoError>;

    fn is_empty(&self) -> Result<bool, IoError>;
}

/// A directory on the local file system.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

impl CdmDirectory for FsDirectory {
    fn location(&self) -> String {
        std::fs::canonicalize(&self.root)
            .unwrap_or_else(|_| self.root.clone())
            .display()
            .to_string()
    }

    fn list_files(&self) -> Result<Vec<String>, IoError> {
        let mut names = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let target = e
                    .path()
                    .unwrap_or(&self.root)
                    .display()
                    .to_string();
                IoError::access(target, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) => names.push(name.to_string()),
                None => tracing::warn!(
                    path = %entry.path().display(),
                    "skipping file with a non UTF-8 name"
                ),
            }
        }
        Ok(names)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, IoError> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|e| IoError::access(path.display().to_string(), e))
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), IoError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| IoError::access(self.root.display().to_string(), e))?;
        let path = self.root.join(name);
        std::fs::write(&path, contents).map_err(|e| IoError::access(path.display().to_string(), e))
    }

    fn is_empty(&self) -> Result<bool, IoError> {
        if !self.root.exists() {
            return Ok(true);
        }
        let mut entries = std::fs::read_dir(&self.root)
            .map_err(|e| IoError::access(self.root.display().to_string(), e))?;
        Ok(entries.next().is_none())
    }
}

/// An in-memory directory. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    label: String,
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryDirectory {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            files: Arc::default(),
        }
    }

    pub fn with_file(self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.write().insert(name.into(), contents.into());
        self
    }

    pub fn file_text(&self, name: &str) -> Option<String> {
        self.files
            .read()
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn remove_file(&self, name: &str) -> bool {
        self.files.write().remove(name).is_some()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.files.read().clone()
    }
}

impl CdmDirectory for MemoryDirectory {
    fn location(&self) -> String {
        format!("memory:{}", self.label)
    }

    fn list_files(&self) -> Result<Vec<String>, IoError> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>, IoError> {
        self.files.read().get(name).cloned().ok_or_else(|| {
            IoError::access(
                format!("{}/{name}", self.location()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), IoError> {
        self.files.write().insert(name.to_string(), contents.to_vec());
        Ok(())
    }

    fn is_empty(&self) -> Result<bool, IoError> {
        Ok(self.files.read().is_empty())
    }
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Parsing,
    Resolving,
    Writing,
}

/// Receives coarse progress ticks. Implementations must not affect results.
pub trait ProgressSink {
    fn report(&self, stage: ProgressStage, done: usize, total: usize);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _stage: ProgressStage, _done: usize, _total: usize) {}
}

/// Forwards ticks as `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, stage: ProgressStage, done: usize, total: usize) {
        tracing::debug!(?stage, done, total, "cdm progress");
    }
}
