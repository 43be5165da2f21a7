//! Filesystem layout, locking and atomic writes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;
use uuid::Uuid;

use depot_core::error::{Error, InvalidArgumentError};
use depot_core::{BackendUrl, QueueName, RecordId, Result};

fn map_io(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |err| Error::unavailable(format!("IO error on {}: {}", path.display(), err))
}

/// Exclusive advisory lock, released on drop.
#[derive(Debug)]
pub(crate) struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Closing the file releases the lock as well.
        let _ = FileExt::unlock(&self.file);
    }
}

/// Root directory shared by file-backed stores and queues.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a file store at the given root directory.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Open the store a `file://` backend URL points at.
    pub fn from_url(url: &BackendUrl) -> Result<Self> {
        let root = url.to_file_path().ok_or_else(|| {
            Error::from(InvalidArgumentError::BackendUrl {
                value: url.to_string(),
                reason: "not a local file URL".to_string(),
            })
        })?;
        Ok(Self::new(root))
    }

    /// Get the root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // Layout
    // ========================================================================

    pub(crate) fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join("tables").join(table)
    }

    pub(crate) fn table_lock_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("table.lock")
    }

    /// Last version issued in a table.
    pub(crate) fn table_clock_path(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("clock.json")
    }

    pub(crate) fn records_dir(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("records")
    }

    /// Path of a record file.
    pub(crate) fn record_path(&self, table: &str, id: &RecordId) -> PathBuf {
        // Windows does not allow ':' in path segments; '%' never occurs in ids.
        let file_name = format!("{}.json", id.as_str().replace(':', "%3A"));
        self.records_dir(table).join(file_name)
    }

    pub(crate) fn queues_dir(&self) -> PathBuf {
        self.root.join("queues")
    }

    pub(crate) fn registry_lock_path(&self) -> PathBuf {
        self.root.join("queues.lock")
    }

    pub(crate) fn queue_dir(&self, name: &QueueName) -> PathBuf {
        self.queues_dir().join(name.as_str())
    }

    pub(crate) fn queue_path(&self, name: &QueueName) -> PathBuf {
        self.queue_dir(name).join("queue.json")
    }

    pub(crate) fn queue_lock_path(&self, name: &QueueName) -> PathBuf {
        self.queue_dir(name).join("queue.lock")
    }

    // ========================================================================
    // File primitives
    // ========================================================================

    /// Block until the lock file at `path` is exclusively ours.
    pub(crate) fn lock(&self, path: &Path) -> Result<LockGuard> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(map_io(parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(map_io(path))?;

        file.lock_exclusive().map_err(map_io(path))?;
        trace!(path = %path.display(), "Acquired lock");

        Ok(LockGuard { file })
    }

    /// Read and parse a JSON file. A missing file is `Ok(None)`.
    pub(crate) fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io(path)(err)),
        }
    }

    /// Replace `path` with the JSON form of `value` in one rename.
    pub(crate) fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(map_io(parent))?;
        }

        let content = serde_json::to_vec_pretty(value)?;

        // Unique per writer so concurrent processes never share a temp file.
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let mut file = File::create(&temp_path).map_err(map_io(&temp_path))?;
        file.write_all(&content).map_err(map_io(&temp_path))?;
        file.sync_data().map_err(map_io(&temp_path))?;
        fs::rename(&temp_path, path).map_err(map_io(path))?;

        Ok(())
    }

    /// Remove a file. Returns false if it did not exist.
    pub(crate) fn remove_file(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(map_io(path)(err)),
        }
    }

    /// Remove a directory tree. Returns false if it did not exist.
    pub(crate) fn remove_dir(&self, path: &Path) -> Result<bool> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(map_io(path)(err)),
        }
    }

    /// Create a directory and its parents.
    pub(crate) fn ensure_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(map_io(path))
    }

    /// Paths of the `.json` files directly inside `dir`, sorted by name.
    pub(crate) fn json_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(map_io(dir)(err)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Names of the subdirectories of `dir`, sorted.
    pub(crate) fn subdirectories(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(map_io(dir)(err)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}
