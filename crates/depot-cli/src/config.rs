//! Backend resolution shared by every command.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use tracing::{debug, warn};

use depot_core::{BackendUrl, RecordStore};
use depot_file::{FileRecordStore, FileStore};
use depot_memory::MemoryRecordStore;

/// The adapters a backend URL selects.
#[derive(Debug, Clone)]
pub enum Backend {
    Memory,
    File(FileStore),
}

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub backend: Backend,
    pub table: String,
    pub pretty: bool,
}

impl Context {
    /// Resolve the backend URL, falling back to the platform data directory.
    pub fn resolve(backend: Option<&str>, table: String, pretty: bool) -> Result<Self> {
        let url = match backend {
            Some(s) => BackendUrl::new(s).context("Invalid backend URL")?,
            None => default_backend()?,
        };

        let backend = if url.is_memory() {
            warn!("memory: backend does not persist between invocations");
            Backend::Memory
        } else {
            Backend::File(FileStore::from_url(&url).context("Invalid backend URL")?)
        };
        debug!(backend = %url, table = %table, "Resolved backend");

        Ok(Self {
            backend,
            table,
            pretty,
        })
    }

    /// Open the record store for the selected table.
    pub fn record_store(&self) -> Result<Box<dyn RecordStore>> {
        match &self.backend {
            Backend::Memory => Ok(Box::new(MemoryRecordStore::new())),
            Backend::File(store) => {
                let records = FileRecordStore::new(store.clone(), self.table.clone())
                    .context("Invalid table name")?;
                Ok(Box::new(records))
            }
        }
    }
}

/// `file://<data dir>/depot`.
fn default_backend() -> Result<BackendUrl> {
    let dirs =
        ProjectDirs::from("", "", "depot").context("Could not determine data directory")?;
    BackendUrl::from_directory(dirs.data_dir()).context("Invalid data directory")
}
