//! On-disk persistence: JSON documents in a per-user data directory, plus the
//! images folder that card attachments point into.

pub mod document;
pub mod images;
pub mod kanban;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tempfile::NamedTempFile;

pub use document::{Decoded, Document, DocumentStore};
pub use images::{open_attachment, stage_attachment, ImageStore};
pub use kanban::{export_kanban, import_kanban, parse_import, KANBAN_VERSION};

pub const KANBAN_FILE: &str = "kanban-data.json";
pub const NOTES_FILE: &str = "notes-data.json";
pub const CANVAS_FILE: &str = "project-management-data.json";
pub const IMAGES_DIR: &str = "images";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid import: {0}")]
    InvalidImport(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("could not open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Layout of the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataDir { root: root.into() }
    }

    /// `<platform data dir>/deskboard/appData`.
    pub fn platform_default() -> Option<PathBuf> {
        ProjectDirs::from("", "", "deskboard").map(|dirs| dirs.data_dir().join("appData"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kanban_path(&self) -> PathBuf {
        self.root.join(KANBAN_FILE)
    }

    pub fn notes_path(&self) -> PathBuf {
        self.root.join(NOTES_FILE)
    }

    pub fn canvas_path(&self) -> PathBuf {
        self.root.join(CANVAS_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.images_dir()] {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Write { path: dir, source })?;
        }
        Ok(())
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Rejects names that would escape their directory.
pub(crate) fn check_file_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
