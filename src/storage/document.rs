use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{atomic_write, Result, StoreError};
use crate::model::{CanvasDocument, NotesDocument};

/// Result of parsing a persisted document.
#[derive(Debug)]
pub struct Decoded<D> {
    pub doc: D,
    /// Set when the text was in an older shape (or absent) and the document
    /// should be written back in the current one.
    pub upgraded: bool,
}

/// A whole-file JSON document.
pub trait Document: Serialize + Sized {
    const NAME: &'static str;

    /// The document used when nothing is on disk yet.
    fn fresh() -> Self;

    fn decode(text: &str) -> Result<Decoded<Self>>;

    fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Exclusive owner of one document file.
///
/// Writes go through: every mutation serializes the whole document and
/// replaces the file before returning. Because all mutation takes `&mut self`
/// there is never more than one write in flight per document. A failed
/// write keeps the in-memory change, marks the store dirty and returns the
/// error; `flush` retries it.
#[derive(Debug)]
pub struct DocumentStore<D> {
    path: PathBuf,
    doc: D,
    dirty: bool,
}

impl<D: Document> DocumentStore<D> {
    /// Loads the document at `path`, creating or upgrading it on disk when
    /// needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let decoded = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Decoded {
                doc: D::fresh(),
                upgraded: true,
            },
            Ok(text) => D::decode(&text).map_err(|err| match err {
                StoreError::Json(source) => StoreError::Parse {
                    path: path.clone(),
                    source,
                },
                other => other,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Decoded {
                doc: D::fresh(),
                upgraded: true,
            },
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let mut store = DocumentStore {
            path,
            doc: decoded.doc,
            dirty: decoded.upgraded,
        };
        if decoded.upgraded {
            info!(document = D::NAME, path = %store.path.display(), "writing initial or upgraded document");
            store.write()?;
        }
        Ok(store)
    }

    pub fn get(&self) -> &D {
        &self.doc
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Applies `f` and writes the document.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut D) -> R) -> Result<R> {
        let out = f(&mut self.doc);
        self.dirty = true;
        self.write()?;
        Ok(out)
    }

    /// Like `update`, but `None` from `f` means nothing changed and skips the
    /// write.
    pub fn try_update<R>(&mut self, f: impl FnOnce(&mut D) -> Option<R>) -> Result<Option<R>> {
        let (out, written) = self.try_update_outcome(f);
        written?;
        Ok(out)
    }

    /// Like `try_update`, but hands back what `f` returned even when the
    /// write fails. The change is already in memory at that point, so
    /// callers can finish side effects that follow it before reporting the
    /// error.
    pub fn try_update_outcome<R>(&mut self, f: impl FnOnce(&mut D) -> Option<R>) -> (Option<R>, Result<()>) {
        match f(&mut self.doc) {
            Some(out) => {
                self.dirty = true;
                let written = self.write();
                (Some(out), written)
            }
            None => (None, Ok(())),
        }
    }

    /// Swaps in a whole new document and writes it.
    pub fn replace(&mut self, doc: D) -> Result<()> {
        self.doc = doc;
        self.dirty = true;
        self.write()
    }

    /// Retries a previously failed write; a no-op when clean.
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.write()?;
        }
        Ok(())
    }

    fn write(&mut self) -> Result<()> {
        let text = self.doc.encode()?;
        if let Err(source) = atomic_write(&self.path, text.as_bytes()) {
            warn!(document = D::NAME, path = %self.path.display(), error = %source, "write failed; document left dirty");
            return Err(StoreError::Write {
                path: self.path.clone(),
                source,
            });
        }
        self.dirty = false;
        debug!(document = D::NAME, bytes = text.len(), "document written");
        Ok(())
    }
}

impl Document for NotesDocument {
    const NAME: &'static str = "notes";

    fn fresh() -> Self {
        NotesDocument::with_default_categories()
    }

    fn decode(text: &str) -> Result<Decoded<Self>> {
        let parsed: Option<NotesDocument> = serde_json::from_str(text)?;
        Ok(match parsed {
            Some(doc) => Decoded { doc, upgraded: false },
            None => Decoded {
                doc: Self::fresh(),
                upgraded: true,
            },
        })
    }
}

impl Document for CanvasDocument {
    const NAME: &'static str = "canvas";

    fn fresh() -> Self {
        CanvasDocument::default()
    }

    fn decode(text: &str) -> Result<Decoded<Self>> {
        let parsed: Option<CanvasDocument> = serde_json::from_str(text)?;
        let (mut doc, upgraded) = match parsed {
            Some(doc) => (doc, false),
            None => (Self::fresh(), true),
        };
        let before = doc.active_project_id.clone();
        doc.resolve_active();
        let upgraded = upgraded || before != doc.active_project_id;
        Ok(Decoded { doc, upgraded })
    }
}
