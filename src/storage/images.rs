use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use tracing::{debug, warn};

use super::{atomic_write, check_file_name, Result, StoreError};
use crate::model::notes::{mime_for_name, strip_data_uri};
use crate::model::FileAttachment;

const TEMP_SUBDIR: &str = "kanban-temp-files";

/// Card images, stored as plain files and referenced by name.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

fn image_mime(name: &str) -> &'static str {
    match mime_for_name(name) {
        mime if mime.starts_with("image/") => mime,
        _ => "image/png",
    }
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ImageStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a new image on `card_id`, unique per save.
    pub fn card_image_name(card_id: &str, ext: &str) -> String {
        format!("card-{}-{}.{}", card_id, Utc::now().timestamp_millis(), ext)
    }

    /// Stores base64 data (with or without a `data:` prefix) under
    /// `filename` and returns the name to keep on the card.
    pub fn save(&self, data: &str, filename: &str) -> Result<String> {
        let bytes = STANDARD.decode(strip_data_uri(data).trim())?;
        self.save_bytes(&bytes, filename)
    }

    pub fn save_bytes(&self, bytes: &[u8], filename: &str) -> Result<String> {
        check_file_name(filename)?;
        let path = self.dir.join(filename);
        atomic_write(&path, bytes).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(file = filename, bytes = bytes.len(), "image saved");
        Ok(filename.to_string())
    }

    /// The image as a `data:` URI, or `None` when the file is gone.
    pub fn load(&self, filename: &str) -> Result<Option<String>> {
        check_file_name(filename)?;
        let path = self.dir.join(filename);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(file = filename, "image not found");
                return Ok(None);
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Some(format!(
            "data:{};base64,{}",
            image_mime(filename),
            STANDARD.encode(bytes)
        )))
    }

    /// Removes the image; an already missing file counts as success.
    pub fn delete(&self, filename: &str) -> Result<()> {
        check_file_name(filename)?;
        let path = self.dir.join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = filename, "image deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write { path, source }),
        }
    }
}

/// Decodes the attachment into `<temp_root>/kanban-temp-files/<name>`.
pub fn stage_attachment(file: &FileAttachment, temp_root: &Path) -> Result<PathBuf> {
    check_file_name(&file.name)?;
    let bytes = STANDARD.decode(file.payload().trim())?;
    let path = temp_root.join(TEMP_SUBDIR).join(&file.name);
    atomic_write(&path, &bytes).map_err(|source| StoreError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Stages the attachment and hands it to the OS default application.
pub fn open_attachment(file: &FileAttachment, temp_root: &Path) -> Result<PathBuf> {
    let path = stage_attachment(file, temp_root)?;
    open::that(&path).map_err(|source| StoreError::Open {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_strips_prefix_and_load_rebuilds_uri() {
        let dir = TempDir::new().unwrap();
        let images = ImageStore::new(dir.path());
        let name = images.save("data:image/png;base64,AQID", "card-1.jpg").unwrap();
        assert_eq!(fs::read(dir.path().join(&name)).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            images.load(&name).unwrap().as_deref(),
            Some("data:image/jpeg;base64,AQID")
        );
    }

    #[test]
    fn unknown_extension_loads_as_png() {
        let dir = TempDir::new().unwrap();
        let images = ImageStore::new(dir.path());
        images.save_bytes(&[0xff], "blob.bin").unwrap();
        assert!(images.load("blob.bin").unwrap().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn missing_image_loads_as_none_and_deletes_cleanly() {
        let dir = TempDir::new().unwrap();
        let images = ImageStore::new(dir.path());
        assert_eq!(images.load("nope.png").unwrap(), None);
        images.delete("nope.png").unwrap();
        images.save_bytes(b"x", "yes.png").unwrap();
        images.delete("yes.png").unwrap();
        assert!(!dir.path().join("yes.png").exists());
    }

    #[test]
    fn bad_base64_is_an_error() {
        let dir = TempDir::new().unwrap();
        let images = ImageStore::new(dir.path());
        assert!(matches!(images.save("!!!", "a.png"), Err(StoreError::Decode(_))));
    }

    #[test]
    fn attachments_are_staged_in_temp_subdir() {
        let dir = TempDir::new().unwrap();
        let file = FileAttachment::from_bytes("report.txt", b"hello");
        let path = stage_attachment(&file, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("kanban-temp-files").join("report.txt"));
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }
}
