//! Board store: column and card operations on the active board, persisted
//! write-through, with card images released when their card goes away.

use std::path::Path;

use tracing::{info, warn};

use crate::model::{Board, Card, CardPatch, ColumnId, KanbanDocument};
use crate::storage::{self, DataDir, DocumentStore, ImageStore, Result, StoreError};

pub struct KanbanStore {
    docs: DocumentStore<KanbanDocument>,
    images: ImageStore,
}

impl KanbanStore {
    pub fn open(data: &DataDir) -> Result<Self> {
        data.ensure()?;
        Ok(KanbanStore {
            docs: DocumentStore::open(data.kanban_path())?,
            images: ImageStore::new(data.images_dir()),
        })
    }

    pub fn document(&self) -> &KanbanDocument {
        self.docs.get()
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn active_board(&self) -> Option<&Board> {
        self.docs.get().active_board()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.docs.flush()
    }

    /// Runs `f` on the active board, writing only when it reports a change.
    fn with_board<R>(&mut self, f: impl FnOnce(&mut Board) -> Option<R>) -> Result<Option<R>> {
        self.docs.try_update(|doc| doc.active_board_mut().and_then(f))
    }

    /// `with_board` that returns the change alongside the write result, so
    /// image cleanup can follow the in-memory document even when the write
    /// fails.
    fn with_board_outcome<R>(&mut self, f: impl FnOnce(&mut Board) -> Option<R>) -> (Option<R>, Result<()>) {
        self.docs.try_update_outcome(|doc| doc.active_board_mut().and_then(f))
    }

    fn release_images<'a>(&self, cards: impl IntoIterator<Item = &'a Card>) {
        for name in cards.into_iter().filter_map(|c| c.image.as_deref()) {
            self.release_image(name);
        }
    }

    /// A stale image file is harmless, so failures are only logged.
    fn release_image(&self, name: &str) {
        if let Err(err) = self.images.delete(name) {
            warn!(file = name, error = %err, "could not release card image");
        }
    }

    pub fn add_card(&mut self, column_id: &str, card: Card) -> Result<Option<String>> {
        let id = card.id.clone();
        self.with_board(|b| b.add_card(column_id, card).then_some(id))
    }

    pub fn move_card(&mut self, card_id: &str, target: &str) -> Result<bool> {
        Ok(self
            .with_board(|b| b.move_card(card_id, target).then_some(()))?
            .is_some())
    }

    pub fn edit_card(&mut self, card_id: &str, patch: &CardPatch) -> Result<bool> {
        Ok(self
            .with_board(|b| b.edit_card(card_id, patch).then_some(()))?
            .is_some())
    }

    /// Applies `f` to one card of the active board (tags, checklist).
    pub fn with_card<R>(&mut self, card_id: &str, f: impl FnOnce(&mut Card) -> Option<R>) -> Result<Option<R>> {
        self.with_board(|b| b.find_card_mut(card_id).and_then(f))
    }

    pub fn delete_card(&mut self, card_id: &str) -> Result<Option<Card>> {
        let (removed, written) = self.with_board_outcome(|b| b.delete_card(card_id));
        if let Some(card) = &removed {
            self.release_images([card]);
        }
        written?;
        Ok(removed)
    }

    pub fn add_column(&mut self, title: &str) -> Result<Option<ColumnId>> {
        self.with_board(|b| b.add_column(title))
    }

    pub fn delete_column(&mut self, column_id: &str) -> Result<Option<Vec<Card>>> {
        let (removed, written) = self.with_board_outcome(|b| b.delete_column(column_id));
        if let Some(cards) = &removed {
            self.release_images(cards);
        }
        written?;
        Ok(removed)
    }

    pub fn rename_column(&mut self, column_id: &str, title: &str) -> Result<bool> {
        Ok(self
            .with_board(|b| b.rename_column(column_id, title).then_some(()))?
            .is_some())
    }

    pub fn reorder_column(&mut self, dragged: &str, target: &str) -> Result<bool> {
        Ok(self
            .with_board(|b| b.reorder_column(dragged, target).then_some(()))?
            .is_some())
    }

    /// Copies `source` into the images folder and points the card at it,
    /// releasing the previous image. The card references the new file from
    /// the moment this returns, even if the document write failed.
    pub fn set_card_image(&mut self, card_id: &str, source: &Path) -> Result<Option<String>> {
        let previous = match self.active_board().and_then(|b| b.find_card(card_id)) {
            Some((_, card)) => card.image.clone(),
            None => return Ok(None),
        };
        let bytes = std::fs::read(source).map_err(|e| StoreError::Read {
            path: source.to_path_buf(),
            source: e,
        })?;
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "png".to_string());
        let name = self
            .images
            .save_bytes(&bytes, &ImageStore::card_image_name(card_id, &ext))?;
        let patch = CardPatch {
            image: Some(Some(name.clone())),
            ..CardPatch::default()
        };
        let (applied, written) = self.with_board_outcome(|b| b.edit_card(card_id, &patch).then_some(()));
        if applied.is_none() {
            self.release_image(&name);
            written?;
            return Ok(None);
        }
        if let Some(old) = previous.filter(|old| *old != name) {
            self.release_image(&old);
        }
        written?;
        Ok(Some(name))
    }

    pub fn clear_card_image(&mut self, card_id: &str) -> Result<bool> {
        let previous = match self.active_board().and_then(|b| b.find_card(card_id)) {
            Some((_, card)) => card.image.clone(),
            None => return Ok(false),
        };
        let old = match previous {
            Some(old) => old,
            None => return Ok(false),
        };
        let patch = CardPatch {
            image: Some(None),
            ..CardPatch::default()
        };
        // The file goes only once no card in memory points at it.
        let (applied, written) = self.with_board_outcome(|b| b.edit_card(card_id, &patch).then_some(()));
        if applied.is_some() {
            self.release_image(&old);
        }
        written?;
        Ok(applied.is_some())
    }

    pub fn create_board(&mut self, title: &str) -> Result<Option<String>> {
        self.docs.try_update(|doc| doc.create_board(title))
    }

    pub fn rename_board(&mut self, board_id: &str, title: &str) -> Result<bool> {
        Ok(self
            .docs
            .try_update(|doc| doc.rename_board(board_id, title).then_some(()))?
            .is_some())
    }

    pub fn delete_board(&mut self, board_id: &str) -> Result<Option<Board>> {
        let (removed, written) = self.docs.try_update_outcome(|doc| doc.delete_board(board_id));
        if let Some(board) = &removed {
            for name in board.image_names() {
                self.release_image(name);
            }
        }
        written?;
        Ok(removed)
    }

    pub fn set_active(&mut self, board_id: &str) -> Result<bool> {
        Ok(self
            .docs
            .try_update(|doc| doc.set_active(board_id).then_some(()))?
            .is_some())
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        storage::export_kanban(self.docs.get(), path)
    }

    /// Replaces the whole document with the one in `path`. The current data
    /// is untouched when the file is rejected.
    pub fn import(&mut self, path: &Path) -> Result<usize> {
        let doc = storage::import_kanban(path)?;
        let count = doc.boards.len();
        self.docs.replace(doc)?;
        info!(boards = count, "kanban document replaced by import");
        Ok(count)
    }
}
